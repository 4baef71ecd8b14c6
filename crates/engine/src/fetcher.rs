use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use common::{Bar, Error, PriceStore, Result};

use crate::alpha_vantage::{DailyRecord, DailySeries, MarketDataProvider, OutputSize};

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Days returned by the provider.
    pub fetched: usize,
    /// Bars newly written to the store.
    pub inserted: usize,
    /// Days dropped as malformed, negative, or already stored.
    pub skipped: usize,
}

/// Pulls daily bars from the provider and appends the new ones to the store.
///
/// This is the only component that writes bars. Bars are always inserted one
/// at a time in ascending timestamp order.
pub struct IngestionFetcher {
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn PriceStore>,
}

impl IngestionFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>, store: Arc<dyn PriceStore>) -> Self {
        Self { provider, store }
    }

    /// Fetch the recent window and insert every day after the store's newest
    /// bar.
    ///
    /// The store must already be seeded (see [`IngestionFetcher::backfill`]);
    /// an empty store is a configuration error. Provider failures and empty
    /// results are logged and reported as a run with zero inserts.
    pub async fn update_latest(&self) -> Result<IngestReport> {
        info!("Updating latest stock data");
        let watermark = self.store.latest_timestamp().await?.ok_or_else(|| {
            Error::Config("price store is empty; seed it with the backfill first".into())
        })?;

        let Some(series) = self.fetch(OutputSize::Compact).await else {
            return Ok(IngestReport::default());
        };

        let report = self
            .ingest(&series, |bar| bar.timestamp > watermark)
            .await?;
        if report.inserted == 0 {
            info!(watermark = %watermark, "No new data available");
        }
        Ok(report)
    }

    /// Seeding and gap repair: fetch the full history and insert every day on
    /// or after `since`, including days older than the newest stored bar.
    /// Days already stored are left untouched and counted as skipped.
    pub async fn backfill(&self, since: NaiveDate) -> Result<IngestReport> {
        let watermark = self.store.latest_timestamp().await?;
        let since = day_start(since);
        info!(since = %since, watermark = ?watermark, "Backfilling daily bars");

        let Some(series) = self.fetch(OutputSize::Full).await else {
            return Ok(IngestReport::default());
        };

        self.ingest(&series, |bar| bar.timestamp >= since).await
    }

    /// Provider failures never propagate past this point.
    async fn fetch(&self, size: OutputSize) -> Option<DailySeries> {
        match self.provider.daily_series(size).await {
            Ok(Some(series)) if !series.is_empty() => Some(series),
            Ok(Some(_)) => {
                info!("Provider returned an empty series");
                None
            }
            Ok(None) => {
                warn!("Error fetching data from provider; skipping this run");
                None
            }
            Err(e) => {
                warn!(error = %e, "Provider request failed; skipping this run");
                None
            }
        }
    }

    async fn ingest(
        &self,
        series: &DailySeries,
        keep: impl Fn(&Bar) -> bool,
    ) -> Result<IngestReport> {
        let (mut bars, malformed) = parse_daily_bars(series);
        let parsed = bars.len();
        bars.retain(|bar| keep(bar));
        bars.sort_by_key(|bar| bar.timestamp);

        let mut report = IngestReport {
            fetched: series.len(),
            inserted: 0,
            skipped: malformed + (parsed - bars.len()),
        };

        for bar in &bars {
            info!(time = %bar.timestamp, close = %bar.close, "Inserting bar");
            if self.store.insert_bar(bar).await? {
                report.inserted += 1;
            } else {
                report.skipped += 1;
            }
        }

        info!(
            fetched = report.fetched,
            inserted = report.inserted,
            skipped = report.skipped,
            "Ingestion finished"
        );
        Ok(report)
    }
}

/// Convert provider records into bars. Returns the bars (in no particular
/// order) and the number of records that were malformed or negative.
pub fn parse_daily_bars(series: &DailySeries) -> (Vec<Bar>, usize) {
    let mut bars = Vec::with_capacity(series.len());
    let mut skipped = 0;

    for (date, record) in series {
        match parse_record(date, record) {
            Ok(bar) if bar.is_non_negative() => bars.push(bar),
            Ok(_) => {
                warn!(date = %date, "Negative price or volume, skipping day");
                skipped += 1;
            }
            Err(e) => {
                warn!(date = %date, error = %e, "Malformed daily record, skipping day");
                skipped += 1;
            }
        }
    }
    (bars, skipped)
}

fn parse_record(date: &str, record: &DailyRecord) -> Result<Bar> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| Error::Provider(format!("bad date '{date}': {e}")))?;

    Ok(Bar::new(
        day_start(day),
        decimal(&record.open)?,
        decimal(&record.high)?,
        decimal(&record.low)?,
        decimal(&record.close)?,
        decimal(&record.volume)?,
    ))
}

fn decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| Error::Provider(format!("bad number '{raw}': {e}")))
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use store::MemoryPriceStore;

    /// Provider returning a canned answer.
    struct FakeProvider {
        answer: Option<DailySeries>,
    }

    #[async_trait]
    impl MarketDataProvider for FakeProvider {
        async fn daily_series(&self, _size: OutputSize) -> Result<Option<DailySeries>> {
            Ok(self.answer.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl MarketDataProvider for FailingProvider {
        async fn daily_series(&self, _size: OutputSize) -> Result<Option<DailySeries>> {
            Err(Error::Http("connection reset".into()))
        }
    }

    fn record(close: &str) -> DailyRecord {
        DailyRecord {
            open: close.into(),
            high: close.into(),
            low: close.into(),
            close: close.into(),
            volume: "1000".into(),
        }
    }

    fn series(days: &[(&str, &str)]) -> DailySeries {
        days.iter()
            .map(|(date, close)| (date.to_string(), record(close)))
            .collect()
    }

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn seeded_store() -> Arc<MemoryPriceStore> {
        let seed = Bar::new(ts(2024, 10, 16), dec!(1), dec!(1), dec!(1), dec!(1), dec!(1));
        Arc::new(MemoryPriceStore::with_bars([seed]))
    }

    fn fetcher(answer: Option<DailySeries>, store: Arc<MemoryPriceStore>) -> IngestionFetcher {
        IngestionFetcher::new(Arc::new(FakeProvider { answer }), store)
    }

    #[tokio::test]
    async fn inserts_only_days_after_watermark_in_order() {
        let store = seeded_store();
        let data = series(&[
            ("2024-10-18", "3.0"),
            ("2024-10-15", "0.5"),
            ("2024-10-16", "1.0"),
            ("2024-10-17", "2.0"),
        ]);
        let report = fetcher(Some(data), store.clone()).update_latest().await.unwrap();

        assert_eq!(report.fetched, 4);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 2);

        let closes: Vec<_> = store.bars().await.unwrap().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![dec!(1), dec!(2), dec!(3)]);
    }

    #[tokio::test]
    async fn refetch_without_new_data_inserts_nothing() {
        let store = seeded_store();
        let data = series(&[("2024-10-16", "1.0"), ("2024-10-17", "2.0")]);
        let f = fetcher(Some(data), store.clone());

        assert_eq!(f.update_latest().await.unwrap().inserted, 1);
        assert_eq!(f.update_latest().await.unwrap().inserted, 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn non_success_status_is_a_no_op() {
        let store = seeded_store();
        let report = fetcher(None, store.clone()).update_latest().await.unwrap();
        assert_eq!(report, IngestReport::default());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn transport_failure_is_a_no_op() {
        let store = seeded_store();
        let f = IngestionFetcher::new(Arc::new(FailingProvider), store.clone());
        assert_eq!(f.update_latest().await.unwrap(), IngestReport::default());
    }

    #[tokio::test]
    async fn empty_store_is_a_configuration_error() {
        let store = Arc::new(MemoryPriceStore::new());
        let data = series(&[("2024-10-17", "2.0")]);
        let err = fetcher(Some(data), store).update_latest().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn malformed_and_negative_days_are_skipped() {
        let store = seeded_store();
        let mut data = series(&[("2024-10-17", "2.0"), ("2024-10-18", "-4.0")]);
        data.insert("2024-10-19".into(), record("n/a"));
        data.insert("not-a-date".into(), record("5.0"));

        let report = fetcher(Some(data), store.clone()).update_latest().await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 3);
    }

    #[tokio::test]
    async fn backfill_seeds_from_start_date_and_is_repeatable() {
        let store = Arc::new(MemoryPriceStore::new());
        let data = series(&[
            ("2021-12-31", "9.0"),
            ("2022-01-03", "10.0"),
            ("2022-01-04", "11.0"),
        ]);
        let f = fetcher(Some(data), store.clone());
        let since = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();

        let first = f.backfill(since).await.unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(store.latest_timestamp().await.unwrap(), Some(ts(2022, 1, 4)));

        let second = f.backfill(since).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn backfill_fills_days_older_than_the_newest_bar() {
        let store = seeded_store();
        let data = series(&[
            ("2022-01-03", "10.0"),
            ("2022-01-04", "11.0"),
            ("2024-10-15", "0.5"),
            ("2024-10-16", "9.0"),
        ]);
        let since = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();

        let report = fetcher(Some(data), store.clone()).backfill(since).await.unwrap();
        assert_eq!(report, IngestReport { fetched: 4, inserted: 3, skipped: 1 });

        let times: Vec<_> = store.bars().await.unwrap().iter().map(|b| b.timestamp).collect();
        assert_eq!(
            times,
            vec![ts(2022, 1, 3), ts(2022, 1, 4), ts(2024, 10, 15), ts(2024, 10, 16)]
        );
        // The stored bar for the watermark day keeps its original close.
        assert_eq!(store.bars().await.unwrap()[3].close, dec!(1));
    }

    #[test]
    fn record_is_normalized_to_midnight_utc() {
        let (bars, skipped) = parse_daily_bars(&series(&[("2024-10-18", "235.12345")]));
        assert_eq!(skipped, 0);
        assert_eq!(bars[0].timestamp, ts(2024, 10, 18));
        assert_eq!(bars[0].close, dec!(235.1235));
    }
}
