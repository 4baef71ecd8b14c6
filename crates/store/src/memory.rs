use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use common::{Bar, PriceStore, Result};

/// In-process price series.
///
/// Keeps bars in a `BTreeMap` keyed by timestamp, so reads come back in
/// ascending order for free. Used by tests, the API test harness and local
/// experiments; nothing is persisted.
#[derive(Clone, Default)]
pub struct MemoryPriceStore {
    bars: Arc<RwLock<BTreeMap<DateTime<Utc>, Bar>>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-seeded with `bars` (duplicates keep the first bar).
    pub fn with_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut map = BTreeMap::new();
        for bar in bars {
            map.entry(bar.timestamp).or_insert(bar);
        }
        Self {
            bars: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn len(&self) -> usize {
        self.bars.read().await.len()
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.bars.read().await.keys().next_back().copied())
    }

    async fn insert_bar(&self, bar: &Bar) -> Result<bool> {
        let mut bars = self.bars.write().await;
        if bars.contains_key(&bar.timestamp) {
            debug!(time = %bar.timestamp, "Bar already stored, skipping");
            return Ok(false);
        }
        bars.insert(bar.timestamp, bar.clone());
        Ok(true)
    }

    async fn bars(&self) -> Result<Vec<Bar>> {
        Ok(self.bars.read().await.values().cloned().collect())
    }

    async fn bars_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Bar>> {
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(self
            .bars
            .read()
            .await
            .range(start..end)
            .map(|(_, bar)| bar.clone())
            .collect())
    }

    async fn recent_bars(&self, limit: usize) -> Result<Vec<Bar>> {
        let bars = self.bars.read().await;
        let mut recent: Vec<Bar> = bars.values().rev().take(limit).cloned().collect();
        recent.reverse();
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn bar(day: u32, close: Decimal) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            close,
            close,
            close,
            close,
            dec!(1000),
        )
    }

    #[tokio::test]
    async fn empty_store_has_no_watermark() {
        let store = MemoryPriceStore::new();
        assert!(store.latest_timestamp().await.unwrap().is_none());
        assert!(store.bars().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reads_are_ascending_regardless_of_insert_order() {
        let store = MemoryPriceStore::new();
        for day in [5, 2, 9, 1] {
            assert!(store.insert_bar(&bar(day, dec!(10))).await.unwrap());
        }

        let days: Vec<_> = store
            .bars()
            .await
            .unwrap()
            .iter()
            .map(|b| b.timestamp)
            .collect();
        let mut sorted = days.clone();
        sorted.sort();
        assert_eq!(days, sorted);
        assert_eq!(
            store.latest_timestamp().await.unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn duplicate_timestamp_is_not_overwritten() {
        let store = MemoryPriceStore::new();
        assert!(store.insert_bar(&bar(1, dec!(10))).await.unwrap());
        assert!(!store.insert_bar(&bar(1, dec!(99))).await.unwrap());

        let bars = store.bars().await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, dec!(10));
    }

    #[tokio::test]
    async fn recent_bars_returns_newest_oldest_first() {
        let store = MemoryPriceStore::with_bars((1..=10).map(|d| bar(d, Decimal::from(d))));
        let recent = store.recent_bars(3).await.unwrap();
        let closes: Vec<_> = recent.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![dec!(8), dec!(9), dec!(10)]);

        assert_eq!(store.recent_bars(50).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn bars_between_is_half_open() {
        let store = MemoryPriceStore::with_bars((1..=10).map(|d| bar(d, Decimal::from(d))));
        let start = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap();
        let closes: Vec<_> = store
            .bars_between(start, end)
            .await
            .unwrap()
            .iter()
            .map(|b| b.close)
            .collect();
        assert_eq!(closes, vec![dec!(3), dec!(4), dec!(5)]);
        assert!(store.bars_between(end, start).await.unwrap().is_empty());
    }
}
