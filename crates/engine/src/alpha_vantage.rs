use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use common::{Error, Result};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// How much history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSize {
    /// The latest 100 trading days.
    Compact,
    /// Complete available history.
    Full,
}

impl OutputSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

impl std::fmt::Display for OutputSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One day as returned by the provider. Every field is a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DailyRecord {
    #[serde(rename = "1. open")]
    pub open: String,
    #[serde(rename = "2. high")]
    pub high: String,
    #[serde(rename = "3. low")]
    pub low: String,
    #[serde(rename = "4. close")]
    pub close: String,
    #[serde(rename = "5. volume")]
    pub volume: String,
}

/// Provider payload keyed by `YYYY-MM-DD` date strings.
pub type DailySeries = BTreeMap<String, DailyRecord>;

/// Abstraction over the external market-data provider.
///
/// `AlphaVantageClient` implements this over HTTP; tests use canned series.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch the daily series. `Ok(None)` means the provider answered with a
    /// non-success status.
    async fn daily_series(&self, size: OutputSize) -> Result<Option<DailySeries>>;
}

/// REST client for the Alpha Vantage `TIME_SERIES_DAILY` endpoint.
pub struct AlphaVantageClient {
    api_key: String,
    symbol: String,
    http: Client,
}

impl AlphaVantageClient {
    pub fn new(api_key: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            symbol: symbol.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageClient {
    async fn daily_series(&self, size: OutputSize) -> Result<Option<DailySeries>> {
        info!(symbol = %self.symbol, outputsize = %size, "Fetching daily series from Alpha Vantage");

        let resp = self
            .http
            .get(BASE_URL)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", self.symbol.as_str()),
                ("outputsize", size.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        info!(status = %status, "Alpha Vantage response received");
        if !status.is_success() {
            warn!(status = %status, "Alpha Vantage returned a non-success status");
            return Ok(None);
        }

        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        parse_daily_response(&body).map(Some)
    }
}

/// Extract the daily series from a response body.
///
/// Rate-limit notices and error messages arrive with a 200 status and no
/// series; they are logged and yield an empty series.
pub fn parse_daily_response(body: &str) -> Result<DailySeries> {
    let resp: DailyResponse =
        serde_json::from_str(body).map_err(|e| Error::Provider(e.to_string()))?;

    if resp.series.is_empty() {
        if let Some(msg) = resp.error.or(resp.note).or(resp.information) {
            warn!(message = %msg, "Alpha Vantage returned no series");
        }
    }
    debug!(days = resp.series.len(), "Parsed daily series");
    Ok(resp.series)
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)", default)]
    series: DailySeries,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Meta Data": {
            "1. Information": "Daily Prices (open, high, low, close) and Volumes",
            "2. Symbol": "AAPL"
        },
        "Time Series (Daily)": {
            "2024-10-18": {
                "1. open": "236.1800",
                "2. high": "236.1800",
                "3. low": "234.0100",
                "4. close": "235.0000",
                "5. volume": "46431472"
            },
            "2024-10-17": {
                "1. open": "233.4300",
                "2. high": "233.8500",
                "3. low": "230.5200",
                "4. close": "232.1500",
                "5. volume": "32993810"
            }
        }
    }"#;

    #[test]
    fn parses_time_series_object() {
        let series = parse_daily_response(SAMPLE).unwrap();
        assert_eq!(series.len(), 2);
        let day = &series["2024-10-18"];
        assert_eq!(day.open, "236.1800");
        assert_eq!(day.close, "235.0000");
        assert_eq!(day.volume, "46431472");
    }

    #[test]
    fn rate_limit_note_yields_empty_series() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        assert!(parse_daily_response(body).unwrap().is_empty());
    }

    #[test]
    fn malformed_body_is_a_provider_error() {
        assert!(matches!(
            parse_daily_response("<html>bad gateway</html>"),
            Err(Error::Provider(_))
        ));
    }

    #[test]
    fn output_size_query_values() {
        assert_eq!(OutputSize::Compact.as_str(), "compact");
        assert_eq!(OutputSize::Full.to_string(), "full");
    }
}
