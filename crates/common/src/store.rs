use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Bar, Result};

/// Abstraction over the ordered daily-bar time series.
///
/// `PgPriceStore` implements this against Postgres.
/// `MemoryPriceStore` implements this in-process for tests and tooling.
///
/// The series is append-only: bars are inserted one row at a time and never
/// updated or removed. Every read returns bars in ascending timestamp order.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Timestamp of the newest stored bar, or `None` when the store is empty.
    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>>;

    /// Insert a single bar. Returns `false` when a bar with the same
    /// timestamp already exists (the stored row is left untouched).
    async fn insert_bar(&self, bar: &Bar) -> Result<bool>;

    /// The full series, oldest first.
    async fn bars(&self) -> Result<Vec<Bar>>;

    /// Bars with `start <= timestamp < end`, oldest first.
    async fn bars_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Bar>>;

    /// The newest `limit` bars, oldest first.
    async fn recent_bars(&self, limit: usize) -> Result<Vec<Bar>>;
}
