use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use common::{Bar, PriceStore, Result};

const SELECT_COLUMNS: &str =
    "SELECT time, open_price, high_price, low_price, close_price, volume FROM price_bars";

/// Postgres-backed price series (`price_bars` table, see `migrations/`).
#[derive(Clone)]
pub struct PgPriceStore {
    db: PgPool,
}

impl PgPriceStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl PriceStore for PgPriceStore {
    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar("SELECT MAX(time) FROM price_bars")
            .fetch_one(&self.db)
            .await?;
        Ok(latest)
    }

    async fn insert_bar(&self, bar: &Bar) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO price_bars (time, open_price, close_price, high_price, low_price, volume)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (time) DO NOTHING
            "#,
        )
        .bind(bar.timestamp)
        .bind(bar.open)
        .bind(bar.close)
        .bind(bar.high)
        .bind(bar.low)
        .bind(bar.volume)
        .execute(&self.db)
        .await?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!(time = %bar.timestamp, "Bar already stored, skipping");
        }
        Ok(inserted)
    }

    async fn bars(&self) -> Result<Vec<Bar>> {
        let bars = sqlx::query_as::<_, Bar>(&format!("{SELECT_COLUMNS} ORDER BY time ASC"))
            .fetch_all(&self.db)
            .await?;
        Ok(bars)
    }

    async fn bars_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Bar>> {
        let bars = sqlx::query_as::<_, Bar>(&format!(
            "{SELECT_COLUMNS} WHERE time >= $1 AND time < $2 ORDER BY time ASC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        Ok(bars)
    }

    async fn recent_bars(&self, limit: usize) -> Result<Vec<Bar>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut bars = sqlx::query_as::<_, Bar>(&format!(
            "{SELECT_COLUMNS} ORDER BY time DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        bars.reverse();
        Ok(bars)
    }
}
