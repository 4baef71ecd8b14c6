//! One-time seeding of the price store with the provider's full daily
//! history, starting at `BACKFILL_START`. Safe to re-run.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::Config;
use engine::{AlphaVantageClient, IngestionFetcher};
use store::PgPriceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env();
    info!(symbol = %cfg.symbol, since = %cfg.backfill_start, "Backfill starting");

    let db = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(cfg.database_options())
        .await
        .context("connecting to the price database")?;
    let pg = PgPriceStore::new(db);
    pg.migrate().await.context("applying migrations")?;

    let provider = Arc::new(AlphaVantageClient::new(&cfg.alpha_vantage_api_key, &cfg.symbol));
    let fetcher = IngestionFetcher::new(provider, Arc::new(pg));

    let report = fetcher
        .backfill(cfg.backfill_start)
        .await
        .context("backfilling daily bars")?;

    info!(
        fetched = report.fetched,
        inserted = report.inserted,
        skipped = report.skipped,
        "Backfill complete"
    );
    Ok(())
}
