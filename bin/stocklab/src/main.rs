use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{Config, PriceStore};
use engine::{AlphaVantageClient, IngestionFetcher, Job, Scheduler, Trigger};
use store::PgPriceStore;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(symbol = %cfg.symbol, "StockLab starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(cfg.database_options())
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {e}"));
    let pg = PgPriceStore::new(db);
    pg.migrate()
        .await
        .unwrap_or_else(|e| panic!("Database migration failed: {e}"));
    info!("Database ready");

    let store: Arc<dyn PriceStore> = Arc::new(pg);

    // ── Ingestion ─────────────────────────────────────────────────────────────
    let provider = Arc::new(AlphaVantageClient::new(&cfg.alpha_vantage_api_key, &cfg.symbol));
    let fetcher = Arc::new(IngestionFetcher::new(provider, store.clone()));

    // ── Scheduler ─────────────────────────────────────────────────────────────
    let mut scheduler = Scheduler::new();

    scheduler.add_job(Job::new(
        "update_latest_stock_data",
        Trigger::daily(cfg.ingest_hour, cfg.ingest_minute),
        move || {
            let fetcher = fetcher.clone();
            async move {
                match fetcher.update_latest().await {
                    Ok(report) => info!(
                        fetched = report.fetched,
                        inserted = report.inserted,
                        skipped = report.skipped,
                        "Daily ingestion complete"
                    ),
                    Err(e) => error!(error = %e, "Daily ingestion failed"),
                }
            }
        },
    ));

    let train_store = store.clone();
    let model_path = cfg.model_path.clone();
    scheduler.add_job(Job::new(
        "train_prediction_model",
        Trigger::once(cfg.train_at),
        move || {
            let store = train_store.clone();
            let path = model_path.clone();
            async move {
                match predictor::train(store.as_ref(), &path).await {
                    Ok(model) => info!(
                        slope = model.slope,
                        intercept = model.intercept,
                        path = %path.display(),
                        "Model retrained"
                    ),
                    Err(e) => error!(error = %e, "Model training failed"),
                }
            }
        },
    ));

    // Lives until the process exits.
    let _scheduler = scheduler.start();

    // ── API ───────────────────────────────────────────────────────────────────
    let api_state = api::AppState {
        store: store.clone(),
        model_path: cfg.model_path.clone(),
        symbol: cfg.symbol.clone(),
    };
    let port = cfg.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "API server stopped");
        }
    });

    // Keep main alive
    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();
    info!("Shutdown signal received. Exiting.");
}
