use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use predictor::PredictionResponse;
use strategy::{BacktestParams, BacktestResult};

use crate::{ApiError, AppState};

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/backtest/", get(get_backtest))
        .route("/api/backtest", get(get_backtest))
        .route("/api/predict-data", get(get_predictions))
}

// ─── Backtest ─────────────────────────────────────────────────────────────────

/// Raw query values; validation happens in [`BacktestParams::parse`] so
/// malformed numbers get the same error body as missing ones.
#[derive(Deserialize)]
struct BacktestQuery {
    investing_amount: Option<String>,
    sell_period: Option<String>,
    buy_period: Option<String>,
}

async fn get_backtest(
    State(state): State<AppState>,
    Query(q): Query<BacktestQuery>,
) -> Result<Json<BacktestResult>, ApiError> {
    let params = BacktestParams::parse(
        q.investing_amount.as_deref(),
        q.sell_period.as_deref(),
        q.buy_period.as_deref(),
    )?;

    let bars = state.store.bars().await?;
    info!(
        bars = bars.len(),
        investing_amount = params.investing_amount,
        sell_period = params.sell_period,
        buy_period = params.buy_period,
        "Running backtest"
    );
    Ok(Json(strategy::backtest(&bars, &params)?))
}

// ─── Predictions ──────────────────────────────────────────────────────────────

async fn get_predictions(
    State(state): State<AppState>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let resp = predictor::predict(state.store.as_ref(), &state.model_path, &state.symbol).await?;
    Ok(Json(resp))
}
