use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{Error, PriceStore, Result};

use crate::model::TrainedModel;
use crate::trainer::closes_f64;

/// Number of most recent closes the projection is based on.
pub const PREDICTION_WINDOW: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub predicted_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub symbol: String,
    pub predictions: Vec<PredictionPoint>,
}

/// Project the next closes from the most recent stored bars.
///
/// Each prediction applies the model to one observed close; predictions are
/// never fed back in. Dates run one day at a time after the newest bar.
pub async fn predict(
    store: &dyn PriceStore,
    artifact_path: &Path,
    symbol: &str,
) -> Result<PredictionResponse> {
    let model = TrainedModel::load(artifact_path).await?;
    debug!(path = %artifact_path.display(), trained_at = %model.trained_at, "Model loaded");

    let bars = store.recent_bars(PREDICTION_WINDOW).await?;
    let Some(latest) = bars.last().map(|b| b.timestamp) else {
        return Err(Error::InsufficientData("no stored bars to predict from".into()));
    };

    let predictions = closes_f64(&bars)?
        .into_iter()
        .zip(1i64..)
        .map(|(close, offset)| PredictionPoint {
            date: (latest + Duration::days(offset)).format("%Y-%m-%d").to_string(),
            predicted_price: model.predict(close),
        })
        .collect::<Vec<_>>();

    info!(symbol, count = predictions.len(), "Predictions generated");
    Ok(PredictionResponse {
        symbol: symbol.to_string(),
        predictions,
    })
}
