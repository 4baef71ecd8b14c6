use std::path::Path;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use tracing::info;

use common::{Bar, Error, PriceStore, Result};

use crate::model::TrainedModel;
use crate::regression::{r_squared, rmse, LinearModel};

/// Share of lag pairs held out for evaluation, taken from the end of the series.
const TEST_FRACTION_DENOM: usize = 5;

/// Fit the next-day model on every stored close and persist it at `artifact_path`.
pub async fn train(store: &dyn PriceStore, artifact_path: &Path) -> Result<TrainedModel> {
    info!("Training prediction model");
    let bars = store.bars().await?;
    let model = fit_series(&bars)?;
    model.save(artifact_path).await?;

    info!(
        train_rows = model.train_rows,
        test_rows = model.test_rows,
        rmse = ?model.test_rmse,
        r_squared = ?model.test_r_squared,
        "Model trained"
    );
    Ok(model)
}

/// Fit on `(close[i-1], close[i])` pairs with a chronological hold-out.
pub fn fit_series(bars: &[Bar]) -> Result<TrainedModel> {
    let closes = closes_f64(bars)?;
    let (x, y) = lag_pairs(&closes);

    if x.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "need at least 2 lag pairs to train, got {}",
            x.len()
        )));
    }

    let test_rows = holdout_len(x.len());
    let train_rows = x.len() - test_rows;
    if train_rows < 2 {
        return Err(Error::InsufficientData(format!(
            "need at least 2 training rows, got {train_rows}"
        )));
    }

    let (x_train, x_test) = x.split_at(train_rows);
    let (y_train, y_test) = y.split_at(train_rows);

    let line = LinearModel::fit(x_train, y_train)?;
    let y_pred = line.predict_all(x_test);

    Ok(TrainedModel {
        slope: line.slope,
        intercept: line.intercept,
        trained_at: Utc::now(),
        train_rows,
        test_rows,
        test_rmse: rmse(y_test, &y_pred),
        test_r_squared: r_squared(y_test, &y_pred),
    })
}

/// `ceil(n / 5)` rows.
fn holdout_len(n: usize) -> usize {
    n.div_ceil(TEST_FRACTION_DENOM)
}

fn lag_pairs(closes: &[f64]) -> (Vec<f64>, Vec<f64>) {
    closes.windows(2).map(|w| (w[0], w[1])).unzip()
}

pub(crate) fn closes_f64(bars: &[Bar]) -> Result<Vec<f64>> {
    bars.iter()
        .map(|bar| {
            bar.close.to_f64().ok_or_else(|| {
                Error::Model(format!("close {} at {} is not representable", bar.close, bar.timestamp))
            })
        })
        .collect()
}
