use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Variance below this is treated as a constant column.
const DEGENERATE_EPS: f64 = 1e-12;

/// Fitted single-feature line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearModel {
    /// Ordinary least squares in closed form.
    ///
    /// Needs at least two points and a non-constant `x`.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::Model(format!(
                "dimension mismatch: {} features, {} targets",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(Error::InsufficientData(format!(
                "need at least 2 points to fit a line, got {}",
                x.len()
            )));
        }

        let x_mean = mean(x);
        let y_mean = mean(y);

        let (sxy, sxx) = x
            .iter()
            .zip(y)
            .fold((0.0, 0.0), |(sxy, sxx), (&xi, &yi)| {
                let dx = xi - x_mean;
                (sxy + dx * (yi - y_mean), sxx + dx * dx)
            });

        if sxx.abs() < DEGENERATE_EPS * x.len() as f64 {
            return Err(Error::Model("degenerate: feature column is constant".into()));
        }

        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: y_mean - slope * x_mean,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn predict_all(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&xi| self.predict(xi)).collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Root mean squared error. `None` for empty input.
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return None;
    }
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Some(mse.sqrt())
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// `None` when the input is empty or the targets are constant.
pub fn r_squared(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return None;
    }
    let y_mean = mean(y_true);
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - y_mean).powi(2)).sum();

    if ss_tot < 1e-10 {
        return None;
    }
    Some(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_exact_line() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        let model = LinearModel::fit(&x, &y).unwrap();
        assert!((model.slope - 2.0).abs() < 1e-9);
        assert!((model.intercept - 1.0).abs() < 1e-9);
        assert!((model.predict(10.0) - 21.0).abs() < 1e-9);
    }

    #[test]
    fn constant_feature_is_degenerate() {
        let err = LinearModel::fit(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, Error::Model(msg) if msg.starts_with("degenerate")));
    }

    #[test]
    fn single_point_is_insufficient() {
        assert!(matches!(
            LinearModel::fit(&[1.0], &[1.0]),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn metrics_on_perfect_and_imperfect_predictions() {
        let y = [1.0, 2.0, 3.0];
        assert_eq!(rmse(&y, &y), Some(0.0));
        assert_eq!(r_squared(&y, &y), Some(1.0));

        let pred = [2.0, 2.0, 2.0];
        let e = rmse(&y, &pred).unwrap();
        assert!((e - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(r_squared(&y, &pred), Some(0.0));
    }

    #[test]
    fn metrics_undefined_for_empty_or_constant_targets() {
        assert_eq!(rmse(&[], &[]), None);
        assert_eq!(r_squared(&[4.0, 4.0], &[4.0, 4.0]), None);
    }
}
