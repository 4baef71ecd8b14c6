use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use common::Bar;
use predictor::regression::{r_squared, rmse};
use predictor::trainer::fit_series;
use predictor::LinearModel;

proptest! {
    /// OLS recovers a noiseless line from distinct feature values.
    #[test]
    fn ols_recovers_known_line(
        slope in -50.0f64..50.0,
        intercept in -1_000.0f64..1_000.0,
        xs in prop::collection::btree_set(-10_000i32..10_000, 2..60),
    ) {
        let x: Vec<f64> = xs.into_iter().map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|xi| slope * xi + intercept).collect();

        let model = LinearModel::fit(&x, &y).unwrap();
        prop_assert!((model.slope - slope).abs() < 1e-6);
        prop_assert!((model.intercept - intercept).abs() < 1e-4);

        let pred = model.predict_all(&x);
        prop_assert!(rmse(&y, &pred).unwrap() < 1e-4);
    }

    /// R² never exceeds one.
    #[test]
    fn r_squared_is_bounded_above(
        pairs in prop::collection::vec((-1_000.0f64..1_000.0, -1_000.0f64..1_000.0), 2..40),
    ) {
        let (y, pred): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        if let Some(r2) = r_squared(&y, &pred) {
            prop_assert!(r2 <= 1.0 + 1e-12);
        }
    }

    /// The hold-out is the last ceil(n/5) lag pairs and the rest train.
    #[test]
    fn split_sizes_cover_every_lag_pair(
        closes in prop::collection::vec(1i64..1_000_000, 4..120),
    ) {
        let start = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let c = Decimal::new(c, 2);
                Bar::new(start + Duration::days(i as i64), c, c, c, c, Decimal::ONE)
            })
            .collect();

        let pairs = bars.len() - 1;
        match fit_series(&bars) {
            Ok(model) => {
                prop_assert_eq!(model.train_rows + model.test_rows, pairs);
                prop_assert_eq!(model.test_rows, pairs.div_ceil(5));
            }
            Err(common::Error::Model(_)) => {}
            Err(e) => prop_assert!(false, "unexpected error: {e}"),
        }
    }
}
