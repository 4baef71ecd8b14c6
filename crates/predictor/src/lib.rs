//! Next-day close projection.
//!
//! A single-feature linear model (`close[t] ≈ slope * close[t-1] + intercept`)
//! is fitted on the stored series by [`train`], persisted as a JSON artifact,
//! and applied to the most recent closes by [`predict`].

pub mod model;
pub mod regression;
pub mod service;
pub mod trainer;

pub use model::TrainedModel;
pub use regression::LinearModel;
pub use service::{predict, PredictionPoint, PredictionResponse, PREDICTION_WINDOW};
pub use trainer::train;
