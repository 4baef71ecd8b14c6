pub mod sma;

pub use sma::{annotate, trailing_mean, SmaIndicator};
