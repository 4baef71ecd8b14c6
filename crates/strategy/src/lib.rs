pub mod backtest;
pub mod indicators;
pub mod params;

pub use backtest::{backtest, run_backtest, BacktestResult};
pub use indicators::{annotate, SmaIndicator};
pub use params::BacktestParams;
