use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// Validated inputs of one backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestParams {
    /// Initial cash, in whole currency units. Zero is allowed.
    pub investing_amount: u64,
    /// Preceding bars averaged (with the current one) for the sell signal.
    pub sell_period: usize,
    /// Preceding bars averaged (with the current one) for the buy signal.
    pub buy_period: usize,
}

impl BacktestParams {
    /// Validate the three raw request values.
    ///
    /// Each value must be present and consist only of ASCII digits, so signs,
    /// decimal points and fractional periods are all rejected. Periods must
    /// be at least 1.
    pub fn parse(
        investing_amount: Option<&str>,
        sell_period: Option<&str>,
        buy_period: Option<&str>,
    ) -> Result<Self> {
        let investing_amount: u64 = parse_whole("investing_amount", investing_amount)?;
        let sell_period: usize = parse_whole("sell_period", sell_period)?;
        let buy_period: usize = parse_whole("buy_period", buy_period)?;

        if sell_period == 0 || buy_period == 0 {
            return Err(Error::InvalidInput(
                "sell_period and buy_period must be greater than zero".into(),
            ));
        }

        Ok(Self {
            investing_amount,
            sell_period,
            buy_period,
        })
    }
}

fn parse_whole<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<T> {
    let raw = raw.ok_or_else(|| Error::InvalidInput(format!("missing parameter '{name}'")))?;
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!(
            "'{name}' must be a non-negative whole number, got '{raw}'"
        )));
    }
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("'{name}' is out of range: '{raw}'")))
}
