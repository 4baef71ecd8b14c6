use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use common::{AnnotatedBar, Bar, Error, Result, TradeEvent};

use crate::indicators::annotate;
use crate::params::BacktestParams;

/// Outcome of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    /// Final cash minus the initial investment. May be negative.
    #[serde(with = "rust_decimal::serde::float")]
    pub profit: Decimal,
    /// Trades in the order they happened.
    pub events: Vec<TradeEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    AwaitingBuy,
    AwaitingSell,
}

/// Per-run simulation state. Created at the start of a run and discarded
/// once the result is produced.
#[derive(Debug)]
struct BacktestState {
    mode: Mode,
    cash_remaining: Decimal,
    shares_held: u64,
    events: Vec<TradeEvent>,
}

impl BacktestState {
    fn new(investing_amount: u64) -> Self {
        Self {
            mode: Mode::AwaitingBuy,
            cash_remaining: Decimal::from(investing_amount),
            shares_held: 0,
            events: Vec::new(),
        }
    }

    fn step(&mut self, row: &AnnotatedBar) -> Result<()> {
        let bar = &row.bar;
        match self.mode {
            Mode::AwaitingBuy => {
                if bar.open > Decimal::ZERO && bar.open < row.buying_moving_average {
                    self.buy(bar)?;
                }
            }
            Mode::AwaitingSell => {
                if bar.close > row.selling_moving_average {
                    self.sell(bar)?;
                }
            }
        }
        Ok(())
    }

    /// Spend as much cash as whole shares allow; the remainder stays as cash.
    /// State is left untouched when the trade cannot be represented.
    fn buy(&mut self, bar: &Bar) -> Result<()> {
        let shares = self
            .cash_remaining
            .checked_div(bar.open)
            .and_then(|q| q.floor().to_u64())
            .ok_or_else(|| overflow("share count", bar))?;
        let remainder = self
            .cash_remaining
            .checked_rem(bar.open)
            .ok_or_else(|| overflow("cash remainder", bar))?;

        self.cash_remaining = remainder;
        self.shares_held = shares;
        debug!(shares, price = %bar.open, time = %bar.timestamp, "Simulated buy");
        self.events.push(TradeEvent::buy(shares, bar.timestamp, bar.open));
        self.mode = Mode::AwaitingSell;
        Ok(())
    }

    fn sell(&mut self, bar: &Bar) -> Result<()> {
        self.cash_remaining = Decimal::from(self.shares_held)
            .checked_mul(bar.close)
            .and_then(|proceeds| proceeds.checked_add(self.cash_remaining))
            .ok_or_else(|| overflow("sale proceeds", bar))?;
        debug!(shares = self.shares_held, price = %bar.close, time = %bar.timestamp, "Simulated sell");
        self.events
            .push(TradeEvent::sell(self.shares_held, bar.timestamp, bar.close));
        self.shares_held = 0;
        self.mode = Mode::AwaitingBuy;
        Ok(())
    }
}

fn overflow(what: &str, bar: &Bar) -> Error {
    Error::InvalidInput(format!(
        "investing_amount too large: {what} on {} is out of range",
        bar.timestamp
    ))
}

/// Replay the crossover strategy over an annotated series.
///
/// `bars` must be in ascending timestamp order (as produced by
/// [`annotate`]). Buys happen when the open is strictly below the buying
/// average, sells when the close is strictly above the selling average.
/// Shares still held after the last bar are sold at that bar's close.
///
/// Fails with [`Error::InvalidInput`] when the amount is so large that a share
/// count or cash balance no longer fits the number types.
pub fn run_backtest(bars: &[AnnotatedBar], investing_amount: u64) -> Result<BacktestResult> {
    let mut state = BacktestState::new(investing_amount);

    for row in bars {
        // Checks the initial amount, not the live cash.
        if investing_amount == 0 {
            break;
        }
        state.step(row)?;
    }

    if state.shares_held > 0 {
        if let Some(last) = bars.last() {
            state.sell(&last.bar)?;
        }
    }

    let profit = state.cash_remaining - Decimal::from(investing_amount);
    info!(
        bars = bars.len(),
        trades = state.events.len(),
        profit = %profit,
        "Backtest finished"
    );

    Ok(BacktestResult {
        profit,
        events: state.events,
    })
}

/// Annotate `bars` with the requested windows and run the backtest.
pub fn backtest(bars: &[Bar], params: &BacktestParams) -> Result<BacktestResult> {
    let annotated = annotate(bars, params.sell_period, params.buy_period);
    run_backtest(&annotated, params.investing_amount)
}
