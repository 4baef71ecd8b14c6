use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize, Serializer};

/// Decimal places kept for every stored price and volume (`NUMERIC(20,4)`).
pub const PRICE_SCALE: u32 = 4;

/// One trading day's OHLCV record for the configured symbol.
///
/// `timestamp` is the primary key and the only ordering key. Bars are never
/// updated or deleted once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bar {
    #[sqlx(rename = "time")]
    pub timestamp: DateTime<Utc>,
    #[sqlx(rename = "open_price")]
    pub open: Decimal,
    #[sqlx(rename = "high_price")]
    pub high: Decimal,
    #[sqlx(rename = "low_price")]
    pub low: Decimal,
    #[sqlx(rename = "close_price")]
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Build a bar with every field rounded half away from zero to
    /// [`PRICE_SCALE`] places, matching how the database rounds `NUMERIC`.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open: round_price(open),
            high: round_price(high),
            low: round_price(low),
            close: round_price(close),
            volume: round_price(volume),
        }
    }

    /// True when no price or volume field is negative.
    pub fn is_non_negative(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| *v >= Decimal::ZERO)
    }
}

fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A bar plus the two trailing moving averages used by the crossover strategy.
/// Derived at read time, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedBar {
    #[serde(flatten)]
    pub bar: Bar,
    pub selling_moving_average: Decimal,
    pub buying_moving_average: Decimal,
}

/// Side of a simulated trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One entry of a backtest's chronological trade log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    pub side: TradeSide,
    pub shares: u64,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

impl TradeEvent {
    pub fn buy(shares: u64, timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self { side: TradeSide::Buy, shares, timestamp, price }
    }

    pub fn sell(shares: u64, timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self { side: TradeSide::Sell, shares, timestamp, price }
    }
}

impl std::fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.side {
            TradeSide::Buy => "Bought",
            TradeSide::Sell => "Sold",
        };
        write!(
            f,
            "{verb} {} stocks on {} for {}",
            self.shares, self.timestamp, self.price
        )
    }
}

// Callers receive the trade log as human-readable lines.
impl Serialize for TradeEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
