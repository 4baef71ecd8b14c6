use rust_decimal::Decimal;

use common::{AnnotatedBar, Bar};

/// Trailing simple moving average over `period` preceding closes plus the
/// current one.
///
/// At the start of the series the window is truncated to whatever rows exist,
/// so every position has a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmaIndicator {
    pub period: usize,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Compute the average for every position of `closes` (oldest first).
    pub fn compute(&self, closes: &[Decimal]) -> Vec<Decimal> {
        let prefix = prefix_sums(closes);
        (0..closes.len())
            .map(|i| window_mean(&prefix, i, self.period))
            .collect()
    }
}

/// Mean of `closes[max(0, index - period)..=index]`.
/// Returns `None` if `index` is out of bounds.
pub fn trailing_mean(closes: &[Decimal], index: usize, period: usize) -> Option<Decimal> {
    if index >= closes.len() {
        return None;
    }
    let window = &closes[index.saturating_sub(period)..=index];
    let sum: Decimal = window.iter().copied().sum();
    Some(sum / Decimal::from(window.len()))
}

/// Annotate the series with the selling and buying moving averages.
///
/// Output is in ascending timestamp order; an unordered input is sorted first.
pub fn annotate(bars: &[Bar], sell_period: usize, buy_period: usize) -> Vec<AnnotatedBar> {
    let mut ordered = bars.to_vec();
    if !ordered.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
        ordered.sort_by_key(|b| b.timestamp);
    }

    let closes: Vec<Decimal> = ordered.iter().map(|b| b.close).collect();
    let selling = SmaIndicator::new(sell_period).compute(&closes);
    let buying = SmaIndicator::new(buy_period).compute(&closes);

    ordered
        .into_iter()
        .zip(selling.into_iter().zip(buying))
        .map(|(bar, (selling_moving_average, buying_moving_average))| AnnotatedBar {
            bar,
            selling_moving_average,
            buying_moving_average,
        })
        .collect()
}

fn prefix_sums(values: &[Decimal]) -> Vec<Decimal> {
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(Decimal::ZERO);
    let mut running = Decimal::ZERO;
    for v in values {
        running += *v;
        prefix.push(running);
    }
    prefix
}

fn window_mean(prefix: &[Decimal], index: usize, period: usize) -> Decimal {
    let start = index.saturating_sub(period);
    let count = index - start + 1;
    (prefix[index + 1] - prefix[start]) / Decimal::from(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(day: u32, close: Decimal) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            close,
            close,
            close,
            close,
            dec!(100),
        )
    }

    #[test]
    fn window_grows_at_series_start() {
        let closes = vec![dec!(10), dec!(20), dec!(30), dec!(40)];
        let sma = SmaIndicator::new(2).compute(&closes);
        assert_eq!(sma, vec![dec!(10), dec!(15), dec!(20), dec!(30)]);
    }

    #[test]
    fn period_counts_preceding_rows() {
        // period 1 → current + one preceding bar
        let closes = vec![dec!(100), dec!(101)];
        assert_eq!(trailing_mean(&closes, 1, 1), Some(dec!(100.5)));
        assert_eq!(trailing_mean(&closes, 0, 1), Some(dec!(100)));
        assert_eq!(trailing_mean(&closes, 2, 1), None);
    }

    #[test]
    fn empty_series_annotates_to_empty() {
        assert!(annotate(&[], 5, 10).is_empty());
    }

    #[test]
    fn annotate_sorts_and_uses_independent_windows() {
        let bars = vec![bar(3, dec!(30)), bar(1, dec!(10)), bar(2, dec!(20))];
        let annotated = annotate(&bars, 1, 2);

        let closes: Vec<_> = annotated.iter().map(|a| a.bar.close).collect();
        assert_eq!(closes, vec![dec!(10), dec!(20), dec!(30)]);

        assert_eq!(annotated[2].selling_moving_average, dec!(25));
        assert_eq!(annotated[2].buying_moving_average, dec!(20));
    }
}
