//! Technical indicators (§4.3.2): moving averages, trend slope, realized
//! volatility and drawdown. Internal math runs in `f64`; callers convert at
//! the boundary, since these are statistical estimates, not ledger amounts.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSummary {
    pub ema_fast: Decimal,
    pub ema_slow: Decimal,
    pub sma: Decimal,
    pub slope: Decimal,
    pub trend: TrendDirection,
    pub realized_volatility_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub z_score: Decimal,
}

fn to_f64_series(values: &[Decimal]) -> Vec<f64> {
    values.iter().filter_map(|d| d.to_f64()).collect()
}

fn from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Exponential moving average over `closes`, most-recent last. `period` is
/// the EMA span; returns `None` if there are no closes.
pub fn ema(closes: &[Decimal], period: usize) -> Option<Decimal> {
    let series = to_f64_series(closes);
    if series.is_empty() || period == 0 {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value = series[0];
    for &price in &series[1..] {
        value = alpha * price + (1.0 - alpha) * value;
    }
    Some(from_f64(value))
}

pub fn sma(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if closes.is_empty() || period == 0 {
        return None;
    }
    let start = closes.len().saturating_sub(period);
    let window = &closes[start..];
    let sum: Decimal = window.iter().copied().sum();
    Some(sum / Decimal::from(window.len()))
}

/// Ordinary-least-squares slope of `closes` against their index, normalized
/// by the mean price so it reads as a fractional trend-per-bar.
pub fn ols_slope(closes: &[Decimal]) -> Decimal {
    let series = to_f64_series(closes);
    if series.len() < 2 {
        return Decimal::ZERO;
    }
    let n = series.len() as f64;
    let xs: Vec<f64> = (0..series.len()).map(|i| i as f64).collect();
    let mean_x = Data::new(xs.clone()).mean().unwrap_or(0.0);
    let mean_y = Data::new(series.clone()).mean().unwrap_or(0.0);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    for i in 0..series.len() {
        cov += (xs[i] - mean_x) * (series[i] - mean_y);
        var_x += (xs[i] - mean_x).powi(2);
    }
    if var_x == 0.0 || mean_y == 0.0 {
        return Decimal::ZERO;
    }
    let raw_slope = cov / var_x;
    let _ = n;
    // Expressed as a percentage-per-bar so it sits on the same scale as the
    // price-move thresholds in the classifier table.
    from_f64(raw_slope / mean_y * 100.0)
}

/// `up` if normalized slope > 0.1, `down` if < -0.1, else `sideways`.
pub fn trend_direction(slope: Decimal) -> TrendDirection {
    use rust_decimal_macros::dec;
    if slope > dec!(0.1) {
        TrendDirection::Up
    } else if slope < dec!(-0.1) {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    }
}

/// Realized volatility: `std(log-returns) * sqrt(N) * 100` over `closes`.
pub fn realized_volatility_pct(closes: &[Decimal]) -> Decimal {
    let series = to_f64_series(closes);
    if series.len() < 2 {
        return Decimal::ZERO;
    }
    let returns: Vec<f64> = series
        .windows(2)
        .filter_map(|w| {
            if w[0] <= 0.0 || w[1] <= 0.0 {
                None
            } else {
                Some((w[1] / w[0]).ln())
            }
        })
        .collect();
    if returns.len() < 2 {
        return Decimal::ZERO;
    }
    let n = returns.len() as f64;
    let std = Data::new(returns).std_dev().unwrap_or(0.0);
    from_f64(std * n.sqrt() * 100.0)
}

/// Largest peak-to-trough decline across `closes`, as a positive percentage.
pub fn max_drawdown_pct(closes: &[Decimal]) -> Decimal {
    let series = to_f64_series(closes);
    if series.is_empty() {
        return Decimal::ZERO;
    }
    let mut peak = series[0];
    let mut worst = 0.0;
    for &price in &series {
        if price > peak {
            peak = price;
        }
        if peak > 0.0 {
            let drawdown = (peak - price) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    from_f64(worst * 100.0)
}

/// Standard z-score of the last close against the mean/std of `closes`.
pub fn z_score(closes: &[Decimal]) -> Decimal {
    let series = to_f64_series(closes);
    if series.len() < 2 {
        return Decimal::ZERO;
    }
    let data = Data::new(series.clone());
    let mean = data.mean().unwrap_or(0.0);
    let std = data.std_dev().unwrap_or(0.0);
    if std == 0.0 {
        return Decimal::ZERO;
    }
    let last = *series.last().unwrap();
    from_f64((last - mean) / std)
}

pub fn summarize(closes: &[Decimal], ema_fast_period: usize, ema_slow_period: usize) -> Option<TechnicalSummary> {
    if closes.is_empty() {
        return None;
    }
    let slope = ols_slope(closes);
    Some(TechnicalSummary {
        ema_fast: ema(closes, ema_fast_period)?,
        ema_slow: ema(closes, ema_slow_period)?,
        sma: sma(closes, closes.len())?,
        slope,
        trend: trend_direction(slope),
        realized_volatility_pct: realized_volatility_pct(closes),
        max_drawdown_pct: max_drawdown_pct(closes),
        z_score: z_score(closes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn series(values: &[i64]) -> Vec<Decimal> {
        values.iter().map(|&v| Decimal::from(v)).collect()
    }

    #[test]
    fn ema_converges_toward_rising_prices() {
        let closes = series(&[100, 101, 102, 103, 104, 105]);
        let fast = ema(&closes, 3).unwrap();
        assert!(fast > dec!(100));
    }

    #[test]
    fn sma_is_plain_average_over_window() {
        let closes = series(&[10, 20, 30]);
        assert_eq!(sma(&closes, 3), Some(dec!(20)));
    }

    #[test]
    fn trend_up_on_positive_slope() {
        let closes = series(&[100, 102, 104, 106, 108, 110]);
        let slope = ols_slope(&closes);
        assert_eq!(trend_direction(slope), TrendDirection::Up);
    }

    #[test]
    fn flat_series_has_zero_drawdown() {
        let closes = series(&[100, 100, 100]);
        assert_eq!(max_drawdown_pct(&closes), Decimal::ZERO);
    }

    #[test]
    fn drawdown_captures_peak_to_trough_decline() {
        let closes = series(&[100, 120, 90, 110]);
        let dd = max_drawdown_pct(&closes);
        assert!(dd > dec!(24) && dd < dec!(26));
    }

    #[test]
    fn z_score_zero_for_constant_series() {
        let closes = series(&[50, 50, 50, 50]);
        assert_eq!(z_score(&closes), Decimal::ZERO);
    }
}
