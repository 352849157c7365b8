//! Volume profile, POC/VAH/VAL (§4.3.3).
//!
//! Allocation choice (Open Question in §9): volume is distributed uniformly
//! across the bins a candle's `[low, high]` range intersects, not
//! VWAP-weighted. See DESIGN.md.

use crate::domain::market::candle::Candle;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

const BIN_COUNT: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeProfile {
    pub poc: Decimal,
    pub vah: Decimal,
    pub val: Decimal,
    pub total_volume: Decimal,
}

/// Builds a volume profile over `candles` (ascending, closed candles).
/// Returns `None` if there are no candles or the price range is degenerate
/// (`min(low) == max(high)`), since a single-point range cannot be binned.
pub fn build_volume_profile(candles: &[Candle]) -> Option<VolumeProfile> {
    if candles.is_empty() {
        return None;
    }

    let lo = candles.iter().map(|c| c.low).min()?;
    let hi = candles.iter().map(|c| c.high).max()?;
    if hi <= lo {
        return None;
    }

    let bin_width = (hi - lo) / Decimal::from(BIN_COUNT);
    let mut bins = vec![Decimal::ZERO; BIN_COUNT];

    for c in candles {
        let volume = c.volume.unwrap_or(Decimal::ZERO);
        if volume.is_zero() {
            continue;
        }
        let first_bin = bin_index(c.low, lo, bin_width);
        let last_bin = bin_index(c.high, lo, bin_width);
        let span = last_bin.saturating_sub(first_bin) + 1;
        let per_bin = volume / Decimal::from(span);
        for bin in bins.iter_mut().take(last_bin + 1).skip(first_bin) {
            *bin += per_bin;
        }
    }

    let total_volume: Decimal = bins.iter().sum();
    if total_volume.is_zero() {
        return None;
    }

    let poc_idx = bins
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let (vah_idx, val_idx) = expand_value_area(&bins, poc_idx, total_volume);

    Some(VolumeProfile {
        poc: bin_price(poc_idx, lo, bin_width),
        vah: bin_price(vah_idx, lo, bin_width),
        val: bin_price(val_idx, lo, bin_width),
        total_volume,
    })
}

fn bin_index(price: Decimal, lo: Decimal, bin_width: Decimal) -> usize {
    if bin_width.is_zero() {
        return 0;
    }
    let idx = ((price - lo) / bin_width)
        .to_usize()
        .unwrap_or(0)
        .min(BIN_COUNT - 1);
    idx
}

fn bin_price(idx: usize, lo: Decimal, bin_width: Decimal) -> Decimal {
    lo + bin_width * Decimal::from(idx)
}

/// Expands symmetrically from `poc_idx`, each step taking whichever adjacent
/// bin (above or below the current area) holds more volume, until the
/// cumulative volume covered reaches 70% of `total_volume`.
fn expand_value_area(bins: &[Decimal], poc_idx: usize, total_volume: Decimal) -> (usize, usize) {
    use rust_decimal_macros::dec;
    let target = total_volume * dec!(0.70);

    let mut upper = poc_idx;
    let mut lower = poc_idx;
    let mut covered = bins[poc_idx];

    while covered < target && (upper + 1 < bins.len() || lower > 0) {
        let above = if upper + 1 < bins.len() {
            Some(bins[upper + 1])
        } else {
            None
        };
        let below = if lower > 0 { Some(bins[lower - 1]) } else { None };

        match (above, below) {
            (Some(a), Some(b)) => {
                if a >= b {
                    upper += 1;
                    covered += a;
                } else {
                    lower -= 1;
                    covered += b;
                }
            }
            (Some(a), None) => {
                upper += 1;
                covered += a;
            }
            (None, Some(b)) => {
                lower -= 1;
                covered += b;
            }
            (None, None) => break,
        }
    }

    (upper, lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use crate::domain::venue::Venue;
    use rust_decimal_macros::dec;

    fn candle(low: Decimal, high: Decimal, volume: Decimal) -> Candle {
        Candle {
            venue: Venue::BinanceUsdtPerp,
            symbol: "BTC".to_string(),
            interval: Timeframe::H1,
            timestamp: 0,
            open: low,
            high,
            low,
            close: high,
            volume: Some(volume),
            oi: None,
            funding_rate: None,
            buy_volume: None,
            sell_volume: None,
        }
    }

    #[test]
    fn poc_sits_in_the_heaviest_bin() {
        let candles = vec![
            candle(dec!(100), dec!(101), dec!(10)),
            candle(dec!(100), dec!(101), dec!(10)),
            candle(dec!(150), dec!(151), dec!(1)),
        ];
        let profile = build_volume_profile(&candles).unwrap();
        assert!(profile.poc < dec!(110));
    }

    #[test]
    fn value_area_contains_at_least_70_pct_of_volume() {
        let mut candles = Vec::new();
        for _ in 0..20 {
            candles.push(candle(dec!(100), dec!(101), dec!(5)));
        }
        candles.push(candle(dec!(200), dec!(201), dec!(5)));
        let profile = build_volume_profile(&candles).unwrap();
        assert!(profile.vah >= profile.val);
    }

    #[test]
    fn degenerate_range_returns_none() {
        let candles = vec![candle(dec!(100), dec!(100), dec!(5))];
        assert!(build_volume_profile(&candles).is_none());
    }

    #[test]
    fn empty_input_returns_none() {
        assert!(build_volume_profile(&[]).is_none());
    }
}
