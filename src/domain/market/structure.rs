//! Swing structure and break-of-structure detection (§4.3.4).

use crate::domain::market::candle::Candle;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const FRACTAL_LEFT: usize = 2;
const FRACTAL_RIGHT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakOfStructure {
    Bullish,
    Bearish,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStructure {
    pub resistance: Option<Decimal>,
    pub support: Option<Decimal>,
    pub bos: BreakOfStructure,
}

struct Swing {
    index: usize,
    price: Decimal,
}

/// A candle at `index` is a fractal swing high iff its high is strictly
/// greater than the highs of the `FRACTAL_LEFT` candles before it and the
/// `FRACTAL_RIGHT` candles after it.
fn swing_highs(candles: &[Candle]) -> Vec<Swing> {
    let mut swings = Vec::new();
    if candles.len() < FRACTAL_LEFT + FRACTAL_RIGHT + 1 {
        return swings;
    }
    for i in FRACTAL_LEFT..candles.len() - FRACTAL_RIGHT {
        let pivot = candles[i].high;
        let is_high = (i - FRACTAL_LEFT..i).all(|j| candles[j].high < pivot)
            && (i + 1..=i + FRACTAL_RIGHT).all(|j| candles[j].high < pivot);
        if is_high {
            swings.push(Swing { index: i, price: pivot });
        }
    }
    swings
}

fn swing_lows(candles: &[Candle]) -> Vec<Swing> {
    let mut swings = Vec::new();
    if candles.len() < FRACTAL_LEFT + FRACTAL_RIGHT + 1 {
        return swings;
    }
    for i in FRACTAL_LEFT..candles.len() - FRACTAL_RIGHT {
        let pivot = candles[i].low;
        let is_low = (i - FRACTAL_LEFT..i).all(|j| candles[j].low > pivot)
            && (i + 1..=i + FRACTAL_RIGHT).all(|j| candles[j].low > pivot);
        if is_low {
            swings.push(Swing { index: i, price: pivot });
        }
    }
    swings
}

/// Derives resistance/support and break-of-structure from closed-candle
/// history. `candles` must be ascending; the last candle is treated as the
/// current bar.
pub fn detect_structure(candles: &[Candle]) -> MarketStructure {
    let Some(current) = candles.last() else {
        return MarketStructure {
            resistance: None,
            support: None,
            bos: BreakOfStructure::None,
        };
    };

    let highs = swing_highs(candles);
    let lows = swing_lows(candles);

    let resistance = highs
        .iter()
        .filter(|s| s.price > current.close)
        .map(|s| s.price)
        .min();
    let support = lows
        .iter()
        .filter(|s| s.price < current.close)
        .map(|s| s.price)
        .max();

    let most_recent_prior_high = highs
        .iter()
        .filter(|s| s.index < candles.len() - 1)
        .max_by_key(|s| s.index)
        .map(|s| s.price);
    let most_recent_prior_low = lows
        .iter()
        .filter(|s| s.index < candles.len() - 1)
        .max_by_key(|s| s.index)
        .map(|s| s.price);

    let bos = if let Some(prior_high) = most_recent_prior_high
        && current.close > prior_high
    {
        BreakOfStructure::Bullish
    } else if let Some(prior_low) = most_recent_prior_low
        && current.close < prior_low
    {
        BreakOfStructure::Bearish
    } else {
        BreakOfStructure::None
    };

    MarketStructure {
        resistance,
        support,
        bos,
    }
}
