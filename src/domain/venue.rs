//! Closed set of venues this engine cross-references for the same asset.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two perpetual venues the analytical pipeline compares for a given symbol.
///
/// Kept as a closed sum type (rather than a free-form string) so that an
/// unrecognized venue in persisted JSON surfaces as a deserialization error
/// instead of silently becoming a third, unhandled branch in the divergence
/// and regime classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    /// USDT-margined perpetual (e.g. Binance).
    BinanceUsdtPerp,
    /// Coin-margined perpetual (e.g. Bybit).
    BybitCoinMarginedPerp,
}

impl Venue {
    pub fn all() -> [Venue; 2] {
        [Venue::BinanceUsdtPerp, Venue::BybitCoinMarginedPerp]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::BinanceUsdtPerp => "binance",
            Venue::BybitCoinMarginedPerp => "bybit",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Venue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "binance" | "binance_usdt_perp" => Ok(Venue::BinanceUsdtPerp),
            "bybit" | "bybit_coin_margined_perp" => Ok(Venue::BybitCoinMarginedPerp),
            _ => Err(anyhow!("Unknown venue: '{}'", s)),
        }
    }
}
