//! `TimeframeMetrics`, `FinalDecision` and `MarketState` (§3): the shapes
//! the Metrics Engine produces and the State Store persists.

use crate::domain::market::aggregation::{BucketName, BucketSummary, MacroOverride};
use crate::domain::market::classifiers::{Bias, FundingClassification, MoveClassification};
use crate::domain::market::decision::{ConfidenceType, FinalBias, RiskMode, ScoredSignals, TradeStance, WeightedSignal};
use crate::domain::market::divergence::{ExchangeDivergenceResult, WhaleRetailRatio};
use crate::domain::market::regime::RegimeResult;
use crate::domain::market::structure::MarketStructure;
use crate::domain::market::technical::TechnicalSummary;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::volume_profile::VolumeProfile;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The Decision entity of §3: everything the UI/LLM/alert distributors need
/// to explain a bias at a single timeframe (or, for the top-level
/// `MarketState.finalDecision`, across the whole aggregation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalDecision {
    pub bias: FinalBias,
    pub confidence: Decimal,
    pub confidence_type: ConfidenceType,
    pub scores: ScoredSignals,
    pub signals: Vec<WeightedSignal>,
    pub reasoning: Vec<String>,
    pub trade_stance: TradeStance,
    pub primary_regime: String,
    pub risk_mode: RiskMode,
    pub macro_anchored: bool,
    pub warning: Option<String>,
    pub macro_override: Option<MacroOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingAdvanced {
    pub classification: FundingClassification,
    pub z_score: Decimal,
    /// `|fundingRate| * OI`, scaled to USD-per-8h — a proxy for squeeze
    /// pressure, surfaced in alert `actionableInsight` text.
    pub pain_index: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OiAdvanced {
    pub binance_move: MoveClassification,
    pub bybit_move: MoveClassification,
    pub whale_retail_ratio: WhaleRetailRatio,
}

/// Per-interval bundle of everything derived from snapshots+history; no
/// hidden state beyond what's carried here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeMetrics {
    pub interval: Timeframe,
    pub exchange_divergence: ExchangeDivergenceResult,
    pub market_regime: RegimeResult,
    pub technical: TechnicalSummary,
    pub funding_advanced: FundingAdvanced,
    pub oi_advanced: OiAdvanced,
    pub volume_profile: Option<VolumeProfile>,
    pub structure: MarketStructure,
    pub final_decision: FinalDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataQuality {
    Full,
    Partial,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeLabel {
    Continuation,
    Reversal,
    Noise,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeAssessment {
    pub label: OutcomeLabel,
    pub reason: String,
    pub horizon_hours: u32,
    pub final_price: Decimal,
    pub final_move_pct: Decimal,
    pub mfe: Decimal,
    pub mae: Decimal,
    pub labeled_at: i64,
}

/// The stable outbound contract (§6): the full payload is the single
/// source of truth persisted as JSON; the State Store additionally indexes
/// a handful of columns out of this for querying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub timestamp: i64,
    pub symbol: String,
    pub primary_timeframe: Timeframe,
    /// Reference close price on `primary_timeframe` at `timestamp` — the
    /// `raw` reference price of §3, used for the indexed `price` column and
    /// for outcome labeling's final-price comparison.
    pub price: Decimal,
    pub final_decision: FinalDecision,
    pub exchange_divergence: ExchangeDivergenceResult,
    pub market_regime: RegimeResult,
    pub technical: TechnicalSummary,
    pub funding_advanced: FundingAdvanced,
    pub oi_advanced: OiAdvanced,
    pub volume_profile: Option<VolumeProfile>,
    pub structure: MarketStructure,
    pub timeframes: Vec<TimeframeMetrics>,
    pub timeframe_buckets: Vec<BucketSummary>,
    pub data_quality: DataQuality,
    pub warnings: Vec<String>,
    pub outcome_label: Option<OutcomeAssessment>,
}

impl MarketState {
    /// `timeBucket = floor(timestamp / scanCycleMs) * scanCycleMs`.
    pub fn time_bucket(&self, scan_cycle_ms: i64) -> i64 {
        (self.timestamp / scan_cycle_ms) * scan_cycle_ms
    }

    pub fn bucket(&self, name: BucketName) -> Option<&BucketSummary> {
        self.timeframe_buckets.iter().find(|b| b.bucket == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_bucket_floors_to_the_scan_cycle() {
        let state = MarketState {
            timestamp: 1_000_123,
            symbol: "BTC".to_string(),
            primary_timeframe: Timeframe::H1,
            price: Decimal::from(50_000),
            final_decision: test_decision(),
            exchange_divergence: test_divergence(),
            market_regime: RegimeResult {
                regime: crate::domain::market::regime::Regime::RangeChop,
                confidence: Decimal::from(3),
            },
            technical: test_technical(),
            funding_advanced: FundingAdvanced {
                classification: FundingClassification {
                    level: crate::domain::market::classifiers::FundingLevel::Normal,
                    bias: Bias::Wait,
                },
                z_score: Decimal::ZERO,
                pain_index: Decimal::ZERO,
            },
            oi_advanced: OiAdvanced {
                binance_move: test_move(),
                bybit_move: test_move(),
                whale_retail_ratio: WhaleRetailRatio {
                    ratio: Decimal::ONE,
                    reliable: false,
                },
            },
            volume_profile: None,
            structure: MarketStructure {
                resistance: None,
                support: None,
                bos: crate::domain::market::structure::BreakOfStructure::None,
            },
            timeframes: Vec::new(),
            timeframe_buckets: Vec::new(),
            data_quality: DataQuality::Full,
            warnings: Vec::new(),
            outcome_label: None,
        };
        assert_eq!(state.time_bucket(300_000), 900_000);
    }

    fn test_move() -> MoveClassification {
        MoveClassification {
            direction: crate::domain::market::classifiers::MoveDirection::Flat,
            strength: crate::domain::market::classifiers::MoveStrength::Noise,
        }
    }

    fn test_decision() -> FinalDecision {
        FinalDecision {
            bias: FinalBias::Wait,
            confidence: Decimal::from(3),
            confidence_type: ConfidenceType::NoTrade,
            scores: ScoredSignals {
                long: Decimal::ZERO,
                short: Decimal::ZERO,
                wait: Decimal::ZERO,
                active_weight: Decimal::ZERO,
                direction_confidence: Decimal::ZERO,
                conflict_bonus: Decimal::ZERO,
                no_trade_confidence: Decimal::from(3),
            },
            signals: Vec::new(),
            reasoning: Vec::new(),
            trade_stance: TradeStance::AvoidTrading,
            primary_regime: "range.chop".to_string(),
            risk_mode: RiskMode::Defensive,
            macro_anchored: false,
            warning: None,
            macro_override: None,
        }
    }

    fn test_divergence() -> ExchangeDivergenceResult {
        ExchangeDivergenceResult {
            scenario: crate::domain::market::divergence::ExchangeScenario::Unclear,
            confidence: Decimal::from(4),
            bias: crate::domain::market::divergence::ScenarioBias::Wait,
            warnings: Vec::new(),
        }
    }

    fn test_technical() -> TechnicalSummary {
        TechnicalSummary {
            ema_fast: Decimal::ZERO,
            ema_slow: Decimal::ZERO,
            sma: Decimal::ZERO,
            slope: Decimal::ZERO,
            trend: crate::domain::market::technical::TrendDirection::Flat,
            realized_volatility_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            z_score: Decimal::ZERO,
        }
    }
}
