//! Versioned, validated `Config` (§3, §4.6): the thresholds/weights/gates/
//! penalties/bounds bundle the Metrics Engine reads as an immutable snapshot
//! on every cycle, and the Config Service mutates under optimistic locking.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("signal weights sum to {actual}, must equal 1.0 +/- 0.001")]
    WeightsDoNotSumToOne { actual: Decimal },

    #[error("field {field} = {value} is outside declared bounds [{min}, {max}]")]
    OutOfBounds {
        field: String,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("field {field} has no declared bounds")]
    MissingBounds { field: String },

    #[error("field {field} step |{delta}| / {old} exceeds maxStepPct {max_step_pct}")]
    StepTooLarge {
        field: String,
        delta: Decimal,
        old: Decimal,
        max_step_pct: Decimal,
    },

    #[error("version conflict: save based on {based_on_version}, current is {current_version}")]
    VersionConflict {
        based_on_version: u32,
        current_version: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMeta {
    pub version: u32,
    pub modified_at: i64,
    pub modified_by: String,
    pub notes: String,
}

/// Tunable classification/decision thresholds. The per-timeframe
/// noise/strong tables of §4.3.1 are compiled-in defaults
/// (`classifiers::default_thresholds`); these are the cross-cutting knobs
/// the Config Service is actually expected to move.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub trend_slope_pct: Decimal,
    pub funding_z_critical: Decimal,
    pub funding_z_elevated: Decimal,
    pub volume_dominance_multiplier: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalWeights {
    pub exchange_divergence: Decimal,
    pub market_regime: Decimal,
    pub structure: Decimal,
    pub volume_profile: Decimal,
    pub technical: Decimal,
    pub funding: Decimal,
    pub cvd: Decimal,
}

impl SignalWeights {
    pub fn sum(&self) -> Decimal {
        self.exchange_divergence
            + self.market_regime
            + self.structure
            + self.volume_profile
            + self.technical
            + self.funding
            + self.cvd
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Weights {
    pub signals: SignalWeights,
}

/// Bias-selection and bucket-aggregation gates (§4.3.7/§4.3.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Gates {
    pub bias_buffer_dominant_multiplier: Decimal,
    pub bias_buffer_wait_floor_multiplier: Decimal,
    pub bucket_bias_multiplier: Decimal,
    pub bucket_trade_stance_active_confidence: Decimal,
    pub macro_bucket_anchor_confidence: Decimal,
}

/// Fixed penalty/cap constants applied in decision- and aggregation-level
/// overrides (§4.3.7/§4.3.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Penalties {
    pub low_confidence_avoid_trading: Decimal,
    pub defensive_risk_confidence: Decimal,
    pub aggressive_risk_confidence: Decimal,
    pub macro_override_confidence_cap: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FieldBounds {
    pub min: Decimal,
    pub max: Decimal,
    pub max_step_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bounds(pub HashMap<String, FieldBounds>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub meta: ConfigMeta,
    pub thresholds: Thresholds,
    pub weights: Weights,
    pub gates: Gates,
    pub penalties: Penalties,
    pub bounds: Bounds,
}

impl Config {
    /// Flattens every bounded field to `(name, value)` so structural,
    /// bounds and delta validation can all walk the same list instead of
    /// repeating a field enumeration three times.
    fn fields(&self) -> Vec<(&'static str, Decimal)> {
        vec![
            ("thresholds.trend_slope_pct", self.thresholds.trend_slope_pct),
            ("thresholds.funding_z_critical", self.thresholds.funding_z_critical),
            ("thresholds.funding_z_elevated", self.thresholds.funding_z_elevated),
            ("thresholds.volume_dominance_multiplier", self.thresholds.volume_dominance_multiplier),
            ("weights.signals.exchange_divergence", self.weights.signals.exchange_divergence),
            ("weights.signals.market_regime", self.weights.signals.market_regime),
            ("weights.signals.structure", self.weights.signals.structure),
            ("weights.signals.volume_profile", self.weights.signals.volume_profile),
            ("weights.signals.technical", self.weights.signals.technical),
            ("weights.signals.funding", self.weights.signals.funding),
            ("weights.signals.cvd", self.weights.signals.cvd),
            ("gates.bias_buffer_dominant_multiplier", self.gates.bias_buffer_dominant_multiplier),
            ("gates.bias_buffer_wait_floor_multiplier", self.gates.bias_buffer_wait_floor_multiplier),
            ("gates.bucket_bias_multiplier", self.gates.bucket_bias_multiplier),
            ("gates.bucket_trade_stance_active_confidence", self.gates.bucket_trade_stance_active_confidence),
            ("gates.macro_bucket_anchor_confidence", self.gates.macro_bucket_anchor_confidence),
            ("penalties.low_confidence_avoid_trading", self.penalties.low_confidence_avoid_trading),
            ("penalties.defensive_risk_confidence", self.penalties.defensive_risk_confidence),
            ("penalties.aggressive_risk_confidence", self.penalties.aggressive_risk_confidence),
            ("penalties.macro_override_confidence_cap", self.penalties.macro_override_confidence_cap),
        ]
    }

    fn validate_structural(&self) -> Result<(), ConfigError> {
        let sum = self.weights.signals.sum();
        if (sum - dec!(1.0)).abs() > dec!(0.001) {
            return Err(ConfigError::WeightsDoNotSumToOne { actual: sum });
        }
        Ok(())
    }

    fn validate_bounds(&self) -> Result<(), ConfigError> {
        for (name, value) in self.fields() {
            let bounds = self
                .bounds
                .0
                .get(name)
                .ok_or_else(|| ConfigError::MissingBounds { field: name.to_string() })?;
            if value < bounds.min || value > bounds.max {
                return Err(ConfigError::OutOfBounds {
                    field: name.to_string(),
                    value,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
        }
        Ok(())
    }

    /// `|delta| / old <= bounds.*.maxStepPct` for every field that changed
    /// from `previous`.
    fn validate_delta(&self, previous: &Config) -> Result<(), ConfigError> {
        let previous_fields: HashMap<&'static str, Decimal> = previous.fields().into_iter().collect();
        for (name, value) in self.fields() {
            let Some(&old) = previous_fields.get(name) else {
                continue;
            };
            if old == value {
                continue;
            }
            let bounds = self
                .bounds
                .0
                .get(name)
                .ok_or_else(|| ConfigError::MissingBounds { field: name.to_string() })?;
            if old == Decimal::ZERO {
                continue;
            }
            let step = ((value - old) / old).abs();
            if step > bounds.max_step_pct {
                return Err(ConfigError::StepTooLarge {
                    field: name.to_string(),
                    delta: value - old,
                    old,
                    max_step_pct: bounds.max_step_pct,
                });
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_structural()?;
        self.validate_bounds()
    }

    /// Runs the full `save` contract of §4.6: optimistic-lock check,
    /// structural validation, bounds validation, delta validation against
    /// `previous`, then returns the new config with its patch version
    /// incremented.
    pub fn save(
        mut self,
        previous: &Config,
        based_on_version: u32,
        modified_by: String,
        notes: String,
        modified_at: i64,
    ) -> Result<Config, ConfigError> {
        if based_on_version != previous.meta.version {
            return Err(ConfigError::VersionConflict {
                based_on_version,
                current_version: previous.meta.version,
            });
        }
        self.validate_structural()?;
        self.validate_bounds()?;
        self.validate_delta(previous)?;

        self.meta = ConfigMeta {
            version: previous.meta.version + 1,
            modified_at,
            modified_by,
            notes,
        };
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        let thresholds = Thresholds {
            trend_slope_pct: dec!(0.1),
            funding_z_critical: dec!(2.0),
            funding_z_elevated: dec!(1.0),
            volume_dominance_multiplier: dec!(1.5),
        };
        let weights = Weights {
            signals: SignalWeights {
                exchange_divergence: dec!(0.35),
                market_regime: dec!(0.20),
                structure: dec!(0.15),
                volume_profile: dec!(0.10),
                technical: dec!(0.10),
                funding: dec!(0.05),
                cvd: dec!(0.05),
            },
        };
        let gates = Gates {
            bias_buffer_dominant_multiplier: dec!(1.3),
            bias_buffer_wait_floor_multiplier: dec!(0.8),
            bucket_bias_multiplier: dec!(1.2),
            bucket_trade_stance_active_confidence: dec!(6.0),
            macro_bucket_anchor_confidence: dec!(6.0),
        };
        let penalties = Penalties {
            low_confidence_avoid_trading: dec!(5),
            defensive_risk_confidence: dec!(6),
            aggressive_risk_confidence: dec!(8),
            macro_override_confidence_cap: dec!(4),
        };

        let mut bounds = HashMap::new();
        bounds.insert("thresholds.trend_slope_pct".to_string(), FieldBounds { min: dec!(0.01), max: dec!(1.0), max_step_pct: dec!(0.5) });
        bounds.insert("thresholds.funding_z_critical".to_string(), FieldBounds { min: dec!(1.0), max: dec!(5.0), max_step_pct: dec!(0.5) });
        bounds.insert("thresholds.funding_z_elevated".to_string(), FieldBounds { min: dec!(0.5), max: dec!(3.0), max_step_pct: dec!(0.5) });
        bounds.insert("thresholds.volume_dominance_multiplier".to_string(), FieldBounds { min: dec!(1.0), max: dec!(5.0), max_step_pct: dec!(0.5) });
        bounds.insert("weights.signals.exchange_divergence".to_string(), FieldBounds { min: dec!(0.0), max: dec!(1.0), max_step_pct: dec!(0.5) });
        bounds.insert("weights.signals.market_regime".to_string(), FieldBounds { min: dec!(0.0), max: dec!(1.0), max_step_pct: dec!(0.5) });
        bounds.insert("weights.signals.structure".to_string(), FieldBounds { min: dec!(0.0), max: dec!(1.0), max_step_pct: dec!(0.5) });
        bounds.insert("weights.signals.volume_profile".to_string(), FieldBounds { min: dec!(0.0), max: dec!(1.0), max_step_pct: dec!(0.5) });
        bounds.insert("weights.signals.technical".to_string(), FieldBounds { min: dec!(0.0), max: dec!(1.0), max_step_pct: dec!(0.5) });
        bounds.insert("weights.signals.funding".to_string(), FieldBounds { min: dec!(0.0), max: dec!(1.0), max_step_pct: dec!(0.5) });
        bounds.insert("weights.signals.cvd".to_string(), FieldBounds { min: dec!(0.0), max: dec!(1.0), max_step_pct: dec!(0.5) });
        bounds.insert("gates.bias_buffer_dominant_multiplier".to_string(), FieldBounds { min: dec!(1.0), max: dec!(3.0), max_step_pct: dec!(0.5) });
        bounds.insert("gates.bias_buffer_wait_floor_multiplier".to_string(), FieldBounds { min: dec!(0.1), max: dec!(1.0), max_step_pct: dec!(0.5) });
        bounds.insert("gates.bucket_bias_multiplier".to_string(), FieldBounds { min: dec!(1.0), max: dec!(3.0), max_step_pct: dec!(0.5) });
        bounds.insert("gates.bucket_trade_stance_active_confidence".to_string(), FieldBounds { min: dec!(0.0), max: dec!(10.0), max_step_pct: dec!(0.5) });
        bounds.insert("gates.macro_bucket_anchor_confidence".to_string(), FieldBounds { min: dec!(0.0), max: dec!(10.0), max_step_pct: dec!(0.5) });
        bounds.insert("penalties.low_confidence_avoid_trading".to_string(), FieldBounds { min: dec!(0.0), max: dec!(10.0), max_step_pct: dec!(0.5) });
        bounds.insert("penalties.defensive_risk_confidence".to_string(), FieldBounds { min: dec!(0.0), max: dec!(10.0), max_step_pct: dec!(0.5) });
        bounds.insert("penalties.aggressive_risk_confidence".to_string(), FieldBounds { min: dec!(0.0), max: dec!(10.0), max_step_pct: dec!(0.5) });
        bounds.insert("penalties.macro_override_confidence_cap".to_string(), FieldBounds { min: dec!(0.0), max: dec!(10.0), max_step_pct: dec!(0.5) });

        Config {
            meta: ConfigMeta {
                version: 1,
                modified_at: 0,
                modified_by: "system".to_string(),
                notes: "default configuration".to_string(),
            },
            thresholds,
            weights,
            gates,
            penalties,
            bounds: Bounds(bounds),
        }
    }
}
