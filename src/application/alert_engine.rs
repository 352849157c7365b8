//! Alert Engine (§4.4): diffs successive `MarketState`s into `Alert`s,
//! gated by a per-category cooldown and an oscillation suppressor on
//! `BIAS_SHIFT`. Cooldown state is hydrated from `AlertRepository` on
//! startup so a process restart doesn't re-fire an alert still within its
//! window.

use crate::domain::alerts::{Alert, AlertCategory, AlertContext, Priority, sort_by_priority_desc};
use crate::domain::errors::EngineError;
use crate::domain::market::classifiers::FundingLevel;
use crate::domain::market::decision::FinalBias;
use crate::domain::market::state::MarketState;
use crate::domain::repositories::AlertRepository;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// How many prior bias readings the oscillation suppressor looks at.
const BIAS_HISTORY_LEN: usize = 6;
/// Suppress `BIAS_SHIFT` once this many changes have happened within the
/// tracked window — the symbol is chopping, not trending.
const OSCILLATION_SUPPRESS_THRESHOLD: usize = 3;
/// Minimum confidence jump (on the 0-10 scale) to raise `CONFIDENCE_SPIKE`.
const CONFIDENCE_SPIKE_DELTA: rust_decimal::Decimal = dec!(3);

fn is_trap(primary_regime: &str) -> bool {
    primary_regime.starts_with("trap.")
}

fn is_squeeze(primary_regime: &str) -> bool {
    primary_regime.starts_with("covering.")
}

fn is_funding_extreme(level: FundingLevel) -> bool {
    matches!(level, FundingLevel::CriticalHigh | FundingLevel::CriticalLow)
}

struct SymbolState {
    last_emitted_at: HashMap<AlertCategory, i64>,
    bias_history: VecDeque<FinalBias>,
}

impl SymbolState {
    fn new() -> Self {
        Self { last_emitted_at: HashMap::new(), bias_history: VecDeque::with_capacity(BIAS_HISTORY_LEN) }
    }

    fn push_bias(&mut self, bias: FinalBias) {
        if self.bias_history.len() == BIAS_HISTORY_LEN {
            self.bias_history.pop_front();
        }
        self.bias_history.push_back(bias);
    }

    fn recent_changes(&self) -> usize {
        self.bias_history.iter().zip(self.bias_history.iter().skip(1)).filter(|(a, b)| a != b).count()
    }

    fn cooldown_active(&self, category: AlertCategory, now: i64) -> bool {
        match self.last_emitted_at.get(&category) {
            Some(last) => now - last < category.cooldown_minutes() as i64 * 60_000,
            None => false,
        }
    }
}

pub struct AlertEngine {
    alert_repository: Arc<dyn AlertRepository>,
    symbols: HashMap<String, SymbolState>,
}

impl AlertEngine {
    pub fn new(alert_repository: Arc<dyn AlertRepository>) -> Self {
        Self { alert_repository, symbols: HashMap::new() }
    }

    /// Rehydrates cooldown state for `symbol` from stored alert history so a
    /// restarted process doesn't re-fire an alert still within its window.
    pub async fn hydrate(&mut self, symbol: &str, since: i64) -> Result<(), EngineError> {
        let history = self.alert_repository.load_since(symbol, since).await?;
        let state = self.symbols.entry(symbol.to_string()).or_insert_with(SymbolState::new);
        for alert in history {
            let entry = state.last_emitted_at.entry(alert.category).or_insert(alert.timestamp);
            if alert.timestamp > *entry {
                *entry = alert.timestamp;
            }
        }
        Ok(())
    }

    fn candidate(
        category: AlertCategory,
        priority: Priority,
        title: &str,
        description: String,
        context: AlertContext,
        actionable_insight: String,
        now: i64,
        market_state_id: Option<String>,
    ) -> Alert {
        Alert {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            category,
            priority,
            title: title.to_string(),
            description,
            context,
            actionable_insight,
            expires_at: now + category.cooldown_minutes() as i64 * 60_000,
            market_state_id,
        }
    }

    /// Diffs `previous` against `current` and returns the alerts that clear
    /// both the per-category cooldown and (for `BIAS_SHIFT`) the oscillation
    /// suppressor. Updates cooldown/bias-history state for every category
    /// that actually fires.
    pub fn evaluate(&mut self, symbol: &str, previous: Option<&MarketState>, current: &MarketState, now: i64) -> Vec<Alert> {
        let state = self.symbols.entry(symbol.to_string()).or_insert_with(SymbolState::new);
        state.push_bias(current.final_decision.bias);

        let Some(previous) = previous else {
            return Vec::new();
        };

        let mut alerts = Vec::new();

        if previous.final_decision.bias != current.final_decision.bias
            && !state.cooldown_active(AlertCategory::BiasShift, now)
            && state.recent_changes() < OSCILLATION_SUPPRESS_THRESHOLD
        {
            alerts.push(Self::candidate(
                AlertCategory::BiasShift,
                Priority::High,
                "Bias shift",
                format!("{:?} -> {:?}", previous.final_decision.bias, current.final_decision.bias),
                AlertContext {
                    previous: format!("{:?}", previous.final_decision.bias),
                    current: format!("{:?}", current.final_decision.bias),
                    trigger_event: "final_decision.bias changed".to_string(),
                },
                format!("Bias moved to {:?} at {:.1} confidence", current.final_decision.bias, current.final_decision.confidence),
                now,
                None,
            ));
        }

        if previous.final_decision.primary_regime != current.final_decision.primary_regime
            && !state.cooldown_active(AlertCategory::RegimeChange, now)
        {
            alerts.push(Self::candidate(
                AlertCategory::RegimeChange,
                Priority::Medium,
                "Regime change",
                format!("{} -> {}", previous.final_decision.primary_regime, current.final_decision.primary_regime),
                AlertContext {
                    previous: previous.final_decision.primary_regime.clone(),
                    current: current.final_decision.primary_regime.clone(),
                    trigger_event: "primary_regime changed".to_string(),
                },
                format!("Regime is now {}", current.final_decision.primary_regime),
                now,
                None,
            ));
        }

        if current.final_decision.confidence - previous.final_decision.confidence >= CONFIDENCE_SPIKE_DELTA
            && !state.cooldown_active(AlertCategory::ConfidenceSpike, now)
        {
            alerts.push(Self::candidate(
                AlertCategory::ConfidenceSpike,
                Priority::Medium,
                "Confidence spike",
                format!("{} -> {}", previous.final_decision.confidence, current.final_decision.confidence),
                AlertContext {
                    previous: previous.final_decision.confidence.to_string(),
                    current: current.final_decision.confidence.to_string(),
                    trigger_event: "final_decision.confidence jumped".to_string(),
                },
                "Confidence rose sharply this cycle".to_string(),
                now,
                None,
            ));
        }

        if is_trap(&current.final_decision.primary_regime)
            && !is_trap(&previous.final_decision.primary_regime)
            && !state.cooldown_active(AlertCategory::TrapDetected, now)
        {
            alerts.push(Self::candidate(
                AlertCategory::TrapDetected,
                Priority::Critical,
                "Trap detected",
                format!("Entered {}", current.final_decision.primary_regime),
                AlertContext {
                    previous: previous.final_decision.primary_regime.clone(),
                    current: current.final_decision.primary_regime.clone(),
                    trigger_event: "regime entered a trap family".to_string(),
                },
                "Price action looks like a liquidity trap; avoid chasing the apparent breakout".to_string(),
                now,
                None,
            ));
        }

        if is_squeeze(&current.final_decision.primary_regime)
            && !is_squeeze(&previous.final_decision.primary_regime)
            && !state.cooldown_active(AlertCategory::SqueezeActive, now)
        {
            alerts.push(Self::candidate(
                AlertCategory::SqueezeActive,
                Priority::High,
                "Squeeze active",
                format!("Entered {}", current.final_decision.primary_regime),
                AlertContext {
                    previous: previous.final_decision.primary_regime.clone(),
                    current: current.final_decision.primary_regime.clone(),
                    trigger_event: "regime entered a covering family".to_string(),
                },
                format!("Pain index {} — squeeze risk is elevated", current.funding_advanced.pain_index),
                now,
                None,
            ));
        }

        if is_funding_extreme(current.funding_advanced.classification.level)
            && !is_funding_extreme(previous.funding_advanced.classification.level)
            && !state.cooldown_active(AlertCategory::FundingExtreme, now)
        {
            alerts.push(Self::candidate(
                AlertCategory::FundingExtreme,
                Priority::High,
                "Funding extreme",
                format!("z-score {}", current.funding_advanced.z_score),
                AlertContext {
                    previous: format!("{:?}", previous.funding_advanced.classification.level),
                    current: format!("{:?}", current.funding_advanced.classification.level),
                    trigger_event: "funding z-score crossed the critical threshold".to_string(),
                },
                format!("Pain index {} at the current funding extreme", current.funding_advanced.pain_index),
                now,
                None,
            ));
        }

        for alert in &alerts {
            state.last_emitted_at.insert(alert.category, alert.timestamp);
        }
        sort_by_priority_desc(&mut alerts);
        alerts
    }

    /// Runs `evaluate` and persists whatever fired.
    pub async fn evaluate_and_persist(
        &mut self,
        symbol: &str,
        previous: Option<&MarketState>,
        current: &MarketState,
        now: i64,
    ) -> Result<Vec<Alert>, EngineError> {
        let alerts = self.evaluate(symbol, previous, current, now);
        if !alerts.is_empty() {
            self.alert_repository.save_many(symbol, &alerts).await?;
        }
        Ok(alerts)
    }
}
