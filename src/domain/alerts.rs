//! `Alert` entity and category/priority enums (§3, §4.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertCategory {
    BiasShift,
    RegimeChange,
    ConfidenceSpike,
    TrapDetected,
    SqueezeActive,
    FundingExtreme,
}

impl AlertCategory {
    /// Cooldown window in minutes, per the §4.4 table.
    pub fn cooldown_minutes(&self) -> i64 {
        match self {
            AlertCategory::BiasShift => 30,
            AlertCategory::RegimeChange => 60,
            AlertCategory::ConfidenceSpike => 60,
            AlertCategory::TrapDetected => 60,
            AlertCategory::SqueezeActive => 60,
            AlertCategory::FundingExtreme => 240,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertContext {
    pub previous: String,
    pub current: String,
    pub trigger_event: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: i64,
    pub category: AlertCategory,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub context: AlertContext,
    pub actionable_insight: String,
    pub expires_at: i64,
    pub market_state_id: Option<String>,
}

/// Sorts a batch of freshly emitted alerts by priority descending, the
/// order the Alert Engine returns them in.
pub fn sort_by_priority_desc(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| b.priority.cmp(&a.priority));
}
