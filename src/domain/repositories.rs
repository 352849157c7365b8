//! Repository traits (§3, §4.5, §4.6): the seams between the pure domain
//! and durable storage. Implementations live under `infrastructure::persistence`.

use crate::domain::alerts::Alert;
use crate::domain::config::Config;
use crate::domain::errors::EngineError;
use crate::domain::market::candle::Candle;
use crate::domain::market::state::MarketState;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::venue::Venue;
use async_trait::async_trait;

/// The Historical-Candle Store: append-only, keyed by
/// `(venue, symbol, interval, timestamp)`. Upsert-on-conflict only — rows
/// are never mutated once written.
#[async_trait]
pub trait CandleRepository: Send + Sync {
    async fn upsert_many(&self, candles: &[Candle]) -> Result<(), EngineError>;

    async fn load_range(
        &self,
        venue: Venue,
        symbol: &str,
        interval: Timeframe,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<Candle>, EngineError>;
}

/// The State Store: persists `MarketState`s deduplicated by
/// `(symbol, timeBucket)`, and fills `outcomeLabel` exactly once per state.
#[async_trait]
pub trait StateStoreRepository: Send + Sync {
    /// Inserts a state for `(symbol, timeBucket)` if absent; returns `false`
    /// without writing if a state for that key already exists (dedup).
    async fn insert_if_absent(&self, state: &MarketState, scan_cycle_ms: i64) -> Result<bool, EngineError>;

    async fn load_latest(&self, symbol: &str) -> Result<Option<MarketState>, EngineError>;

    async fn load_unlabeled_older_than(
        &self,
        symbol: &str,
        horizon_cutoff: i64,
    ) -> Result<Vec<MarketState>, EngineError>;

    /// Fills `outcomeLabel` on the row identified by `(symbol, timeBucket)`.
    async fn apply_outcome_label(
        &self,
        symbol: &str,
        time_bucket: i64,
        outcome: &crate::domain::market::state::OutcomeAssessment,
    ) -> Result<(), EngineError>;
}

/// The Config Service's durable side: append-only history plus a single
/// active row, mutated atomically by a successful `save`.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    async fn load_active(&self) -> Result<Config, EngineError>;

    /// Appends `config` as both the new active row and a new history row in
    /// one atomic write. Callers are expected to have already run
    /// `Config::save`'s in-memory validation before calling this.
    async fn save_active(&self, config: &Config) -> Result<(), EngineError>;

    async fn load_history(&self, limit: usize) -> Result<Vec<Config>, EngineError>;
}

/// Persists emitted alerts and hydrates cooldown state on startup.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn save_many(&self, symbol: &str, alerts: &[Alert]) -> Result<(), EngineError>;

    async fn load_since(&self, symbol: &str, since: i64) -> Result<Vec<Alert>, EngineError>;
}
