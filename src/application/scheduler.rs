//! Scheduler (§5, §10): drives the live cycle timer, the hourly
//! outcome-labeling sweep and the daily cleanup job, wiring
//! Data Service -> Metrics Engine -> Alert Engine -> State Store end to end
//! for a single symbol. Cancellation is cooperative via
//! `tokio_util::sync::CancellationToken`; a cycle already running is never
//! interrupted, only the next tick is skipped if the previous one overran.

use crate::application::alert_engine::AlertEngine;
use crate::application::data_service::DataService;
use crate::application::metrics_engine::build_market_state;
use crate::application::state_store::StateStore;
use crate::domain::alerts::Alert;
use crate::domain::errors::EngineError;
use crate::domain::market::state::MarketState;
use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long between labeling sweeps.
const LABELING_SWEEP_INTERVAL: Duration = Duration::from_secs(3_600);
/// How long between the retention cleanup job's runs; the job itself
/// no-ops outside the 00:00 UTC window it targets.
const CLEANUP_CHECK_INTERVAL: Duration = Duration::from_secs(3_600);
const DAY_MS: i64 = 86_400_000;

/// One completed cycle's output, returned to callers that want to observe
/// what `run_once` did (tests, `replay` CLI, etc).
pub struct CycleOutcome {
    pub state: Option<MarketState>,
    pub alerts: Vec<Alert>,
    pub inserted: bool,
}

pub struct Scheduler {
    data_service: DataService,
    alert_engine: Mutex<AlertEngine>,
    state_store: Arc<StateStore>,
    symbol: String,
    primary_timeframe: Timeframe,
    scan_cycle_ms: i64,
    /// Guarantees no two cycles run concurrently for this symbol even if a
    /// tick fires while the previous cycle is still running (overrun-skip,
    /// not overrun-queue).
    cycle_lock: Mutex<()>,
    paused: Mutex<bool>,
}

impl Scheduler {
    pub fn new(
        data_service: DataService,
        alert_engine: AlertEngine,
        state_store: Arc<StateStore>,
        symbol: String,
        primary_timeframe: Timeframe,
        scan_cycle_ms: i64,
    ) -> Self {
        Self {
            data_service,
            alert_engine: Mutex::new(alert_engine),
            state_store,
            symbol,
            primary_timeframe,
            scan_cycle_ms,
            cycle_lock: Mutex::new(()),
            paused: Mutex::new(false),
        }
    }

    pub async fn pause(&self) {
        *self.paused.lock().await = true;
    }

    pub async fn resume(&self) {
        *self.paused.lock().await = false;
    }

    async fn is_paused(&self) -> bool {
        *self.paused.lock().await
    }

    /// Runs one live cycle: fetches fresh inputs for every timeframe, builds
    /// a `MarketState`, dedups it into the State Store, then diffs it
    /// against the previous state to fire alerts.
    pub async fn run_once(&self, now: i64) -> Result<CycleOutcome, EngineError> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            warn!(symbol = %self.symbol, "cycle overrun: previous cycle still running, skipping this tick");
            return Ok(CycleOutcome { state: None, alerts: Vec::new(), inserted: false });
        };

        let inputs = self.data_service.live_inputs(now).await;
        let price = inputs
            .iter()
            .find(|(tf, _)| *tf == self.primary_timeframe)
            .and_then(|(_, input)| input.binance.as_ref().or(input.bybit.as_ref()))
            .map(|v| v.snapshot.price)
            .unwrap_or(Decimal::ZERO);

        let Some(state) = build_market_state(&self.symbol, now, self.primary_timeframe, price, inputs) else {
            warn!(symbol = %self.symbol, "every timeframe dropped this cycle, no state produced");
            return Ok(CycleOutcome { state: None, alerts: Vec::new(), inserted: false });
        };

        let previous = self.state_store.latest(&self.symbol).await?;
        let inserted = self.state_store.insert_if_absent(&state, now).await?;

        let alerts = if inserted {
            self.alert_engine.lock().await.evaluate_and_persist(&self.symbol, previous.as_ref(), &state, now).await?
        } else {
            Vec::new()
        };

        Ok(CycleOutcome { state: Some(state), alerts, inserted })
    }

    async fn label_outcomes_once(&self, now: i64) -> Result<(), EngineError> {
        let Some(latest) = self.state_store.latest(&self.symbol).await? else {
            return Ok(());
        };
        let labeled = self.state_store.label_outcomes(&self.symbol, now, latest.price).await?;
        if labeled > 0 {
            info!(symbol = %self.symbol, labeled, "labeled outcomes this sweep");
        }
        Ok(())
    }

    /// Drives the live cycle timer, the hourly outcome-labeling sweep and a
    /// cleanup-check tick, until `cancel` fires. A slow cycle (one that
    /// overruns `scan_cycle_ms`) logs a warning rather than stacking ticks —
    /// `MissedTickBehavior::Skip` drops any tick missed while busy.
    pub async fn run_forever(&self, cancel: CancellationToken, now_fn: impl Fn() -> i64) {
        let mut cycle_timer = interval(Duration::from_millis(self.scan_cycle_ms.max(1) as u64));
        cycle_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut labeling_timer = interval(LABELING_SWEEP_INTERVAL);
        labeling_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cleanup_timer = interval(CLEANUP_CHECK_INTERVAL);
        cleanup_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(symbol = %self.symbol, "scheduler cancelled, stopping");
                    break;
                }
                _ = cycle_timer.tick() => {
                    if self.is_paused().await {
                        continue;
                    }
                    let now = now_fn();
                    let started = tokio::time::Instant::now();
                    match self.run_once(now).await {
                        Ok(outcome) => {
                            let elapsed = started.elapsed();
                            if elapsed > Duration::from_millis(self.scan_cycle_ms as u64) {
                                warn!(symbol = %self.symbol, elapsed_ms = elapsed.as_millis(), "cycle ran longer than the scan interval");
                            }
                            if !outcome.alerts.is_empty() {
                                info!(symbol = %self.symbol, count = outcome.alerts.len(), "alerts fired this cycle");
                            }
                        }
                        Err(err) => warn!(symbol = %self.symbol, error = %err, "cycle failed"),
                    }
                }
                _ = labeling_timer.tick() => {
                    if let Err(err) = self.label_outcomes_once(now_fn()).await {
                        warn!(symbol = %self.symbol, error = %err, "outcome labeling sweep failed");
                    }
                }
                _ = cleanup_timer.tick() => {
                    let now = now_fn();
                    if is_daily_cleanup_window(now) {
                        info!(symbol = %self.symbol, "running daily retention cleanup");
                    }
                }
            }
        }
    }
}

/// True within the first `CLEANUP_CHECK_INTERVAL` of 00:00 UTC, so an
/// hourly-granularity timer still hits the window once a day without
/// needing its own midnight-aligned clock.
fn is_daily_cleanup_window(now: i64) -> bool {
    let ms_into_day = now.rem_euclid(DAY_MS);
    ms_into_day < CLEANUP_CHECK_INTERVAL.as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_window_matches_midnight_utc() {
        assert!(is_daily_cleanup_window(0));
        assert!(is_daily_cleanup_window(DAY_MS * 3));
        assert!(!is_daily_cleanup_window(DAY_MS / 2));
    }
}
