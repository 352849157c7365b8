//! State Store (§4.5): a dedup cache in front of `StateStoreRepository`,
//! plus the outcome-labeling job that fills `outcomeLabel` exactly once per
//! `MarketState`.

use crate::domain::errors::EngineError;
use crate::domain::market::decision::FinalBias;
use crate::domain::market::state::{MarketState, OutcomeAssessment, OutcomeLabel};
use crate::domain::repositories::StateStoreRepository;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::info;

/// How long a `(symbol, timeBucket)` key stays in the in-memory dedup cache.
/// Matches the dedup window of §4.5 — long enough to cover the shortest
/// scheduler interval many times over.
const DEDUP_RETENTION_MS: i64 = 60 * 60_000;

/// Outcome-labeling horizons, in hours, and the directional-move threshold
/// (percent) that separates a CONTINUATION/REVERSAL from NOISE at each one.
const HORIZONS: [(u32, Decimal); 3] = [(4, dec!(0.5)), (24, dec!(1.0)), (72, dec!(2.0))];

fn signed_bias(bias: FinalBias) -> Decimal {
    match bias {
        FinalBias::Long => Decimal::ONE,
        FinalBias::Short => -Decimal::ONE,
        FinalBias::Wait => Decimal::ZERO,
    }
}

/// In-memory dedup entry: just enough to age the key out after
/// `DEDUP_RETENTION_MS`.
struct DedupEntry {
    symbol: String,
    time_bucket: i64,
    inserted_at: i64,
}

pub struct StateStore {
    repository: Arc<dyn StateStoreRepository>,
    scan_cycle_ms: i64,
    seen: Mutex<Vec<DedupEntry>>,
}

impl StateStore {
    pub fn new(repository: Arc<dyn StateStoreRepository>, scan_cycle_ms: i64) -> Self {
        Self { repository, scan_cycle_ms, seen: Mutex::new(Vec::new()) }
    }

    /// Rehydrates the dedup cache from the latest persisted state for
    /// `symbol`, so a process restart doesn't immediately re-insert a
    /// duplicate for the bucket already on disk.
    pub async fn hydrate(&self, symbol: &str, now: i64) -> Result<(), EngineError> {
        if let Some(latest) = self.repository.load_latest(symbol).await? {
            let time_bucket = latest.time_bucket(self.scan_cycle_ms);
            self.remember(symbol, time_bucket, now);
        }
        Ok(())
    }

    fn remember(&self, symbol: &str, time_bucket: i64, now: i64) {
        let mut seen = self.seen.lock().unwrap();
        seen.retain(|e| now - e.inserted_at < DEDUP_RETENTION_MS);
        seen.push(DedupEntry { symbol: symbol.to_string(), time_bucket, inserted_at: now });
    }

    fn already_seen(&self, symbol: &str, time_bucket: i64) -> bool {
        self.seen.lock().unwrap().iter().any(|e| e.symbol == symbol && e.time_bucket == time_bucket)
    }

    /// Inserts `state` if its `(symbol, timeBucket)` key hasn't already been
    /// written this cache window or by a prior process (repository is the
    /// source of truth; the in-memory cache only saves a round trip on the
    /// common case). Returns `true` iff a new row was written.
    pub async fn insert_if_absent(&self, state: &MarketState, now: i64) -> Result<bool, EngineError> {
        let time_bucket = state.time_bucket(self.scan_cycle_ms);
        if self.already_seen(&state.symbol, time_bucket) {
            return Ok(false);
        }
        let inserted = self.repository.insert_if_absent(state, self.scan_cycle_ms).await?;
        self.remember(&state.symbol, time_bucket, now);
        Ok(inserted)
    }

    pub async fn latest(&self, symbol: &str) -> Result<Option<MarketState>, EngineError> {
        self.repository.load_latest(symbol).await
    }

    /// Labels every unlabeled state for `symbol` whose oldest configured
    /// horizon has elapsed, using `current_price` as the final reference
    /// price. Runs the §8 outcome formula per-horizon and keeps the first
    /// horizon whose cutoff has actually passed.
    pub async fn label_outcomes(&self, symbol: &str, now: i64, current_price: Decimal) -> Result<usize, EngineError> {
        let min_horizon_ms = HORIZONS.iter().map(|(h, _)| *h as i64).min().unwrap_or(4) * 3_600_000;
        let cutoff = now - min_horizon_ms;
        let unlabeled = self.repository.load_unlabeled_older_than(symbol, cutoff).await?;

        let mut labeled = 0;
        for state in unlabeled {
            let Some((horizon_hours, threshold)) = HORIZONS
                .iter()
                .copied()
                .filter(|(h, _)| now - state.timestamp >= *h as i64 * 3_600_000)
                .max_by_key(|(h, _)| *h)
            else {
                continue;
            };

            let outcome = assess_outcome(&state, current_price, horizon_hours, threshold, now);
            let time_bucket = state.time_bucket(self.scan_cycle_ms);
            self.repository.apply_outcome_label(symbol, time_bucket, &outcome).await?;
            labeled += 1;
        }
        if labeled > 0 {
            info!(symbol, labeled, "outcome labeling sweep applied labels");
        }
        Ok(labeled)
    }
}

/// `finalDirectionalMove = (finalPrice - signalPrice) / signalPrice *
/// directionSign(bias) * 100`. CONTINUATION if `>= threshold`, REVERSAL if
/// `<= -threshold`. For `WAIT` (directionSign == 0) the unsigned move over
/// its own range decides: `|finalMove| / threshold >= 1.5` and
/// directionality `> 0.6` is CONTINUATION, else NOISE.
fn assess_outcome(state: &MarketState, final_price: Decimal, horizon_hours: u32, threshold: Decimal, now: i64) -> OutcomeAssessment {
    let signal_price = state.price;
    let raw_move_pct = if signal_price.is_zero() {
        Decimal::ZERO
    } else {
        (final_price - signal_price) / signal_price * Decimal::ONE_HUNDRED
    };
    let sign = signed_bias(state.final_decision.bias);
    let final_directional_move = raw_move_pct * sign;

    let (label, reason) = if sign != Decimal::ZERO {
        if final_directional_move >= threshold {
            (OutcomeLabel::Continuation, format!("directional move {final_directional_move}% >= threshold {threshold}%"))
        } else if final_directional_move <= -threshold {
            (OutcomeLabel::Reversal, format!("directional move {final_directional_move}% <= -{threshold}%"))
        } else {
            (OutcomeLabel::Noise, format!("directional move {final_directional_move}% within +/-{threshold}%"))
        }
    } else {
        let directionality = if threshold.is_zero() { Decimal::ZERO } else { raw_move_pct.abs() / threshold };
        if directionality >= dec!(1.5) && directionality > dec!(0.6) {
            (OutcomeLabel::Continuation, format!("WAIT call but unsigned move cleared 1.5x threshold ({directionality}x)"))
        } else {
            (OutcomeLabel::Noise, format!("WAIT call, unsigned move stayed under 1.5x threshold ({directionality}x)"))
        }
    };

    OutcomeAssessment {
        label,
        reason,
        horizon_hours,
        final_price,
        final_move_pct: raw_move_pct,
        mfe: raw_move_pct.max(Decimal::ZERO),
        mae: raw_move_pct.min(Decimal::ZERO),
        labeled_at: now,
    }
}
