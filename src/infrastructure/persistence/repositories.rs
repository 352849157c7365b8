//! Sqlite implementations of the four repository traits (§3, §4.5, §4.6)
//! against the schema created in `database.rs`.

use crate::domain::alerts::{Alert, AlertCategory, AlertContext, Priority};
use crate::domain::config::Config;
use crate::domain::errors::EngineError;
use crate::domain::market::candle::Candle;
use crate::domain::market::state::{MarketState, OutcomeAssessment, OutcomeLabel};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{AlertRepository, CandleRepository, ConfigRepository, StateStoreRepository};
use crate::domain::venue::Venue;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

fn storage_err(context: &str, err: sqlx::Error) -> EngineError {
    EngineError::Storage(format!("{context}: {err}"))
}

fn decimal_or_zero(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or(Decimal::ZERO)
}

pub struct SqliteCandleRepository {
    pool: SqlitePool,
}

impl SqliteCandleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandleRepository for SqliteCandleRepository {
    async fn upsert_many(&self, candles: &[Candle]) -> Result<(), EngineError> {
        for candle in candles {
            sqlx::query(
                r#"
                INSERT INTO historical_candles
                    (venue, symbol, timeframe, timestamp, open, high, low, close, volume, oi, funding_rate, buy_volume, sell_volume)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(venue, symbol, timeframe, timestamp) DO NOTHING
                "#,
            )
            .bind(candle.venue.as_str())
            .bind(&candle.symbol)
            .bind(candle.interval.vendor_interval())
            .bind(candle.timestamp)
            .bind(candle.open.to_string())
            .bind(candle.high.to_string())
            .bind(candle.low.to_string())
            .bind(candle.close.to_string())
            .bind(candle.volume.map(|v| v.to_string()))
            .bind(candle.oi.map(|v| v.to_string()))
            .bind(candle.funding_rate.map(|v| v.to_string()))
            .bind(candle.buy_volume.map(|v| v.to_string()))
            .bind(candle.sell_volume.map(|v| v.to_string()))
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("failed to upsert candle", e))?;
        }
        Ok(())
    }

    async fn load_range(
        &self,
        venue: Venue,
        symbol: &str,
        interval: Timeframe,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<Candle>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM historical_candles
            WHERE venue = ? AND symbol = ? AND timeframe = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(venue.as_str())
        .bind(symbol)
        .bind(interval.vendor_interval())
        .bind(start_time)
        .bind(end_time)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("failed to load candle range", e))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            let open: String = row.try_get("open").map_err(|e| storage_err("missing open", e))?;
            let high: String = row.try_get("high").map_err(|e| storage_err("missing high", e))?;
            let low: String = row.try_get("low").map_err(|e| storage_err("missing low", e))?;
            let close: String = row.try_get("close").map_err(|e| storage_err("missing close", e))?;
            let volume: Option<String> = row.try_get("volume").map_err(|e| storage_err("missing volume", e))?;
            let oi: Option<String> = row.try_get("oi").map_err(|e| storage_err("missing oi", e))?;
            let funding_rate: Option<String> = row.try_get("funding_rate").map_err(|e| storage_err("missing funding_rate", e))?;
            let buy_volume: Option<String> = row.try_get("buy_volume").map_err(|e| storage_err("missing buy_volume", e))?;
            let sell_volume: Option<String> = row.try_get("sell_volume").map_err(|e| storage_err("missing sell_volume", e))?;

            candles.push(Candle {
                venue,
                symbol: symbol.to_string(),
                interval,
                timestamp: row.try_get("timestamp").map_err(|e| storage_err("missing timestamp", e))?,
                open: decimal_or_zero(&open),
                high: decimal_or_zero(&high),
                low: decimal_or_zero(&low),
                close: decimal_or_zero(&close),
                volume: volume.as_deref().map(decimal_or_zero),
                oi: oi.as_deref().map(decimal_or_zero),
                funding_rate: funding_rate.as_deref().map(decimal_or_zero),
                buy_volume: buy_volume.as_deref().map(decimal_or_zero),
                sell_volume: sell_volume.as_deref().map(decimal_or_zero),
            });
        }
        Ok(candles)
    }
}

pub struct SqliteStateStoreRepository {
    pool: SqlitePool,
}

impl SqliteStateStoreRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn deserialize_state(full_state_json: &str) -> Result<MarketState, EngineError> {
        serde_json::from_str(full_state_json)
            .map_err(|e| EngineError::Storage(format!("corrupt market_states row: {e}")))
    }
}

#[async_trait]
impl StateStoreRepository for SqliteStateStoreRepository {
    async fn insert_if_absent(&self, state: &MarketState, scan_cycle_ms: i64) -> Result<bool, EngineError> {
        let full_state_json = serde_json::to_string(state)
            .map_err(|e| EngineError::Storage(format!("failed to serialize market state: {e}")))?;
        let time_bucket = state.time_bucket(scan_cycle_ms);

        let result = sqlx::query(
            r#"
            INSERT INTO market_states
                (id, symbol, timestamp, time_bucket, bias, confidence, primary_regime, price, full_state_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol, time_bucket) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&state.symbol)
        .bind(state.timestamp)
        .bind(time_bucket)
        .bind(format!("{:?}", state.final_decision.bias))
        .bind(state.final_decision.confidence.to_string())
        .bind(&state.final_decision.primary_regime)
        .bind(state.price.to_string())
        .bind(full_state_json)
        .bind(state.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("failed to insert market state", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_latest(&self, symbol: &str) -> Result<Option<MarketState>, EngineError> {
        let row = sqlx::query("SELECT full_state_json FROM market_states WHERE symbol = ? ORDER BY timestamp DESC LIMIT 1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("failed to load latest market state", e))?;

        match row {
            Some(row) => {
                let full_state_json: String = row.try_get("full_state_json").map_err(|e| storage_err("missing full_state_json", e))?;
                Ok(Some(Self::deserialize_state(&full_state_json)?))
            }
            None => Ok(None),
        }
    }

    async fn load_unlabeled_older_than(
        &self,
        symbol: &str,
        horizon_cutoff: i64,
    ) -> Result<Vec<MarketState>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT full_state_json FROM market_states
            WHERE symbol = ? AND timestamp < ? AND outcome_label IS NULL
            ORDER BY timestamp ASC
            "#,
        )
        .bind(symbol)
        .bind(horizon_cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("failed to load unlabeled market states", e))?;

        let mut states = Vec::with_capacity(rows.len());
        for row in rows {
            let full_state_json: String = row.try_get("full_state_json").map_err(|e| storage_err("missing full_state_json", e))?;
            states.push(Self::deserialize_state(&full_state_json)?);
        }
        Ok(states)
    }

    async fn apply_outcome_label(
        &self,
        symbol: &str,
        time_bucket: i64,
        outcome: &OutcomeAssessment,
    ) -> Result<(), EngineError> {
        let outcome_json = serde_json::to_string(outcome)
            .map_err(|e| EngineError::Storage(format!("failed to serialize outcome: {e}")))?;
        let label = match outcome.label {
            OutcomeLabel::Continuation => "continuation",
            OutcomeLabel::Reversal => "reversal",
            OutcomeLabel::Noise => "noise",
            OutcomeLabel::Pending => "pending",
        };

        sqlx::query(
            r#"
            UPDATE market_states
            SET outcome_label = ?, outcome_json = ?
            WHERE symbol = ? AND time_bucket = ?
            "#,
        )
        .bind(label)
        .bind(outcome_json)
        .bind(symbol)
        .bind(time_bucket)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("failed to apply outcome label", e))?;

        Ok(())
    }
}

pub struct SqliteConfigRepository {
    pool: SqlitePool,
}

impl SqliteConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigRepository for SqliteConfigRepository {
    async fn load_active(&self) -> Result<Config, EngineError> {
        let row = sqlx::query("SELECT config_json FROM analyzer_config WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_err("failed to load active config", e))?;

        match row {
            Some(row) => {
                let config_json: String = row.try_get("config_json").map_err(|e| storage_err("missing config_json", e))?;
                serde_json::from_str(&config_json).map_err(|e| EngineError::Storage(format!("corrupt analyzer_config row: {e}")))
            }
            None => Ok(Config::default()),
        }
    }

    /// Appends `config` as both the active row and a new history row in one
    /// transaction, per the §4.6 "append both atomically" requirement.
    async fn save_active(&self, config: &Config) -> Result<(), EngineError> {
        let config_json = serde_json::to_string(config)
            .map_err(|e| EngineError::Storage(format!("failed to serialize config: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("failed to begin config transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO analyzer_config (id, version, modified_at, modified_by, notes, config_json)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                version = excluded.version,
                modified_at = excluded.modified_at,
                modified_by = excluded.modified_by,
                notes = excluded.notes,
                config_json = excluded.config_json
            "#,
        )
        .bind(config.meta.version)
        .bind(config.meta.modified_at)
        .bind(&config.meta.modified_by)
        .bind(&config.meta.notes)
        .bind(&config_json)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_err("failed to upsert active config", e))?;

        sqlx::query(
            r#"
            INSERT INTO analyzer_config_history (version, modified_at, modified_by, notes, config_json)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(version) DO NOTHING
            "#,
        )
        .bind(config.meta.version)
        .bind(config.meta.modified_at)
        .bind(&config.meta.modified_by)
        .bind(&config.meta.notes)
        .bind(&config_json)
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_err("failed to insert config history row", e))?;

        tx.commit().await.map_err(|e| storage_err("failed to commit config transaction", e))?;
        info!("Persisted analyzer_config version {}", config.meta.version);
        Ok(())
    }

    async fn load_history(&self, limit: usize) -> Result<Vec<Config>, EngineError> {
        let rows = sqlx::query("SELECT config_json FROM analyzer_config_history ORDER BY version DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("failed to load config history", e))?;

        let mut configs = Vec::with_capacity(rows.len());
        for row in rows {
            let config_json: String = row.try_get("config_json").map_err(|e| storage_err("missing config_json", e))?;
            configs.push(serde_json::from_str(&config_json).map_err(|e| EngineError::Storage(format!("corrupt analyzer_config_history row: {e}")))?);
        }
        Ok(configs)
    }
}

pub struct SqliteAlertRepository {
    pool: SqlitePool,
}

impl SqliteAlertRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn category_str(category: AlertCategory) -> &'static str {
        match category {
            AlertCategory::BiasShift => "bias_shift",
            AlertCategory::RegimeChange => "regime_change",
            AlertCategory::ConfidenceSpike => "confidence_spike",
            AlertCategory::TrapDetected => "trap_detected",
            AlertCategory::SqueezeActive => "squeeze_active",
            AlertCategory::FundingExtreme => "funding_extreme",
        }
    }

    fn category_from_str(s: &str) -> Result<AlertCategory, EngineError> {
        match s {
            "bias_shift" => Ok(AlertCategory::BiasShift),
            "regime_change" => Ok(AlertCategory::RegimeChange),
            "confidence_spike" => Ok(AlertCategory::ConfidenceSpike),
            "trap_detected" => Ok(AlertCategory::TrapDetected),
            "squeeze_active" => Ok(AlertCategory::SqueezeActive),
            "funding_extreme" => Ok(AlertCategory::FundingExtreme),
            other => Err(EngineError::Storage(format!("unknown alert_type in storage: {other}"))),
        }
    }

    fn priority_str(priority: Priority) -> &'static str {
        match priority {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    fn priority_from_str(s: &str) -> Result<Priority, EngineError> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(EngineError::Storage(format!("unknown priority in storage: {other}"))),
        }
    }
}

#[async_trait]
impl AlertRepository for SqliteAlertRepository {
    async fn save_many(&self, symbol: &str, alerts: &[Alert]) -> Result<(), EngineError> {
        for alert in alerts {
            let context_json = serde_json::to_string(&alert.context)
                .map_err(|e| EngineError::Storage(format!("failed to serialize alert context: {e}")))?;

            sqlx::query(
                r#"
                INSERT INTO alerts
                    (id, symbol, timestamp, alert_type, priority, title, description, context_json, actionable_insight, expires_at, market_state_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&alert.id)
            .bind(symbol)
            .bind(alert.timestamp)
            .bind(Self::category_str(alert.category))
            .bind(Self::priority_str(alert.priority))
            .bind(&alert.title)
            .bind(&alert.description)
            .bind(context_json)
            .bind(&alert.actionable_insight)
            .bind(alert.expires_at)
            .bind(&alert.market_state_id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("failed to save alert", e))?;
        }
        Ok(())
    }

    async fn load_since(&self, symbol: &str, since: i64) -> Result<Vec<Alert>, EngineError> {
        let rows = sqlx::query("SELECT * FROM alerts WHERE symbol = ? AND timestamp >= ? ORDER BY timestamp ASC")
            .bind(symbol)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("failed to load alerts", e))?;

        let mut alerts = Vec::with_capacity(rows.len());
        for row in rows {
            let alert_type: String = row.try_get("alert_type").map_err(|e| storage_err("missing alert_type", e))?;
            let priority: String = row.try_get("priority").map_err(|e| storage_err("missing priority", e))?;
            let context_json: String = row.try_get("context_json").map_err(|e| storage_err("missing context_json", e))?;
            let context: AlertContext = serde_json::from_str(&context_json)
                .map_err(|e| EngineError::Storage(format!("corrupt alert context: {e}")))?;

            alerts.push(Alert {
                id: row.try_get("id").map_err(|e| storage_err("missing id", e))?,
                timestamp: row.try_get("timestamp").map_err(|e| storage_err("missing timestamp", e))?,
                category: Self::category_from_str(&alert_type)?,
                priority: Self::priority_from_str(&priority)?,
                title: row.try_get("title").map_err(|e| storage_err("missing title", e))?,
                description: row.try_get("description").map_err(|e| storage_err("missing description", e))?,
                context,
                actionable_insight: row.try_get("actionable_insight").map_err(|e| storage_err("missing actionable_insight", e))?,
                expires_at: row.try_get("expires_at").map_err(|e| storage_err("missing expires_at", e))?,
                market_state_id: row.try_get("market_state_id").map_err(|e| storage_err("missing market_state_id", e))?,
            });
        }
        Ok(alerts)
    }
}
