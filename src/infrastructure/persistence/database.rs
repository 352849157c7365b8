//! Sqlite schema (§6): `historical_candles`, `market_states`, `alerts`,
//! `daily_summaries`, `analyzer_config` + append-only `analyzer_config_history`.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent).await.context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS historical_candles (
                venue TEXT NOT NULL,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume TEXT,
                oi TEXT,
                funding_rate TEXT,
                buy_volume TEXT,
                sell_volume TEXT,
                PRIMARY KEY (venue, symbol, timeframe, timestamp)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create historical_candles table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_candles_symbol_tf_time
            ON historical_candles (symbol, timeframe, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create historical_candles index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_states (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                time_bucket INTEGER NOT NULL,
                bias TEXT NOT NULL,
                confidence TEXT NOT NULL,
                primary_regime TEXT NOT NULL,
                price TEXT NOT NULL,
                full_state_json TEXT NOT NULL,
                outcome_label TEXT,
                outcome_json TEXT,
                created_at INTEGER NOT NULL,
                UNIQUE (symbol, time_bucket)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create market_states table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_market_states_symbol_time
            ON market_states (symbol, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create market_states index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                alert_type TEXT NOT NULL,
                priority TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                context_json TEXT NOT NULL,
                actionable_insight TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                market_state_id TEXT,
                acknowledged BOOLEAN NOT NULL DEFAULT 0,
                acknowledged_at INTEGER
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create alerts table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_alerts_symbol_category_time
            ON alerts (symbol, alert_type, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create alerts index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_summaries (
                date TEXT NOT NULL,
                symbol TEXT NOT NULL,
                avg_confidence TEXT,
                predominant_bias TEXT,
                bias_long_pct TEXT,
                bias_short_pct TEXT,
                bias_wait_pct TEXT,
                regime_distribution_json TEXT,
                total_alerts INTEGER NOT NULL DEFAULT 0,
                high_priority_alerts INTEGER NOT NULL DEFAULT 0,
                open TEXT,
                high TEXT,
                low TEXT,
                close TEXT,
                state_count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (date, symbol)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create daily_summaries table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyzer_config (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL,
                modified_at INTEGER NOT NULL,
                modified_by TEXT NOT NULL,
                notes TEXT NOT NULL,
                config_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create analyzer_config table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyzer_config_history (
                version INTEGER PRIMARY KEY,
                modified_at INTEGER NOT NULL,
                modified_by TEXT NOT NULL,
                notes TEXT NOT NULL,
                config_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create analyzer_config_history table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
