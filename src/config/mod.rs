//! Process-environment configuration (§6): the typed wrapper around
//! `env::var` the rest of the application reads from instead of touching
//! `std::env` directly.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Coinglass's published plan tiers (§6); drives both the inter-request
/// delay and the coarsest interval the plan is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinglassPlan {
    Startup,
    Standard,
    Professional,
}

impl CoinglassPlan {
    /// Delay between consecutive vendor requests, in milliseconds.
    pub fn request_delay_ms(&self) -> u64 {
        match self {
            CoinglassPlan::Startup => 2_000,
            CoinglassPlan::Standard => 500,
            CoinglassPlan::Professional => 100,
        }
    }
}

impl FromStr for CoinglassPlan {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "STARTUP" => Ok(CoinglassPlan::Startup),
            "STANDARD" => Ok(CoinglassPlan::Standard),
            "PROFESSIONAL" => Ok(CoinglassPlan::Professional),
            _ => anyhow::bail!("Invalid COINGLASS_ACTIVE_PLAN: '{}'", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoinglassEnvConfig {
    pub active_plan: CoinglassPlan,
    pub api_key: String,
}

impl CoinglassEnvConfig {
    fn from_env() -> Result<Self> {
        let active_plan = env::var("COINGLASS_ACTIVE_PLAN")
            .unwrap_or_else(|_| "STANDARD".to_string())
            .parse::<CoinglassPlan>()?;
        let api_key = env::var("COINGLASS_API_KEY").context("COINGLASS_API_KEY is required")?;
        Ok(Self { active_plan, api_key })
    }
}

/// Durable storage credentials (§6). Named after Supabase per the spec's
/// literal env keys, but consumed here as an arbitrary keyed row store.
#[derive(Debug, Clone)]
pub struct StorageEnvConfig {
    pub database_url: String,
    pub service_key: Option<String>,
}

impl StorageEnvConfig {
    fn from_env() -> Result<Self> {
        let database_url = env::var("SUPABASE_URL").unwrap_or_else(|_| "sqlite://data/engine.db".to_string());
        let service_key = env::var("SUPABASE_SERVICE_KEY").ok();
        Ok(Self { database_url, service_key })
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerEnvConfig {
    pub enable_cron_jobs: bool,
    pub enable_startup_cache: bool,
}

impl SchedulerEnvConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            enable_cron_jobs: Self::parse_bool("ENABLE_CRON_JOBS", true)?,
            enable_startup_cache: Self::parse_bool("ENABLE_STARTUP_CACHE", true)?,
        })
    }

    fn parse_bool(key: &str, default: bool) -> Result<bool> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<bool>()
            .context(format!("Failed to parse {}", key))
    }
}

/// Rate limiting for the inbound API (§6), not the outbound vendor calls.
#[derive(Debug, Clone)]
pub struct RateLimitEnvConfig {
    pub window_minutes: u32,
    pub max_requests: u32,
}

impl RateLimitEnvConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            window_minutes: Self::parse_u32("RATE_LIMIT_WINDOW_MINUTES", 1)?,
            max_requests: Self::parse_u32("RATE_LIMIT_MAX_REQUESTS", 60)?,
        })
    }

    fn parse_u32(key: &str, default: u32) -> Result<u32> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u32>()
            .context(format!("Failed to parse {}", key))
    }
}

/// Aggregates every environment-sourced sub-config into one value the rest
/// of the application is built from, mirroring the teacher's
/// `Config::from_env` aggregation of `BrokerEnvConfig`/`StrategyEnvConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub scan_cycle_ms: i64,
    pub coinglass: CoinglassEnvConfig,
    pub storage: StorageEnvConfig,
    pub scheduler: SchedulerEnvConfig,
    pub rate_limit: RateLimitEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let symbol = env::var("SYMBOL").unwrap_or_else(|_| "BTC".to_string());
        let scan_cycle_ms = env::var("SCAN_CYCLE_MS")
            .unwrap_or_else(|_| "300000".to_string())
            .parse::<i64>()
            .context("Failed to parse SCAN_CYCLE_MS")?;

        Ok(Self {
            symbol,
            scan_cycle_ms,
            coinglass: CoinglassEnvConfig::from_env()?,
            storage: StorageEnvConfig::from_env()?,
            scheduler: SchedulerEnvConfig::from_env()?,
            rate_limit: RateLimitEnvConfig::from_env()?,
        })
    }
}
