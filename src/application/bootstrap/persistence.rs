use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::domain::repositories::{AlertRepository, CandleRepository, ConfigRepository, StateStoreRepository};
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::{
    SqliteAlertRepository, SqliteCandleRepository, SqliteConfigRepository, SqliteStateStoreRepository,
};
use crate::infrastructure::vendor::coinglass::CoinglassClient;

/// Every durable repository the application layer depends on, wired once at
/// startup behind the trait objects the domain defines.
pub struct PersistenceHandle {
    pub db: Database,
    pub candle_repository: Arc<dyn CandleRepository>,
    pub state_store_repository: Arc<dyn StateStoreRepository>,
    pub config_repository: Arc<dyn ConfigRepository>,
    pub alert_repository: Arc<dyn AlertRepository>,
}

pub struct PersistenceBootstrap;

impl PersistenceBootstrap {
    pub async fn init(database_url: &str) -> Result<PersistenceHandle> {
        info!("Initializing database at {}", database_url);
        let db = Database::new(database_url).await.context("Failed to initialize database")?;

        let candle_repository = Arc::new(SqliteCandleRepository::new(db.pool.clone()));
        let state_store_repository = Arc::new(SqliteStateStoreRepository::new(db.pool.clone()));
        let config_repository = Arc::new(SqliteConfigRepository::new(db.pool.clone()));
        let alert_repository = Arc::new(SqliteAlertRepository::new(db.pool.clone()));

        Ok(PersistenceHandle {
            db,
            candle_repository,
            state_store_repository,
            config_repository,
            alert_repository,
        })
    }
}

/// The fully wired engine: persistence plus the vendor client, built once
/// from process environment at process startup.
pub struct EngineContext {
    pub config: Config,
    pub persistence: PersistenceHandle,
    pub coinglass: CoinglassClient,
}

impl EngineContext {
    pub async fn bootstrap() -> Result<Self> {
        let config = Config::from_env()?;
        let persistence = PersistenceBootstrap::init(&config.storage.database_url).await?;
        let coinglass = CoinglassClient::new(
            config.coinglass.api_key.clone(),
            "https://open-api-v4.coinglass.com".to_string(),
            config.coinglass.active_plan,
        );

        Ok(Self {
            config,
            persistence,
            coinglass,
        })
    }
}
