//! Config Service (§4.6): holds the active `Config` in memory for lock-free
//! reads on every cycle, and serializes writes through `Config::save`'s
//! optimistic-locking contract before persisting.

use crate::domain::config::Config;
use crate::domain::errors::EngineError;
use crate::domain::repositories::ConfigRepository;
use std::sync::Arc;
use std::sync::RwLock;
use tracing::info;

pub struct ConfigService {
    repository: Arc<dyn ConfigRepository>,
    active: RwLock<Config>,
}

impl ConfigService {
    pub async fn load(repository: Arc<dyn ConfigRepository>) -> Result<Self, EngineError> {
        let active = repository.load_active().await?;
        Ok(Self { repository, active: RwLock::new(active) })
    }

    /// Lock-free snapshot read; callers clone out of the lock immediately so
    /// a cycle never holds it across an `.await`.
    pub fn current(&self) -> Config {
        self.active.read().unwrap().clone()
    }

    /// Validates `candidate` against the live snapshot under
    /// `Config::save`'s full contract (optimistic lock, structural, bounds,
    /// delta), then persists and swaps the in-memory snapshot on success.
    pub async fn save(
        &self,
        candidate: Config,
        based_on_version: u32,
        modified_by: String,
        notes: String,
        modified_at: i64,
    ) -> Result<Config, EngineError> {
        let previous = self.current();
        let saved = candidate
            .save(&previous, based_on_version, modified_by, notes, modified_at)
            .map_err(|e| EngineError::Validation { violations: vec![e.to_string()] })?;

        self.repository.save_active(&saved).await?;
        *self.active.write().unwrap() = saved.clone();
        info!(version = saved.meta.version, modified_by = %saved.meta.modified_by, "config saved");
        Ok(saved)
    }

    /// Rolls back to a specific historical version: re-runs it through
    /// `save` (against the current snapshot) so the rollback itself is
    /// bounds-checked and bumps the version forward rather than rewriting
    /// history in place.
    pub async fn rollback_to(&self, version: u32, modified_by: String, modified_at: i64) -> Result<Config, EngineError> {
        let history = self.repository.load_history(usize::MAX).await?;
        let target = history
            .into_iter()
            .find(|c| c.meta.version == version)
            .ok_or_else(|| EngineError::Storage(format!("no config history entry for version {version}")))?;

        let previous = self.current();
        let based_on_version = previous.meta.version;
        let notes = format!("rollback to version {version}");
        let rolled_back = target
            .save(&previous, based_on_version, modified_by, notes, modified_at)
            .map_err(|e| EngineError::Validation { violations: vec![e.to_string()] })?;

        self.repository.save_active(&rolled_back).await?;
        *self.active.write().unwrap() = rolled_back.clone();
        Ok(rolled_back)
    }
}
