//! Where snapshots come from and where `LastExecution` goes back to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Catalog;
use common::model::Snapshot;
use tokio::sync::RwLock;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] sqlx::Error),
    #[error("Unknown vacuuming policy: {0}")]
    UnknownVacuumingPolicy(String),
}

/// Read-model input for the engine.
///
/// `load_snapshot` must return a consistent view for the whole pass. The only
/// write the engine ever performs goes through `record_execution`.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn load_snapshot(&self) -> Result<Snapshot, SourceError>;

    async fn record_execution(
        &self,
        vacuuming_policy: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SourceError>;
}

#[async_trait]
impl SnapshotSource for Catalog {
    async fn load_snapshot(&self) -> Result<Snapshot, SourceError> {
        Ok(Catalog::load_snapshot(self).await?)
    }

    async fn record_execution(
        &self,
        vacuuming_policy: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SourceError> {
        Catalog::record_execution(self, vacuuming_policy, at)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    SourceError::UnknownVacuumingPolicy(vacuuming_policy.to_string())
                }
                other => SourceError::Catalog(other),
            })
    }
}

/// Snapshot source held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    snapshot: RwLock<Snapshot>,
}

impl InMemorySource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Replace the held snapshot.
    pub async fn replace(&self, snapshot: Snapshot) {
        *self.snapshot.write().await = snapshot;
    }
}

#[async_trait]
impl SnapshotSource for InMemorySource {
    async fn load_snapshot(&self) -> Result<Snapshot, SourceError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn record_execution(
        &self,
        vacuuming_policy: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SourceError> {
        let mut snapshot = self.snapshot.write().await;
        let policy = snapshot
            .vacuuming_policy(vacuuming_policy)
            .cloned()
            .ok_or_else(|| SourceError::UnknownVacuumingPolicy(vacuuming_policy.to_string()))?;
        snapshot.insert_vacuuming_policy(policy.with_last_execution(at));
        Ok(())
    }
}
