//! In-memory store backend
//!
//! Backs tests and local development. Upholds the same contracts as the
//! file backend, including id uniqueness under concurrent insert attempts.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::records::{EvolutionState, PredictionRecord};
use super::{AuditLog, EvolutionStore, PredictionStore};

#[derive(Default)]
pub struct MemoryStore {
    predictions: RwLock<Vec<PredictionRecord>>,
    prediction_ids: RwLock<HashSet<String>>,
    evolution: RwLock<Vec<EvolutionState>>,
    audit: RwLock<Vec<(String, Value)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit entries recorded so far, for assertions in tests.
    pub async fn audit_events(&self) -> Vec<(String, Value)> {
        self.audit.read().await.clone()
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn insert_ignore(&self, record: PredictionRecord) -> Result<bool> {
        let mut ids = self.prediction_ids.write().await;
        if !ids.insert(record.game_id.clone()) {
            debug!(game_id = %record.game_id, "duplicate prediction ignored");
            return Ok(false);
        }
        self.predictions.write().await.push(record);
        Ok(true)
    }

    async fn recent_ids(&self, window: Duration) -> Result<HashSet<String>> {
        let floor = Utc::now() - window;
        Ok(self
            .predictions
            .read()
            .await
            .iter()
            .filter(|r| r.created_at >= floor)
            .map(|r| r.game_id.clone())
            .collect())
    }

    async fn recent_records(&self, window: Duration) -> Result<Vec<PredictionRecord>> {
        let floor = Utc::now() - window;
        Ok(self
            .predictions
            .read()
            .await
            .iter()
            .filter(|r| r.created_at >= floor)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.predictions.read().await.len())
    }
}

#[async_trait]
impl EvolutionStore for MemoryStore {
    async fn latest(&self) -> Result<Option<EvolutionState>> {
        let versions = self.evolution.read().await;
        Ok(versions
            .iter()
            .max_by_key(|s| (s.last_updated_at, s.generation))
            .cloned())
    }

    async fn append(&self, state: EvolutionState) -> Result<()> {
        self.evolution.write().await.push(state);
        Ok(())
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn record_event(&self, event_type: &str, payload: Value) -> Result<()> {
        self.audit
            .write()
            .await
            .push((event_type.to_string(), payload));
        Ok(())
    }
}
