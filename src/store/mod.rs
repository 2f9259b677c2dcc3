//! Persistence collaborators
//!
//! The pipeline core owns only the contracts: an append-with-ignore write
//! for predictions keyed by game id, latest/append access for the
//! evolution aggregate, and an append-only audit log. Two backends uphold
//! them — in-process memory and append-only JSON-lines files.

pub mod jsonl;
pub mod memory;
pub mod records;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use records::{AccuracyStats, EvolutionState, PredictionRecord, QualityTier};

/// Append-only store of prediction records, unique per game id.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Insert unless a record with the same game id already exists.
    /// Returns false on conflict; a conflict is success-with-no-op.
    async fn insert_ignore(&self, record: PredictionRecord) -> Result<bool>;

    /// Game ids persisted within the recent window. Bounded on purpose:
    /// this feeds the advisory dedup filter, not an audit.
    async fn recent_ids(&self, window: Duration) -> Result<HashSet<String>>;

    /// Records persisted within the recent window.
    async fn recent_records(&self, window: Duration) -> Result<Vec<PredictionRecord>>;

    async fn count(&self) -> Result<usize>;
}

/// Append-only versions of the evolution aggregate.
#[async_trait]
pub trait EvolutionStore: Send + Sync {
    /// Most recent version by timestamp, if any batch ever completed.
    async fn latest(&self) -> Result<Option<EvolutionState>>;

    async fn append(&self, state: EvolutionState) -> Result<()>;
}

/// Free-form append-only event log.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record_event(&self, event_type: &str, payload: Value) -> Result<()>;
}
