//! JSON-lines store backend
//!
//! Append-only files, one JSON object per line: `predictions.jsonl`,
//! `evolution.jsonl`, `audit.jsonl`. Everything is loaded into a hot
//! in-memory mirror at open; writes append to both. A line that fails to
//! parse on load is skipped, not fatal — the file is a log, not a schema.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::records::{EvolutionState, PredictionRecord};
use super::{AuditLog, EvolutionStore, PredictionStore};

pub struct JsonlStore {
    predictions_path: PathBuf,
    evolution_path: PathBuf,
    audit_path: PathBuf,
    predictions: RwLock<Vec<PredictionRecord>>,
    prediction_ids: RwLock<HashSet<String>>,
    evolution: RwLock<Vec<EvolutionState>>,
}

fn load_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut items = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(item) => items.push(item),
            Err(e) => warn!(path = %path.display(), line = n + 1, error = %e, "skipping bad line"),
        }
    }
    Ok(items)
}

fn append_line<T: Serialize>(path: &Path, item: &T) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {} for append", path.display()))?;
    let line = serde_json::to_string(item)?;
    writeln!(file, "{line}")?;
    Ok(())
}

impl JsonlStore {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = data_dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;

        let predictions_path = dir.join("predictions.jsonl");
        let evolution_path = dir.join("evolution.jsonl");
        let audit_path = dir.join("audit.jsonl");

        let predictions: Vec<PredictionRecord> = load_lines(&predictions_path)?;
        let prediction_ids = predictions.iter().map(|r| r.game_id.clone()).collect();
        let evolution: Vec<EvolutionState> = load_lines(&evolution_path)?;

        info!(
            predictions = predictions.len(),
            evolution_versions = evolution.len(),
            dir = %dir.display(),
            "opened jsonl store"
        );

        Ok(Self {
            predictions_path,
            evolution_path,
            audit_path,
            predictions: RwLock::new(predictions),
            prediction_ids: RwLock::new(prediction_ids),
            evolution: RwLock::new(evolution),
        })
    }
}

#[async_trait]
impl PredictionStore for JsonlStore {
    async fn insert_ignore(&self, record: PredictionRecord) -> Result<bool> {
        // The id set is the uniqueness authority; holding its write lock
        // across the file append keeps a racing duplicate out of the file.
        let mut ids = self.prediction_ids.write().await;
        if !ids.insert(record.game_id.clone()) {
            debug!(game_id = %record.game_id, "duplicate prediction ignored");
            return Ok(false);
        }
        append_line(&self.predictions_path, &record)?;
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
impl EvolutionStore for JsonlStore {
    async fn latest(&self) -> Result<Option<EvolutionState>> {
        let versions = self.evolution.read().await;
        Ok(versions
            .iter()
            .max_by_key(|s| (s.last_updated_at, s.generation))
            .cloned())
    }

    async fn append(&self, state: EvolutionState) -> Result<()> {
        append_line(&self.evolution_path, &state)?;
        self.evolution.write().await.push(state);
        Ok(())
    }
}

#[async_trait]
impl AuditLog for JsonlStore {
    async fn record_event(&self, event_type: &str, payload: Value) -> Result<()> {
        #[derive(Serialize)]
        struct AuditLine<'a> {
            event_type: &'a str,
            payload: &'a Value,
            at: DateTime<Utc>,
        }
        append_line(
            &self.audit_path,
            &AuditLine {
                event_type,
                payload: &payload,
                at: Utc::now(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Archetype;
    use crate::eval::EvalSource;
    use crate::sources::GameOutcome;
    use crate::store::records::QualityTier;

    fn record(game_id: &str) -> PredictionRecord {
        PredictionRecord {
            game_id: game_id.to_string(),
            cutoff_ply: 30,
            archetype: Archetype::KingsideAttack,
            trajectory_prediction: GameOutcome::WhiteWins,
            trajectory_confidence: 70.0,
            evaluation_prediction: GameOutcome::Draw,
            evaluation_confidence: 55.0,
            actual_outcome: GameOutcome::WhiteWins,
            trajectory_correct: true,
            evaluation_correct: false,
            source_tag: EvalSource::Authoritative,
            quality_tier: QualityTier::Verified,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonlStore::open(dir.path()).unwrap();
            store.insert_ignore(record("g1")).await.unwrap();
            store.insert_ignore(record("g2")).await.unwrap();
            store
                .append(EvolutionState::genesis(Utc::now()))
                .await
                .unwrap();
        }
        let reopened = JsonlStore::open(dir.path()).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        assert!(reopened.latest().await.unwrap().is_some());
        // Uniqueness survives the reopen too.
        assert!(!reopened.insert_ignore(record("g1")).await.unwrap());
    }

    #[tokio::test]
    async fn bad_lines_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        store.insert_ignore(record("g1")).await.unwrap();
        drop(store);

        let path = dir.path().join("predictions.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "this is not json").unwrap();
        drop(file);

        let reopened = JsonlStore::open(dir.path()).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn audit_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        store
            .record_event("batch_completed", serde_json::json!({"games": 3}))
            .await
            .unwrap();
        let contents = std::fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        assert!(contents.contains("batch_completed"));
    }
}
