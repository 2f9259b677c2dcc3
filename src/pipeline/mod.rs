//! Batch Orchestrator
//!
//! One invocation: fetch candidates, drop already-seen ids, analyze and
//! evaluate each game, persist predictions with a conflict-ignoring write,
//! fold the batch into the evolution aggregate, and leave an audit trail.
//! Overlapping invocations are legal; the store's id-keyed write makes
//! double-processing harmless rather than impossible.

pub mod dedup;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::analysis::{extract, move_prefix, parse_moves, Classifier};
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::eval::Evaluator;
use crate::evolution::advance;
use crate::predict::PredictionEngine;
use crate::sources::{fetch_candidates, GameProvider};
use crate::store::records::PredictionRecord;
use crate::store::{AuditLog, EvolutionStore, PredictionStore};

pub use dedup::filter_unseen;

/// What one batch accomplished; the manual-invocation response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub success: bool,
    pub games_processed: usize,
    pub predictions_generated: usize,
    pub divergent_predictions: usize,
    pub duration_ms: u64,
    pub message: String,
}

/// Read-only aggregate metrics for the `status` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub generation: u64,
    pub fitness_score: f64,
    pub total_predictions: u64,
    pub stored_predictions: usize,
    pub trajectory_accuracy: f64,
    pub evaluation_accuracy: f64,
}

/// Everything one batch needs, wired once at startup.
pub struct Pipeline {
    providers: Vec<Arc<dyn GameProvider>>,
    classifier: Box<dyn Classifier>,
    evaluator: Evaluator,
    engine: Mutex<PredictionEngine>,
    predictions: Arc<dyn PredictionStore>,
    evolution: Arc<dyn EvolutionStore>,
    audit: Arc<dyn AuditLog>,
    config: AppConfig,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        providers: Vec<Arc<dyn GameProvider>>,
        classifier: Box<dyn Classifier>,
        evaluator: Evaluator,
        engine: PredictionEngine,
        predictions: Arc<dyn PredictionStore>,
        evolution: Arc<dyn EvolutionStore>,
        audit: Arc<dyn AuditLog>,
        config: AppConfig,
    ) -> Self {
        Self {
            providers,
            classifier,
            evaluator,
            engine: Mutex::new(engine),
            predictions,
            evolution,
            audit,
            config,
        }
    }

    /// Run one batch end to end.
    ///
    /// Per-game failures drop that game only. A persistence failure is the
    /// one thing that aborts; even then an audit event is attempted first.
    pub async fn run_batch(&self) -> Result<BatchReport, PipelineError> {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.config.batch_cap_ms);
        let cfg = &self.config;

        let seen = match self
            .predictions
            .recent_ids(chrono::Duration::hours(cfg.dedup_window_hours))
            .await
        {
            Ok(seen) => seen,
            Err(e) => return self.abort_batch(format!("seen-set load failed: {e}")).await,
        };

        let since = Utc::now() - chrono::Duration::hours(cfg.since_hours);
        let candidates = fetch_candidates(
            &self.providers,
            since,
            cfg.per_provider_limit,
            cfg.min_plies,
            Duration::from_millis(cfg.provider_timeout_ms),
        )
        .await;

        let fresh = filter_unseen(&seen, candidates);
        info!(fresh = fresh.len(), "batch working set ready");

        let mut processed = 0usize;
        let mut inserted_records: Vec<PredictionRecord> = Vec::new();
        let mut divergent = 0usize;
        let mut rejected = 0usize;

        for game in &fresh {
            if Instant::now() >= deadline {
                warn!(remaining = fresh.len() - processed, "batch cap reached, abandoning rest");
                break;
            }
            processed += 1;

            let moves = parse_moves(&game.move_text);
            let cutoff = cfg.cutoff_ply.min(moves.len());
            let signature = extract(&moves, cutoff);
            let archetype = self.classifier.classify(&signature, moves.len());

            let position = move_prefix(&moves, cutoff);
            let evaluation = self.evaluator.evaluate(&position, &signature).await;

            let prediction = {
                let mut engine = self.engine.lock().await;
                match engine.predict(&game.id, &signature, archetype, Some(&evaluation)) {
                    Ok(prediction) => prediction,
                    Err(e) => {
                        // No usable basis: skip persistence, retry on a
                        // future batch via normal dedup rules.
                        warn!(game_id = %game.id, error = %e, "prediction rejected");
                        rejected += 1;
                        continue;
                    }
                }
            };

            let record = PredictionRecord::build(
                game,
                cutoff,
                archetype,
                &prediction,
                evaluation.source,
                Utc::now(),
            );

            match self.predictions.insert_ignore(record.clone()).await {
                Ok(true) => {
                    debug!(game_id = %game.id, archetype = %archetype.as_str(), "prediction stored");
                    if prediction.diverges() {
                        divergent += 1;
                    }
                    inserted_records.push(record);
                }
                Ok(false) => {
                    // A concurrent batch got there first. Converged, done.
                    debug!(game_id = %game.id, "lost insert race, no-op");
                }
                Err(e) => return self.abort_batch(format!("prediction write failed: {e}")).await,
            }
        }

        // Fold the batch into the aggregate: read latest, bump generation,
        // append. A lost update here costs one generation of staleness at
        // most and is accepted.
        let previous = match self.evolution.latest().await {
            Ok(previous) => previous,
            Err(e) => return self.abort_batch(format!("evolution read failed: {e}")).await,
        };
        let next = advance(previous.as_ref(), &inserted_records, &cfg.fitness, Utc::now());
        let generation = next.generation;
        if let Err(e) = self.evolution.append(next).await {
            return self.abort_batch(format!("evolution append failed: {e}")).await;
        }

        let report = BatchReport {
            success: true,
            games_processed: processed,
            predictions_generated: inserted_records.len(),
            divergent_predictions: divergent,
            duration_ms: started.elapsed().as_millis() as u64,
            message: format!(
                "generation {generation}: {} stored, {divergent} divergent, {rejected} rejected",
                inserted_records.len()
            ),
        };

        if let Err(e) = self
            .audit
            .record_event(
                "batch_completed",
                json!({
                    "generation": generation,
                    "games_processed": report.games_processed,
                    "predictions_generated": report.predictions_generated,
                    "divergent_predictions": report.divergent_predictions,
                    "rejected": rejected,
                    "duration_ms": report.duration_ms,
                }),
            )
            .await
        {
            warn!(error = %e, "audit write failed after successful batch");
        }

        info!(
            generation,
            stored = report.predictions_generated,
            divergent,
            "batch complete"
        );
        Ok(report)
    }

    /// Read-only metrics; performs no fetch or write work.
    pub async fn status(&self) -> Result<StatusReport, PipelineError> {
        let latest = self
            .evolution
            .latest()
            .await
            .map_err(|e| PipelineError::Setup(format!("evolution read failed: {e}")))?;
        let stored = self
            .predictions
            .count()
            .await
            .map_err(|e| PipelineError::Setup(format!("prediction count failed: {e}")))?;

        Ok(match latest {
            Some(state) => {
                let overall = state.overall_stats();
                StatusReport {
                    generation: state.generation,
                    fitness_score: state.fitness_score,
                    total_predictions: state.total_predictions,
                    stored_predictions: stored,
                    trajectory_accuracy: overall.trajectory_accuracy(),
                    evaluation_accuracy: overall.evaluation_accuracy(),
                }
            }
            None => StatusReport {
                generation: 0,
                fitness_score: 50.0,
                total_predictions: 0,
                stored_predictions: stored,
                trajectory_accuracy: 0.0,
                evaluation_accuracy: 0.0,
            },
        })
    }

    /// Abort path for unrecoverable setup failures: leave an audit trace
    /// if at all possible, then report the failure to the invoker.
    async fn abort_batch(&self, reason: String) -> Result<BatchReport, PipelineError> {
        warn!(%reason, "aborting batch");
        if let Err(e) = self
            .audit
            .record_event("batch_failed", json!({ "reason": reason.clone() }))
            .await
        {
            warn!(error = %e, "audit write failed during abort");
        }
        Err(PipelineError::Setup(reason))
    }
}
