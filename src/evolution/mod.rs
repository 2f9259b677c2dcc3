//! Evolution State Tracker
//!
//! Folds one batch of persisted predictions into the append-only aggregate:
//! generation up by exactly one, accuracy counters absorbed per archetype
//! and per quality tier, fitness nudged toward the batch's accuracy. The
//! aggregate is advisory reporting data; a lost-update race between two
//! overlapping batches costs at most one generation of staleness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::records::{EvolutionState, PredictionRecord};

/// How the fitness score moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessTuning {
    /// Weight of the trajectory half in a batch's blended accuracy.
    pub trajectory_weight: f64,
    /// Exponential-moving-average retention of the old fitness.
    pub retention: f64,
}

impl Default for FitnessTuning {
    fn default() -> Self {
        Self {
            trajectory_weight: 0.6,
            retention: 0.9,
        }
    }
}

/// Build the next aggregate version from the previous one plus one batch.
///
/// Pure: reading the previous version and appending the result are the
/// caller's concern. An empty batch still advances the generation — the
/// batch ran, there was just nothing new to learn from.
pub fn advance(
    previous: Option<&EvolutionState>,
    batch: &[PredictionRecord],
    tuning: &FitnessTuning,
    now: DateTime<Utc>,
) -> EvolutionState {
    let mut next = previous
        .cloned()
        .unwrap_or_else(|| EvolutionState::genesis(now));

    next.generation += 1;
    next.total_predictions += batch.len() as u64;
    next.last_updated_at = now;

    for record in batch {
        next.per_archetype
            .entry(record.archetype)
            .or_default()
            .absorb(record);
        next.per_tier
            .entry(record.quality_tier)
            .or_default()
            .absorb(record);
    }

    if !batch.is_empty() {
        let n = batch.len() as f64;
        let trajectory_acc =
            batch.iter().filter(|r| r.trajectory_correct).count() as f64 / n;
        let evaluation_acc =
            batch.iter().filter(|r| r.evaluation_correct).count() as f64 / n;
        let blended = 100.0
            * (tuning.trajectory_weight * trajectory_acc
                + (1.0 - tuning.trajectory_weight) * evaluation_acc);
        next.fitness_score =
            tuning.retention * next.fitness_score + (1.0 - tuning.retention) * blended;
    }

    next
}
