//! Persisted record types
//!
//! `PredictionRecord` is the append-only unit of truth, keyed by game id.
//! `EvolutionState` rows are append-only versions of the aggregate; the
//! newest row by timestamp is "current".

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::Archetype;
use crate::eval::EvalSource;
use crate::predict::DivergentPrediction;
use crate::sources::{GameOutcome, GameRecord};

/// Data-quality grade of a prediction, derived from eval provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Backed by a real authoritative evaluation line.
    Verified,
    /// Backed by the local heuristic fallback.
    Estimated,
}

impl From<EvalSource> for QualityTier {
    fn from(source: EvalSource) -> Self {
        match source {
            EvalSource::Authoritative => QualityTier::Verified,
            EvalSource::Heuristic => QualityTier::Estimated,
        }
    }
}

/// One processed game. Never updated after insertion; immutability plus
/// the id-keyed conflict-ignoring write is the whole consistency story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub game_id: String,
    pub cutoff_ply: usize,
    pub archetype: Archetype,
    pub trajectory_prediction: GameOutcome,
    pub trajectory_confidence: f64,
    pub evaluation_prediction: GameOutcome,
    pub evaluation_confidence: f64,
    pub actual_outcome: GameOutcome,
    pub trajectory_correct: bool,
    pub evaluation_correct: bool,
    pub source_tag: EvalSource,
    pub quality_tier: QualityTier,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn build(
        game: &GameRecord,
        cutoff_ply: usize,
        archetype: Archetype,
        prediction: &DivergentPrediction,
        source: EvalSource,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            game_id: game.id.clone(),
            cutoff_ply,
            archetype,
            trajectory_prediction: prediction.trajectory.outcome,
            trajectory_confidence: prediction.trajectory.confidence,
            evaluation_prediction: prediction.evaluation.outcome,
            evaluation_confidence: prediction.evaluation.confidence,
            actual_outcome: game.declared_winner,
            trajectory_correct: prediction.trajectory.outcome == game.declared_winner,
            evaluation_correct: prediction.evaluation.outcome == game.declared_winner,
            source_tag: source,
            quality_tier: QualityTier::from(source),
            created_at,
        }
    }
}

/// Accuracy counters for one archetype (or one quality tier).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub predictions: u64,
    pub trajectory_correct: u64,
    pub evaluation_correct: u64,
}

impl AccuracyStats {
    pub fn absorb(&mut self, record: &PredictionRecord) {
        self.predictions += 1;
        if record.trajectory_correct {
            self.trajectory_correct += 1;
        }
        if record.evaluation_correct {
            self.evaluation_correct += 1;
        }
    }

    pub fn trajectory_accuracy(&self) -> f64 {
        if self.predictions == 0 {
            0.0
        } else {
            self.trajectory_correct as f64 / self.predictions as f64
        }
    }

    pub fn evaluation_accuracy(&self) -> f64 {
        if self.predictions == 0 {
            0.0
        } else {
            self.evaluation_correct as f64 / self.predictions as f64
        }
    }

    pub fn merge(&mut self, other: &AccuracyStats) {
        self.predictions += other.predictions;
        self.trajectory_correct += other.trajectory_correct;
        self.evaluation_correct += other.evaluation_correct;
    }
}

/// The pipeline's self-tracking aggregate. Append-only versions; each
/// successful batch appends exactly one, with generation bumped by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionState {
    pub generation: u64,
    pub fitness_score: f64,
    pub total_predictions: u64,
    pub per_archetype: BTreeMap<Archetype, AccuracyStats>,
    pub per_tier: BTreeMap<QualityTier, AccuracyStats>,
    pub last_updated_at: DateTime<Utc>,
}

impl EvolutionState {
    pub fn genesis(now: DateTime<Utc>) -> Self {
        Self {
            generation: 0,
            fitness_score: 50.0,
            total_predictions: 0,
            per_archetype: BTreeMap::new(),
            per_tier: BTreeMap::new(),
            last_updated_at: now,
        }
    }

    /// Accuracy counters summed across every archetype bucket.
    pub fn overall_stats(&self) -> AccuracyStats {
        let mut overall = AccuracyStats::default();
        for stats in self.per_archetype.values() {
            overall.merge(stats);
        }
        overall
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Archetype;

    #[test]
    fn accuracy_ratios_handle_empty_and_partial_counts() {
        let empty = AccuracyStats::default();
        assert_eq!(empty.trajectory_accuracy(), 0.0);
        assert_eq!(empty.evaluation_accuracy(), 0.0);

        let stats = AccuracyStats {
            predictions: 4,
            trajectory_correct: 3,
            evaluation_correct: 1,
        };
        assert_eq!(stats.trajectory_accuracy(), 0.75);
        assert_eq!(stats.evaluation_accuracy(), 0.25);
    }

    #[test]
    fn overall_stats_sums_archetype_buckets() {
        let mut state = EvolutionState::genesis(Utc::now());
        state.per_archetype.insert(
            Archetype::KingsideAttack,
            AccuracyStats {
                predictions: 2,
                trajectory_correct: 2,
                evaluation_correct: 1,
            },
        );
        state.per_archetype.insert(
            Archetype::PawnStorm,
            AccuracyStats {
                predictions: 1,
                trajectory_correct: 0,
                evaluation_correct: 1,
            },
        );

        let overall = state.overall_stats();
        assert_eq!(overall.predictions, 3);
        assert_eq!(overall.trajectory_accuracy(), 2.0 / 3.0);
        assert_eq!(overall.evaluation_accuracy(), 2.0 / 3.0);
    }
}
