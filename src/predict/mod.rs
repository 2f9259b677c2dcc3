//! Divergent Prediction Engine
//!
//! Two independent outcome predictions per game: a trajectory half driven
//! by archetype and spatial/temporal reasoning that never looks at the
//! evaluation score, and an evaluation half driven by the score alone that
//! never looks at the archetype. They are allowed to disagree; measuring
//! that disagreement is the point.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::{ArchetypeCatalog, Archetype, FavoredSide, FeatureSignature};
use crate::error::PipelineError;
use crate::eval::EvaluationResult;
use crate::sources::GameOutcome;

/// Tunables for both prediction halves. Every constant in here is a
/// calibration choice, not a truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionTuning {
    /// Scale applied to (win_rate_prior - 0.5) in the trajectory half.
    pub prior_scale: f64,
    /// Maximum spatial-dominance bonus, split by normalized differential.
    pub dominance_bonus: f64,
    /// Weight of the late-vs-opening momentum term.
    pub momentum_weight: f64,
    /// Logistic steepness per centipawn in the evaluation half.
    pub logistic_k: f64,
    /// Half-width of the near-50 band where draws are considered.
    pub draw_window: f64,
    /// Probability that a near-50 score resolves to a draw.
    pub draw_bias: f64,
}

impl Default for PredictionTuning {
    fn default() -> Self {
        Self {
            prior_scale: 50.0,
            dominance_bonus: 25.0,
            momentum_weight: 8.0,
            logistic_k: 0.004,
            draw_window: 6.0,
            draw_bias: 0.35,
        }
    }
}

/// One resolved prediction: the call and how sure the engine is (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub outcome: GameOutcome,
    pub confidence: f64,
}

/// Both halves for one game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergentPrediction {
    pub trajectory: Prediction,
    pub evaluation: Prediction,
}

impl DivergentPrediction {
    pub fn diverges(&self) -> bool {
        self.trajectory.outcome != self.evaluation.outcome
    }
}

/// The engine. Holds its own RNG so the draw tie-break is seedable and
/// isolated from everything deterministic.
pub struct PredictionEngine {
    catalog: ArchetypeCatalog,
    tuning: PredictionTuning,
    rng: StdRng,
}

impl PredictionEngine {
    pub fn new(catalog: ArchetypeCatalog, tuning: PredictionTuning, rng_seed: Option<u64>) -> Self {
        Self {
            catalog,
            tuning,
            rng: match rng_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }

    /// Produce both predictions, or reject the game when no evaluation
    /// basis exists at all. "No data" is distinct from "score zero": an
    /// equal position still predicts, an absent evaluation must not.
    pub fn predict(
        &mut self,
        game_id: &str,
        signature: &FeatureSignature,
        archetype: Archetype,
        evaluation: Option<&EvaluationResult>,
    ) -> Result<DivergentPrediction, PipelineError> {
        let evaluation = evaluation.ok_or_else(|| PipelineError::PredictionRejected {
            game_id: game_id.to_string(),
        })?;

        let trajectory_score = self.trajectory_score(signature, archetype);
        let trajectory = self.resolve(trajectory_score);

        let evaluation_pred = if evaluation.is_forced_mate {
            // Mate on the board: near-certainty for the mating side.
            let outcome = if evaluation.score >= 0.0 {
                GameOutcome::WhiteWins
            } else {
                GameOutcome::BlackWins
            };
            Prediction {
                outcome,
                confidence: 99.0,
            }
        } else {
            self.resolve(self.evaluation_score(evaluation.score))
        };

        Ok(DivergentPrediction {
            trajectory,
            evaluation: evaluation_pred,
        })
    }

    /// White-win likelihood, 0-100, from archetype and trajectory alone.
    fn trajectory_score(&self, signature: &FeatureSignature, archetype: Archetype) -> f64 {
        let t = &self.tuning;
        let profile = self.catalog.profile(archetype);
        let q = &signature.quadrant_profile;
        let flow = &signature.temporal_flow;

        let white_energy = q.white_wing_energy();
        let black_energy = q.black_wing_energy();
        let dominant_sign = if white_energy >= black_energy { 1.0 } else { -1.0 };

        let prior_sign = match profile.favored_side {
            FavoredSide::Dominant => dominant_sign,
            FavoredSide::White => 1.0,
            FavoredSide::Black => -1.0,
            FavoredSide::Neutral => 0.0,
        };

        let mut score = 50.0;
        score += prior_sign * (profile.win_rate_prior - 0.5) * t.prior_scale;

        let total_energy = white_energy + black_energy;
        if total_energy > 0.0 {
            score += t.dominance_bonus * (white_energy - black_energy) / total_energy;
        }

        // Whoever is still generating play late, relative to their opening,
        // carries the momentum.
        let white_momentum = flow.endgame_white - flow.opening_white;
        let black_momentum = flow.endgame_black - flow.opening_black;
        score += t.momentum_weight * (white_momentum - black_momentum);

        score.clamp(1.0, 99.0)
    }

    /// White-win likelihood, 0-100, from the centipawn score alone.
    fn evaluation_score(&self, centipawns: f64) -> f64 {
        let k = self.tuning.logistic_k;
        let p = 50.0 + 50.0 * (2.0 / (1.0 + (-k * centipawns).exp()) - 1.0);
        p.clamp(1.0, 99.0)
    }

    /// Turn a 0-100 white-win likelihood into an outcome call.
    ///
    /// Near-50 scores resolve to a draw only probabilistically: real game
    /// populations are more decisive than a naive threshold would make
    /// them, so the draw bias is a tuned probability, not a rule.
    fn resolve(&mut self, score: f64) -> Prediction {
        let t = &self.tuning;
        let distance = (score - 50.0).abs();

        if distance < t.draw_window && self.rng.gen::<f64>() < t.draw_bias {
            return Prediction {
                outcome: GameOutcome::Draw,
                confidence: (50.0 + (t.draw_window - distance) * 2.0).min(65.0),
            };
        }

        if score >= 50.0 {
            Prediction {
                outcome: GameOutcome::WhiteWins,
                confidence: score.clamp(50.0, 99.0),
            }
        } else {
            Prediction {
                outcome: GameOutcome::BlackWins,
                confidence: (100.0 - score).clamp(50.0, 99.0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::{QuadrantProfile, TemporalFlow};
    use crate::eval::EvalSource;

    fn engine(seed: u64) -> PredictionEngine {
        PredictionEngine::new(ArchetypeCatalog::default(), PredictionTuning::default(), Some(seed))
    }

    fn kingside_rout_signature() -> FeatureSignature {
        FeatureSignature {
            aggression: 0.3,
            complexity: 0.6,
            tempo: 1.0,
            material_balance: 2.0,
            quadrant_profile: QuadrantProfile {
                kingside_white: 40.0,
                kingside_black: 5.0,
                queenside_white: 3.0,
                queenside_black: 2.0,
                center: 4.0,
            },
            temporal_flow: TemporalFlow {
                opening_white: 0.5,
                opening_black: 0.5,
                middlegame_white: 0.6,
                middlegame_black: 0.5,
                endgame_white: 0.5,
                endgame_black: 0.4,
                volatility: 0.2,
            },
        }
    }

    fn plain_eval(score: f64) -> EvaluationResult {
        EvaluationResult {
            score,
            search_depth: 20,
            is_forced_mate: false,
            mate_distance: None,
            source: EvalSource::Authoritative,
        }
    }

    #[test]
    fn trajectory_half_favors_the_dominant_attacker() {
        let mut engine = engine(7);
        let prediction = engine
            .predict(
                "g1",
                &kingside_rout_signature(),
                Archetype::KingsideAttack,
                Some(&plain_eval(0.0)),
            )
            .unwrap();
        assert_eq!(prediction.trajectory.outcome, GameOutcome::WhiteWins);
        assert!(prediction.trajectory.confidence > 60.0);
    }

    #[test]
    fn forced_mate_short_circuits_to_near_certainty() {
        let mut engine = engine(7);
        let mate = EvaluationResult {
            score: 10_000.0,
            search_depth: 40,
            is_forced_mate: true,
            mate_distance: Some(4),
            source: EvalSource::Authoritative,
        };
        let prediction = engine
            .predict("g1", &kingside_rout_signature(), Archetype::OpenTactical, Some(&mate))
            .unwrap();
        assert_eq!(prediction.evaluation.outcome, GameOutcome::WhiteWins);
        assert!(prediction.evaluation.confidence >= 99.0);
    }

    #[test]
    fn missing_evaluation_is_rejected_not_fabricated() {
        let mut engine = engine(7);
        let result = engine.predict("g9", &kingside_rout_signature(), Archetype::PieceHarmony, None);
        assert!(matches!(
            result,
            Err(PipelineError::PredictionRejected { ref game_id }) if game_id == "g9"
        ));
    }

    #[test]
    fn evaluation_half_tracks_score_sign() {
        let mut engine = engine(7);
        let sig = kingside_rout_signature();
        let white = engine
            .predict("g1", &sig, Archetype::PieceHarmony, Some(&plain_eval(300.0)))
            .unwrap();
        assert_eq!(white.evaluation.outcome, GameOutcome::WhiteWins);

        let black = engine
            .predict("g2", &sig, Archetype::PieceHarmony, Some(&plain_eval(-300.0)))
            .unwrap();
        assert_eq!(black.evaluation.outcome, GameOutcome::BlackWins);
    }

    #[test]
    fn trajectory_half_is_deterministic_for_decisive_scores() {
        // The signature sits far from 50, so the draw tie-break never
        // consults the RNG and repeated calls agree exactly.
        let sig = kingside_rout_signature();
        let mut a = engine(1);
        let mut b = engine(2);
        let pa = a
            .predict("g1", &sig, Archetype::KingsideAttack, Some(&plain_eval(0.0)))
            .unwrap();
        let pb = b
            .predict("g1", &sig, Archetype::KingsideAttack, Some(&plain_eval(0.0)))
            .unwrap();
        assert_eq!(pa.trajectory, pb.trajectory);
    }

    #[test]
    fn near_even_scores_can_resolve_to_draw_probabilistically() {
        // With a fixed seed, some near-50 resolutions land on draw and
        // some do not; both must stay inside the allowed outcomes.
        let mut engine = engine(42);
        let mut saw_draw = false;
        let mut saw_decisive = false;
        let mut sig = kingside_rout_signature();
        sig.quadrant_profile = QuadrantProfile {
            kingside_white: 10.0,
            kingside_black: 10.0,
            queenside_white: 5.0,
            queenside_black: 5.0,
            center: 4.0,
        };
        sig.temporal_flow = TemporalFlow::default();
        for i in 0..40 {
            let p = engine
                .predict(&format!("g{i}"), &sig, Archetype::ClosedManeuvering, Some(&plain_eval(10.0)))
                .unwrap();
            match p.evaluation.outcome {
                GameOutcome::Draw => saw_draw = true,
                _ => saw_decisive = true,
            }
        }
        assert!(saw_draw);
        assert!(saw_decisive);
    }

    #[test]
    fn divergence_is_visible() {
        let mut engine = engine(7);
        // Trajectory says white (dominant kingside rout), evaluation says
        // black (big negative score).
        let prediction = engine
            .predict(
                "g1",
                &kingside_rout_signature(),
                Archetype::KingsideAttack,
                Some(&plain_eval(-400.0)),
            )
            .unwrap();
        assert!(prediction.diverges());
    }
}
