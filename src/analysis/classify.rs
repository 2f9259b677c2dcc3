//! Archetype Classification
//!
//! Ordered threshold rules over a feature signature, first match wins.
//! Rule order matters: opposite castling is tested before kingside attack
//! because both can match the same signature and the former is the more
//! specific label. Thresholds live in a named config struct so calibration
//! can move them without touching the rule logic.
//!
//! The synaptic refiner layers a cascading-energy re-ranking on top of the
//! rule baseline. It is opt-in; the rule classifier stays the default.

use serde::{Deserialize, Serialize};

use super::archetype::Archetype;
use super::features::FeatureSignature;

/// Named, overridable thresholds for the ordered rule list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    /// Per-wing side imbalance required on BOTH wings for opposite castling.
    pub wing_imbalance: f64,
    /// Volatility floor for opposite castling.
    pub castling_volatility: f64,
    /// Endgame-minus-opening intensity margin for a pawn storm.
    pub storm_margin: f64,
    /// One wing must out-activity the other by this factor...
    pub wing_ratio: f64,
    /// ...and carry at least this much absolute activity.
    pub wing_min_activity: f64,
    /// Center dominance over mean wing activity for central domination.
    pub center_dominance: f64,
    /// Aggression floor for a sacrificial attack.
    pub aggression_high: f64,
    /// Volatility floor for open tactical play.
    pub volatility_open: f64,
    /// Ply count beyond which a game is endgame technique.
    pub endgame_plies: usize,
    /// Volatility ceiling for quiet-game rules.
    pub volatility_low: f64,
    /// Ply count a quiet game must exceed to count as closed maneuvering.
    pub closed_plies: usize,
    /// Aggression ceiling for prophylactic defense.
    pub aggression_low: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            wing_imbalance: 10.0,
            castling_volatility: 0.8,
            storm_margin: 0.5,
            wing_ratio: 2.0,
            wing_min_activity: 15.0,
            center_dominance: 8.0,
            aggression_high: 0.45,
            volatility_open: 1.5,
            endgame_plies: 60,
            volatility_low: 0.25,
            closed_plies: 50,
            aggression_low: 0.08,
        }
    }
}

/// Swappable classification strategy.
pub trait Classifier: Send + Sync {
    fn classify(&self, signature: &FeatureSignature, total_plies: usize) -> Archetype;
}

/// The deterministic baseline: ordered rules, first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleClassifier {
    thresholds: ClassifierThresholds,
}

impl RuleClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }
}

impl Classifier for RuleClassifier {
    fn classify(&self, sig: &FeatureSignature, total_plies: usize) -> Archetype {
        let t = &self.thresholds;
        let q = &sig.quadrant_profile;
        let flow = &sig.temporal_flow;

        // Opposite-side castling races: both wings imbalanced, sharp game.
        if q.kingside_imbalance() > t.wing_imbalance
            && q.queenside_imbalance() > t.wing_imbalance
            && flow.volatility > t.castling_volatility
        {
            return Archetype::OppositeCastling;
        }

        if flow.endgame_intensity() - flow.opening_intensity() > t.storm_margin {
            return Archetype::PawnStorm;
        }

        if q.kingside_total() > q.queenside_total() * t.wing_ratio
            && q.kingside_total() > t.wing_min_activity
        {
            return Archetype::KingsideAttack;
        }

        if q.queenside_total() > q.kingside_total() * t.wing_ratio
            && q.queenside_total() > t.wing_min_activity
        {
            return Archetype::QueensideExpansion;
        }

        if q.center_dominance() > t.center_dominance {
            return Archetype::CentralDomination;
        }

        if sig.aggression > t.aggression_high {
            return Archetype::SacrificialAttack;
        }

        if flow.volatility > t.volatility_open {
            return Archetype::OpenTactical;
        }

        if total_plies > t.endgame_plies {
            return Archetype::EndgameTechnique;
        }

        if flow.volatility < t.volatility_low && total_plies > t.closed_plies {
            return Archetype::ClosedManeuvering;
        }

        if flow.middlegame_intensity() > flow.opening_intensity() {
            return Archetype::PositionalSqueeze;
        }

        if sig.aggression < t.aggression_low && flow.volatility < t.volatility_low {
            return Archetype::ProphylacticDefense;
        }

        // Must-match default.
        Archetype::PieceHarmony
    }
}

/// Cross-activation weights for the synaptic refinement stage.
///
/// Each entry says: activation of `from` also energizes `to` by `weight`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynapticWeights {
    pub edges: Vec<(Archetype, Archetype, f64)>,
    /// Energy the rule-selected candidate starts with.
    pub base_activation: f64,
}

impl Default for SynapticWeights {
    fn default() -> Self {
        use Archetype::*;
        Self {
            edges: vec![
                (KingsideAttack, OppositeCastling, 0.35),
                (KingsideAttack, SacrificialAttack, 0.30),
                (QueensideExpansion, PositionalSqueeze, 0.30),
                (OppositeCastling, PawnStorm, 0.40),
                (SacrificialAttack, OpenTactical, 0.45),
                (OpenTactical, SacrificialAttack, 0.25),
                (CentralDomination, PositionalSqueeze, 0.35),
                (ClosedManeuvering, ProphylacticDefense, 0.40),
                (PositionalSqueeze, ClosedManeuvering, 0.25),
                (EndgameTechnique, ClosedManeuvering, 0.30),
            ],
            base_activation: 1.0,
        }
    }
}

/// Weighted-graph re-ranking over the rule classifier's candidate.
///
/// Runs the rule baseline, then lets activation cascade once along the
/// weight edges, scoring neighbors by how well the signature supports them.
/// The rule candidate only loses if a neighbor's cascaded energy beats its
/// base activation outright.
pub struct SynapticClassifier {
    baseline: RuleClassifier,
    weights: SynapticWeights,
}

impl SynapticClassifier {
    pub fn new(thresholds: ClassifierThresholds, weights: SynapticWeights) -> Self {
        Self {
            baseline: RuleClassifier::new(thresholds),
            weights,
        }
    }

    /// Signature affinity for a candidate, 0.0 - 1.0. Deliberately coarse;
    /// this stage re-ranks, it does not re-classify from scratch.
    fn affinity(sig: &FeatureSignature, archetype: Archetype) -> f64 {
        let q = &sig.quadrant_profile;
        let flow = &sig.temporal_flow;
        let raw = match archetype {
            Archetype::KingsideAttack => q.kingside_total() / 40.0,
            Archetype::QueensideExpansion => q.queenside_total() / 40.0,
            Archetype::CentralDomination => (q.center_dominance() / 16.0).max(0.0),
            Archetype::PawnStorm => {
                (flow.endgame_intensity() - flow.opening_intensity()).max(0.0)
            }
            Archetype::SacrificialAttack => sig.aggression / 0.9,
            Archetype::OpenTactical => flow.volatility / 3.0,
            Archetype::OppositeCastling => {
                q.kingside_imbalance().min(q.queenside_imbalance()) / 20.0
            }
            Archetype::EndgameTechnique | Archetype::ClosedManeuvering => {
                (1.0 - flow.volatility).max(0.0)
            }
            Archetype::PositionalSqueeze => {
                (flow.middlegame_intensity() - flow.opening_intensity()).max(0.0)
            }
            Archetype::ProphylacticDefense => (1.0 - sig.aggression * 4.0).max(0.0),
            Archetype::PieceHarmony => 0.3,
        };
        raw.clamp(0.0, 1.0)
    }
}

impl Classifier for SynapticClassifier {
    fn classify(&self, sig: &FeatureSignature, total_plies: usize) -> Archetype {
        let seed = self.baseline.classify(sig, total_plies);

        let mut best = seed;
        let mut best_energy = self.weights.base_activation;
        for (from, to, weight) in &self.weights.edges {
            if *from != seed {
                continue;
            }
            let energy = self.weights.base_activation * weight * Self::affinity(sig, *to)
                + Self::affinity(sig, *to);
            if energy > best_energy {
                best = *to;
                best_energy = energy;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::{QuadrantProfile, TemporalFlow};

    fn signature(quadrants: QuadrantProfile, flow: TemporalFlow, aggression: f64) -> FeatureSignature {
        FeatureSignature {
            aggression,
            complexity: 0.5,
            tempo: 0.0,
            material_balance: 0.0,
            quadrant_profile: quadrants,
            temporal_flow: flow,
        }
    }

    #[test]
    fn kingside_pressure_classifies_as_kingside_attack() {
        let sig = signature(
            QuadrantProfile {
                kingside_white: 40.0,
                kingside_black: 5.0,
                queenside_white: 3.0,
                queenside_black: 2.0,
                center: 4.0,
            },
            TemporalFlow {
                opening_white: 0.5,
                opening_black: 0.5,
                middlegame_white: 0.5,
                middlegame_black: 0.5,
                endgame_white: 0.4,
                endgame_black: 0.4,
                volatility: 0.1,
            },
            0.2,
        );
        let classifier = RuleClassifier::default();
        assert_eq!(classifier.classify(&sig, 45), Archetype::KingsideAttack);
    }

    #[test]
    fn opposite_castling_wins_over_kingside_attack() {
        // Both wings heavily imbalanced with a sharp game: the earlier,
        // more specific rule must take it even though the kingside rule
        // would also fire.
        let sig = signature(
            QuadrantProfile {
                kingside_white: 30.0,
                kingside_black: 5.0,
                queenside_white: 2.0,
                queenside_black: 14.0,
                center: 3.0,
            },
            TemporalFlow {
                volatility: 1.1,
                ..Default::default()
            },
            0.3,
        );
        let classifier = RuleClassifier::default();
        assert_eq!(classifier.classify(&sig, 40), Archetype::OppositeCastling);
    }

    #[test]
    fn default_is_piece_harmony() {
        let sig = signature(
            QuadrantProfile::default(),
            TemporalFlow {
                opening_white: 0.5,
                opening_black: 0.5,
                volatility: 0.3,
                ..Default::default()
            },
            0.2,
        );
        let classifier = RuleClassifier::default();
        assert_eq!(classifier.classify(&sig, 30), Archetype::PieceHarmony);
    }

    #[test]
    fn long_quiet_game_is_endgame_or_closed() {
        let quiet = signature(
            QuadrantProfile::default(),
            TemporalFlow {
                volatility: 0.1,
                ..Default::default()
            },
            0.05,
        );
        let classifier = RuleClassifier::default();
        assert_eq!(classifier.classify(&quiet, 70), Archetype::EndgameTechnique);
        assert_eq!(classifier.classify(&quiet, 55), Archetype::ClosedManeuvering);
    }

    #[test]
    fn classification_is_deterministic() {
        let sig = signature(
            QuadrantProfile {
                kingside_white: 20.0,
                kingside_black: 10.0,
                queenside_white: 5.0,
                queenside_black: 5.0,
                center: 6.0,
            },
            TemporalFlow {
                volatility: 0.6,
                ..Default::default()
            },
            0.3,
        );
        let classifier = RuleClassifier::default();
        let first = classifier.classify(&sig, 44);
        for _ in 0..10 {
            assert_eq!(classifier.classify(&sig, 44), first);
        }
    }

    #[test]
    fn synaptic_refiner_stays_on_rule_candidate_without_support() {
        let sig = signature(
            QuadrantProfile {
                kingside_white: 40.0,
                kingside_black: 5.0,
                queenside_white: 3.0,
                queenside_black: 2.0,
                center: 4.0,
            },
            TemporalFlow {
                volatility: 0.1,
                ..Default::default()
            },
            0.1,
        );
        let refined = SynapticClassifier::new(
            ClassifierThresholds::default(),
            SynapticWeights::default(),
        );
        // Low aggression and one-wing play: no neighbor gathers enough
        // energy to displace the kingside attack.
        assert_eq!(refined.classify(&sig, 45), Archetype::KingsideAttack);
    }
}
