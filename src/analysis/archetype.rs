//! Archetype taxonomy
//!
//! Closed enumeration of strategic archetypes plus the static calibration
//! metadata each one carries. The metadata is configuration: the pipeline
//! reads it, re-calibration rewrites it, nothing in between mutates it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Dominant strategic pattern of one game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    KingsideAttack,
    QueensideExpansion,
    CentralDomination,
    PawnStorm,
    SacrificialAttack,
    OpenTactical,
    EndgameTechnique,
    ClosedManeuvering,
    PositionalSqueeze,
    PieceHarmony,
    OppositeCastling,
    ProphylacticDefense,
}

impl Archetype {
    pub const ALL: [Archetype; 12] = [
        Archetype::KingsideAttack,
        Archetype::QueensideExpansion,
        Archetype::CentralDomination,
        Archetype::PawnStorm,
        Archetype::SacrificialAttack,
        Archetype::OpenTactical,
        Archetype::EndgameTechnique,
        Archetype::ClosedManeuvering,
        Archetype::PositionalSqueeze,
        Archetype::PieceHarmony,
        Archetype::OppositeCastling,
        Archetype::ProphylacticDefense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::KingsideAttack => "kingside_attack",
            Archetype::QueensideExpansion => "queenside_expansion",
            Archetype::CentralDomination => "central_domination",
            Archetype::PawnStorm => "pawn_storm",
            Archetype::SacrificialAttack => "sacrificial_attack",
            Archetype::OpenTactical => "open_tactical",
            Archetype::EndgameTechnique => "endgame_technique",
            Archetype::ClosedManeuvering => "closed_maneuvering",
            Archetype::PositionalSqueeze => "positional_squeeze",
            Archetype::PieceHarmony => "piece_harmony",
            Archetype::OppositeCastling => "opposite_castling",
            Archetype::ProphylacticDefense => "prophylactic_defense",
        }
    }
}

/// Which side an archetype's historical prior leans toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoredSide {
    /// The prior rewards whichever side holds the spatial-energy lead.
    Dominant,
    White,
    Black,
    Neutral,
}

/// Static calibration metadata for one archetype.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeProfile {
    /// Historical win rate of the favored side, 0.0 - 1.0.
    pub win_rate_prior: f64,
    pub favored_side: FavoredSide,
    /// How far ahead trajectory reasoning for this pattern tends to hold up.
    pub lookahead_confidence: f64,
}

/// The calibration table, keyed by archetype.
///
/// Carries defaults from historical outcome data; re-calibration replaces
/// entries wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeCatalog {
    profiles: BTreeMap<Archetype, ArchetypeProfile>,
}

impl ArchetypeCatalog {
    pub fn profile(&self, archetype: Archetype) -> ArchetypeProfile {
        // Default catalog covers every variant; a pruned override table
        // falls back to a neutral profile rather than panicking.
        self.profiles.get(&archetype).copied().unwrap_or(ArchetypeProfile {
            win_rate_prior: 0.5,
            favored_side: FavoredSide::Neutral,
            lookahead_confidence: 0.5,
        })
    }

    pub fn with_profile(mut self, archetype: Archetype, profile: ArchetypeProfile) -> Self {
        self.profiles.insert(archetype, profile);
        self
    }
}

impl Default for ArchetypeCatalog {
    fn default() -> Self {
        use Archetype::*;
        use FavoredSide::*;

        let entries = [
            (KingsideAttack, 0.58, Dominant, 0.72),
            (QueensideExpansion, 0.55, Dominant, 0.66),
            (CentralDomination, 0.57, Dominant, 0.70),
            (PawnStorm, 0.56, Dominant, 0.64),
            (SacrificialAttack, 0.54, Dominant, 0.58),
            (OpenTactical, 0.52, Dominant, 0.52),
            (EndgameTechnique, 0.51, Neutral, 0.75),
            (ClosedManeuvering, 0.50, Neutral, 0.68),
            (PositionalSqueeze, 0.56, Dominant, 0.71),
            (PieceHarmony, 0.52, Dominant, 0.55),
            (OppositeCastling, 0.55, Dominant, 0.60),
            (ProphylacticDefense, 0.49, Neutral, 0.69),
        ];

        Self {
            profiles: entries
                .into_iter()
                .map(|(a, prior, side, lookahead)| {
                    (
                        a,
                        ArchetypeProfile {
                            win_rate_prior: prior,
                            favored_side: side,
                            lookahead_confidence: lookahead,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_every_archetype() {
        let catalog = ArchetypeCatalog::default();
        for archetype in Archetype::ALL {
            let profile = catalog.profile(archetype);
            assert!(profile.win_rate_prior > 0.0 && profile.win_rate_prior < 1.0);
            assert!(profile.lookahead_confidence > 0.0);
        }
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&Archetype::KingsideAttack).unwrap();
        assert_eq!(json, "\"kingside_attack\"");
    }
}
