//! Feature Extraction
//!
//! Derives spatial (board-region activity) and temporal (phase-by-phase
//! intensity) signatures from a game's move list, truncated at a cutoff ply.
//! Pure and deterministic: same moves in, same signature out.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Activity credited to the mover for every move walked.
const ACTIVITY_QUANTUM: f64 = 1.0;

/// Opening ends at this ply (inclusive).
pub const OPENING_END_PLY: usize = 10;
/// Middlegame ends at this ply (inclusive); everything after is endgame.
pub const MIDDLEGAME_END_PLY: usize = 25;

/// A single move parsed out of SAN game text.
///
/// Only the fields the extractor cares about: destination square,
/// capture/check flags, castling. Legality is someone else's problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanMove {
    /// The token as it appeared in the game text.
    pub raw: String,
    /// Destination file 0-7 (a-h) and rank 0-7 (1-8), when derivable.
    pub dest: Option<(u8, u8)>,
    pub is_capture: bool,
    pub is_check: bool,
    pub castle: Option<CastleSide>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastleSide {
    King,
    Queen,
}

/// Accumulated activity per board region, split by the investing side.
///
/// All five scores are non-negative magnitudes. Any balance downstream
/// consumers need is computed by differencing two of these at read time;
/// no signed running total is ever carried through the walk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuadrantProfile {
    pub kingside_white: f64,
    pub kingside_black: f64,
    pub queenside_white: f64,
    pub queenside_black: f64,
    pub center: f64,
}

impl QuadrantProfile {
    pub fn kingside_total(&self) -> f64 {
        self.kingside_white + self.kingside_black
    }

    pub fn queenside_total(&self) -> f64 {
        self.queenside_white + self.queenside_black
    }

    /// Absolute per-wing imbalance between the two sides.
    pub fn kingside_imbalance(&self) -> f64 {
        (self.kingside_white - self.kingside_black).abs()
    }

    pub fn queenside_imbalance(&self) -> f64 {
        (self.queenside_white - self.queenside_black).abs()
    }

    /// Wing energy invested by each side (center is contested, excluded).
    pub fn white_wing_energy(&self) -> f64 {
        self.kingside_white + self.queenside_white
    }

    pub fn black_wing_energy(&self) -> f64 {
        self.kingside_black + self.queenside_black
    }

    /// How far central activity exceeds the mean wing activity.
    pub fn center_dominance(&self) -> f64 {
        let wings = self.kingside_total() + self.queenside_total();
        self.center - wings / 4.0
    }

    /// Signed white-positive spatial differential across the wings.
    pub fn spatial_differential(&self) -> f64 {
        self.white_wing_energy() - self.black_wing_energy()
    }
}

/// Per-phase move intensity for each side plus an initiative-volatility
/// scalar. Intensities are move counts normalized by phase length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalFlow {
    pub opening_white: f64,
    pub opening_black: f64,
    pub middlegame_white: f64,
    pub middlegame_black: f64,
    pub endgame_white: f64,
    pub endgame_black: f64,
    /// Turn-by-turn sign-flip magnitude of tactical impact, per ply.
    pub volatility: f64,
}

impl TemporalFlow {
    pub fn opening_intensity(&self) -> f64 {
        self.opening_white + self.opening_black
    }

    pub fn middlegame_intensity(&self) -> f64 {
        self.middlegame_white + self.middlegame_black
    }

    pub fn endgame_intensity(&self) -> f64 {
        self.endgame_white + self.endgame_black
    }
}

/// Structural signature of one game, truncated at a cutoff ply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSignature {
    /// Capture/check density relative to ply count (checks weighted 2x).
    pub aggression: f64,
    /// Spread of play: distinct destination squares per ply.
    pub complexity: f64,
    /// Signed white-positive forward-progress differential.
    pub tempo: f64,
    /// Signed white-positive capture-count differential.
    pub material_balance: f64,
    pub quadrant_profile: QuadrantProfile,
    pub temporal_flow: TemporalFlow,
}

/// Extract SAN move tokens from raw game text.
///
/// Strips brace comments, numeric annotation glyphs, move numbers, and
/// result markers; everything left that looks like a move is kept. This is
/// deliberately not a PGN validator — malformed tokens simply parse to a
/// move with no destination.
pub fn parse_moves(move_text: &str) -> Vec<SanMove> {
    let comments = Regex::new(r"\{[^}]*\}").expect("static regex");
    let nags = Regex::new(r"\$\d+").expect("static regex");
    let move_numbers = Regex::new(r"\d+\.(\.\.)?").expect("static regex");
    let dest_square = Regex::new(r"[a-h][1-8]").expect("static regex");

    let cleaned = comments.replace_all(move_text, " ");
    let cleaned = nags.replace_all(&cleaned, " ");
    let cleaned = move_numbers.replace_all(&cleaned, " ");

    cleaned
        .split_whitespace()
        .filter(|t| !matches!(*t, "1-0" | "0-1" | "1/2-1/2" | "*"))
        .map(|token| {
            let castle = if token.starts_with("O-O-O") || token.starts_with("0-0-0") {
                Some(CastleSide::Queen)
            } else if token.starts_with("O-O") || token.starts_with("0-0") {
                Some(CastleSide::King)
            } else {
                None
            };
            let dest = dest_square.find_iter(token).last().map(|m| {
                let bytes = m.as_str().as_bytes();
                (bytes[0] - b'a', bytes[1] - b'1')
            });
            SanMove {
                raw: token.to_string(),
                dest,
                is_capture: token.contains('x'),
                is_check: token.ends_with('+') || token.ends_with('#'),
                castle,
            }
        })
        .collect()
}

/// Number of plies in raw game text.
pub fn ply_count(move_text: &str) -> usize {
    parse_moves(move_text).len()
}

/// Opaque position key for the evaluation authority: the cleaned move
/// prefix up to the cutoff.
pub fn move_prefix(moves: &[SanMove], cutoff_ply: usize) -> String {
    moves
        .iter()
        .take(cutoff_ply)
        .map(|m| m.raw.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Kingside,
    Queenside,
    Center,
}

fn region_of(file: u8, rank: u8) -> Region {
    // Central 2x2: d4, d5, e4, e5.
    if (3..=4).contains(&file) && (3..=4).contains(&rank) {
        Region::Center
    } else if file >= 4 {
        Region::Kingside
    } else {
        Region::Queenside
    }
}

/// Walk `moves` up to `cutoff_ply` and accumulate the signature.
///
/// White moves on even ply indexes. Castling is attributed to the wing the
/// king lands on, since no destination square appears in the SAN token.
pub fn extract(moves: &[SanMove], cutoff_ply: usize) -> FeatureSignature {
    let walked = &moves[..moves.len().min(cutoff_ply)];
    let plies = walked.len();
    if plies == 0 {
        return FeatureSignature::default();
    }

    let mut quadrants = QuadrantProfile::default();
    let mut flow = TemporalFlow::default();
    let mut captures_white = 0.0_f64;
    let mut captures_black = 0.0_f64;
    let mut checks = 0.0_f64;
    let mut advance_white = 0.0_f64;
    let mut advance_black = 0.0_f64;
    let mut seen_squares = std::collections::HashSet::new();
    let mut volatility = 0.0_f64;
    let mut prev_impact = 0.0_f64;

    let opening_len = plies.min(OPENING_END_PLY) as f64;
    let middlegame_len = plies
        .min(MIDDLEGAME_END_PLY)
        .saturating_sub(OPENING_END_PLY)
        .max(1) as f64;
    let endgame_len = plies.saturating_sub(MIDDLEGAME_END_PLY).max(1) as f64;

    for (ply, mv) in walked.iter().enumerate() {
        let white_to_move = ply % 2 == 0;

        let dest = mv.dest.or_else(|| {
            mv.castle.map(|side| {
                let file = match side {
                    CastleSide::King => 6,
                    CastleSide::Queen => 2,
                };
                (file, if white_to_move { 0 } else { 7 })
            })
        });

        if let Some((file, rank)) = dest {
            match (region_of(file, rank), white_to_move) {
                (Region::Center, _) => quadrants.center += ACTIVITY_QUANTUM,
                (Region::Kingside, true) => quadrants.kingside_white += ACTIVITY_QUANTUM,
                (Region::Kingside, false) => quadrants.kingside_black += ACTIVITY_QUANTUM,
                (Region::Queenside, true) => quadrants.queenside_white += ACTIVITY_QUANTUM,
                (Region::Queenside, false) => quadrants.queenside_black += ACTIVITY_QUANTUM,
            }
            seen_squares.insert((file, rank));

            // Forward progress from each side's own home rank.
            if white_to_move {
                advance_white += f64::from(rank) / 7.0;
            } else {
                advance_black += f64::from(7 - rank) / 7.0;
            }
        }

        match (ply, white_to_move) {
            (p, true) if p < OPENING_END_PLY => flow.opening_white += 1.0,
            (p, false) if p < OPENING_END_PLY => flow.opening_black += 1.0,
            (p, true) if p < MIDDLEGAME_END_PLY => flow.middlegame_white += 1.0,
            (p, false) if p < MIDDLEGAME_END_PLY => flow.middlegame_black += 1.0,
            (_, true) => flow.endgame_white += 1.0,
            (_, false) => flow.endgame_black += 1.0,
        }

        if mv.is_capture {
            if white_to_move {
                captures_white += 1.0;
            } else {
                captures_black += 1.0;
            }
        }
        if mv.is_check {
            checks += 1.0;
        }

        // Tactical impact of this move, signed by mover. Quiet moves carry
        // zero impact so placid games accumulate near-zero volatility.
        let impact = (if mv.is_capture { 1.0 } else { 0.0 }) + (if mv.is_check { 2.0 } else { 0.0 });
        let signed = if white_to_move { impact } else { -impact };
        volatility += (signed - prev_impact).abs();
        prev_impact = signed;
    }

    flow.opening_white /= opening_len;
    flow.opening_black /= opening_len;
    flow.middlegame_white /= middlegame_len;
    flow.middlegame_black /= middlegame_len;
    flow.endgame_white /= endgame_len;
    flow.endgame_black /= endgame_len;
    flow.volatility = volatility / plies as f64;

    let plies_f = plies as f64;
    FeatureSignature {
        aggression: (captures_white + captures_black + 2.0 * checks) / plies_f,
        complexity: seen_squares.len() as f64 / plies_f,
        tempo: advance_white - advance_black,
        material_balance: captures_white - captures_black,
        quadrant_profile: quadrants,
        temporal_flow: flow,
    }
}

/// Convenience wrapper: parse then extract.
pub fn extract_from_text(move_text: &str, cutoff_ply: usize) -> FeatureSignature {
    extract(&parse_moves(move_text), cutoff_ply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_san() {
        let moves = parse_moves("1. e4 e5 2. Nf3 Nc6 3. Bb5 a6");
        assert_eq!(moves.len(), 6);
        assert_eq!(moves[0].dest, Some((4, 3))); // e4
        assert_eq!(moves[5].dest, Some((0, 5))); // a6
        assert!(!moves[0].is_capture);
    }

    #[test]
    fn parses_captures_checks_and_castles() {
        let moves = parse_moves("1. e4 d5 2. exd5 Qxd5 3. Nc3 Qd8 4. O-O-O");
        assert!(moves[2].is_capture);
        assert!(moves[3].is_capture);
        assert_eq!(moves[6].castle, Some(CastleSide::Queen));

        let check = parse_moves("Qh5+");
        assert!(check[0].is_check);
    }

    #[test]
    fn strips_comments_nags_and_results() {
        let moves = parse_moves("1. e4 {best by test} e5 $1 2. Nf3 1-0");
        assert_eq!(moves.len(), 3);
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6 5. O-O Be7";
        let a = extract_from_text(text, 40);
        let b = extract_from_text(text, 40);
        assert_eq!(a, b);
    }

    #[test]
    fn cutoff_truncates_the_walk() {
        let text = "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6";
        let short = extract_from_text(text, 4);
        let long = extract_from_text(text, 8);
        assert!(
            short.quadrant_profile.kingside_total() + short.quadrant_profile.queenside_total()
                + short.quadrant_profile.center
                < long.quadrant_profile.kingside_total()
                    + long.quadrant_profile.queenside_total()
                    + long.quadrant_profile.center
        );
    }

    #[test]
    fn quadrant_attribution_by_mover_and_region() {
        // e4 lands in the central 2x2; h4 is a white kingside move;
        // a5 is a black queenside move.
        let sig = extract_from_text("1. e4 a5 2. h4", 10);
        assert_eq!(sig.quadrant_profile.center, ACTIVITY_QUANTUM);
        assert_eq!(sig.quadrant_profile.kingside_white, ACTIVITY_QUANTUM);
        assert_eq!(sig.quadrant_profile.queenside_black, ACTIVITY_QUANTUM);
        assert_eq!(sig.quadrant_profile.queenside_white, 0.0);
    }

    #[test]
    fn quiet_games_have_near_zero_volatility() {
        let sig = extract_from_text("1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6", 20);
        assert!(sig.temporal_flow.volatility < 0.01);
        assert!(sig.aggression < 0.01);
    }

    #[test]
    fn captures_raise_aggression_and_volatility() {
        let quiet = extract_from_text("1. e4 e5 2. Nf3 Nc6", 20);
        let sharp = extract_from_text("1. e4 d5 2. exd5 Qxd5 3. Nc3 Qxc3 4. bxc3", 20);
        assert!(sharp.aggression > quiet.aggression);
        assert!(sharp.temporal_flow.volatility > quiet.temporal_flow.volatility);
    }

    #[test]
    fn all_accumulators_are_non_negative() {
        let sig = extract_from_text("1. e4 d5 2. exd5 Qxd5 3. Nc3 Qd8 4. d4 Nf6", 20);
        let q = &sig.quadrant_profile;
        for v in [
            q.kingside_white,
            q.kingside_black,
            q.queenside_white,
            q.queenside_black,
            q.center,
            sig.temporal_flow.volatility,
            sig.aggression,
        ] {
            assert!(v >= 0.0);
        }
    }
}
