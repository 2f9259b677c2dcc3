//! Palette Evolution Pipeline
//!
//! The autonomous batch worker behind the chess-art palette marketplace:
//! - Pulls fresh games from external chess servers
//! - Extracts spatial and temporal signatures per game
//! - Classifies each game into a strategic archetype
//! - Produces two deliberately independent outcome predictions
//! - Tracks its own historical accuracy in an append-only evolution state

pub mod analysis;
pub mod config;
pub mod error;
pub mod eval;
pub mod evolution;
pub mod pipeline;
pub mod predict;
pub mod server;
pub mod sources;
pub mod store;

// Re-exports for convenience
pub use analysis::{Archetype, FeatureSignature};
pub use config::AppConfig;
pub use pipeline::{BatchReport, Pipeline};
pub use sources::{GameOutcome, GameRecord};
