//! Pipeline error taxonomy
//!
//! Most failure classes are recovered locally (skip the provider, skip the
//! record, fall back to the heuristic). Only `Setup` aborts a batch.

use thiserror::Error;

/// Classified failures inside the evolution pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A game provider could not be reached or returned garbage.
    /// Recovered by skipping that provider for the current batch.
    #[error("provider '{provider}' unavailable: {reason}")]
    Provider { provider: String, reason: String },

    /// A single candidate record could not be parsed into a `GameRecord`.
    /// Recovered by dropping the record.
    #[error("malformed record from '{provider}': {reason}")]
    MalformedRecord { provider: String, reason: String },

    /// No usable evaluation basis existed for a game, so no prediction may
    /// be persisted for it. The game is re-attempted on a future batch.
    #[error("no usable evaluation for game '{game_id}'")]
    PredictionRejected { game_id: String },

    /// The persistence layer (or another required collaborator) is
    /// unreachable. The only class that aborts the batch.
    #[error("setup failure: {0}")]
    Setup(String),
}
