//! Game Source Adapter
//!
//! Fetches candidate games from external chess servers and normalizes them
//! into `GameRecord`s. A provider being down costs the batch that
//! provider's games, nothing more; a malformed record costs only itself.

pub mod chesscom;
pub mod lichess;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::ply_count;
use crate::error::PipelineError;

pub use chesscom::ChessComProvider;
pub use lichess::LichessProvider;

/// Declared result of a finished game. Doubles as the prediction target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    WhiteWins,
    BlackWins,
    Draw,
}

/// One fetched game, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub move_text: String,
    pub declared_winner: GameOutcome,
    pub white_rating: Option<u32>,
    pub black_rating: Option<u32>,
    pub time_control: Option<String>,
    pub provider_tag: String,
}

/// A normalized upstream game server.
#[async_trait]
pub trait GameProvider: Send + Sync {
    fn tag(&self) -> &str;

    /// Fetch finished games newer than `since`, at most `limit` of them.
    async fn fetch(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<GameRecord>>;
}

/// One provider's fetch, bounded by the per-provider timeout. Failures of
/// either kind come back classified so the caller logs one uniform shape.
async fn fetch_one(
    provider: Arc<dyn GameProvider>,
    since: DateTime<Utc>,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<GameRecord>, PipelineError> {
    let tag = provider.tag().to_string();
    match tokio::time::timeout(timeout, provider.fetch(since, limit)).await {
        Ok(Ok(games)) => {
            debug!(provider = %tag, count = games.len(), "provider fetch ok");
            Ok(games)
        }
        Ok(Err(e)) => Err(PipelineError::Provider {
            provider: tag,
            reason: e.to_string(),
        }),
        Err(_) => Err(PipelineError::Provider {
            provider: tag,
            reason: "fetch timed out".to_string(),
        }),
    }
}

/// Fan out to every provider concurrently and collect whatever arrives.
///
/// Each provider call carries its own timeout; an unreachable or slow
/// provider logs a warning and contributes zero records. Games shorter
/// than `min_plies` are dropped — too little data to feature-extract.
pub async fn fetch_candidates(
    providers: &[Arc<dyn GameProvider>],
    since: DateTime<Utc>,
    per_provider_limit: usize,
    min_plies: usize,
    provider_timeout: Duration,
) -> Vec<GameRecord> {
    let fetches = providers
        .iter()
        .map(|provider| fetch_one(provider.clone(), since, per_provider_limit, provider_timeout));

    let mut candidates: Vec<GameRecord> = join_all(fetches)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(games) => Some(games),
            Err(e) => {
                warn!(error = %e, "provider fetch failed, skipping");
                None
            }
        })
        .flatten()
        .collect();
    let before = candidates.len();
    candidates.retain(|game| ply_count(&game.move_text) >= min_plies);
    if candidates.len() < before {
        debug!(dropped = before - candidates.len(), "dropped short games");
    }
    candidates
}
