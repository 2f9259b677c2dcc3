//! Lichess-style provider
//!
//! Streams finished games as newline-delimited JSON from the per-player
//! games export endpoint. Unknown fields are ignored; a line that fails to
//! parse is logged and dropped without touching the rest of the batch.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::PipelineError;

use super::{GameOutcome, GameProvider, GameRecord};

pub struct LichessProvider {
    client: Client,
    base_url: String,
    player: String,
    tag: String,
}

impl LichessProvider {
    pub fn new(base_url: impl Into<String>, player: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            player: player.into(),
            tag: "lichess".to_string(),
        }
    }
}

/// Wire shape of one exported game. Tolerant: everything the pipeline can
/// live without is optional.
#[derive(Debug, Deserialize)]
struct WireGame {
    id: Option<String>,
    moves: Option<String>,
    /// Absent for draws and aborted games.
    winner: Option<String>,
    status: Option<String>,
    speed: Option<String>,
    players: Option<WirePlayers>,
}

#[derive(Debug, Deserialize)]
struct WirePlayers {
    white: Option<WirePlayer>,
    black: Option<WirePlayer>,
}

#[derive(Debug, Deserialize)]
struct WirePlayer {
    rating: Option<u32>,
}

fn normalize(wire: WireGame, tag: &str) -> Result<GameRecord, PipelineError> {
    let malformed = |reason: &str| PipelineError::MalformedRecord {
        provider: tag.to_string(),
        reason: reason.to_string(),
    };

    let id = wire.id.ok_or_else(|| malformed("missing game id"))?;
    let move_text = wire
        .moves
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| malformed("missing move list"))?;

    let declared_winner = match wire.winner.as_deref() {
        Some("white") => GameOutcome::WhiteWins,
        Some("black") => GameOutcome::BlackWins,
        Some(other) => return Err(malformed(&format!("unknown winner '{other}'"))),
        // No winner field on a finished game means a draw; anything still
        // in flight is unusable.
        None => match wire.status.as_deref() {
            Some("draw" | "stalemate") | None => GameOutcome::Draw,
            Some(other) => return Err(malformed(&format!("unfinished status '{other}'"))),
        },
    };

    let (white_rating, black_rating) = wire
        .players
        .map(|p| {
            (
                p.white.and_then(|w| w.rating),
                p.black.and_then(|b| b.rating),
            )
        })
        .unwrap_or((None, None));

    Ok(GameRecord {
        id: format!("{tag}_{id}"),
        move_text,
        declared_winner,
        white_rating,
        black_rating,
        time_control: wire.speed,
        provider_tag: tag.to_string(),
    })
}

#[async_trait]
impl GameProvider for LichessProvider {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn fetch(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<GameRecord>> {
        let url = format!(
            "{}/api/games/user/{}?since={}&max={}&moves=true",
            self.base_url,
            self.player,
            since.timestamp_millis(),
            limit
        );
        debug!(url = %url, "fetching lichess games");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/x-ndjson")
            .send()
            .await
            .context("lichess request failed")?
            .error_for_status()
            .context("lichess returned an error status")?;

        let body = response.text().await.context("failed to read lichess body")?;

        let mut games = Vec::new();
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let wire: WireGame = match serde_json::from_str(line) {
                Ok(wire) => wire,
                Err(e) => {
                    warn!(provider = %self.tag, error = %e, "unparseable game line, skipping");
                    continue;
                }
            };
            match normalize(wire, &self.tag) {
                Ok(game) => games.push(game),
                Err(e) => warn!(error = %e, "skipping record"),
            }
            if games.len() >= limit {
                break;
            }
        }
        Ok(games)
    }
}
