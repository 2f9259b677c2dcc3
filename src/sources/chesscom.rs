//! Chess.com-style provider
//!
//! Pulls the player's recent games as one JSON object with a `games`
//! array. The result is encoded per side rather than as a single winner
//! field, and moves arrive as full PGN.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::PipelineError;

use super::{GameOutcome, GameProvider, GameRecord};

pub struct ChessComProvider {
    client: Client,
    base_url: String,
    player: String,
    tag: String,
}

impl ChessComProvider {
    pub fn new(base_url: impl Into<String>, player: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            player: player.into(),
            tag: "chesscom".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    games: Option<Vec<WireGame>>,
}

#[derive(Debug, Deserialize)]
struct WireGame {
    uuid: Option<String>,
    url: Option<String>,
    pgn: Option<String>,
    end_time: Option<i64>,
    time_control: Option<String>,
    white: Option<WireSide>,
    black: Option<WireSide>,
}

#[derive(Debug, Deserialize)]
struct WireSide {
    rating: Option<u32>,
    result: Option<String>,
}

fn outcome_from_results(white: Option<&str>, black: Option<&str>) -> Option<GameOutcome> {
    match (white?, black?) {
        ("win", _) => Some(GameOutcome::WhiteWins),
        (_, "win") => Some(GameOutcome::BlackWins),
        ("agreed" | "repetition" | "stalemate" | "insufficient" | "50move" | "timevsinsufficient", _) => {
            Some(GameOutcome::Draw)
        }
        _ => None,
    }
}

fn normalize(wire: WireGame, tag: &str) -> Result<GameRecord, PipelineError> {
    let malformed = |reason: &str| PipelineError::MalformedRecord {
        provider: tag.to_string(),
        reason: reason.to_string(),
    };

    let id = wire
        .uuid
        .or_else(|| wire.url.as_deref().and_then(|u| u.rsplit('/').next().map(String::from)))
        .ok_or_else(|| malformed("missing uuid and url"))?;
    let move_text = wire
        .pgn
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| malformed("missing pgn"))?;

    let white = wire.white.unwrap_or(WireSide { rating: None, result: None });
    let black = wire.black.unwrap_or(WireSide { rating: None, result: None });
    let declared_winner = outcome_from_results(white.result.as_deref(), black.result.as_deref())
        .ok_or_else(|| malformed("undeterminable result"))?;

    // PGN headers would confuse the move tokenizer; keep only move text.
    let move_text = move_text
        .lines()
        .filter(|line| !line.trim_start().starts_with('['))
        .collect::<Vec<_>>()
        .join(" ");

    Ok(GameRecord {
        id: format!("{tag}_{id}"),
        move_text,
        declared_winner,
        white_rating: white.rating,
        black_rating: black.rating,
        time_control: wire.time_control,
        provider_tag: tag.to_string(),
    })
}

#[async_trait]
impl GameProvider for ChessComProvider {
    fn tag(&self) -> &str {
        &self.tag
    }

    async fn fetch(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<GameRecord>> {
        let url = format!("{}/pub/player/{}/games/recent", self.base_url, self.player);
        debug!(url = %url, "fetching chess.com games");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("chess.com request failed")?
            .error_for_status()
            .context("chess.com returned an error status")?;

        let wire: WireResponse = response
            .json()
            .await
            .context("failed to decode chess.com response")?;

        let since_epoch = since.timestamp();
        let mut games = Vec::new();
        for game in wire.games.unwrap_or_default() {
            if game.end_time.is_some_and(|t| t < since_epoch) {
                continue;
            }
            match normalize(game, &self.tag) {
                Ok(record) => games.push(record),
                Err(e) => warn!(error = %e, "skipping record"),
            }
            if games.len() >= limit {
                break;
            }
        }
        Ok(games)
    }
}
