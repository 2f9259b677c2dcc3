//! Pipeline configuration
//!
//! Defaults with environment overrides, prefixed `PE_`. Every tunable the
//! classifier, evaluator, and prediction engine consume is named here; no
//! calibration constant hides inside logic.

use std::str::FromStr;

use tracing::warn;

use crate::analysis::ClassifierThresholds;
use crate::eval::HeuristicWeights;
use crate::evolution::FitnessTuning;
use crate::predict::PredictionTuning;

/// Which classification strategy runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierStrategy {
    /// Deterministic ordered rules — the default, testable path.
    Rules,
    /// Rule baseline plus the synaptic re-ranking refinement.
    Synaptic,
}

/// Which persistence backend runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Jsonl,
}

/// One upstream game provider to pull from.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub player: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Lichess,
    ChessCom,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub providers: Vec<ProviderConfig>,
    /// How far back the "since" parameter reaches on each fetch.
    pub since_hours: i64,
    pub per_provider_limit: usize,
    pub provider_timeout_ms: u64,
    /// Games shorter than this are dropped before analysis.
    pub min_plies: usize,
    /// Feature extraction truncates the move walk here.
    pub cutoff_ply: usize,
    /// Seen-id window the dedup filter loads.
    pub dedup_window_hours: i64,

    pub authority_url: String,
    pub eval_min_interval_ms: u64,
    pub eval_timeout_ms: u64,
    pub heuristic: HeuristicWeights,

    pub prediction: PredictionTuning,
    /// Fixed seed for the draw tie-break; None seeds from entropy.
    pub rng_seed: Option<u64>,

    pub classifier_strategy: ClassifierStrategy,
    pub thresholds: ClassifierThresholds,
    pub fitness: FitnessTuning,

    pub store_backend: StoreBackend,
    pub data_dir: String,

    /// Hard cap on one batch's wall-clock duration.
    pub batch_cap_ms: u64,
    /// Fixed scheduler interval between batch invocations.
    pub scheduler_minutes: u64,
    pub http_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            since_hours: 24,
            per_provider_limit: 30,
            provider_timeout_ms: 10_000,
            min_plies: 20,
            cutoff_ply: 30,
            dedup_window_hours: 72,
            authority_url: "https://lichess.org".to_string(),
            eval_min_interval_ms: 5_000,
            eval_timeout_ms: 2_500,
            heuristic: HeuristicWeights::default(),
            prediction: PredictionTuning::default(),
            rng_seed: None,
            classifier_strategy: ClassifierStrategy::Rules,
            thresholds: ClassifierThresholds::default(),
            fitness: FitnessTuning::default(),
            store_backend: StoreBackend::Jsonl,
            data_dir: "data".to_string(),
            batch_cap_ms: 120_000,
            scheduler_minutes: 7,
            http_port: 8090,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, raw, "unparseable env override, using default");
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    /// Defaults overlaid with `PE_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.since_hours = env_or("PE_SINCE_HOURS", config.since_hours);
        config.per_provider_limit = env_or("PE_PER_PROVIDER_LIMIT", config.per_provider_limit);
        config.provider_timeout_ms = env_or("PE_PROVIDER_TIMEOUT_MS", config.provider_timeout_ms);
        config.min_plies = env_or("PE_MIN_PLIES", config.min_plies);
        config.cutoff_ply = env_or("PE_CUTOFF_PLY", config.cutoff_ply);
        config.dedup_window_hours = env_or("PE_DEDUP_WINDOW_HOURS", config.dedup_window_hours);

        config.authority_url = env_or("PE_AUTHORITY_URL", config.authority_url);
        config.eval_min_interval_ms = env_or("PE_EVAL_MIN_INTERVAL_MS", config.eval_min_interval_ms);
        config.eval_timeout_ms = env_or("PE_EVAL_TIMEOUT_MS", config.eval_timeout_ms);

        config.prediction.logistic_k = env_or("PE_LOGISTIC_K", config.prediction.logistic_k);
        config.prediction.draw_bias = env_or("PE_DRAW_BIAS", config.prediction.draw_bias);
        config.prediction.draw_window = env_or("PE_DRAW_WINDOW", config.prediction.draw_window);
        if let Ok(seed) = std::env::var("PE_RNG_SEED") {
            config.rng_seed = seed.parse().ok();
        }

        config.classifier_strategy = match std::env::var("PE_CLASSIFIER").as_deref() {
            Ok("synaptic") => ClassifierStrategy::Synaptic,
            _ => ClassifierStrategy::Rules,
        };
        config.store_backend = match std::env::var("PE_STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Jsonl,
        };
        config.data_dir = env_or("PE_DATA_DIR", config.data_dir);

        config.batch_cap_ms = env_or("PE_BATCH_CAP_MS", config.batch_cap_ms);
        config.scheduler_minutes = env_or("PE_SCHEDULER_MINUTES", config.scheduler_minutes);
        config.http_port = env_or("PE_HTTP_PORT", config.http_port);

        if let Ok(player) = std::env::var("PE_LICHESS_PLAYER") {
            config.providers.push(ProviderConfig {
                kind: ProviderKind::Lichess,
                base_url: env_or("PE_LICHESS_URL", "https://lichess.org".to_string()),
                player,
            });
        }
        if let Ok(player) = std::env::var("PE_CHESSCOM_PLAYER") {
            config.providers.push(ProviderConfig {
                kind: ProviderKind::ChessCom,
                base_url: env_or("PE_CHESSCOM_URL", "https://api.chess.com".to_string()),
                player,
            });
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert!(config.min_plies >= 20);
        assert!(config.cutoff_ply > 0);
        assert!(config.eval_min_interval_ms > 0);
        assert_eq!(config.classifier_strategy, ClassifierStrategy::Rules);
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("PE_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("PE_TEST_GARBAGE", 7_usize), 7);
        std::env::remove_var("PE_TEST_GARBAGE");
    }
}
