//! Evaluation Fallback Service
//!
//! Returns a position evaluation for every request, preferring a
//! rate-limited external authority and degrading silently to a local
//! heuristic. Unavailability of the authority is provenance, not an error:
//! the caller always gets a usable result, tagged with where it came from.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::FeatureSignature;

/// Provenance of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalSource {
    Authoritative,
    Heuristic,
}

/// One position evaluation, centipawns from white's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub score: f64,
    pub search_depth: u32,
    pub is_forced_mate: bool,
    pub mate_distance: Option<i32>,
    pub source: EvalSource,
}

/// Injectable clock so tests can simulate elapsed time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Shared rate budget for authoritative calls.
///
/// One timestamp of the last authoritative attempt; if less than the
/// minimum interval has elapsed the attempt is skipped outright. The gate
/// never makes a caller wait out the budget.
pub struct RateGate {
    last_attempt: Mutex<Option<Instant>>,
    min_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl RateGate {
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            last_attempt: Mutex::new(None),
            min_interval,
            clock,
        }
    }

    /// True if an authoritative attempt may proceed now. Acquiring records
    /// the attempt time regardless of whether the call later succeeds.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let mut last = self.last_attempt.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(at) if now.duration_since(at) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// A principal-variation line as the authority reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityLine {
    /// Centipawn score; absent when the line is a forced mate.
    pub cp: Option<f64>,
    /// Moves to mate, negative when black mates.
    pub mate: Option<i32>,
}

/// Successful authority payload: depth plus at least one evaluated line.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityEvaluation {
    pub depth: Option<u32>,
    #[serde(default)]
    pub pvs: Vec<AuthorityLine>,
}

/// The external evaluation authority, behind a trait so tests can fake it.
///
/// `Ok(None)` means "unavailable" — rate limited upstream, unknown
/// position, or a response with no evaluated line. Only transport-level
/// surprises surface as `Err`, and the evaluator treats those the same way.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    async fn query(&self, position: &str) -> Result<Option<AuthorityEvaluation>>;
}

/// HTTP authority client, keyed by a position encoding.
pub struct HttpAuthority {
    client: Client,
    base_url: String,
}

impl HttpAuthority {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AuthorityClient for HttpAuthority {
    async fn query(&self, position: &str) -> Result<Option<AuthorityEvaluation>> {
        let url = format!(
            "{}/api/cloud-eval?fen={}",
            self.base_url,
            urlencoded(position)
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("authority request failed")?;

        // 429 and 404 are ordinary here: over budget or position unknown.
        if !response.status().is_success() {
            debug!(status = %response.status(), "authority unavailable");
            return Ok(None);
        }

        let eval: AuthorityEvaluation = match response.json().await {
            Ok(eval) => eval,
            Err(e) => {
                debug!(error = %e, "authority payload undecodable");
                return Ok(None);
            }
        };

        // An empty pv list means "no line evaluated", not "equal position".
        if eval.pvs.is_empty() {
            return Ok(None);
        }
        Ok(Some(eval))
    }
}

fn urlencoded(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '/' => "%2F".to_string(),
            c => c.to_string(),
        })
        .collect()
}

/// Named coefficients of the local heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicWeights {
    pub spatial: f64,
    pub aggression: f64,
    pub tempo: f64,
    /// Clamp bound, centipawn-equivalent.
    pub clamp: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            spatial: 12.0,
            aggression: 60.0,
            tempo: 25.0,
            clamp: 600.0,
        }
    }
}

/// Local fallback: linear combination of the already-extracted signature.
///
/// Aggression has no side of its own, so it amplifies whichever side the
/// spatial differential says is pressing.
pub fn heuristic_evaluation(signature: &FeatureSignature, weights: &HeuristicWeights) -> EvaluationResult {
    let spatial = signature.quadrant_profile.spatial_differential();
    let score = weights.spatial * spatial
        + weights.aggression * signature.aggression * spatial.signum()
        + weights.tempo * signature.tempo;

    EvaluationResult {
        score: score.clamp(-weights.clamp, weights.clamp),
        search_depth: 0,
        is_forced_mate: false,
        mate_distance: None,
        source: EvalSource::Heuristic,
    }
}

/// The fallback service itself.
pub struct Evaluator {
    authority: Box<dyn AuthorityClient>,
    gate: RateGate,
    weights: HeuristicWeights,
    request_timeout: Duration,
}

impl Evaluator {
    pub fn new(
        authority: Box<dyn AuthorityClient>,
        gate: RateGate,
        weights: HeuristicWeights,
        request_timeout: Duration,
    ) -> Self {
        Self {
            authority,
            gate,
            weights,
            request_timeout,
        }
    }

    /// Evaluate a position. Never fails; never blocks past the request
    /// timeout; tags every result with its provenance.
    pub async fn evaluate(&self, position: &str, signature: &FeatureSignature) -> EvaluationResult {
        if !self.gate.try_acquire() {
            debug!("rate budget spent, using heuristic");
            return heuristic_evaluation(signature, &self.weights);
        }

        let attempt = tokio::time::timeout(self.request_timeout, self.authority.query(position));
        match attempt.await {
            Ok(Ok(Some(eval))) => {
                // Clients are expected to strip empty pv lists; treat one
                // that slips through as unavailable rather than panicking.
                let Some(line) = eval.pvs.first() else {
                    return heuristic_evaluation(signature, &self.weights);
                };
                let (score, is_forced_mate, mate_distance) = match (line.mate, line.cp) {
                    (Some(mate), _) => {
                        let sign = if mate >= 0 { 1.0 } else { -1.0 };
                        (sign * 10_000.0, true, Some(mate))
                    }
                    (None, Some(cp)) => (cp, false, None),
                    (None, None) => {
                        // A line with neither score nor mate is no line.
                        return heuristic_evaluation(signature, &self.weights);
                    }
                };
                EvaluationResult {
                    score,
                    search_depth: eval.depth.unwrap_or(0),
                    is_forced_mate,
                    mate_distance,
                    source: EvalSource::Authoritative,
                }
            }
            Ok(Ok(None)) => heuristic_evaluation(signature, &self.weights),
            Ok(Err(e)) => {
                warn!(error = %e, "authority call failed, using heuristic");
                heuristic_evaluation(signature, &self.weights)
            }
            Err(_) => {
                warn!("authority call timed out, using heuristic");
                heuristic_evaluation(signature, &self.weights)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::QuadrantProfile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Clock whose time only moves when the test says so.
    pub struct ManualClock {
        origin: Instant,
        offset_ms: std::sync::atomic::AtomicU64,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset_ms: std::sync::atomic::AtomicU64::new(0),
            }
        }

        pub fn advance(&self, d: Duration) {
            self.offset_ms
                .fetch_add(d.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
        }
    }

    struct CountingAuthority {
        calls: AtomicUsize,
        response: Option<AuthorityEvaluation>,
    }

    #[async_trait]
    impl AuthorityClient for CountingAuthority {
        async fn query(&self, _position: &str) -> Result<Option<AuthorityEvaluation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    /// Authority that hangs far past any sane request timeout.
    struct SlowAuthority {
        delay: Duration,
    }

    #[async_trait]
    impl AuthorityClient for SlowAuthority {
        async fn query(&self, _position: &str) -> Result<Option<AuthorityEvaluation>> {
            tokio::time::sleep(self.delay).await;
            Ok(Some(AuthorityEvaluation {
                depth: Some(30),
                pvs: vec![AuthorityLine { cp: Some(200.0), mate: None }],
            }))
        }
    }

    fn white_leaning_signature() -> FeatureSignature {
        FeatureSignature {
            aggression: 0.3,
            tempo: 1.5,
            quadrant_profile: QuadrantProfile {
                kingside_white: 20.0,
                kingside_black: 5.0,
                queenside_white: 5.0,
                queenside_black: 5.0,
                center: 4.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn rate_gate_skips_within_interval() {
        let clock = Arc::new(ManualClock::new());
        let gate = RateGate::new(Duration::from_secs(5), clock.clone());
        assert!(gate.try_acquire());
        clock.advance(Duration::from_secs(1));
        assert!(!gate.try_acquire());
        clock.advance(Duration::from_secs(5));
        assert!(gate.try_acquire());
    }

    #[tokio::test]
    async fn rate_limited_call_goes_straight_to_heuristic() {
        let clock = Arc::new(ManualClock::new());
        let authority = CountingAuthority {
            calls: AtomicUsize::new(0),
            response: Some(AuthorityEvaluation {
                depth: Some(30),
                pvs: vec![AuthorityLine { cp: Some(120.0), mate: None }],
            }),
        };
        let evaluator = Evaluator::new(
            Box::new(authority),
            RateGate::new(Duration::from_secs(5), clock.clone()),
            HeuristicWeights::default(),
            Duration::from_secs(2),
        );
        let sig = white_leaning_signature();

        let first = evaluator.evaluate("pos", &sig).await;
        assert_eq!(first.source, EvalSource::Authoritative);

        // 1s elapsed of a 5s budget: no network attempt at all.
        clock.advance(Duration::from_secs(1));
        let second = evaluator.evaluate("pos", &sig).await;
        assert_eq!(second.source, EvalSource::Heuristic);
    }

    #[tokio::test]
    async fn unavailable_authority_degrades_silently() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        let evaluator = Evaluator::new(
            Box::new(CountingAuthority {
                calls: AtomicUsize::new(0),
                response: None,
            }),
            RateGate::new(Duration::from_millis(0), clock),
            HeuristicWeights::default(),
            Duration::from_secs(2),
        );
        let result = evaluator.evaluate("pos", &white_leaning_signature()).await;
        assert_eq!(result.source, EvalSource::Heuristic);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_authority_never_blocks_past_the_timeout() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        let evaluator = Evaluator::new(
            Box::new(SlowAuthority {
                delay: Duration::from_secs(30),
            }),
            RateGate::new(Duration::from_millis(0), clock),
            HeuristicWeights::default(),
            Duration::from_secs(2),
        );
        // Paused virtual time: the 30s sleep auto-advances and the 2s
        // timeout fires first, without the test waiting either out.
        let result = evaluator.evaluate("pos", &white_leaning_signature()).await;
        assert_eq!(result.source, EvalSource::Heuristic);
    }

    #[tokio::test]
    async fn empty_line_list_counts_as_unavailable() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        let evaluator = Evaluator::new(
            Box::new(CountingAuthority {
                calls: AtomicUsize::new(0),
                response: Some(AuthorityEvaluation {
                    depth: Some(30),
                    pvs: Vec::new(),
                }),
            }),
            RateGate::new(Duration::from_millis(0), clock),
            HeuristicWeights::default(),
            Duration::from_secs(2),
        );
        let result = evaluator.evaluate("pos", &white_leaning_signature()).await;
        assert_eq!(result.source, EvalSource::Heuristic);
    }

    #[tokio::test]
    async fn forced_mate_is_surfaced() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        let evaluator = Evaluator::new(
            Box::new(CountingAuthority {
                calls: AtomicUsize::new(0),
                response: Some(AuthorityEvaluation {
                    depth: Some(40),
                    pvs: vec![AuthorityLine { cp: None, mate: Some(4) }],
                }),
            }),
            RateGate::new(Duration::from_millis(0), clock),
            HeuristicWeights::default(),
            Duration::from_secs(2),
        );
        let result = evaluator.evaluate("pos", &white_leaning_signature()).await;
        assert!(result.is_forced_mate);
        assert_eq!(result.mate_distance, Some(4));
        assert!(result.score > 0.0);
        assert_eq!(result.source, EvalSource::Authoritative);
    }

    #[test]
    fn heuristic_is_clamped_and_directional() {
        let weights = HeuristicWeights::default();
        let white = heuristic_evaluation(&white_leaning_signature(), &weights);
        assert!(white.score > 0.0);
        assert!(white.score <= weights.clamp);

        let mut black_sig = white_leaning_signature();
        black_sig.quadrant_profile = QuadrantProfile {
            kingside_white: 5.0,
            kingside_black: 20.0,
            queenside_white: 5.0,
            queenside_black: 5.0,
            center: 4.0,
        };
        black_sig.tempo = -1.5;
        let black = heuristic_evaluation(&black_sig, &weights);
        assert!(black.score < 0.0);
    }
}
