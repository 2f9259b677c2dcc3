//! Palette Evolution Pipeline
//!
//! Batch worker entry point: wires config, stores, providers, and the
//! analysis/evaluation/prediction stack, then runs both the fixed-interval
//! scheduler and the HTTP trigger endpoint. Overlapping invocations are
//! tolerated by design; the store's conflict-ignoring writes converge them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use palette_evolution::analysis::{
    ArchetypeCatalog, Classifier, RuleClassifier, SynapticClassifier, SynapticWeights,
};
use palette_evolution::config::{AppConfig, ClassifierStrategy, ProviderKind, StoreBackend};
use palette_evolution::eval::{Evaluator, HttpAuthority, RateGate, SystemClock};
use palette_evolution::pipeline::Pipeline;
use palette_evolution::predict::PredictionEngine;
use palette_evolution::server::{run_server, AppState};
use palette_evolution::sources::{ChessComProvider, GameProvider, LichessProvider};
use palette_evolution::store::{AuditLog, EvolutionStore, JsonlStore, MemoryStore, PredictionStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config = AppConfig::from_env();

    println!("\n{}", "═".repeat(60));
    println!("♟️  Palette Evolution Pipeline v0.1.0");
    println!("{}", "═".repeat(60));
    println!(
        "Providers: {} | Classifier: {:?} | Store: {:?}",
        config.providers.len(),
        config.classifier_strategy,
        config.store_backend
    );
    println!("{}\n", "═".repeat(60));

    // Persistence: one backend serves all three collaborator contracts.
    let (predictions, evolution, audit): (
        Arc<dyn PredictionStore>,
        Arc<dyn EvolutionStore>,
        Arc<dyn AuditLog>,
    ) = match config.store_backend {
        StoreBackend::Jsonl => {
            let store = Arc::new(JsonlStore::open(&config.data_dir)?);
            (store.clone(), store.clone(), store)
        }
        StoreBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store.clone(), store)
        }
    };

    let providers: Vec<Arc<dyn GameProvider>> = config
        .providers
        .iter()
        .map(|p| match p.kind {
            ProviderKind::Lichess => {
                Arc::new(LichessProvider::new(&p.base_url, &p.player)) as Arc<dyn GameProvider>
            }
            ProviderKind::ChessCom => {
                Arc::new(ChessComProvider::new(&p.base_url, &p.player)) as Arc<dyn GameProvider>
            }
        })
        .collect();
    if providers.is_empty() {
        info!("no providers configured; batches will process zero candidates");
    }

    let classifier: Box<dyn Classifier> = match config.classifier_strategy {
        ClassifierStrategy::Rules => Box::new(RuleClassifier::new(config.thresholds.clone())),
        ClassifierStrategy::Synaptic => Box::new(SynapticClassifier::new(
            config.thresholds.clone(),
            SynapticWeights::default(),
        )),
    };

    let evaluator = Evaluator::new(
        Box::new(HttpAuthority::new(
            &config.authority_url,
            Duration::from_millis(config.eval_timeout_ms),
        )),
        RateGate::new(
            Duration::from_millis(config.eval_min_interval_ms),
            Arc::new(SystemClock),
        ),
        config.heuristic.clone(),
        Duration::from_millis(config.eval_timeout_ms),
    );

    let engine = PredictionEngine::new(
        ArchetypeCatalog::default(),
        config.prediction.clone(),
        config.rng_seed,
    );

    let scheduler_minutes = config.scheduler_minutes;
    let http_port = config.http_port;
    let pipeline = Arc::new(Pipeline::new(
        providers, classifier, evaluator, engine, predictions, evolution, audit, config,
    ));

    // Fixed-interval scheduler; the HTTP endpoint can trigger on top of it.
    let scheduled = pipeline.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(scheduler_minutes * 60));
        loop {
            interval.tick().await;
            match scheduled.run_batch().await {
                Ok(report) => info!(
                    games = report.games_processed,
                    stored = report.predictions_generated,
                    divergent = report.divergent_predictions,
                    duration_ms = report.duration_ms,
                    "scheduled batch done"
                ),
                Err(e) => error!(error = %e, "scheduled batch failed"),
            }
        }
    });

    run_server(AppState { pipeline }, http_port).await
}
