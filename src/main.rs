//! Fraud Scoring Engine - Main Entry Point
//!
//! Consumes scoring requests from NATS, runs the scoring pipeline, and
//! publishes prediction results. Supports parallel request processing.

use anyhow::Result;
use fraud_scoring_engine::{
    config::AppConfig, engine::FraudScoringEngine,
    metrics::{MetricsReporter, ScoringMetrics},
    nats::ScoringBus, types::ScoringRequest,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fraud_scoring_engine=info".parse()?),
        )
        .init();

    info!("Starting Fraud Scoring Engine");

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded successfully");
    info!(
        "Detection threshold: {:.2}, fusion weights: model {:.1} / rules {:.1}",
        config.detection.threshold, config.detection.model_weight, config.detection.rule_weight
    );

    // Initialize metrics
    let metrics = Arc::new(ScoringMetrics::new());

    // Build the scoring engine (loads model, scaler and encoder artifacts)
    let engine = Arc::new(FraudScoringEngine::new(&config)?);
    info!(
        "Scoring engine initialized ({} active rules, model {})",
        engine.rule_table().active_count(),
        engine.model_version()
    );

    // Probe the explanation service; scoring proceeds either way
    if !engine.explanation_service_healthy().await {
        warn!("Explanation service unreachable, fallback narratives will be used");
    }

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    // Initialize the message bus
    let bus = Arc::new(ScoringBus::new(client.clone(), &config.nats));

    // Parallel processing configuration
    let num_workers = config.pipeline.workers;
    info!(
        "Starting request processing loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", config.nats.request_subject);
    info!("Publishing results to: {}", config.nats.result_subject);

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter (prints summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    // Process scoring requests in parallel
    let mut subscription = bus.subscribe_requests().await?;

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        // Clone shared resources for the spawned task
        let engine = engine.clone();
        let bus = bus.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        // Spawn task to process this request
        tokio::spawn(async move {
            let start_time = Instant::now();

            match serde_json::from_slice::<ScoringRequest>(&message.payload) {
                Ok(request) => {
                    let tx_id = request.transaction.transaction_id.clone();

                    let result = if request.explain {
                        engine
                            .score_with_explanation(&request.transaction, request.baseline)
                            .await
                    } else {
                        engine.score(&request.transaction, request.baseline)
                    };

                    match result {
                        Ok(prediction) => {
                            let processing_time = start_time.elapsed();

                            metrics.record_scored(
                                processing_time,
                                prediction.risk_score,
                                prediction.is_fraud,
                            );
                            metrics.record_rules(&prediction.rules_triggered);
                            if prediction.explanation.is_some() {
                                metrics.record_explanation();
                            }

                            if prediction.is_fraud {
                                info!(
                                    transaction_id = %tx_id,
                                    risk_score = prediction.risk_score,
                                    rules = ?prediction.rules_triggered,
                                    processing_time_us = processing_time.as_micros(),
                                    "Transaction flagged as fraud"
                                );
                            } else {
                                debug!(
                                    transaction_id = %tx_id,
                                    risk_score = prediction.risk_score,
                                    processing_time_us = processing_time.as_micros(),
                                    "Transaction scored as legitimate"
                                );
                            }

                            if let Err(e) = bus.publish_result(&prediction).await {
                                error!(
                                    transaction_id = %tx_id,
                                    error = %e,
                                    "Failed to publish prediction result"
                                );
                            }

                            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

                            // Log progress every 100 requests
                            if count % 100 == 0 {
                                let throughput = metrics.get_throughput();
                                let processing_stats = metrics.get_processing_stats();
                                info!(
                                    processed = count,
                                    throughput = format!("{:.1} tx/s", throughput),
                                    avg_latency_us = processing_stats.mean_us,
                                    "Processing milestone"
                                );
                            }
                        }
                        Err(e) => {
                            error!(
                                transaction_id = %tx_id,
                                error = %e,
                                "Scoring failed"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize scoring request");
                }
            }

            // Release permit when done
            drop(permit);
        });
    }

    // Print final summary
    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
