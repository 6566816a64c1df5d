//! Performance metrics and statistics tracking for the scoring pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline performance
pub struct ScoringMetrics {
    /// Total transactions scored
    pub transactions_scored: AtomicU64,
    /// Total transactions flagged as fraud
    pub fraud_flagged: AtomicU64,
    /// Total explanations attached to results
    pub explanations_generated: AtomicU64,
    /// Trigger counts per rule name
    rule_triggers: RwLock<HashMap<String, u64>>,
    /// Scoring call latencies (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ScoringMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            transactions_scored: AtomicU64::new(0),
            fraud_flagged: AtomicU64::new(0),
            explanations_generated: AtomicU64::new(0),
            rule_triggers: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed scoring call
    pub fn record_scored(&self, processing_time: Duration, risk_score: f64, is_fraud: bool) {
        self.transactions_scored.fetch_add(1, Ordering::Relaxed);
        if is_fraud {
            self.fraud_flagged.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (risk_score * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record the rules a result triggered
    pub fn record_rules(&self, rules_triggered: &[String]) {
        if rules_triggered.is_empty() {
            return;
        }
        if let Ok(mut triggers) = self.rule_triggers.write() {
            for rule in rules_triggered {
                *triggers.entry(rule.clone()).or_insert(0) += 1;
            }
        }
    }

    /// Record an attached explanation
    pub fn record_explanation(&self) {
        self.explanations_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Get scoring latency statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get overall throughput in transactions per second
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print a summary of all collected metrics
    pub fn print_summary(&self) {
        let scored = self.transactions_scored.load(Ordering::Relaxed);
        let flagged = self.fraud_flagged.load(Ordering::Relaxed);
        let explained = self.explanations_generated.load(Ordering::Relaxed);
        let stats = self.get_processing_stats();

        info!(
            transactions_scored = scored,
            fraud_flagged = flagged,
            explanations_generated = explained,
            throughput = format!("{:.1} tx/s", self.get_throughput()),
            mean_latency_us = stats.mean_us,
            p95_latency_us = stats.p95_us,
            "Pipeline summary"
        );

        if let Ok(triggers) = self.rule_triggers.read() {
            for (rule, count) in triggers.iter() {
                info!(rule = %rule, count = count, "Rule trigger count");
            }
        }

        if let Ok(buckets) = self.score_buckets.read() {
            info!(buckets = ?buckets.as_slice(), "Risk score distribution (0.0-1.0 in tenths)");
        }
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoring latency statistics snapshot
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodically prints the metrics summary
pub struct MetricsReporter {
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Run the reporting loop forever
    pub async fn start(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
