//! The fraud scoring pipeline: encode, score, evaluate rules, fuse,
//! explain.
//!
//! All components hold only read-only, process-lifetime artifacts loaded
//! once at startup, so one engine instance can be shared across
//! concurrent scoring calls without locks (the ONNX session manages its
//! own exclusivity).

use crate::config::AppConfig;
use crate::encoder::FeatureEncoder;
use crate::error::ScoringError;
use crate::explain::ExplanationGenerator;
use crate::fusion::FusionPolicy;
use crate::models::SequenceScorer;
use crate::rules::{self, RuleTable};
use crate::types::prediction::PredictionResult;
use crate::types::transaction::TransactionRecord;
use anyhow::Result;
use chrono::Utc;
use tracing::info;

pub struct FraudScoringEngine {
    encoder: FeatureEncoder,
    scorer: SequenceScorer,
    rule_table: RuleTable,
    fusion: FusionPolicy,
    explainer: ExplanationGenerator,
    model_version: String,
    default_baseline: f64,
}

impl FraudScoringEngine {
    /// Load all artifacts and assemble the pipeline.
    ///
    /// A mismatch between the encoder's output dimension and the model's
    /// configured feature dimension is a fatal configuration error, not a
    /// per-request one.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let encoder = FeatureEncoder::from_artifacts(
            &config.artifacts.scaler_path,
            &config.artifacts.encoder_path,
            config.model.sequence_length,
        )?;

        anyhow::ensure!(
            encoder.feature_dim() == config.model.feature_dim,
            "encoder produces {} features per step, model configured for {}",
            encoder.feature_dim(),
            config.model.feature_dim
        );

        let scorer = SequenceScorer::new(config)?;
        let fusion = FusionPolicy::new(
            config.detection.threshold,
            config.detection.model_weight,
            config.detection.rule_weight,
        );
        let explainer = ExplanationGenerator::new(&config.llm);

        info!(
            feature_dim = config.model.feature_dim,
            sequence_length = config.model.sequence_length,
            threshold = config.detection.threshold,
            model_version = %config.model.version,
            "Fraud scoring engine initialized"
        );

        Ok(Self {
            encoder,
            scorer,
            rule_table: RuleTable::default(),
            fusion,
            explainer,
            model_version: config.model.version.clone(),
            default_baseline: config.detection.default_baseline,
        })
    }

    /// Score a transaction against the engine's own rule table.
    pub fn score(
        &self,
        record: &TransactionRecord,
        baseline: Option<f64>,
    ) -> Result<PredictionResult, ScoringError> {
        self.score_with_table(record, baseline, &self.rule_table)
    }

    /// Score a transaction against a caller-owned, possibly versioned
    /// rule table.
    pub fn score_with_table(
        &self,
        record: &TransactionRecord,
        baseline: Option<f64>,
        table: &RuleTable,
    ) -> Result<PredictionResult, ScoringError> {
        let baseline = baseline.unwrap_or(self.default_baseline);

        let tensor = self.encoder.encode(record, baseline)?;
        let probability = self.scorer.score(&tensor)?;
        let rule_outcome = rules::evaluate(record, baseline, table);
        let verdict = self.fusion.fuse(probability, &rule_outcome);

        Ok(PredictionResult {
            transaction_id: record.transaction_id.clone(),
            is_fraud: verdict.is_fraud,
            fraud_probability: probability,
            risk_score: verdict.risk_score,
            prediction_confidence: probability,
            model_version: self.model_version.clone(),
            rules_triggered: rule_outcome.triggered,
            reason: verdict.reason,
            explanation: None,
            timestamp: Utc::now(),
        })
    }

    /// Score a transaction and attach a narrative explanation.
    ///
    /// The explanation layer never fails the call: on service problems
    /// the deterministic fallback narrative is attached instead.
    pub async fn score_with_explanation(
        &self,
        record: &TransactionRecord,
        baseline: Option<f64>,
    ) -> Result<PredictionResult, ScoringError> {
        let mut result = self.score(record, baseline)?;
        result.explanation = Some(self.explainer.explain(record, &result).await);
        Ok(result)
    }

    pub fn rule_table(&self) -> &RuleTable {
        &self.rule_table
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Probe the explanation service; availability is advisory only.
    pub async fn explanation_service_healthy(&self) -> bool {
        self.explainer.health_check().await
    }
}
