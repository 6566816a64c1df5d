//! Prediction result produced by a completed scoring call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete outcome of scoring one transaction.
///
/// Produced atomically: either the full object is returned (with or
/// without an explanation) or the scoring call fails with a typed error.
/// The caller owns the result after return; the pipeline never persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Associated transaction ID
    pub transaction_id: String,

    /// Final fraud determination (model OR rules)
    pub is_fraud: bool,

    /// Model-estimated fraud probability (0.0 - 1.0)
    pub fraud_probability: f64,

    /// Fused risk score combining model and rule signals (0.0 - 1.0)
    pub risk_score: f64,

    /// Prediction confidence (model probability)
    pub prediction_confidence: f64,

    /// Version tag of the model that produced the probability
    pub model_version: String,

    /// Names of triggered rules, in priority order
    pub rules_triggered: Vec<String>,

    /// Human-readable reason for the verdict
    pub reason: String,

    /// Narrative explanation, present when the caller requested one
    pub explanation: Option<String>,

    /// Result creation timestamp
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serialization() {
        let result = PredictionResult {
            transaction_id: "tx_123".to_string(),
            is_fraud: true,
            fraud_probability: 0.82,
            risk_score: 0.81,
            prediction_confidence: 0.82,
            model_version: "v1.0".to_string(),
            rules_triggered: vec!["high_amount_rule".to_string()],
            reason: "Business rules flagged: high amount".to_string(),
            explanation: None,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&result).unwrap();
        let deserialized: PredictionResult = serde_json::from_str(&json).unwrap();

        assert_eq!(result.transaction_id, deserialized.transaction_id);
        assert_eq!(result.is_fraud, deserialized.is_fraud);
        assert_eq!(result.rules_triggered, deserialized.rules_triggered);
        assert!(deserialized.explanation.is_none());
    }
}
