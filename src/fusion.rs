//! Fusion of the model probability and the rule score into a verdict.

use crate::rules::RuleOutcome;

/// Final verdict for one transaction.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub is_fraud: bool,
    /// Fused risk score in [0,1]
    pub risk_score: f64,
    pub reason: String,
}

/// Combines the model probability and the rule signal.
///
/// The fraud determination is an OR-gate, not a weighted vote: a single
/// triggered rule flags the transaction regardless of model confidence.
/// The risk score is a fixed linear blend, clamped at 1.0.
#[derive(Debug, Clone)]
pub struct FusionPolicy {
    threshold: f64,
    model_weight: f64,
    rule_weight: f64,
}

impl FusionPolicy {
    pub fn new(threshold: f64, model_weight: f64, rule_weight: f64) -> Self {
        Self {
            threshold,
            model_weight,
            rule_weight,
        }
    }

    /// Advisory model classification at the configured threshold.
    pub fn model_flag(&self, probability: f64) -> bool {
        probability > self.threshold
    }

    pub fn fuse(&self, probability: f64, rules: &RuleOutcome) -> Verdict {
        let model_flag = self.model_flag(probability);
        let rule_flag = rules.any_triggered();
        let is_fraud = model_flag || rule_flag;

        let risk_score =
            (self.model_weight * probability + self.rule_weight * rules.score).min(1.0);

        let confidence = format!("{:.1}%", probability * 100.0);
        let reason = if is_fraud {
            if model_flag && rule_flag {
                format!(
                    "Both AI model (confidence: {}) and business rules flagged this transaction. Rules: {}",
                    confidence, rules.reason
                )
            } else if model_flag {
                format!("AI model flagged with {} fraud probability", confidence)
            } else {
                format!("Business rules flagged: {}", rules.reason)
            }
        } else {
            format!("Transaction appears legitimate (AI confidence: {})", confidence)
        };

        Verdict {
            is_fraud,
            risk_score,
            reason,
        }
    }
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self::new(0.3, 0.7, 0.3)
    }
}
