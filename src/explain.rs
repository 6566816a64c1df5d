//! Narrative explanation of a verdict, with a deterministic fallback.
//!
//! Best-effort enrichment through an external generative-text service;
//! any failure (timeout, transport, status, schema, unusably short text)
//! is absorbed into a locally synthesized narrative. Callers always get
//! some explanation, bounded by the configured timeout.

use crate::config::LlmConfig;
use crate::error::ExplanationUnavailable;
use crate::rules::format_amount;
use crate::types::prediction::PredictionResult;
use crate::types::transaction::TransactionRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Responses at or below this length are treated as unusable.
const MIN_EXPLANATION_CHARS: usize = 20;

/// Longer texts are trimmed to their first three sentences.
const MAX_EXPLANATION_CHARS: usize = 500;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for the external generation service plus the local fallback.
pub struct ExplanationGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    timeout: Duration,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
}

impl ExplanationGenerator {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }

    /// Narrate the verdict. Never fails: on any service problem the
    /// deterministic fallback narrative is returned instead.
    pub async fn explain(
        &self,
        record: &TransactionRecord,
        prediction: &PredictionResult,
    ) -> String {
        let prompt = self.build_prompt(record, prediction);

        match tokio::time::timeout(self.timeout, self.request(&prompt)).await {
            Ok(Ok(text)) => clean_explanation(&text),
            Ok(Err(e)) => {
                warn!(
                    transaction_id = %record.transaction_id,
                    error = %e,
                    "Explanation service failed, using fallback narrative"
                );
                fallback_narrative(record, prediction)
            }
            Err(_) => {
                warn!(
                    transaction_id = %record.transaction_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Explanation request timed out, using fallback narrative"
                );
                fallback_narrative(record, prediction)
            }
        }
    }

    async fn request(&self, prompt: &str) -> Result<String, ExplanationUnavailable> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                top_p: self.top_p,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExplanationUnavailable::Status(response.status().as_u16()));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed.response.trim().to_string();

        if text.len() <= MIN_EXPLANATION_CHARS {
            return Err(ExplanationUnavailable::TooShort(text.len()));
        }

        Ok(text)
    }

    /// Probe the service's model listing endpoint. Availability is logged
    /// but never required.
    pub async fn health_check(&self) -> bool {
        let probe = self
            .client
            .get(format!("{}/api/tags", self.url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match probe {
            Ok(response) if response.status().is_success() => {
                info!(url = %self.url, model = %self.model, "Explanation service reachable");
                true
            }
            Ok(response) => {
                warn!(
                    url = %self.url,
                    status = response.status().as_u16(),
                    "Explanation service responded with non-success status"
                );
                false
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Cannot reach explanation service");
                false
            }
        }
    }

    fn build_prompt(&self, record: &TransactionRecord, prediction: &PredictionResult) -> String {
        let fraud_status = if prediction.is_fraud {
            "FRAUDULENT"
        } else {
            "LEGITIMATE"
        };
        let rules = if prediction.rules_triggered.is_empty() {
            "None".to_string()
        } else {
            prediction.rules_triggered.join(", ")
        };

        format!(
            "You are a fraud detection expert. Analyze this transaction and provide a clear explanation.\n\n\
             TRANSACTION DETAILS:\n\
             - Amount: ${}\n\
             - Channel: {}\n\
             - KYC Status: {}\n\
             - Account Age: {} days\n\
             - Time: {}\n\n\
             ANALYSIS RESULTS:\n\
             - Classification: {}\n\
             - AI Fraud Probability: {:.1}%\n\
             - Risk Score: {:.1}%\n\
             - Business Rules Triggered: {}\n\n\
             Explain in 2-3 clear sentences why this transaction was classified as {}. \
             Focus on key risk factors.\n\n\
             Explanation:",
            format_amount(record.amount),
            record.channel.as_str(),
            record.kyc_status.as_str(),
            record.account_age_days,
            record.timestamp,
            fraud_status,
            prediction.fraud_probability * 100.0,
            prediction.risk_score * 100.0,
            rules,
            fraud_status.to_lowercase(),
        )
    }
}

/// Normalize the service's raw text and bound its length.
fn clean_explanation(raw: &str) -> String {
    let cleaned: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Explanation:"))
        .collect();
    let cleaned = cleaned.join(" ");

    if cleaned.len() > MAX_EXPLANATION_CHARS {
        let sentences: Vec<&str> = cleaned.split(". ").collect();
        let mut trimmed = sentences
            .into_iter()
            .take(3)
            .collect::<Vec<_>>()
            .join(". ");
        if !trimmed.ends_with('.') {
            trimmed.push('.');
        }
        return trimmed;
    }

    cleaned
}

/// Deterministic narrative synthesized purely from local data.
///
/// Given the same prediction and rule list this always produces identical
/// text; it never touches the network.
pub fn fallback_narrative(record: &TransactionRecord, prediction: &PredictionResult) -> String {
    let probability = format!("{:.1}%", prediction.fraud_probability * 100.0);

    if prediction.is_fraud {
        let mut risk_factors = Vec::new();

        if prediction.rules_triggered.iter().any(|r| r == "high_amount_rule") {
            risk_factors.push(format!(
                "unusually high amount (${})",
                format_amount(record.amount)
            ));
        }
        if prediction
            .rules_triggered
            .iter()
            .any(|r| r == "unverified_kyc_international")
        {
            risk_factors.push("international transaction with unverified KYC".to_string());
        }
        if prediction.rules_triggered.iter().any(|r| r == "odd_hours_rule") {
            risk_factors.push("transaction during unusual hours".to_string());
        }
        if prediction
            .rules_triggered
            .iter()
            .any(|r| r == "new_account_high_amount")
        {
            risk_factors.push("high amount from new account".to_string());
        }

        if !risk_factors.is_empty() {
            return format!(
                "This transaction is flagged as fraudulent due to: {}. The AI model assigned a {} fraud probability.",
                risk_factors.join(", "),
                probability
            );
        }
    }

    format!(
        "This transaction appears legitimate with a {} fraud probability.",
        probability
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::{Channel, KycStatus};
    use chrono::{TimeZone, Utc};

    fn record() -> TransactionRecord {
        TransactionRecord {
            transaction_id: "tx_exp".to_string(),
            amount: 60000.0,
            kyc_status: KycStatus::Unverified,
            account_age_days: 5,
            channel: Channel::International,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 14, 3, 0, 0).unwrap(),
            customer_segment: "Retail".to_string(),
            transaction_type: "Purchase".to_string(),
        }
    }

    fn fraud_prediction(rules: Vec<&str>) -> PredictionResult {
        PredictionResult {
            transaction_id: "tx_exp".to_string(),
            is_fraud: true,
            fraud_probability: 0.82,
            risk_score: 0.84,
            prediction_confidence: 0.82,
            model_version: "v1.0".to_string(),
            rules_triggered: rules.into_iter().map(String::from).collect(),
            reason: "Business rules flagged".to_string(),
            explanation: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_fallback_enumerates_triggered_rules() {
        let prediction = fraud_prediction(vec![
            "high_amount_rule",
            "unverified_kyc_international",
            "odd_hours_rule",
            "new_account_high_amount",
        ]);
        let text = fallback_narrative(&record(), &prediction);

        assert_eq!(
            text,
            "This transaction is flagged as fraudulent due to: unusually high amount ($60,000.00), \
             international transaction with unverified KYC, transaction during unusual hours, \
             high amount from new account. The AI model assigned a 82.0% fraud probability."
        );
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let prediction = fraud_prediction(vec!["high_amount_rule"]);
        let first = fallback_narrative(&record(), &prediction);
        let second = fallback_narrative(&record(), &prediction);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_legitimate() {
        let mut prediction = fraud_prediction(vec![]);
        prediction.is_fraud = false;
        prediction.fraud_probability = 0.1;

        let text = fallback_narrative(&record(), &prediction);
        assert_eq!(
            text,
            "This transaction appears legitimate with a 10.0% fraud probability."
        );
    }

    #[test]
    fn test_fallback_fraud_without_mapped_rules() {
        // weekend_high_amount has no canned phrase; falls through to the
        // probability-only sentence
        let prediction = fraud_prediction(vec!["weekend_high_amount"]);
        let text = fallback_narrative(&record(), &prediction);
        assert!(text.starts_with("This transaction appears legitimate"));
    }

    #[test]
    fn test_clean_explanation_joins_lines() {
        let raw = "Explanation:\nThe amount is unusually large.\n\nThe account is new.";
        assert_eq!(
            clean_explanation(raw),
            "The amount is unusually large. The account is new."
        );
    }

    #[test]
    fn test_clean_explanation_trims_long_text() {
        let sentence = "This transaction shows several independent risk factors worth noting";
        let raw = format!(
            "{s}. {s}. {s}. {s}. {s}. {s}. {s}. {s}.",
            s = sentence
        );
        let cleaned = clean_explanation(&raw);

        assert_eq!(cleaned.matches(sentence).count(), 3);
        assert!(cleaned.ends_with('.'));
    }

    #[test]
    fn test_prompt_embeds_facts() {
        let config = LlmConfig {
            url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 30,
            max_tokens: 300,
            temperature: 0.3,
            top_p: 0.9,
        };
        let generator = ExplanationGenerator::new(&config);
        let prompt = generator.build_prompt(&record(), &fraud_prediction(vec!["odd_hours_rule"]));

        assert!(prompt.contains("Amount: $60,000.00"));
        assert!(prompt.contains("Channel: international"));
        assert!(prompt.contains("Classification: FRAUDULENT"));
        assert!(prompt.contains("AI Fraud Probability: 82.0%"));
        assert!(prompt.contains("Business Rules Triggered: odd_hours_rule"));
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        // Port 9 (discard) refuses connections on loopback
        let config = LlmConfig {
            url: "http://127.0.0.1:9".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 2,
            max_tokens: 300,
            temperature: 0.3,
            top_p: 0.9,
        };
        let generator = ExplanationGenerator::new(&config);
        let prediction = fraud_prediction(vec!["high_amount_rule"]);

        let first = generator.explain(&record(), &prediction).await;
        let second = generator.explain(&record(), &prediction).await;

        assert_eq!(first, second);
        assert_eq!(first, fallback_narrative(&record(), &prediction));
    }
}
