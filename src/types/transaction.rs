//! Transaction data structures for fraud scoring

use crate::error::ScoringError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// KYC verification status of the customer behind a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    #[serde(alias = "Yes")]
    Verified,
    #[serde(alias = "No")]
    Unverified,
    #[serde(alias = "Pending")]
    Pending,
}

impl KycStatus {
    /// Label used when the status is fed to the categorical encoder.
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Verified => "verified",
            KycStatus::Unverified => "unverified",
            KycStatus::Pending => "pending",
        }
    }
}

/// Channel through which the transaction was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Domestic,
    International,
    Online,
    Atm,
    Mobile,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Domestic => "domestic",
            Channel::International => "international",
            Channel::Online => "online",
            Channel::Atm => "atm",
            Channel::Mobile => "mobile",
        }
    }
}

fn default_segment() -> String {
    "Retail".to_string()
}

fn default_transaction_type() -> String {
    "Purchase".to_string()
}

/// A raw transaction to be scored for fraud risk.
///
/// Constructed by the caller before each scoring call and never mutated
/// by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique transaction identifier
    pub transaction_id: String,

    /// Transaction amount, must be strictly positive
    pub amount: f64,

    /// KYC verification status
    pub kyc_status: KycStatus,

    /// Account age in days
    pub account_age_days: u32,

    /// Transaction channel
    pub channel: Channel,

    /// Transaction timestamp (UTC, must not be in the future)
    pub timestamp: DateTime<Utc>,

    /// Customer segment, e.g. "Retail"
    #[serde(default = "default_segment")]
    pub customer_segment: String,

    /// Transaction type, e.g. "Purchase"
    #[serde(default = "default_transaction_type")]
    pub transaction_type: String,
}

impl TransactionRecord {
    /// Check the record invariants, rejecting malformed input before any
    /// scoring work happens.
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.transaction_id.is_empty() {
            return Err(ScoringError::Validation(
                "transaction_id must not be empty".to_string(),
            ));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ScoringError::Validation(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.timestamp > Utc::now() {
            return Err(ScoringError::Validation(format!(
                "timestamp {} is in the future",
                self.timestamp
            )));
        }
        Ok(())
    }
}

/// A scoring request as received by the serving shell.
///
/// The baseline is the caller-owned trailing average transaction amount
/// for this user; when absent, the configured default is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub transaction: TransactionRecord,

    /// Trailing-average transaction amount for the user, if known
    #[serde(default)]
    pub baseline: Option<f64>,

    /// Whether an LLM explanation should be generated for the result
    #[serde(default)]
    pub explain: bool,
}
