//! Feature encoding: raw transaction record to model-ready sequence tensor.
//!
//! The continuous block and categorical one-hot block match the layout the
//! sequence model was trained on. Scaler and encoder parameters are fitted
//! artifacts exported by the training pipeline, loaded once at startup and
//! never mutated.

use crate::error::ScoringError;
use crate::types::transaction::TransactionRecord;
use anyhow::{Context, Result};
use chrono::{Datelike, Timelike};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Absolute high-value threshold in currency units.
///
/// Intentionally not baseline-relative, matching observed production
/// behavior; the relative signal lives in the rule engine instead.
pub const HIGH_VALUE_THRESHOLD: f64 = 50_000.0;

/// Number of continuous features in the numeric block.
pub const NUMERIC_FEATURE_COUNT: usize = 11;

/// A single encoded feature row replicated across the temporal window.
///
/// The model expects a short constant-valued history when scoring a single
/// snapshot. Data is row-major `[sequence_length, feature_dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceTensor {
    pub sequence_length: usize,
    pub feature_dim: usize,
    pub data: Vec<f32>,
}

/// Pre-fitted mean/variance scaler for the continuous block.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = Self { mean, scale };
        scaler.check()?;
        Ok(scaler)
    }

    /// Load fitted scaler parameters from a JSON artifact.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler artifact {}", path.display()))?;
        let scaler: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scaler artifact {}", path.display()))?;
        scaler.check()?;
        Ok(scaler)
    }

    fn check(&self) -> Result<()> {
        anyhow::ensure!(
            self.mean.len() == NUMERIC_FEATURE_COUNT && self.scale.len() == NUMERIC_FEATURE_COUNT,
            "scaler expects {} features, artifact has mean={} scale={}",
            NUMERIC_FEATURE_COUNT,
            self.mean.len(),
            self.scale.len()
        );
        anyhow::ensure!(
            self.scale.iter().all(|&s| s.is_finite() && s != 0.0),
            "scaler contains zero or non-finite scale entries"
        );
        Ok(())
    }

    fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&x, (&m, &s))| (x - m) / s)
            .collect()
    }
}

/// One categorical column with its fitted vocabulary.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryColumn {
    pub name: String,
    pub categories: Vec<String>,
}

/// Internal encoding failure, mapped to `ScoringError::Feature` at the
/// module boundary. The schema-mismatch variant drives the wide-to-narrow
/// compatibility negotiation.
#[derive(Debug)]
pub(crate) enum EncodeError {
    SchemaMismatch { fitted: usize, given: usize },
    UnseenCategory { column: String, value: String },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::SchemaMismatch { fitted, given } => write!(
                f,
                "encoder fitted on {} categorical columns, {} given",
                fitted, given
            ),
            EncodeError::UnseenCategory { column, value } => {
                write!(f, "value '{}' unseen by fitted encoder column '{}'", value, column)
            }
        }
    }
}

/// Pre-fitted one-hot encoder for the categorical block.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoricalEncoder {
    columns: Vec<CategoryColumn>,
}

impl CategoricalEncoder {
    pub fn new(columns: Vec<CategoryColumn>) -> Self {
        Self { columns }
    }

    /// Load the fitted vocabulary from a JSON artifact.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read encoder artifact {}", path.display()))?;
        let encoder: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse encoder artifact {}", path.display()))?;
        anyhow::ensure!(
            !encoder.columns.is_empty(),
            "encoder artifact {} has no fitted columns",
            path.display()
        );
        Ok(encoder)
    }

    /// Number of fitted categorical columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Total width of the one-hot output.
    pub fn output_width(&self) -> usize {
        self.columns.iter().map(|c| c.categories.len()).sum()
    }

    pub(crate) fn encode(&self, values: &[&str]) -> std::result::Result<Vec<f64>, EncodeError> {
        if values.len() != self.columns.len() {
            return Err(EncodeError::SchemaMismatch {
                fitted: self.columns.len(),
                given: values.len(),
            });
        }

        let mut encoded = Vec::with_capacity(self.output_width());
        for (column, value) in self.columns.iter().zip(values) {
            let index = column
                .categories
                .iter()
                .position(|c| c == value)
                .ok_or_else(|| EncodeError::UnseenCategory {
                    column: column.name.clone(),
                    value: value.to_string(),
                })?;
            for i in 0..column.categories.len() {
                encoded.push(if i == index { 1.0 } else { 0.0 });
            }
        }
        Ok(encoded)
    }
}

/// Historical aggregates for the user behind a transaction.
#[derive(Debug, Clone, Copy)]
pub struct HistoricalAggregates {
    pub time_since_last_txn: f64,
    pub rolling_avg_amount: f64,
    pub deviation_from_avg: f64,
    pub transaction_count: f64,
    pub unique_channels: f64,
}

/// Pluggable source of historical aggregates.
///
/// The scoring core works with or without a historical-feature store;
/// [`NoHistory`] is the documented no-op default.
pub trait HistoryProvider: Send + Sync {
    fn aggregates(&self, record: &TransactionRecord, baseline: f64) -> HistoricalAggregates;
}

/// Default provider used when no historical-feature store is wired in.
/// Returns neutral values, which leaves the corresponding engineered
/// features inert.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistoryProvider for NoHistory {
    fn aggregates(&self, record: &TransactionRecord, _baseline: f64) -> HistoricalAggregates {
        HistoricalAggregates {
            time_since_last_txn: 0.0,
            rolling_avg_amount: record.amount,
            deviation_from_avg: 0.0,
            transaction_count: 1.0,
            unique_channels: 1.0,
        }
    }
}

/// Turns a raw transaction record into the fixed-shape sequence tensor the
/// model consumes. Deterministic: re-encoding the same record yields
/// bit-identical output.
pub struct FeatureEncoder {
    scaler: StandardScaler,
    encoder: CategoricalEncoder,
    history: Box<dyn HistoryProvider>,
    sequence_length: usize,
}

impl FeatureEncoder {
    pub fn new(
        scaler: StandardScaler,
        encoder: CategoricalEncoder,
        history: Box<dyn HistoryProvider>,
        sequence_length: usize,
    ) -> Self {
        Self {
            scaler,
            encoder,
            history,
            sequence_length,
        }
    }

    /// Load scaler and encoder artifacts and build an encoder with the
    /// no-op history provider.
    pub fn from_artifacts<P: AsRef<Path>>(
        scaler_path: P,
        encoder_path: P,
        sequence_length: usize,
    ) -> Result<Self> {
        let scaler = StandardScaler::load(scaler_path)?;
        let encoder = CategoricalEncoder::load(encoder_path)?;
        Ok(Self::new(scaler, encoder, Box::new(NoHistory), sequence_length))
    }

    /// Combined feature dimension produced per time step.
    pub fn feature_dim(&self) -> usize {
        NUMERIC_FEATURE_COUNT + self.encoder.output_width()
    }

    /// Encode a record into the sequence tensor.
    ///
    /// Validates the record invariants first; any missing or irrecoverable
    /// field fails the call rather than being silently imputed.
    pub fn encode(
        &self,
        record: &TransactionRecord,
        baseline: f64,
    ) -> std::result::Result<SequenceTensor, ScoringError> {
        record.validate()?;

        let hour = record.timestamp.hour() as f64;
        let weekday = record.timestamp.weekday().num_days_from_monday() as f64;
        let month = record.timestamp.month() as f64;
        let is_high_value = if record.amount > HIGH_VALUE_THRESHOLD {
            1.0
        } else {
            0.0
        };

        let aggregates = self.history.aggregates(record, baseline);

        let numeric = [
            record.account_age_days as f64,
            record.amount,
            hour,
            weekday,
            month,
            is_high_value,
            aggregates.time_since_last_txn,
            aggregates.rolling_avg_amount,
            aggregates.deviation_from_avg,
            aggregates.transaction_count,
            aggregates.unique_channels,
        ];
        let scaled = self.scaler.transform(&numeric);

        let categorical = self.encode_categorical(record)?;

        let feature_dim = scaled.len() + categorical.len();
        let mut row = Vec::with_capacity(feature_dim);
        row.extend(scaled.iter().map(|&v| v as f32));
        row.extend(categorical.iter().map(|&v| v as f32));

        let mut data = Vec::with_capacity(feature_dim * self.sequence_length);
        for _ in 0..self.sequence_length {
            data.extend_from_slice(&row);
        }

        Ok(SequenceTensor {
            sequence_length: self.sequence_length,
            feature_dim,
            data,
        })
    }

    /// Encode the categorical tuple, negotiating the artifact schema.
    ///
    /// Tries the wide (kyc, channel, segment, type) schema first; if the
    /// fitted encoder carries fewer columns, degrades to (kyc, channel)
    /// and logs the path taken.
    fn encode_categorical(
        &self,
        record: &TransactionRecord,
    ) -> std::result::Result<Vec<f64>, ScoringError> {
        let wide = [
            record.kyc_status.as_str(),
            record.channel.as_str(),
            record.customer_segment.as_str(),
            record.transaction_type.as_str(),
        ];

        match self.encoder.encode(&wide) {
            Ok(encoded) => Ok(encoded),
            Err(EncodeError::SchemaMismatch { fitted, given }) => {
                warn!(
                    fitted_columns = fitted,
                    given = given,
                    transaction_id = %record.transaction_id,
                    "Categorical encoder fitted on narrow schema, degrading to (kyc, channel)"
                );
                let narrow = [record.kyc_status.as_str(), record.channel.as_str()];
                self.encoder
                    .encode(&narrow)
                    .map_err(|e| ScoringError::Feature(e.to_string()))
            }
            Err(e) => Err(ScoringError::Feature(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::{Channel, KycStatus};
    use chrono::{TimeZone, Utc};

    fn identity_scaler() -> StandardScaler {
        StandardScaler::new(vec![0.0; NUMERIC_FEATURE_COUNT], vec![1.0; NUMERIC_FEATURE_COUNT])
            .unwrap()
    }

    fn wide_encoder() -> CategoricalEncoder {
        CategoricalEncoder::new(vec![
            CategoryColumn {
                name: "kyc_status".to_string(),
                categories: vec![
                    "pending".to_string(),
                    "unverified".to_string(),
                    "verified".to_string(),
                ],
            },
            CategoryColumn {
                name: "channel".to_string(),
                categories: vec![
                    "atm".to_string(),
                    "domestic".to_string(),
                    "international".to_string(),
                    "mobile".to_string(),
                    "online".to_string(),
                ],
            },
            CategoryColumn {
                name: "customer_segment".to_string(),
                categories: vec!["Corporate".to_string(), "Retail".to_string()],
            },
            CategoryColumn {
                name: "transaction_type".to_string(),
                categories: vec!["Purchase".to_string(), "Transfer".to_string()],
            },
        ])
    }

    fn narrow_encoder() -> CategoricalEncoder {
        CategoricalEncoder::new(vec![
            CategoryColumn {
                name: "kyc_status".to_string(),
                categories: vec![
                    "pending".to_string(),
                    "unverified".to_string(),
                    "verified".to_string(),
                ],
            },
            CategoryColumn {
                name: "channel".to_string(),
                categories: vec![
                    "atm".to_string(),
                    "domestic".to_string(),
                    "international".to_string(),
                    "mobile".to_string(),
                    "online".to_string(),
                ],
            },
        ])
    }

    fn sample_record() -> TransactionRecord {
        TransactionRecord {
            transaction_id: "tx_enc".to_string(),
            amount: 1500.0,
            kyc_status: KycStatus::Verified,
            account_age_days: 200,
            channel: Channel::Online,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 14, 14, 0, 0).unwrap(),
            customer_segment: "Retail".to_string(),
            transaction_type: "Purchase".to_string(),
        }
    }

    fn encoder_with(categorical: CategoricalEncoder) -> FeatureEncoder {
        FeatureEncoder::new(identity_scaler(), categorical, Box::new(NoHistory), 10)
    }

    #[test]
    fn test_tensor_shape() {
        let encoder = encoder_with(wide_encoder());
        let tensor = encoder.encode(&sample_record(), 1000.0).unwrap();

        // 11 numeric + 3+5+2+2 one-hot = 23
        assert_eq!(tensor.feature_dim, 23);
        assert_eq!(encoder.feature_dim(), 23);
        assert_eq!(tensor.sequence_length, 10);
        assert_eq!(tensor.data.len(), 230);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = encoder_with(wide_encoder());
        let record = sample_record();

        let a = encoder.encode(&record, 1000.0).unwrap();
        let b = encoder.encode(&record, 1000.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sequence_rows_are_identical() {
        let encoder = encoder_with(wide_encoder());
        let tensor = encoder.encode(&sample_record(), 1000.0).unwrap();

        let dim = tensor.feature_dim;
        let first = &tensor.data[..dim];
        for step in 1..tensor.sequence_length {
            assert_eq!(&tensor.data[step * dim..(step + 1) * dim], first);
        }
    }

    #[test]
    fn test_numeric_block_values() {
        let encoder = encoder_with(wide_encoder());
        let tensor = encoder.encode(&sample_record(), 1000.0).unwrap();

        // Identity scaler: raw feature values survive
        assert_eq!(tensor.data[0], 200.0); // account age
        assert_eq!(tensor.data[1], 1500.0); // amount
        assert_eq!(tensor.data[2], 14.0); // hour
        assert_eq!(tensor.data[3], 1.0); // Tuesday
        assert_eq!(tensor.data[4], 5.0); // May
        assert_eq!(tensor.data[5], 0.0); // below high-value threshold
        assert_eq!(tensor.data[7], 1500.0); // neutral rolling average
        assert_eq!(tensor.data[9], 1.0); // neutral transaction count
    }

    #[test]
    fn test_high_value_flag_is_absolute() {
        let encoder = encoder_with(wide_encoder());

        let mut record = sample_record();
        record.amount = 50_000.0;
        let tensor = encoder.encode(&record, 1.0).unwrap();
        assert_eq!(tensor.data[5], 0.0); // threshold is strict

        record.amount = 50_000.01;
        let tensor = encoder.encode(&record, 1_000_000.0).unwrap();
        assert_eq!(tensor.data[5], 1.0); // baseline does not matter
    }

    #[test]
    fn test_narrow_encoder_fallback() {
        let encoder = encoder_with(narrow_encoder());
        let tensor = encoder.encode(&sample_record(), 1000.0).unwrap();

        // 11 numeric + 3+5 one-hot = 19
        assert_eq!(tensor.feature_dim, 19);

        // verified is index 2 of the kyc column
        assert_eq!(&tensor.data[11..14], &[0.0, 0.0, 1.0]);
        // online is index 4 of the channel column
        assert_eq!(&tensor.data[14..19], &[0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unseen_category_is_feature_error() {
        let encoder = encoder_with(wide_encoder());
        let mut record = sample_record();
        record.customer_segment = "Institutional".to_string();

        assert!(matches!(
            encoder.encode(&record, 1000.0),
            Err(ScoringError::Feature(_))
        ));
    }

    #[test]
    fn test_invalid_record_rejected_before_encoding() {
        let encoder = encoder_with(wide_encoder());
        let mut record = sample_record();
        record.amount = -1.0;

        assert!(matches!(
            encoder.encode(&record, 1000.0),
            Err(ScoringError::Validation(_))
        ));
    }

    #[test]
    fn test_scaler_rejects_zero_scale() {
        let mut scale = vec![1.0; NUMERIC_FEATURE_COUNT];
        scale[3] = 0.0;
        assert!(StandardScaler::new(vec![0.0; NUMERIC_FEATURE_COUNT], scale).is_err());
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = StandardScaler::new(
            vec![10.0; NUMERIC_FEATURE_COUNT],
            vec![2.0; NUMERIC_FEATURE_COUNT],
        )
        .unwrap();
        let out = scaler.transform(&[12.0; NUMERIC_FEATURE_COUNT]);
        assert!(out.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }
}
