//! Type definitions for the fraud scoring engine

pub mod prediction;
pub mod transaction;

pub use prediction::PredictionResult;
pub use transaction::{Channel, KycStatus, ScoringRequest, TransactionRecord};
