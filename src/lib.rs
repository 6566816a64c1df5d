//! Fraud Scoring Engine Library
//!
//! Scores financial transactions for fraud risk by combining a learned
//! sequence model, a deterministic rule engine, and a natural-language
//! explanation layer with a guaranteed deterministic fallback.

pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod explain;
pub mod fusion;
pub mod metrics;
pub mod models;
pub mod nats;
pub mod rules;
pub mod types;

pub use config::AppConfig;
pub use encoder::FeatureEncoder;
pub use engine::FraudScoringEngine;
pub use error::ScoringError;
pub use explain::ExplanationGenerator;
pub use fusion::FusionPolicy;
pub use models::SequenceScorer;
pub use rules::RuleTable;
pub use types::{PredictionResult, ScoringRequest, TransactionRecord};
