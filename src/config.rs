//! Configuration management for the fraud scoring engine

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub artifacts: ArtifactsConfig,
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming scoring requests
    pub request_subject: String,
    /// Subject for outgoing prediction results
    pub result_subject: String,
}

/// Filesystem paths of the pretrained artifacts, loaded once at startup
/// and treated as immutable.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    /// ONNX export of the pretrained sequence model
    pub model_path: String,
    /// Fitted standard scaler parameters (JSON)
    pub scaler_path: String,
    /// Fitted categorical encoder vocabulary (JSON)
    pub encoder_path: String,
}

/// Sequence model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Combined feature dimension the model was trained on
    pub feature_dim: usize,
    /// Temporal window length the model expects
    pub sequence_length: usize,
    /// Version tag reported in prediction results
    #[serde(default = "default_model_version")]
    pub version: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_model_version() -> String {
    "v1.0".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

/// Detection and fusion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Probability threshold for the advisory model classification
    pub threshold: f64,
    /// Model probability weight in the fused risk score
    #[serde(default = "default_model_weight")]
    pub model_weight: f64,
    /// Rule score weight in the fused risk score
    #[serde(default = "default_rule_weight")]
    pub rule_weight: f64,
    /// Baseline amount assumed for users with no history
    #[serde(default = "default_baseline")]
    pub default_baseline: f64,
    /// Trailing window (days) the caller-supplied baseline covers
    #[serde(default = "default_baseline_window")]
    pub baseline_window_days: u32,
}

fn default_model_weight() -> f64 {
    0.7
}

fn default_rule_weight() -> f64 {
    0.3
}

fn default_baseline() -> f64 {
    1000.0
}

fn default_baseline_window() -> u32 {
    30
}

/// External language model configuration (Ollama-style generate API)
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the generation service
    pub url: String,
    /// Model name to request
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Token budget per explanation
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub temperature: f64,
    /// Nucleus sampling parameter
    #[serde(default = "default_llm_top_p")]
    pub top_p: f64,
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_llm_max_tokens() -> u32 {
    300
}

fn default_llm_temperature() -> f64 {
    0.3
}

fn default_llm_top_p() -> f64 {
    0.9
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent scoring workers
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "fraud.score".to_string(),
                result_subject: "fraud.results".to_string(),
            },
            artifacts: ArtifactsConfig {
                model_path: "artifacts/model.onnx".to_string(),
                scaler_path: "artifacts/scaler.json".to_string(),
                encoder_path: "artifacts/encoder.json".to_string(),
            },
            model: ModelConfig {
                feature_dim: 23,
                sequence_length: 10,
                version: "v1.0".to_string(),
                onnx_threads: 1,
            },
            detection: DetectionConfig {
                threshold: 0.3,
                model_weight: 0.7,
                rule_weight: 0.3,
                default_baseline: 1000.0,
                baseline_window_days: 30,
            },
            llm: LlmConfig {
                url: "http://localhost:11434".to_string(),
                model: "llama3".to_string(),
                timeout_secs: 30,
                max_tokens: 300,
                temperature: 0.3,
                top_p: 0.9,
            },
            pipeline: PipelineConfig { workers: 4 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}
