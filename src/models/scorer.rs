//! Sequence model inference.
//!
//! Wraps the pretrained temporal/self-attention model exported to ONNX.
//! Inference is stateless and deterministic (no dropout at inference
//! time, no gradient tracking in the runtime), so failures here are
//! configuration bugs and are never retried.

use crate::config::{AppConfig, ModelConfig};
use crate::encoder::SequenceTensor;
use crate::error::ScoringError;
use crate::models::loader::{LoadedModel, ModelLoader};
use anyhow::Result;
use std::sync::RwLock;
use tracing::debug;

/// Logistic squashing of the model's raw logit.
fn sigmoid(logit: f64) -> f64 {
    1.0 / (1.0 + (-logit).exp())
}

/// Check a tensor against the dimensions the model was configured with.
///
/// Dimensionality is a startup constant, never inferred at call time, so
/// a mismatch is a deployment error surfaced as `Inference`.
fn check_shape(
    tensor: &SequenceTensor,
    sequence_length: usize,
    feature_dim: usize,
) -> std::result::Result<(), ScoringError> {
    if tensor.sequence_length != sequence_length || tensor.feature_dim != feature_dim {
        return Err(ScoringError::Inference(format!(
            "tensor shape [{}, {}] does not match configured [{}, {}]",
            tensor.sequence_length, tensor.feature_dim, sequence_length, feature_dim
        )));
    }
    if tensor.data.len() != sequence_length * feature_dim {
        return Err(ScoringError::Inference(format!(
            "tensor carries {} values, expected {}",
            tensor.data.len(),
            sequence_length * feature_dim
        )));
    }
    Ok(())
}

/// Runs the encoded sequence through the pretrained model to produce a
/// fraud probability in [0,1].
pub struct SequenceScorer {
    /// Loaded model (behind a lock: the ONNX session requires exclusive
    /// access to run)
    model: RwLock<LoadedModel>,
    sequence_length: usize,
    feature_dim: usize,
    /// Advisory classification threshold; final determination happens in
    /// the fusion policy
    threshold: f64,
}

impl SequenceScorer {
    /// Load the model artifact and build a scorer from configuration.
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::from_model_config(&config.model, &config.artifacts.model_path, config.detection.threshold)
    }

    pub fn from_model_config(
        model_config: &ModelConfig,
        model_path: &str,
        threshold: f64,
    ) -> Result<Self> {
        let loader = ModelLoader::with_threads(model_config.onnx_threads)?;
        let model = loader.load_model(model_path, "sequence")?;

        Ok(Self {
            model: RwLock::new(model),
            sequence_length: model_config.sequence_length,
            feature_dim: model_config.feature_dim,
            threshold,
        })
    }

    /// Score an encoded sequence, returning the fraud probability.
    pub fn score(&self, tensor: &SequenceTensor) -> std::result::Result<f64, ScoringError> {
        use ort::value::Tensor;

        check_shape(tensor, self.sequence_length, self.feature_dim)?;

        // Input shape [1, sequence_length, feature_dim]
        let shape = vec![
            1_i64,
            tensor.sequence_length as i64,
            tensor.feature_dim as i64,
        ];
        let input_tensor = Tensor::from_array((shape, tensor.data.clone()))
            .map_err(|e| ScoringError::Inference(format!("failed to create input tensor: {}", e)))?;

        let mut model = self
            .model
            .write()
            .map_err(|e| ScoringError::Inference(format!("model lock poisoned: {}", e)))?;

        let input_name = model.input_name.clone();
        let output_name = model.output_name.clone();

        let outputs = model
            .session
            .run(ort::inputs![&input_name => input_tensor])
            .map_err(|e| ScoringError::Inference(format!("model run failed: {}", e)))?;

        let logit = extract_logit(&outputs, &output_name)?;
        let probability = sigmoid(logit);

        debug!(
            logit = logit,
            probability = probability,
            "Sequence model inference complete"
        );

        Ok(probability)
    }

    /// Advisory classification of a probability at the configured
    /// threshold.
    pub fn is_fraud(&self, probability: f64) -> bool {
        probability > self.threshold
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Extract the raw logit from the model output.
fn extract_logit(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
) -> std::result::Result<f64, ScoringError> {
    if let Some(output) = outputs.get(output_name) {
        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            if let Some(&logit) = data.last() {
                return Ok(logit as f64);
            }
        }
    }

    // Fallback: first extractable output
    for (_, output) in outputs.iter() {
        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            if let Some(&logit) = data.last() {
                return Ok(logit as f64);
            }
        }
    }

    Err(ScoringError::Inference(
        "no logit tensor found in model output".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_range_and_symmetry() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);

        for logit in [-5.0, -0.3, 0.0, 1.7, 8.0] {
            let p = sigmoid(logit);
            assert!((0.0..=1.0).contains(&p));
            assert!((p + sigmoid(-logit) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_shape_mismatch_is_inference_error() {
        let tensor = SequenceTensor {
            sequence_length: 10,
            feature_dim: 23,
            data: vec![0.0; 230],
        };

        assert!(check_shape(&tensor, 10, 23).is_ok());
        assert!(matches!(
            check_shape(&tensor, 10, 15),
            Err(ScoringError::Inference(_))
        ));
        assert!(matches!(
            check_shape(&tensor, 5, 23),
            Err(ScoringError::Inference(_))
        ));
    }

    #[test]
    fn test_data_length_checked() {
        let tensor = SequenceTensor {
            sequence_length: 10,
            feature_dim: 23,
            data: vec![0.0; 200], // truncated
        };
        assert!(matches!(
            check_shape(&tensor, 10, 23),
            Err(ScoringError::Inference(_))
        ));
    }
}
