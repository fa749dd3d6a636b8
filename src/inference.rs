//! Inference backend abstraction

use crate::{config::RemovalConfig, error::Result};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
///
/// Backends are `Send` so an engine can hand the session to a worker thread;
/// concurrent forward passes are serialized by the owning engine.
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given configuration
    ///
    /// Idempotent: an already-initialized backend returns `Ok(None)` without
    /// reloading the model.
    ///
    /// # Errors
    /// - Model loading or validation errors
    /// - Backend initialization failures
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>>;

    /// Run a forward pass on the input tensor
    ///
    /// Only the model's finest-resolution output head is returned; auxiliary
    /// supervision heads are discarded by the backend.
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Tensor conversion or shape errors
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Get the expected input shape for this backend (NCHW)
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Get the expected output shape for this backend (NCHW)
    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Get preprocessing configuration for this backend
    ///
    /// # Errors
    /// - Model manager not initialized
    fn get_preprocessing_config(&self) -> Result<crate::models::PreprocessingConfig>;

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Model manager not initialized
    fn get_model_info(&self) -> Result<crate::models::ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackend;

    #[test]
    fn test_backend_trait_object() {
        let backend: Box<dyn InferenceBackend> = Box::new(MockBackend::new());

        assert!(!backend.is_initialized());

        let input_shape = backend.input_shape();
        let output_shape = backend.output_shape();

        assert_eq!(input_shape.0, 1); // Batch size
        assert_eq!(input_shape.1, 3); // RGB channels
        assert_eq!(output_shape.0, 1); // Batch size
        assert_eq!(output_shape.1, 1); // Single channel mask
    }
}
