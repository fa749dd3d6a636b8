//! Test utilities and mock backends for testing inference functionality
//!
//! This module provides a mock implementation of the `InferenceBackend` trait
//! to enable pipeline testing without requiring actual model files or the
//! ONNX Runtime / Tract toolchains.

use crate::{
    config::RemovalConfig,
    error::{BgSwapError, Result},
    inference::InferenceBackend,
    matting::BackendFactory,
    models::{ModelInfo, ModelManager, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;

/// Mock inference backend producing a deterministic circular matte
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Whether the backend has been initialized
    initialized: bool,
    /// Simulated model information
    model_info: ModelInfo,
    /// Preprocessing configuration
    preprocessing_config: PreprocessingConfig,
    /// Whether to simulate initialization failure
    should_fail_init: bool,
    /// Whether to simulate inference failure
    should_fail_inference: bool,
}

impl MockBackend {
    /// Create a new mock backend with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            model_info: ModelInfo {
                name: "mock-model".to_string(),
                precision: "fp32".to_string(),
                size_bytes: 1024 * 1024, // 1MB
                input_shape: (1, 3, 320, 320),
                output_shape: (1, 1, 320, 320),
            },
            preprocessing_config: PreprocessingConfig::default(),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::new();
        backend.should_fail_inference = true;
        backend
    }

    /// Generate a deterministic mock output tensor from the input dimensions
    ///
    /// Produces a centered circle with a saturated plateau and a soft rim:
    /// the plateau pins the min-max maximum so interior pixels survive
    /// normalization and resizing at full opacity, while the rim exercises
    /// intermediate values.
    fn generate_mock_output(&self, input: &Array4<f32>) -> Array4<f32> {
        let input_shape = input.shape();
        let batch_size = input_shape[0];
        let output_height = input_shape[2];
        let output_width = input_shape[3];

        let mut output = Array4::<f32>::zeros((batch_size, 1, output_height, output_width));

        let center_x = output_width as f32 / 2.0;
        let center_y = output_height as f32 / 2.0;
        let radius = (output_width.min(output_height) as f32 / 3.0).max(1.0);
        let plateau = radius / 2.0;

        for b in 0..batch_size {
            for y in 0..output_height {
                for x in 0..output_width {
                    let dx = x as f32 - center_x;
                    let dy = y as f32 - center_y;
                    let distance = (dx * dx + dy * dy).sqrt();

                    let mask_value = if distance <= plateau {
                        1.0
                    } else if distance < radius {
                        ((radius - distance) / (radius - plateau)).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };

                    output[[b, 0, y, x]] = mask_value;
                }
            }
        }

        output
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.should_fail_init {
            return Err(BgSwapError::model("Mock initialization failure"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgSwapError::internal("Backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgSwapError::inference("Mock inference failure"));
        }
        Ok(self.generate_mock_output(input))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.input_shape
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.output_shape
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing_config.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.model_info.clone())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Backend factory producing [`MockBackend`] instances
#[derive(Debug, Default)]
pub struct MockBackendFactory {
    fail_init: bool,
    fail_inference: bool,
}

impl MockBackendFactory {
    /// Factory for well-behaved mock backends
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose backends fail to initialize
    #[must_use]
    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            fail_inference: false,
        }
    }

    /// Factory whose backends fail at inference time
    #[must_use]
    pub fn failing_inference() -> Self {
        Self {
            fail_init: false,
            fail_inference: true,
        }
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(
        &self,
        _config: &RemovalConfig,
        _model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        let backend = if self.fail_init {
            MockBackend::new_failing_init()
        } else if self.fail_inference {
            MockBackend::new_failing_inference()
        } else {
            MockBackend::new()
        };
        Ok(Box::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_lifecycle() {
        let mut backend = MockBackend::new();
        assert!(!backend.is_initialized());

        let config = RemovalConfig::default();
        let load_time = backend.initialize(&config).unwrap();
        assert!(load_time.is_some());
        assert!(backend.is_initialized());

        // Second initialization is a no-op
        assert!(backend.initialize(&config).unwrap().is_none());
    }

    #[test]
    fn test_mock_output_is_deterministic_and_bounded() {
        let mut backend = MockBackend::new();
        backend.initialize(&RemovalConfig::default()).unwrap();

        let input = Array4::<f32>::zeros((1, 3, 320, 320));
        let first = backend.infer(&input).unwrap();
        let second = backend.infer(&input).unwrap();
        assert_eq!(first, second);

        assert_eq!(first.shape(), &[1, 1, 320, 320]);
        assert!(first.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // The circle pattern covers both extremes
        assert!(first.iter().any(|&v| v == 0.0));
        assert!(first.iter().any(|&v| v > 0.9));
    }

    #[test]
    fn test_mock_failure_modes() {
        let mut failing = MockBackend::new_failing_init();
        assert!(failing.initialize(&RemovalConfig::default()).is_err());

        let mut backend = MockBackend::new_failing_inference();
        backend.initialize(&RemovalConfig::default()).unwrap();
        let input = Array4::<f32>::zeros((1, 3, 320, 320));
        let err = backend.infer(&input).unwrap_err();
        assert!(matches!(err, BgSwapError::Inference(_)));
    }
}
