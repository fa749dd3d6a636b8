//! ONNX Runtime backend implementation for segmentation models
//!
//! Implements the `InferenceBackend` trait using ONNX Runtime with support
//! for multiple execution providers (CPU, CUDA, CoreML). Provider selection
//! is availability-checked at session build time with CPU as the fallback.

use crate::config::{ExecutionProvider, RemovalConfig};
use crate::error::Result;
use crate::inference::InferenceBackend;
use crate::models::ModelManager;
use log;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::{self, value::Value};

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status
    ///
    /// Returns tuples of provider name, availability, and description.
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let mut providers = Vec::new();

        providers.push((
            "CPU".to_string(),
            true,
            "Always available, uses CPU for inference".to_string(),
        ));

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        providers.push((
            "CUDA".to_string(),
            cuda_available,
            "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
        ));

        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);
        providers.push((
            "CoreML".to_string(),
            coreml_available,
            "Apple Silicon GPU acceleration (macOS only)".to_string(),
        ));

        providers
    }

    /// Create a new ONNX backend with a pre-configured model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Create a new uninitialized ONNX backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Set the model manager for this backend
    pub fn set_model_manager(&mut self, model_manager: ModelManager) {
        self.model_manager = Some(model_manager);
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &RemovalConfig) -> Result<std::time::Duration> {
        let model_load_start = std::time::Instant::now();

        let Some(ref model_manager) = self.model_manager else {
            return Err(crate::error::BgSwapError::model(
                "No model manager available for ONNX backend",
            ));
        };

        // Load the model weights
        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;

        log::info!(
            "Initializing ONNX backend: {} ({})",
            model_info.name,
            model_info.precision
        );
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::debug!("Model size: {size_mb:.2} MB");

        let mut session_builder = Session::builder()
            .map_err(|e| {
                crate::error::BgSwapError::inference(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                crate::error::BgSwapError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        // Configure execution providers with availability checking
        session_builder = match config.execution_provider {
            ExecutionProvider::Auto => {
                // Auto-detect: try CUDA > CoreML > CPU
                let mut providers = Vec::new();

                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    log::info!("CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                } else {
                    log::debug!("CUDA execution provider is not available");
                }

                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    log::info!("CoreML execution provider is available and will be used");
                    providers.push(
                        CoreMLExecutionProvider::default().with_subgraphs(true).build(),
                    );
                } else {
                    log::debug!("CoreML execution provider is not available");
                }

                if providers.is_empty() {
                    log::warn!("No hardware acceleration available, falling back to CPU");
                    session_builder
                } else {
                    session_builder
                        .with_execution_providers(providers)
                        .map_err(|e| {
                            crate::error::BgSwapError::inference(format!(
                                "Failed to set auto execution providers: {e}"
                            ))
                        })?
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                session_builder
            },
            ExecutionProvider::Cuda => {
                let cuda_provider = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
                    log::info!("Using CUDA execution provider");
                    session_builder
                        .with_execution_providers([cuda_provider.build()])
                        .map_err(|e| {
                            crate::error::BgSwapError::inference(format!(
                                "Failed to set CUDA execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
            ExecutionProvider::CoreMl => {
                let coreml_provider = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false) {
                    log::info!("Using CoreML execution provider");
                    session_builder
                        .with_execution_providers([CoreMLExecutionProvider::default()
                            .with_subgraphs(true)
                            .build()])
                        .map_err(|e| {
                            crate::error::BgSwapError::inference(format!(
                                "Failed to set CoreML execution provider: {e}"
                            ))
                        })?
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    session_builder
                }
            },
        };

        // Calculate optimal threading if auto-detect (0)
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
        };

        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
                / 4)
            .max(1)
        };

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| crate::error::BgSwapError::inference(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| crate::error::BgSwapError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| crate::error::BgSwapError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| crate::error::BgSwapError::model(format!("Failed to create session from model data: {e}")))?;

        log::debug!(
            "ONNX session created ({intra_threads} intra-op threads, {inter_threads} inter-op threads)"
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<instant::Duration>> {
        if self.initialized {
            return Ok(None); // No model loading time for already initialized backend
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(crate::error::BgSwapError::internal(
                "Backend not initialized",
            ));
        }

        let session = self.session.as_mut().ok_or_else(|| {
            crate::error::BgSwapError::internal("ONNX session not initialized")
        })?;

        let inference_start = std::time::Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        // Convert ndarray to ort Value
        let input_value = Value::from_array(input.clone()).map_err(|e| {
            crate::error::BgSwapError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs eliminate tensor name dependencies across models
        let outputs = session.run(ort::inputs![input_value]).map_err(|e| {
            crate::error::BgSwapError::inference(format!("ONNX inference failed: {e}"))
        })?;

        // Extract the first output: the finest-resolution head. U2Net-style
        // networks expose auxiliary supervision heads after it; those are
        // discarded.
        let output_tensor = {
            let keys: Vec<_> = outputs.keys().collect();
            if let Some(first_key) = keys.first() {
                outputs
                    .get(first_key)
                    .ok_or_else(|| {
                        crate::error::BgSwapError::inference("First output tensor not found")
                    })?
                    .try_extract_array::<f32>()
                    .map_err(|e| {
                        crate::error::BgSwapError::inference(format!(
                            "Failed to extract output tensor: {e}"
                        ))
                    })?
            } else {
                return Err(crate::error::BgSwapError::inference(
                    "No output tensors found",
                ));
            }
        };

        // Convert output to Array4<f32>
        let output_shape = output_tensor.shape();
        let output_data = output_tensor.view().to_owned();

        let result = if output_shape.len() == 4 {
            Array4::from_shape_vec(
                (
                    output_shape.first().copied().unwrap_or(1),
                    output_shape.get(1).copied().unwrap_or(1),
                    output_shape.get(2).copied().unwrap_or(1),
                    output_shape.get(3).copied().unwrap_or(1),
                ),
                output_data.into_raw_vec_and_offset().0,
            )
            .map_err(|e| {
                crate::error::BgSwapError::inference(format!("Failed to reshape output tensor: {e}"))
            })
        } else {
            Err(crate::error::BgSwapError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )))
        };

        let inference_time = inference_start.elapsed();
        log::debug!(
            "Inference complete: {:.2}ms",
            inference_time.as_secs_f64() * 1000.0
        );

        result
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 3, 320, 320), |info| info.input_shape) // Default fallback
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .and_then(|manager| manager.get_info().ok())
            .map_or((1, 1, 320, 320), |info| info.output_shape) // Default fallback
    }

    fn get_preprocessing_config(&self) -> Result<crate::models::PreprocessingConfig> {
        let model_manager = self.model_manager.as_ref().ok_or_else(|| {
            crate::error::BgSwapError::internal("Model manager not initialized")
        })?;
        model_manager.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<crate::models::ModelInfo> {
        let model_manager = self.model_manager.as_ref().ok_or_else(|| {
            crate::error::BgSwapError::internal("Model manager not initialized")
        })?;
        model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelSource, ModelSpec};

    #[test]
    fn test_onnx_backend_creation() {
        let backend = OnnxBackend::new();

        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), (1, 3, 320, 320)); // Default fallback
        assert_eq!(backend.output_shape(), (1, 1, 320, 320)); // Default fallback
    }

    #[test]
    fn test_list_providers_always_has_cpu() {
        let providers = OnnxBackend::list_providers();
        let cpu = providers.iter().find(|(name, _, _)| name == "CPU");
        assert!(matches!(cpu, Some((_, true, _))));
    }

    #[test]
    fn test_initialization_fails_for_missing_weights() {
        let spec = ModelSpec {
            source: ModelSource::File("/nonexistent/model.onnx".into()),
            variant: None,
        };
        let model_manager = ModelManager::from_spec(&spec).unwrap();
        let mut backend = OnnxBackend::with_model_manager(model_manager);

        let config = RemovalConfig::default();
        let result = backend.initialize(&config);
        assert!(result.is_err());
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_uninitialized_metadata_queries_fail_gracefully() {
        let backend = OnnxBackend::new();

        assert!(backend.get_model_info().is_err());
        assert!(backend.get_preprocessing_config().is_err());
    }
}
