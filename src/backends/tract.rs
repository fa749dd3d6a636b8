//! Tract backend implementation for segmentation models
//!
//! Implements the `InferenceBackend` trait using Tract, a pure Rust neural
//! network inference library with no external dependencies. CPU only, but
//! memory safe without FFI boundaries and WASM compatible.

use crate::config::RemovalConfig;
use crate::error::Result;
use crate::inference::InferenceBackend;
use crate::models::ModelManager;
use log;
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl TractBackend {
    /// List Tract execution providers with availability status
    ///
    /// CPU is the only execution provider for Tract (pure Rust implementation).
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Create a Tract backend with a pre-configured model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Set the model manager for this backend
    pub fn set_model_manager(&mut self, model_manager: ModelManager) {
        self.model_manager = Some(model_manager);
    }

    /// Load and initialize the model using Tract
    fn load_model(&mut self, _config: &RemovalConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let Some(ref model_manager) = self.model_manager else {
            return Err(crate::error::BgSwapError::model(
                "No model manager available for Tract backend",
            ));
        };

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;

        log::info!(
            "Initializing Tract backend: {} ({})",
            model_info.name,
            model_info.precision
        );
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::debug!("Model size: {size_mb:.2} MB");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| {
                crate::error::BgSwapError::model(format!("Failed to load ONNX model: {e}"))
            })?
            .into_optimized()
            .map_err(|e| {
                crate::error::BgSwapError::model(format!("Failed to optimize model: {e}"))
            })?
            .into_runnable()
            .map_err(|e| {
                crate::error::BgSwapError::model(format!("Failed to create runnable model: {e}"))
            })?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {:.2}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl Default for TractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None); // No model loading time for already initialized backend
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    #[allow(clippy::get_first)]
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self.model.as_ref().ok_or_else(|| {
            crate::error::BgSwapError::inference("Tract model not initialized")
        })?;

        log::debug!("Running Tract inference, input tensor: {:?}", input.shape());

        let inference_start = Instant::now();

        // Convert ndarray to Tract tensor
        let input_tensor = Tensor::from(input.clone());

        // Run inference
        let outputs = model.run(tvec![input_tensor.into()]).map_err(|e| {
            crate::error::BgSwapError::inference(format!("Tract inference failed: {e}"))
        })?;

        // The first output is the finest-resolution head; auxiliary heads are
        // dropped with the rest of the tvec
        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::BgSwapError::inference("No output tensor found"))?
            .into_arc_tensor();

        // Convert back to ndarray
        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            crate::error::BgSwapError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let output_shape = output_data.shape();
        if output_shape.len() != 4 {
            return Err(crate::error::BgSwapError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let output_array = Array4::from_shape_vec(
            (
                output_shape.get(0).copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(320),
                output_shape.get(3).copied().unwrap_or(320),
            ),
            output_data.to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| {
            crate::error::BgSwapError::inference(format!("Failed to reshape output tensor: {e}"))
        })?;

        let inference_time = inference_start.elapsed();
        log::debug!(
            "Tract inference completed in {:.2}ms",
            inference_time.as_millis()
        );

        Ok(output_array)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
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
}
