//! Matting engine: foreground isolation via salient-object segmentation
//!
//! The engine owns the inference backend behind a single-initialization lock:
//! the model is loaded once on first use and reused by every subsequent
//! request, and concurrent forward passes serialize on the per-engine lock.

use crate::{
    config::{BackendType, RemovalConfig},
    error::{BgSwapError, Result},
    inference::InferenceBackend,
    models::ModelManager,
    types::{AlphaMatte, MattingResult, ProcessingMetadata, ProcessingTimings},
    utils::ImagePreprocessor,
};
use image::{DynamicImage, RgbaImage};
use instant::{Duration, Instant};
use ndarray::Array4;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug as trace_debug, info as trace_info, instrument, span, Level};

/// Epsilon guarding the min-max denominator against constant model output
const NORMALIZATION_EPSILON: f32 = 1e-8;

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance for the configured backend type with the
    /// given model manager
    ///
    /// # Errors
    /// - Backend type not compiled in
    /// - Backend construction failures
    fn create_backend(
        &self,
        config: &RemovalConfig,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;
}

/// Default backend factory covering the compiled-in backends
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    #[allow(unused_variables)] // model_manager unused when a backend feature is disabled
    fn create_backend(
        &self,
        config: &RemovalConfig,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match config.backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(
                crate::backends::TractBackend::with_model_manager(model_manager),
            )),
            #[allow(unreachable_patterns)] // reachable only with backend features disabled
            other => Err(BgSwapError::invalid_config(format!(
                "{other} backend requested but its feature is disabled"
            ))),
        }
    }
}

/// Matting engine producing foreground-isolated RGBA images
///
/// The engine is `Send + Sync`; share it across request handlers behind an
/// [`Arc`] instead of constructing one per request. The model loads exactly
/// once.
pub struct MattingEngine {
    config: RemovalConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Mutex<Option<Box<dyn InferenceBackend>>>,
}

impl MattingEngine {
    /// Create a new engine with the default backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: RemovalConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a new engine with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(
        config: RemovalConfig,
        backend_factory: Box<dyn BackendFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend_factory,
            backend: Mutex::new(None),
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Check whether the model has been loaded
    pub fn is_initialized(&self) -> bool {
        self.backend
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|b| b.is_initialized()))
            .unwrap_or(false)
    }

    fn lock_backend(&self) -> Result<MutexGuard<'_, Option<Box<dyn InferenceBackend>>>> {
        self.backend
            .lock()
            .map_err(|_| BgSwapError::internal("Matting engine lock poisoned"))
    }

    /// Eagerly load the model
    ///
    /// Optional: processing lazily initializes on first use. Calling this at
    /// startup moves the load cost out of the first request.
    ///
    /// # Errors
    /// - Model loading failures
    /// - Backend initialization errors
    pub fn initialize(&self) -> Result<()> {
        let mut guard = self.lock_backend()?;
        self.initialize_locked(&mut guard).map(|_| ())
    }

    /// Load the model under an already-held lock; concurrent first requests
    /// cannot race a duplicate load
    fn initialize_locked(
        &self,
        guard: &mut MutexGuard<'_, Option<Box<dyn InferenceBackend>>>,
    ) -> Result<Option<Duration>> {
        if guard.is_some() {
            return Ok(None);
        }

        trace_info!(
            backend = %self.config.backend_type,
            model = %self.config.model_spec.source.display_name(),
            "Initializing matting engine"
        );

        let model_manager = ModelManager::from_spec(&self.config.model_spec)?;
        let mut backend = self
            .backend_factory
            .create_backend(&self.config, model_manager)?;
        let model_load_time = backend.initialize(&self.config)?;

        **guard = Some(backend);
        Ok(model_load_time)
    }

    /// Remove the background from encoded image bytes, returning encoded
    /// output bytes
    ///
    /// The end-to-end pipeline: decode, preprocess, infer, postprocess, apply
    /// matte, encode (PNG by default, preserving the alpha channel
    /// losslessly). A single typed error surfaces the first failing stage;
    /// no partial output is ever produced.
    ///
    /// # Errors
    /// - `Decode` for malformed image bytes
    /// - `Model` / `Inference` / `Dimension` from the respective stages
    pub fn remove_background(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let result = self.process_bytes(image_bytes)?;
        let encode_start = Instant::now();
        let bytes = result.to_bytes(self.config.output_format, self.config.jpeg_quality)?;
        trace_debug!(
            encode_ms = encode_start.elapsed().as_millis() as u64,
            "Encoded matting output"
        );
        Ok(bytes)
    }

    /// Process encoded image bytes into a [`MattingResult`]
    ///
    /// # Errors
    /// - `Decode` for malformed image bytes, plus any pipeline stage error
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<MattingResult> {
        let decode_start = Instant::now();
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| BgSwapError::decode_error("image bytes", &e))?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image)?;
        result.metadata.timings.image_decode_ms = decode_ms;
        result.metadata.timings.total_ms += decode_ms;
        Ok(result)
    }

    /// Process an already-decoded image
    ///
    /// # Errors
    /// - Preprocessing, inference, or matte application failures
    #[instrument(
        skip(self, image),
        fields(
            backend = %self.config.backend_type,
            model = %self.config.model_spec.source.display_name(),
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&self, image: &DynamicImage) -> Result<MattingResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        let original_dimensions = (image.width(), image.height());

        // One lock per request: the model loads at most once process-wide,
        // and forward passes never interleave on a single session.
        let mut guard = self.lock_backend()?;
        if let Some(load_time) = self.initialize_locked(&mut guard)? {
            timings.model_load_ms = load_time.as_millis() as u64;
        }
        let backend = guard
            .as_mut()
            .ok_or_else(|| BgSwapError::internal("Backend missing after initialization"))?;

        let model_info = backend.get_model_info()?;
        let preprocessing_config = backend.get_preprocessing_config()?;

        // Preprocess
        let input_tensor = {
            let _span = span!(
                Level::DEBUG,
                "preprocessing",
                original_width = %original_dimensions.0,
                original_height = %original_dimensions.1
            )
            .entered();
            let preprocess_start = Instant::now();
            let tensor =
                ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;
            timings.preprocessing_ms = preprocess_start.elapsed().as_millis() as u64;
            tensor
        };

        // Inference
        let output_tensor = {
            let _span = span!(Level::INFO, "inference", backend = %self.config.backend_type)
                .entered();
            let inference_start = Instant::now();
            let tensor = backend.infer(&input_tensor)?;
            timings.inference_ms = inference_start.elapsed().as_millis() as u64;
            tensor
        };

        drop(guard);

        // Postprocess: raw head to matte, matte to RGBA subject
        let postprocess_start = Instant::now();
        let raw_matte = Self::postprocess_mask(&output_tensor)?;
        let matte = if raw_matte.dimensions == original_dimensions {
            raw_matte
        } else {
            raw_matte.resize(original_dimensions.0, original_dimensions.1)?
        };
        let result_image = Self::apply_mask(image, &matte)?;
        timings.postprocessing_ms = postprocess_start.elapsed().as_millis() as u64;

        timings.total_ms = total_start.elapsed().as_millis() as u64;

        let mut metadata = ProcessingMetadata::new(model_info.name);
        metadata.model_precision = model_info.precision;
        metadata.timings = timings;

        trace_info!(
            total_ms = metadata.timings.total_ms,
            inference_ms = metadata.timings.inference_ms,
            "Matting complete"
        );

        Ok(MattingResult::new(
            DynamicImage::ImageRgba8(result_image),
            matte,
            original_dimensions,
            metadata,
        ))
    }

    /// Convert the raw model output into an alpha matte at model resolution
    ///
    /// Min-max normalizes the single-channel head to [0, 1] with an
    /// epsilon-guarded denominator (constant output maps to all zeros rather
    /// than dividing by zero), then scales to 0-255.
    pub fn postprocess_mask(tensor: &Array4<f32>) -> Result<AlphaMatte> {
        let shape = tensor.shape();
        if shape.first().copied().unwrap_or(0) != 1 || shape.get(1).copied().unwrap_or(0) < 1 {
            return Err(BgSwapError::inference(format!(
                "Invalid output tensor shape {shape:?}"
            )));
        }
        let mask_height = shape.get(2).copied().unwrap_or(0);
        let mask_width = shape.get(3).copied().unwrap_or(0);
        if mask_height == 0 || mask_width == 0 {
            return Err(BgSwapError::dimension(
                "Model produced an empty output tensor",
            ));
        }

        let channel = tensor.slice(ndarray::s![0, 0, .., ..]);

        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &value in &channel {
            min = min.min(value);
            max = max.max(value);
        }
        let range = max - min + NORMALIZATION_EPSILON;

        let mut data = Vec::with_capacity(mask_width * mask_height);
        for y in 0..mask_height {
            for x in 0..mask_width {
                let value = channel.get((y, x)).copied().unwrap_or(0.0);
                let normalized = ((value - min) / range).clamp(0.0, 1.0);
                data.push((normalized * 255.0) as u8);
            }
        }

        AlphaMatte::new(data, (mask_width as u32, mask_height as u32))
    }

    /// Attach an alpha matte to an image as its fourth channel
    ///
    /// The matte is resized to the image's exact dimensions (Triangle filter)
    /// when needed; the image is forced to 3-channel color first. The output
    /// always has exactly 4 channels and the input's dimensions.
    pub fn apply_mask(image: &DynamicImage, matte: &AlphaMatte) -> Result<RgbaImage> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(BgSwapError::dimension("Cannot mask a zero-size image"));
        }

        let resized;
        let matte = if matte.dimensions == (width, height) {
            matte
        } else {
            resized = matte.resize(width, height)?;
            &resized
        };

        let rgb = image.to_rgb8();
        let mut result = RgbaImage::new(width, height);
        for ((x, y, pixel), &alpha) in rgb.enumerate_pixels().zip(matte.data.iter()) {
            result.put_pixel(x, y, image::Rgba([pixel[0], pixel[1], pixel[2], alpha]));
        }

        Ok(result)
    }

    /// Remove the background from bytes on a blocking worker thread
    ///
    /// Decode, inference, and encode are CPU-bound; on a cooperative
    /// scheduler they would starve concurrent tasks. This offloads the whole
    /// pipeline via `spawn_blocking`.
    ///
    /// # Errors
    /// - Same as [`MattingEngine::remove_background`]
    pub async fn remove_background_async(
        self: &Arc<Self>,
        image_bytes: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.remove_background(&image_bytes))
            .await
            .map_err(|e| BgSwapError::internal(format!("Worker task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackendFactory;
    use image::{ImageBuffer, Rgb, Rgba};

    fn mock_engine() -> MattingEngine {
        MattingEngine::with_factory(
            RemovalConfig::default(),
            Box::new(MockBackendFactory::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_postprocess_mask_range_and_shape() {
        let mut tensor = Array4::<f32>::zeros((1, 1, 4, 6));
        for (i, v) in tensor.iter_mut().enumerate() {
            *v = i as f32;
        }

        let matte = MattingEngine::postprocess_mask(&tensor).unwrap();
        assert_eq!(matte.dimensions, (6, 4));
        assert_eq!(matte.data.len(), 24);
        // Min maps to 0, max to 255 (up to epsilon rounding)
        assert_eq!(matte.data[0], 0);
        assert!(matte.data[23] >= 254);
    }

    #[test]
    fn test_postprocess_mask_constant_output() {
        // Constant raw output exercises the epsilon-guarded denominator
        let tensor = Array4::<f32>::from_elem((1, 1, 8, 8), 0.7);
        let matte = MattingEngine::postprocess_mask(&tensor).unwrap();
        assert!(matte.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_postprocess_mask_rejects_bad_shapes() {
        let tensor = Array4::<f32>::zeros((2, 1, 8, 8));
        assert!(MattingEngine::postprocess_mask(&tensor).is_err());

        let tensor = Array4::<f32>::zeros((1, 1, 0, 8));
        assert!(MattingEngine::postprocess_mask(&tensor).is_err());
    }

    #[test]
    fn test_apply_mask_forces_four_channels() {
        // Grayscale input still comes out 4-channel at the input dimensions
        let gray = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(7, 5, image::Luma([100])));
        let matte = AlphaMatte::new(vec![200; 4], (2, 2)).unwrap();

        let result = MattingEngine::apply_mask(&gray, &matte).unwrap();
        assert_eq!(result.dimensions(), (7, 5));
        assert!(result.pixels().all(|p| p[3] == 200));
    }

    #[test]
    fn test_apply_mask_one_pixel() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(1, 1, Rgb([1, 2, 3])));
        let matte = AlphaMatte::new(vec![128], (1, 1)).unwrap();

        let result = MattingEngine::apply_mask(&image, &matte).unwrap();
        assert_eq!(result.get_pixel(0, 0), &Rgba([1, 2, 3, 128]));
    }

    #[test]
    fn test_engine_lazy_single_initialization() {
        let engine = mock_engine();
        assert!(!engine.is_initialized());

        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(16, 16, Rgb([50, 100, 150])));
        let first = engine.process_image(&image).unwrap();
        assert!(engine.is_initialized());
        assert!(first.metadata.timings.model_load_ms < 1_000);

        // Second run reuses the loaded model
        let second = engine.process_image(&image).unwrap();
        assert_eq!(second.metadata.timings.model_load_ms, 0);
    }

    #[test]
    fn test_process_image_output_contract() {
        let engine = mock_engine();
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(64, 48, Rgb([10, 20, 30])));

        let result = engine.process_image(&image).unwrap();
        assert_eq!(result.dimensions(), (64, 48));
        assert_eq!(result.matte.dimensions, (64, 48));
        assert_eq!(result.original_dimensions, (64, 48));
        assert_eq!(result.metadata.model_name, "mock-model");
    }

    #[test]
    fn test_remove_background_rejects_garbage() {
        let engine = mock_engine();
        let err = engine.remove_background(b"definitely not an image").unwrap_err();
        assert!(matches!(err, BgSwapError::Decode(_)));
    }

    #[test]
    fn test_failing_backend_surfaces_inference_error() {
        let engine = MattingEngine::with_factory(
            RemovalConfig::default(),
            Box::new(MockBackendFactory::failing_inference()),
        )
        .unwrap();

        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(8, 8, Rgb([0, 0, 0])));
        let err = engine.process_image(&image).unwrap_err();
        assert!(matches!(err, BgSwapError::Inference(_)));
    }

    #[test]
    fn test_failing_init_surfaces_model_error() {
        let engine = MattingEngine::with_factory(
            RemovalConfig::default(),
            Box::new(MockBackendFactory::failing_init()),
        )
        .unwrap();

        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(8, 8, Rgb([0, 0, 0])));
        let err = engine.process_image(&image).unwrap_err();
        assert!(matches!(err, BgSwapError::Model(_)));
        assert!(!engine.is_initialized());
    }
}
