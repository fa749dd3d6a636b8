#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # bgswap
//!
//! A Rust library for image background removal and replacement using
//! salient-object segmentation, with ONNX Runtime and Tract inference
//! backends.
//!
//! Two components, used in sequence: the **matting engine** isolates the
//! foreground subject of a photograph as an RGBA image with a clean alpha
//! matte, and the **compositor** alpha-blends that subject over a new
//! background image.
//!
//! ## Features
//!
//! - **Multiple Backends**: ONNX Runtime (GPU acceleration) and Tract (pure
//!   Rust, WASM compatible)
//! - **Hardware Acceleration**: CUDA, `CoreML`, and CPU execution providers
//!   with availability-checked fallback
//! - **Load-Once Model Discipline**: the segmentation model loads once per
//!   engine and is reused by every request; concurrent first requests cannot
//!   race a duplicate load
//! - **Format Support**: PNG, JPEG, TIFF, BMP inputs; lossless PNG output
//!   preserving the alpha channel
//! - **Background Replacement**: fetches generated backgrounds over HTTP with
//!   enforced timeouts and composites with a deterministic bilinear resize
//! - **CLI Integration**: optional command-line interface (enable with the
//!   `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgswap::{MattingEngine, ModelSource, ModelSpec, RemovalConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Configure once at startup; the model loads lazily on first use
//! let config = RemovalConfig::builder()
//!     .model_spec(ModelSpec {
//!         source: ModelSource::File("models/u2net.onnx".into()),
//!         variant: None,
//!     })
//!     .build()?;
//! let engine = Arc::new(MattingEngine::new(config)?);
//!
//! // Share the engine across requests; each call reuses the loaded model
//! let input = tokio::fs::read("input.jpg").await?;
//! let png = engine.remove_background_async(input).await?;
//! tokio::fs::write("subject.png", png).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Background replacement
//!
//! ```rust,no_run
//! use bgswap::{replace_background, BackgroundFetcher, BackgroundGenerator};
//!
//! # async fn example(
//! #     subject_png: Vec<u8>,
//! #     generator: &dyn BackgroundGenerator,
//! # ) -> anyhow::Result<()> {
//! let fetcher = BackgroundFetcher::new()?;
//! let composite = replace_background(
//!     &subject_png,
//!     "a serene mountain landscape",
//!     generator,
//!     &fetcher,
//! )
//! .await?;
//! tokio::fs::write("composite.png", composite).await?;
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod inference;
pub mod matting;
pub mod models;
pub mod services;
pub mod types;
pub mod utils;

// Internal imports for lib functions
use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
pub use background::{
    replace_background, BackgroundFetcher, BackgroundGenerator, PromptRewriter,
};
pub use backends::*;
pub use compositor::Compositor;
pub use config::{BackendType, ExecutionProvider, OutputFormat, RemovalConfig};
pub use error::{BgSwapError, Result};
pub use inference::InferenceBackend;
pub use matting::{BackendFactory, DefaultBackendFactory, MattingEngine};
pub use models::{ModelManager, ModelSource, ModelSpec, PreprocessingConfig};
pub use services::OutputFormatHandler;
pub use types::{AlphaMatte, MattingResult, ProcessingMetadata, ProcessingTimings};
pub use utils::ImagePreprocessor;

/// Remove the background from an async reader stream
///
/// Accepts any async readable stream, making it suitable for processing
/// uploads from network streams or large files. The CPU-bound pipeline runs
/// on a blocking worker thread so it does not starve the async runtime.
///
/// # Arguments
///
/// * `reader` - Any type implementing `AsyncRead + Unpin`
/// * `engine` - A shared matting engine; the model is loaded at most once
///   over the engine's lifetime
///
/// # Returns
///
/// A [`MattingResult`] containing the RGBA subject, the matte, and timings
///
/// # Examples
///
/// ```rust,no_run
/// use bgswap::{remove_background_from_reader, MattingEngine, RemovalConfig};
/// use std::sync::Arc;
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let engine = Arc::new(MattingEngine::new(RemovalConfig::default())?);
/// let file = File::open("input.jpg").await?;
/// let result = remove_background_from_reader(file, &engine).await?;
/// result.save_png("output.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    engine: &Arc<MattingEngine>,
) -> Result<MattingResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer)
        .await
        .map_err(|e| BgSwapError::internal(format!("Failed to read from stream: {e}")))?;

    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || engine.process_bytes(&buffer))
        .await
        .map_err(|e| BgSwapError::internal(format!("Worker task failed: {e}")))?
}
