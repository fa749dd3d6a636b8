//! Configuration types for the matting pipeline

use crate::models::ModelSpec;
use serde::{Deserialize, Serialize};

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        // Default to auto-detection for best performance
        Self::Auto
    }
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl Default for BackendType {
    fn default() -> Self {
        Self::Onnx
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency (lossless, the default)
    Png,
    /// JPEG (no transparency, alpha channel dropped)
    Jpeg,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

/// Configuration for background removal operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Backend type to use for inference
    pub backend_type: BackendType,

    /// Execution provider for the inference backend
    pub execution_provider: ExecutionProvider,

    /// Output format
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// Enable debug mode (additional logging and validation)
    pub debug: bool,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Model specification including source and variant
    pub model_spec: ModelSpec,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            debug: false,
            intra_threads: 0, // Auto-detect optimal intra-op threads
            inter_threads: 0, // Auto-detect optimal inter-op threads
            model_spec: ModelSpec::default(),
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bgswap::{RemovalConfig, ExecutionProvider};
    ///
    /// let config = RemovalConfig::builder()
    ///     .execution_provider(ExecutionProvider::Cpu)
    ///     .build()
    ///     .unwrap();
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Invalid JPEG quality value (must be 0-100)
    pub fn validate(&self) -> crate::Result<()> {
        if self.jpeg_quality > 100 {
            return Err(crate::error::BgSwapError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
            ));
        }

        Ok(())
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Set backend type
    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality (clamped to 0-100)
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(0, 100);
        self
    }

    /// Enable debug mode
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Set intra-op thread count (0 = auto)
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set inter-op thread count (0 = auto)
    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set the model specification
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    /// Build the configuration, validating parameters
    ///
    /// # Errors
    /// - Configuration validation failures
    pub fn build(self) -> crate::Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RemovalConfig::default();
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.jpeg_quality, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = RemovalConfig::builder()
            .execution_provider(ExecutionProvider::Cpu)
            .output_format(OutputFormat::Jpeg)
            .jpeg_quality(95)
            .debug(true)
            .intra_threads(4)
            .build()
            .unwrap();

        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.output_format, OutputFormat::Jpeg);
        assert_eq!(config.jpeg_quality, 95);
        assert!(config.debug);
        assert_eq!(config.intra_threads, 4);
    }

    #[test]
    fn test_quality_clamping_and_validation() {
        // Builder clamps out-of-range quality
        let config = RemovalConfig::builder().jpeg_quality(200).build().unwrap();
        assert_eq!(config.jpeg_quality, 100);

        // Manual mutation still caught by validate()
        let mut config = RemovalConfig::default();
        config.jpeg_quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("JPEG quality"));
        assert!(err.to_string().contains("101"));
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(ExecutionProvider::Auto.to_string(), "auto");
        assert_eq!(ExecutionProvider::Cpu.to_string(), "cpu");
        assert_eq!(ExecutionProvider::Cuda.to_string(), "cuda");
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
    }
}
