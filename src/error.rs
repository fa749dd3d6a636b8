//! Error types for background removal and compositing operations

use thiserror::Error;

/// Result type alias for background swap operations
pub type Result<T> = std::result::Result<T, BgSwapError>;

/// Error types for the matting and compositing pipeline
#[derive(Error, Debug)]
pub enum BgSwapError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or undecodable image bytes
    #[error("Decode error: {0}")]
    Decode(String),

    /// Model loading or initialization errors (missing, corrupt, incompatible weights)
    #[error("Model error: {0}")]
    Model(String),

    /// Backend inference errors (forward-pass failure, device OOM)
    #[error("Inference error: {0}")]
    Inference(String),

    /// Zero-size images or shape mismatches the pipeline cannot normalize
    #[error("Dimension error: {0}")]
    Dimension(String),

    /// Background fetch failures and timeouts
    #[error("Network error: {0}")]
    Network(String),

    /// Blend-stage failures, wrapping the causing stage's message
    #[error("Composite error: {0}")]
    Composite(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgSwapError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new dimension error
    pub fn dimension<S: Into<String>>(msg: S) -> Self {
        Self::Dimension(msg.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new composite error
    pub fn composite<S: Into<String>>(msg: S) -> Self {
        Self::Composite(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    // Enhanced contextual error creators

    /// Create a decode error with input context
    pub fn decode_error(input: &str, error: &image::ImageError) -> Self {
        Self::Decode(format!(
            "Failed to decode {input}: {error}. Supported formats: PNG, JPEG, TIFF, BMP"
        ))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
    ) -> Self {
        let path_display = model_path.as_ref().display();
        Self::Model(format!("Failed to {operation} model '{path_display}': {error}"))
    }

    /// Create network error preserving the transport-level cause
    pub fn network_error(context: &str, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            "timed out"
        } else if error.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        Self::Network(format!("{context} ({kind}): {error}"))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range})"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = BgSwapError::invalid_config("test config error");
        assert!(matches!(err, BgSwapError::InvalidConfig(_)));

        let err = BgSwapError::decode("not an image");
        assert!(matches!(err, BgSwapError::Decode(_)));

        let err = BgSwapError::network("fetch aborted");
        assert!(matches!(err, BgSwapError::Network(_)));
    }

    #[test]
    fn test_error_display() {
        let err = BgSwapError::invalid_config("Invalid model path");
        assert_eq!(err.to_string(), "Invalid configuration: Invalid model path");

        let err = BgSwapError::dimension("zero-size image");
        assert_eq!(err.to_string(), "Dimension error: zero-size image");
    }

    #[test]
    fn test_contextual_errors() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = BgSwapError::file_io_error("read weights", Path::new("/models/u2net.onnx"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("read weights"));
        assert!(error_string.contains("/models/u2net.onnx"));

        let err = BgSwapError::model_error_with_context(
            "initialize",
            Path::new("/models/missing.onnx"),
            "file not found",
        );
        let error_string = err.to_string();
        assert!(error_string.contains("initialize"));
        assert!(error_string.contains("/models/missing.onnx"));

        let err = BgSwapError::config_value_error("jpeg quality", 150, "0-100");
        let error_string = err.to_string();
        assert!(error_string.contains("150"));
        assert!(error_string.contains("0-100"));
    }

    #[test]
    fn test_network_distinct_from_decode() {
        // The HTTP boundary maps these to different status classes; the kinds
        // must never collapse into each other.
        let net = BgSwapError::network("backgrounds.example.com unreachable");
        let dec = BgSwapError::decode("truncated PNG");
        assert!(matches!(net, BgSwapError::Network(_)));
        assert!(matches!(dec, BgSwapError::Decode(_)));
    }
}
