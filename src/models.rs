//! Model management for salient-object segmentation weights

use crate::error::{BgSwapError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// ONNX weight files probed inside a model directory, by variant
const ONNX_FILES: &[(&str, &str)] = &[("model.onnx", "fp32"), ("model_fp16.onnx", "fp16")];

/// Optional per-model metadata file inside a model directory
const MODEL_CONFIG_FILE: &str = "model.json";

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelSource {
    /// A bare `.onnx` weights file on the filesystem
    File(PathBuf),
    /// A model directory containing `model.onnx` (and optionally
    /// `model_fp16.onnx` and `model.json`)
    Directory(PathBuf),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::File(path) => format!(
                "file:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            ModelSource::Directory(path) => format!(
                "dir:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
        }
    }
}

/// Complete model specification including source and optional precision variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    /// Precision variant for directory sources ("fp32" or "fp16"); `None`
    /// selects the first available weights file
    pub variant: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::File(PathBuf::from("models/u2net.onnx")),
            variant: None,
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Preprocessing configuration for the segmentation model
///
/// The normalization constants are fixed, documented values matching the
/// weights the model was trained with; they are never derived from the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input resolution as [width, height]
    pub target_size: [u32; 2],
    /// Per-channel mean subtracted after scaling to [0, 1]
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation divisor
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        // ImageNet statistics, the convention for U2Net-family checkpoints
        Self {
            target_size: [320, 320],
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        }
    }
}

/// Schema of the optional `model.json` metadata file in a model directory
#[derive(Debug, Clone, Deserialize)]
struct ModelConfigFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    target_size: Option<[u32; 2]>,
    #[serde(default)]
    normalization_mean: Option<[f32; 3]>,
    #[serde(default)]
    normalization_std: Option<[f32; 3]>,
}

/// Manager resolving a [`ModelSpec`] into weights bytes and metadata
#[derive(Debug, Clone)]
pub struct ModelManager {
    spec: ModelSpec,
    preprocessing: PreprocessingConfig,
    name: String,
}

impl ModelManager {
    /// Create a manager from a model specification
    ///
    /// Reads the directory's `model.json` (when present) to override the
    /// default preprocessing configuration.
    ///
    /// # Errors
    /// - Metadata file present but unparseable
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        let mut preprocessing = PreprocessingConfig::default();
        let mut name = match &spec.source {
            ModelSource::File(path) | ModelSource::Directory(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string()),
        };

        if let ModelSource::Directory(dir) = &spec.source {
            let config_path = dir.join(MODEL_CONFIG_FILE);
            if config_path.exists() {
                let raw = fs::read_to_string(&config_path).map_err(|e| {
                    BgSwapError::file_io_error("read model metadata", &config_path, &e)
                })?;
                let parsed: ModelConfigFile = serde_json::from_str(&raw).map_err(|e| {
                    BgSwapError::model_error_with_context(
                        "parse metadata for",
                        &config_path,
                        &e.to_string(),
                    )
                })?;
                if let Some(n) = parsed.name {
                    name = n;
                }
                if let Some(size) = parsed.target_size {
                    preprocessing.target_size = size;
                }
                if let Some(mean) = parsed.normalization_mean {
                    preprocessing.normalization_mean = mean;
                }
                if let Some(std) = parsed.normalization_std {
                    preprocessing.normalization_std = std;
                }
            }
        }

        Ok(Self {
            spec: spec.clone(),
            preprocessing,
            name,
        })
    }

    /// Resolve the weights file for this spec, honoring the variant
    fn weights_path(&self) -> Result<(PathBuf, String)> {
        match &self.spec.source {
            ModelSource::File(path) => {
                if !path.exists() {
                    return Err(BgSwapError::model_error_with_context(
                        "locate",
                        path,
                        "weights file not found",
                    ));
                }
                Ok((path.clone(), "fp32".to_string()))
            },
            ModelSource::Directory(dir) => {
                for (file_name, precision) in ONNX_FILES {
                    if let Some(ref wanted) = self.spec.variant {
                        if wanted != precision {
                            continue;
                        }
                    }
                    let candidate = dir.join(file_name);
                    if candidate.exists() {
                        return Ok((candidate, (*precision).to_string()));
                    }
                }
                Err(BgSwapError::model_error_with_context(
                    "locate weights in",
                    dir,
                    &format!(
                        "no matching variant ({})",
                        self.spec.variant.as_deref().unwrap_or("any")
                    ),
                ))
            },
        }
    }

    /// Load the model weights as bytes
    ///
    /// # Errors
    /// - Weights file missing or unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let (path, _) = self.weights_path()?;
        log::debug!("Loading model weights from {}", path.display());
        fs::read(&path).map_err(|e| BgSwapError::file_io_error("read model weights", &path, &e))
    }

    /// Get model information
    ///
    /// # Errors
    /// - Weights file missing (size cannot be determined)
    pub fn get_info(&self) -> Result<ModelInfo> {
        let (path, precision) = self.weights_path()?;
        let size_bytes = fs::metadata(&path)
            .map_err(|e| BgSwapError::file_io_error("stat model weights", &path, &e))?
            .len() as usize;

        let [width, height] = self.preprocessing.target_size;
        Ok(ModelInfo {
            name: self.name.clone(),
            precision,
            size_bytes,
            input_shape: (1, 3, height as usize, width as usize),
            output_shape: (1, 1, height as usize, width as usize),
        })
    }

    /// Get the preprocessing configuration for this model
    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing.clone())
    }
}
