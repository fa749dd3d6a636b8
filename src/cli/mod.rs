//! CLI module for the bgswap library
//!
//! This module is only available when the "cli" feature is enabled.

use crate::{
    config::{BackendType, ExecutionProvider, OutputFormat, RemovalConfig},
    error::BgSwapError,
    matting::MattingEngine,
    models::{ModelSource, ModelSpec},
    services::OutputFormatHandler,
    Compositor,
};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Background removal and replacement CLI
#[derive(Debug, Parser)]
#[command(name = "bgswap", version, about = "Remove or replace image backgrounds")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Remove the background from an image, producing an RGBA PNG
    Remove {
        /// Input image (PNG, JPEG, TIFF, BMP)
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Path to segmentation model weights (.onnx file or model directory)
        #[arg(short, long)]
        model: PathBuf,

        /// Inference backend
        #[arg(long, value_enum, default_value_t = CliBackend::Onnx)]
        backend: CliBackend,

        /// Execution provider
        #[arg(long, value_enum, default_value_t = CliProvider::Auto)]
        provider: CliProvider,

        /// Output format
        #[arg(long, value_enum, default_value_t = CliOutputFormat::Png)]
        format: CliOutputFormat,
    },
    /// Composite a subject over a background image
    Compose {
        /// Subject image (alpha channel respected when present)
        subject: PathBuf,

        /// Background image (stretched to the subject's dimensions)
        background: PathBuf,

        /// Output file path (PNG)
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Backend selection on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliBackend {
    Onnx,
    Tract,
}

impl From<CliBackend> for BackendType {
    fn from(value: CliBackend) -> Self {
        match value {
            CliBackend::Onnx => BackendType::Onnx,
            CliBackend::Tract => BackendType::Tract,
        }
    }
}

/// Execution provider selection on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliProvider {
    Auto,
    Cpu,
    Cuda,
    Coreml,
}

impl From<CliProvider> for ExecutionProvider {
    fn from(value: CliProvider) -> Self {
        match value {
            CliProvider::Auto => ExecutionProvider::Auto,
            CliProvider::Cpu => ExecutionProvider::Cpu,
            CliProvider::Cuda => ExecutionProvider::Cuda,
            CliProvider::Coreml => ExecutionProvider::CoreMl,
        }
    }
}

/// Output format selection on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(value: CliOutputFormat) -> Self {
        match value {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// CLI entry point
///
/// # Errors
/// - Any pipeline error, with file context attached
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Remove {
            input,
            output,
            model,
            backend,
            provider,
            format,
        } => {
            let format: OutputFormat = format.into();
            OutputFormatHandler::validate_for_matting(format);

            let source = if model.is_dir() {
                ModelSource::Directory(model)
            } else {
                ModelSource::File(model)
            };

            let config = RemovalConfig::builder()
                .backend_type(backend.into())
                .execution_provider(provider.into())
                .output_format(format)
                .model_spec(ModelSpec {
                    source,
                    variant: None,
                })
                .build()?;

            let engine = std::sync::Arc::new(MattingEngine::new(config)?);

            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("failed to read {}", input.display()))?;

            let result = engine.remove_background_async(bytes).await?;

            tokio::fs::write(&output, result)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;

            tracing::info!(
                input = %input.display(),
                output = %output.display(),
                "Background removed"
            );
        },
        Command::Compose {
            subject,
            background,
            output,
        } => {
            let subject_bytes = tokio::fs::read(&subject)
                .await
                .with_context(|| format!("failed to read {}", subject.display()))?;
            let background_bytes = tokio::fs::read(&background)
                .await
                .with_context(|| format!("failed to read {}", background.display()))?;

            let composite = tokio::task::spawn_blocking(move || {
                Compositor::compose(&subject_bytes, &background_bytes)
            })
            .await
            .map_err(|e| BgSwapError::internal(format!("Worker task failed: {e}")))??;

            tokio::fs::write(&output, composite)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;

            tracing::info!(
                subject = %subject.display(),
                background = %background.display(),
                output = %output.display(),
                "Composite written"
            );
        },
    }

    Ok(())
}
