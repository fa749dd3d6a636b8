//! Background image acquisition for replacement operations
//!
//! Generated backgrounds arrive as URLs from an external image-generation
//! collaborator; this module owns fetching them with enforced timeouts and
//! defines the collaborator contracts the surrounding service consumes.

use crate::compositor::Compositor;
use crate::error::{BgSwapError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug as trace_debug, info as trace_info};

/// Default timeout for background downloads
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// External collaborator producing a background image URL from a text prompt
///
/// Treated as an opaque black box (the reference implementation calls a
/// hosted diffusion model); the pipeline only needs the returned URL to be
/// fetchable.
#[async_trait]
pub trait BackgroundGenerator: Send + Sync {
    /// Generate a background image for the prompt, returning its URL
    ///
    /// # Errors
    /// - Generation service failures
    async fn generate_background(&self, prompt: &str) -> Result<String>;
}

/// External collaborator rewriting user prompts for better generation results
///
/// Contract only: consumed by callers outside this crate. `Ok(None)` is the
/// documented fallback when the rewriting service fails; it is not an error
/// path.
#[async_trait]
pub trait PromptRewriter: Send + Sync {
    /// Rewrite a prompt, or return `None` when no rewrite is available
    ///
    /// # Errors
    /// - Transport-level failures the caller wants surfaced
    async fn rewrite(&self, prompt: &str) -> Result<Option<String>>;
}

/// HTTP fetcher for background images with an enforced timeout
#[derive(Debug, Clone)]
pub struct BackgroundFetcher {
    client: reqwest::Client,
}

impl BackgroundFetcher {
    /// Create a fetcher with the default 30 second timeout
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a fetcher with a custom timeout
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BgSwapError::network_error("Failed to create HTTP client", &e))?;

        Ok(Self { client })
    }

    /// Download a background image, returning its encoded bytes
    ///
    /// Timeouts, connection failures, and non-success statuses all surface as
    /// the `Network` error kind, kept distinct from decode and inference
    /// failures so the caller can map them separately.
    ///
    /// # Errors
    /// - `Network` for any transport or status failure
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        trace_debug!(url, "Fetching background image");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BgSwapError::network_error("Background fetch failed", &e))?;

        let response = response.error_for_status().map_err(|e| {
            BgSwapError::network(format!("Background fetch returned error status: {e}"))
        })?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BgSwapError::network_error("Background download interrupted", &e))?;

        trace_debug!(size_bytes = bytes.len(), "Background image fetched");
        Ok(bytes.to_vec())
    }
}

/// Replace a subject's background with a freshly generated one
///
/// The end-to-end path behind background replacement: generate a background
/// from the prompt, fetch it, composite the subject over it. The subject is
/// expected to be the RGBA output of the matting engine, but any decodable
/// image works (a subject without alpha composites fully opaque).
///
/// # Errors
/// - `Network` for generation/fetch failures
/// - `Decode` / `Composite` from the compositing stages
pub async fn replace_background(
    subject_bytes: &[u8],
    prompt: &str,
    generator: &dyn BackgroundGenerator,
    fetcher: &BackgroundFetcher,
) -> Result<Vec<u8>> {
    trace_info!(prompt, "Generating replacement background");
    let url = generator.generate_background(prompt).await?;

    let background_bytes = fetcher.fetch(&url).await?;

    Compositor::compose(subject_bytes, &background_bytes)
}
