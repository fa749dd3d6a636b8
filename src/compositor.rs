//! Compositor: alpha-blending a foreground subject over a background image
//!
//! The compositor is stateless; every operation is a pure function over its
//! inputs. Channel order is RGB throughout.

use crate::error::{BgSwapError, Result};
use image::{DynamicImage, RgbImage};
use tracing::debug as trace_debug;

/// Stateless compositing operations
pub struct Compositor;

impl Compositor {
    /// Decode a subject/background pair from encoded bytes
    ///
    /// The subject is decoded preserving any alpha channel; the background is
    /// forced to opaque RGB.
    ///
    /// # Errors
    /// - `Decode` naming whichever input failed
    /// - `Dimension` for zero-size inputs
    pub fn decode_pair(
        subject_bytes: &[u8],
        background_bytes: &[u8],
    ) -> Result<(DynamicImage, RgbImage)> {
        let subject = image::load_from_memory(subject_bytes)
            .map_err(|e| BgSwapError::decode_error("subject image", &e))?;
        let background = image::load_from_memory(background_bytes)
            .map_err(|e| BgSwapError::decode_error("background image", &e))?
            .to_rgb8();

        if subject.width() == 0 || subject.height() == 0 {
            return Err(BgSwapError::dimension("Subject image has zero size"));
        }
        if background.width() == 0 || background.height() == 0 {
            return Err(BgSwapError::dimension("Background image has zero size"));
        }

        Ok((subject, background))
    }

    /// Resize the background to exactly match the subject's dimensions
    ///
    /// The stretch is the sole adaptation; aspect ratio is deliberately not
    /// preserved, so a mismatched background distorts rather than crops.
    #[must_use]
    pub fn align(subject: &DynamicImage, background: &RgbImage) -> RgbImage {
        let (width, height) = (subject.width(), subject.height());
        if background.dimensions() == (width, height) {
            return background.clone();
        }

        trace_debug!(
            from = %format!("{}x{}", background.width(), background.height()),
            to = %format!("{width}x{height}"),
            "Stretching background to subject dimensions"
        );
        image::imageops::resize(
            background,
            width,
            height,
            image::imageops::FilterType::Triangle,
        )
    }

    /// Extract the subject's per-pixel alpha as values in [0, 1]
    ///
    /// Subjects carrying an alpha channel contribute channel 4 divided by
    /// 255. Subjects without one default to fully opaque everywhere, so the
    /// composite equals the subject; callers wanting background contribution
    /// must supply a real matte.
    #[must_use]
    pub fn extract_alpha(subject: &DynamicImage) -> Vec<f32> {
        if subject.color().has_alpha() {
            subject
                .to_rgba8()
                .pixels()
                .map(|p| f32::from(p[3]) / 255.0)
                .collect()
        } else {
            vec![1.0; subject.width() as usize * subject.height() as usize]
        }
    }

    /// Blend a subject over a background with a per-pixel alpha
    ///
    /// Per pixel and channel: `alpha * subject + (1 - alpha) * background`,
    /// computed in f32 and truncated to u8 (no rounding, matching the
    /// reference blend bit-for-bit). Alpha is broadcast identically across
    /// all three channels.
    ///
    /// # Errors
    /// - `Dimension` when image dimensions or the alpha length disagree
    pub fn blend(
        subject_rgb: &RgbImage,
        background: &RgbImage,
        alpha: &[f32],
    ) -> Result<RgbImage> {
        let (width, height) = subject_rgb.dimensions();
        if background.dimensions() != (width, height) {
            return Err(BgSwapError::dimension(format!(
                "Background {}x{} does not match subject {width}x{height}",
                background.width(),
                background.height()
            )));
        }
        let expected = width as usize * height as usize;
        if alpha.len() != expected {
            return Err(BgSwapError::dimension(format!(
                "Alpha length {} does not match {width}x{height} ({expected} expected)",
                alpha.len()
            )));
        }

        let mut result = RgbImage::new(width, height);
        for (((x, y, fg), bg), &a) in subject_rgb
            .enumerate_pixels()
            .zip(background.pixels())
            .zip(alpha.iter())
        {
            let mut out = [0u8; 3];
            for c in 0..3 {
                let value = a * f32::from(fg[c]) + (1.0 - a) * f32::from(bg[c]);
                out[c] = value as u8;
            }
            result.put_pixel(x, y, image::Rgb(out));
        }

        Ok(result)
    }

    /// Composite a decoded subject over a decoded background
    ///
    /// # Errors
    /// - `Composite` wrapping the failing stage's message
    pub fn compose_images(subject: &DynamicImage, background: &RgbImage) -> Result<RgbImage> {
        let aligned = Self::align(subject, background);
        let alpha = Self::extract_alpha(subject);
        let subject_rgb = subject.to_rgb8();
        Self::blend(&subject_rgb, &aligned, &alpha)
            .map_err(|e| BgSwapError::composite(format!("Blend stage failed: {e}")))
    }

    /// End-to-end composition: decode, align, extract alpha, blend, encode
    ///
    /// Output is PNG, encoded losslessly. Nothing is written to disk at any
    /// point; a failure surfaces a single typed error and no partial output.
    ///
    /// # Errors
    /// - `Decode` for malformed inputs
    /// - `Composite` wrapping any later stage failure
    pub fn compose(subject_bytes: &[u8], background_bytes: &[u8]) -> Result<Vec<u8>> {
        let (subject, background) = Self::decode_pair(subject_bytes, background_bytes)?;
        let composite = Self::compose_images(&subject, &background)?;

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        DynamicImage::ImageRgb8(composite)
            .write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| BgSwapError::composite(format!("PNG encoding failed: {e}")))?;

        Ok(buffer)
    }
}
