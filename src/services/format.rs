//! Output format handling service
//!
//! Separates output format conversion logic from the pipeline, keeping the
//! alpha-dropping rules in one place.

use crate::{config::OutputFormat, error::Result};
use image::{DynamicImage, ImageBuffer, RgbaImage};

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an RGBA image to the specified output format
    ///
    /// # Errors
    /// Currently infallible; kept fallible for parity with encoder paths.
    pub fn convert_format(rgba_image: RgbaImage, format: OutputFormat) -> Result<DynamicImage> {
        match format {
            OutputFormat::Png | OutputFormat::Rgba8 => Ok(DynamicImage::ImageRgba8(rgba_image)),
            OutputFormat::Jpeg => {
                // Convert RGBA to RGB by dropping the alpha channel
                let (width, height) = rgba_image.dimensions();
                let mut rgb_image = ImageBuffer::new(width, height);

                for (x, y, pixel) in rgba_image.enumerate_pixels() {
                    rgb_image.put_pixel(x, y, image::Rgb([pixel[0], pixel[1], pixel[2]]));
                }

                Ok(DynamicImage::ImageRgb8(rgb_image))
            },
        }
    }

    /// Get the appropriate file extension for a given output format
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Rgba8 => "raw",
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::Rgba8 => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Warn when a format cannot represent the matting result's transparency
    pub fn validate_for_matting(format: OutputFormat) {
        if !Self::supports_transparency(format) {
            log::warn!(
                "Output format {format:?} does not support transparency; the removed background will appear solid"
            );
        }
    }
}
