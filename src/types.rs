//! Core types for matting and compositing operations

use crate::{config::OutputFormat, error::Result};
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-pixel opacity map in [0, 255], the product of the matting engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaMatte {
    /// Matte data as grayscale values (0-255)
    pub data: Vec<u8>,

    /// Matte dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl AlphaMatte {
    /// Create a new alpha matte, validating that the data length matches the
    /// dimensions
    ///
    /// # Errors
    /// - Data length does not equal width * height
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let (width, height) = dimensions;
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(crate::error::BgSwapError::dimension(format!(
                "Matte data length {} does not match {}x{} ({} expected)",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Create a matte from a grayscale image
    #[must_use]
    pub fn from_image(image: &ImageBuffer<image::Luma<u8>, Vec<u8>>) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.as_raw().clone(),
            dimensions: (width, height),
        }
    }

    /// Convert the matte to a grayscale image
    pub fn to_image(&self) -> Result<ImageBuffer<image::Luma<u8>, Vec<u8>>> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            crate::error::BgSwapError::internal("Failed to create image from matte data")
        })
    }

    /// Resize the matte to new dimensions
    ///
    /// Uses Triangle (bilinear) interpolation, the crate-wide fixed resize
    /// contract.
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<AlphaMatte> {
        let current_image = self.to_image()?;
        let resized = image::imageops::resize(
            &current_image,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );

        Ok(AlphaMatte::from_image(&resized))
    }

    /// Write the matte into the alpha channel of an RGBA image
    ///
    /// # Errors
    /// - Image and matte dimensions do not match
    pub fn apply_to_image(&self, image: &mut ImageBuffer<Rgba<u8>, Vec<u8>>) -> Result<()> {
        let (img_width, img_height) = image.dimensions();
        if (img_width, img_height) != self.dimensions {
            return Err(crate::error::BgSwapError::dimension(format!(
                "Image {img_width}x{img_height} and matte {}x{} dimensions do not match",
                self.dimensions.0, self.dimensions.1
            )));
        }

        for (pixel, &alpha) in image.pixels_mut().zip(self.data.iter()) {
            pixel[3] = alpha;
        }

        Ok(())
    }

    /// Save the matte as a grayscale PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let image = self.to_image()?;
        image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| crate::error::BgSwapError::internal(format!("Failed to save matte: {e}")))?;
        Ok(())
    }
}

/// Detailed timing breakdown for a matting run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first call only)
    pub model_load_ms: u64,

    /// Image decoding from bytes
    pub image_decode_ms: u64,

    /// Image preprocessing (resize, normalize, tensor conversion)
    pub preprocessing_ms: u64,

    /// Inference execution
    pub inference_ms: u64,

    /// Postprocessing (matte generation, alpha application)
    pub postprocessing_ms: u64,

    /// Final image encoding (if requested)
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

/// Metadata about a matting operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Detailed timing breakdown
    pub timings: ProcessingTimings,

    /// Model used for inference
    pub model_name: String,

    /// Model precision used
    pub model_precision: String,
}

impl ProcessingMetadata {
    /// Create new processing metadata
    #[must_use]
    pub fn new(model_name: String) -> Self {
        Self {
            timings: ProcessingTimings::default(),
            model_name,
            model_precision: "fp32".to_string(),
        }
    }
}

/// Result of a background removal operation
#[derive(Debug, Clone)]
pub struct MattingResult {
    /// The foreground subject as an RGBA image, matte in the alpha channel
    pub image: DynamicImage,

    /// The alpha matte used for removal, at the original image resolution
    pub matte: AlphaMatte,

    /// Original image dimensions
    pub original_dimensions: (u32, u32),

    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl MattingResult {
    /// Create a new matting result
    #[must_use]
    pub fn new(
        image: DynamicImage,
        matte: AlphaMatte,
        original_dimensions: (u32, u32),
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            matte,
            original_dimensions,
            metadata,
        }
    }

    /// Save the result as PNG with alpha channel
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| crate::error::BgSwapError::internal(format!("Failed to save PNG: {e}")))?;
        Ok(())
    }

    /// Get the image as encoded bytes in the specified format
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Png => {
                let mut buffer = Vec::new();
                let mut cursor = std::io::Cursor::new(&mut buffer);
                self.image
                    .write_to(&mut cursor, image::ImageFormat::Png)
                    .map_err(|e| {
                        crate::error::BgSwapError::internal(format!("PNG encoding failed: {e}"))
                    })?;
                Ok(buffer)
            },
            OutputFormat::Jpeg => {
                let mut buffer = Vec::new();
                let mut cursor = std::io::Cursor::new(&mut buffer);
                let rgb_image = self.image.to_rgb8();
                let mut jpeg_encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
                jpeg_encoder.encode_image(&rgb_image).map_err(|e| {
                    crate::error::BgSwapError::internal(format!("JPEG encoding failed: {e}"))
                })?;
                Ok(buffer)
            },
            OutputFormat::Rgba8 => Ok(self.image.to_rgba8().into_raw()),
        }
    }

    /// Get image dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Get detailed timing breakdown
    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_matte_creation_validates_length() {
        let matte = AlphaMatte::new(vec![255, 128, 0, 255], (2, 2)).unwrap();
        assert_eq!(matte.dimensions, (2, 2));
        assert_eq!(matte.data.len(), 4);

        let err = AlphaMatte::new(vec![255; 3], (2, 2)).unwrap_err();
        assert!(matches!(err, crate::error::BgSwapError::Dimension(_)));
    }

    #[test]
    fn test_matte_apply_to_image() {
        let matte = AlphaMatte::new(vec![0, 64, 128, 255], (2, 2)).unwrap();
        let mut image = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));

        matte.apply_to_image(&mut image).unwrap();

        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert_eq!(image.get_pixel(1, 0)[3], 64);
        assert_eq!(image.get_pixel(0, 1)[3], 128);
        assert_eq!(image.get_pixel(1, 1)[3], 255);
        // Color channels untouched
        assert_eq!(image.get_pixel(0, 0)[0], 10);
    }

    #[test]
    fn test_matte_apply_dimension_mismatch() {
        let matte = AlphaMatte::new(vec![255; 4], (2, 2)).unwrap();
        let mut image = RgbaImage::new(3, 3);
        let err = matte.apply_to_image(&mut image).unwrap_err();
        assert!(matches!(err, crate::error::BgSwapError::Dimension(_)));
    }

    #[test]
    fn test_matte_resize() {
        let matte = AlphaMatte::new(vec![255; 16], (4, 4)).unwrap();
        let resized = matte.resize(8, 2).unwrap();
        assert_eq!(resized.dimensions, (8, 2));
        assert_eq!(resized.data.len(), 16);
        // Constant matte stays constant under interpolation
        assert!(resized.data.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_png_round_trip_preserves_pixels() {
        let rgba = RgbaImage::from_fn(5, 3, |x, y| {
            Rgba([x as u8 * 40, y as u8 * 80, 200, 128 + x as u8])
        });
        let matte = AlphaMatte::new(vec![255; 15], (5, 3)).unwrap();
        let result = MattingResult::new(
            DynamicImage::ImageRgba8(rgba.clone()),
            matte,
            (5, 3),
            ProcessingMetadata::new("test".to_string()),
        );

        let bytes = result.to_bytes(OutputFormat::Png, 100).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, rgba);
    }

    #[test]
    fn test_to_bytes_rgba8_raw_length() {
        let rgba = RgbaImage::new(4, 4);
        let matte = AlphaMatte::new(vec![0; 16], (4, 4)).unwrap();
        let result = MattingResult::new(
            DynamicImage::ImageRgba8(rgba),
            matte,
            (4, 4),
            ProcessingMetadata::new("test".to_string()),
        );

        let raw = result.to_bytes(OutputFormat::Rgba8, 100).unwrap();
        assert_eq!(raw.len(), 4 * 4 * 4);
    }
}
