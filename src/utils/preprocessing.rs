//! Shared image preprocessing utilities
//!
//! Converts decoded images into the normalized NCHW tensors the segmentation
//! models consume.

use crate::{
    error::{BgSwapError, Result},
    models::PreprocessingConfig,
};
use image::DynamicImage;
use ndarray::Array4;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image for model inference
    ///
    /// This function handles:
    /// - RGB conversion (any input channel count)
    /// - Stretch resize to the model's fixed input resolution (Triangle
    ///   filter, the documented deterministic contract)
    /// - Scaling to [0, 1] and per-channel mean/std normalization
    /// - NCHW tensor layout with a leading batch dimension of 1
    ///
    /// # Arguments
    /// * `image` - Input image to preprocess
    /// * `preprocessing_config` - Model preprocessing configuration
    ///
    /// # Returns
    /// * `Ok(tensor)` - Preprocessed tensor ready for inference
    /// * `Err(BgSwapError)` - On zero-sized input
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    // Casting is acceptable for image processing math - precision loss is expected
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let (orig_width, orig_height) = (image.width(), image.height());
        if orig_width == 0 || orig_height == 0 {
            return Err(BgSwapError::dimension(format!(
                "Cannot preprocess zero-size image ({orig_width}x{orig_height})"
            )));
        }

        let [target_width, target_height] = preprocessing_config.target_size;

        // Convert to RGB and stretch to the model resolution. Aspect ratio is
        // not preserved; the matte is stretched back the same way afterwards.
        let rgb_image = image.to_rgb8();
        let resized = image::imageops::resize(
            &rgb_image,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        let width = target_width as usize;
        let height = target_height as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, height, width));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match the resized image
        for (x, y, pixel) in resized.enumerate_pixels() {
            let x = x as usize;
            let y = y as usize;
            // Convert to 0-1 range and apply normalization
            tensor[[0, 0, y, x]] = (f32::from(pixel[0]) / 255.0
                - preprocessing_config.normalization_mean[0])
                / preprocessing_config.normalization_std[0];
            tensor[[0, 1, y, x]] = (f32::from(pixel[1]) / 255.0
                - preprocessing_config.normalization_mean[1])
                / preprocessing_config.normalization_std[1];
            tensor[[0, 2, y, x]] = (f32::from(pixel[2]) / 255.0
                - preprocessing_config.normalization_mean[2])
                / preprocessing_config.normalization_std[2];
        }

        Ok(tensor)
    }
}
