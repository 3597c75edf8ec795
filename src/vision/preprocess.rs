//! Image preprocessing for OCR models
//!
//! Handles resizing, normalization, and tensor conversion of the binarized
//! raster for the detection and recognition models. The raster has a single
//! channel; it is replicated into the three channels the models expect.

use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;

/// Preprocessing configuration
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Mean values for detection normalization [R, G, B]
    pub det_mean: [f32; 3],
    /// Std values for detection normalization [R, G, B]
    pub det_std: [f32; 3],
    /// Mean values for recognition normalization [R, G, B]
    pub rec_mean: [f32; 3],
    /// Std values for recognition normalization [R, G, B]
    pub rec_std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            // DB detector is trained with ImageNet statistics
            det_mean: [0.485, 0.456, 0.406],
            det_std: [0.229, 0.224, 0.225],
            // CRNN recognizer maps [0, 255] -> [-1, 1]
            rec_mean: [0.5, 0.5, 0.5],
            rec_std: [0.5, 0.5, 0.5],
        }
    }
}

/// Detection model input
#[derive(Debug)]
pub struct DetectionInput {
    /// NCHW tensor, padded to multiples of 32
    pub tensor: Array4<f32>,
    /// Canvas pixels per raster pixel
    pub ratio: f32,
}

/// Canvas size for detection: magnified by `mag_ratio`, longest side capped
/// at `canvas_size`. Returns (width, height, ratio).
pub fn detection_canvas(width: u32, height: u32, canvas_size: u32, mag_ratio: f32) -> (u32, u32, f32) {
    let longest = width.max(height) as f32;
    let target = (mag_ratio * longest).min(canvas_size as f32);
    let ratio = target / longest;

    let new_w = ((width as f32 * ratio).round() as u32).max(1);
    let new_h = ((height as f32 * ratio).round() as u32).max(1);
    (new_w, new_h, ratio)
}

/// Round up to the next multiple of 32 (required by the detector)
pub fn pad_to_32(side: u32) -> u32 {
    side.div_ceil(32) * 32
}

/// Width of a line crop resized to `target_height`, capped at `max_width`
pub fn recognition_width(width: u32, height: u32, target_height: u32, max_width: u32) -> u32 {
    if height == 0 {
        return 1;
    }
    let scaled = (target_height as f32 * width as f32 / height as f32).ceil() as u32;
    scaled.clamp(1, max_width)
}

/// Full preprocessing pipeline for detection
pub fn preprocess_for_detection(
    raster: &GrayImage,
    canvas_size: u32,
    mag_ratio: f32,
    config: &PreprocessConfig,
) -> DetectionInput {
    let (width, height) = raster.dimensions();
    let (new_w, new_h, ratio) = detection_canvas(width, height, canvas_size, mag_ratio);

    let resized;
    let source = if (new_w, new_h) == (width, height) {
        raster
    } else {
        resized = image::imageops::resize(raster, new_w, new_h, FilterType::Triangle);
        &resized
    };

    let padded_h = pad_to_32(new_h) as usize;
    let padded_w = pad_to_32(new_w) as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, padded_h, padded_w));

    for c in 0..3 {
        let padding = (0.0 - config.det_mean[c]) / config.det_std[c];
        tensor
            .slice_mut(ndarray::s![0, c, .., ..])
            .fill(padding);
    }

    for (x, y, pixel) in source.enumerate_pixels() {
        let value = pixel[0] as f32 / 255.0;
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (value - config.det_mean[c]) / config.det_std[c];
        }
    }

    DetectionInput { tensor, ratio }
}

/// Full preprocessing pipeline for a batch of recognition crops.
///
/// Every crop is resized to `target_height`; the batch is as wide as its
/// widest crop and narrower crops are zero-padded on the right.
pub fn preprocess_for_recognition(
    crops: &[GrayImage],
    target_height: u32,
    max_width: u32,
    config: &PreprocessConfig,
) -> Array4<f32> {
    let widths: Vec<u32> = crops
        .iter()
        .map(|crop| recognition_width(crop.width(), crop.height(), target_height, max_width))
        .collect();
    let batch_w = widths.iter().copied().max().unwrap_or(1) as usize;
    let h = target_height as usize;

    let mut tensor = Array4::<f32>::zeros((crops.len(), 3, h, batch_w));

    for (n, (crop, &w)) in crops.iter().zip(&widths).enumerate() {
        let resized = image::imageops::resize(crop, w, target_height, FilterType::Triangle);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let value = pixel[0] as f32 / 255.0;
            for c in 0..3 {
                tensor[[n, c, y as usize, x as usize]] = (value - config.rec_mean[c]) / config.rec_std[c];
            }
        }
    }

    tensor
}
