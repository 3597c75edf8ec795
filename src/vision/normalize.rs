//! Image normalization for OCR
//!
//! Turns an arbitrary photo or scan into a bounded, denoised, two-valued
//! raster: decode → bounded resize → grayscale → bilateral filter → Otsu.

use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GrayImage, ImageDecoder, ImageError, ImageReader, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use std::path::Path;
use tracing::debug;

use crate::config::PreprocessSettings;
use crate::error::NormalizeError;

/// Produces binarized rasters from image files
#[derive(Debug, Clone, Default)]
pub struct ImageNormalizer {
    settings: PreprocessSettings,
}

impl ImageNormalizer {
    pub fn new(settings: PreprocessSettings) -> Self {
        Self { settings }
    }

    /// Decode an image file and normalize it
    pub fn normalize_file(&self, path: &Path) -> Result<GrayImage, NormalizeError> {
        let image = decode(path)?;
        self.normalize(image)
    }

    /// Normalize a decoded image
    pub fn normalize(&self, image: DynamicImage) -> Result<GrayImage, NormalizeError> {
        ensure_pixels("decode", image.width(), image.height())?;
        let (src_w, src_h) = (image.width(), image.height());

        let image = bounded_resize(image, self.settings.max_dimension);
        ensure_pixels("resize", image.width(), image.height())?;

        let gray = to_grayscale(&image);
        let smoothed = bilateral_filter(
            &gray,
            self.settings.bilateral_diameter,
            self.settings.sigma_color,
            self.settings.sigma_space,
        );
        let (binary, level) = binarize_otsu(&smoothed);

        debug!(
            "Normalized {}x{} -> {}x{} raster (otsu level {})",
            src_w,
            src_h,
            binary.width(),
            binary.height(),
            level
        );

        Ok(binary)
    }
}

/// Decode an image file, sniffing the format from its content.
///
/// An EXIF orientation tag is applied, so photographed pages come out upright.
pub fn decode(path: &Path) -> Result<DynamicImage, NormalizeError> {
    let decode_error = |source: ImageError| NormalizeError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_error(ImageError::IoError(e)))?;
    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    let orientation = decoder.orientation().map_err(decode_error)?;

    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    if orientation != Orientation::NoTransforms {
        debug!("Applying EXIF orientation {:?}", orientation);
        image.apply_orientation(orientation);
    }
    Ok(image)
}

fn ensure_pixels(stage: &'static str, width: u32, height: u32) -> Result<(), NormalizeError> {
    if width == 0 || height == 0 {
        return Err(NormalizeError::EmptyRaster {
            stage,
            width,
            height,
        });
    }
    Ok(())
}

/// Target size after bounding the longest side to `max_dimension`.
///
/// Never upscales; the longest side of the result is at most `max_dimension`.
pub fn bounded_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }

    let scale = max_dimension as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);
    (scaled(width), scaled(height))
}

/// Downscale so the longest side fits `max_dimension`.
///
/// Triangle filtering widens its support with the reduction factor, so each
/// output pixel averages the source area it covers.
pub fn bounded_resize(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (new_w, new_h) = bounded_dimensions(width, height, max_dimension);
    if (new_w, new_h) == (width, height) {
        return image;
    }

    debug!("Downscaling {}x{} to {}x{}", width, height, new_w, new_h);
    image.resize_exact(new_w, new_h, FilterType::Triangle)
}

/// Convert to a single luminance channel (ITU-R BT.601 weights)
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }

    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let gray = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([gray.round().clamp(0.0, 255.0) as u8])
    })
}

/// Edge-preserving bilateral smoothing.
///
/// Each output pixel is the average of its circular neighbourhood of
/// `diameter` pixels, weighted by spatial distance and intensity difference.
/// Borders are mirrored without repeating the edge pixel.
pub fn bilateral_filter(gray: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let radius = (diameter / 2).max(1) as i64;

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let color_weights: Vec<f32> = (0..256u32)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = dx * dx + dy * dy;
            if r2 <= radius * radius {
                offsets.push((dx, dy, (r2 as f32 * space_coeff).exp()));
            }
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let center = gray.get_pixel(x, y)[0];
        let mut sum = 0.0f32;
        let mut weight_sum = 0.0f32;

        for &(dx, dy, space_weight) in &offsets {
            let nx = reflect_101(x as i64 + dx, width);
            let ny = reflect_101(y as i64 + dy, height);
            let value = gray.get_pixel(nx, ny)[0];
            let weight = space_weight * color_weights[center.abs_diff(value) as usize];
            sum += weight * value as f32;
            weight_sum += weight;
        }

        Luma([(sum / weight_sum).round().clamp(0.0, 255.0) as u8])
    })
}

/// Mirror an out-of-range index back into `0..len` (`dcb|abcd|cba`)
fn reflect_101(index: i64, len: u32) -> u32 {
    let last = len as i64 - 1;
    if last <= 0 {
        return 0;
    }

    let mut i = index;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as u32
}

/// Binarize with an automatically chosen Otsu threshold.
///
/// Pixels brighter than the level become white, the rest black. Returns the
/// raster and the level used.
pub fn binarize_otsu(gray: &GrayImage) -> (GrayImage, u8) {
    let level = otsu_level(gray);
    (threshold(gray, level, ThresholdType::Binary), level)
}
