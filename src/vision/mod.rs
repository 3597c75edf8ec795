//! Vision/OCR Layer
//!
//! Normalizes the input image into a binarized raster and extracts text from
//! it. Text extraction sits behind [`TextRecognizer`] so the pipeline can run
//! against the ONNX engine or a deterministic stand-in.

pub mod ctc;
pub mod detection;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod paragraph;
pub mod preprocess;

use anyhow::Result;
use image::GrayImage;

use crate::config::RecognitionSettings;

pub use models::ModelStore;
pub use normalize::ImageNormalizer;
pub use ocr::LazyOcrEngine;

/// Detect-and-read capability: binarized raster in, ordered text fragments out
pub trait TextRecognizer: Send + Sync {
    /// Text fragments in reading order; paragraphs when `settings.paragraph`
    /// is set, single lines otherwise
    fn read_paragraphs(&self, raster: &GrayImage, settings: &RecognitionSettings) -> Result<Vec<String>>;
}
