//! OCR (Optical Character Recognition) module
//!
//! Runs a text detector and a CTC line recognizer through ONNX Runtime over
//! the binarized raster and returns paragraph-level text fragments.

use anyhow::{Context, Result};
use image::{imageops, GrayImage};
use parking_lot::Mutex;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info};

use super::ctc::CtcDecoder;
use super::detection::{extract_text_boxes, ProbabilityMap};
use super::models::{ModelStore, ModelType, OnnxSession};
use super::paragraph::{group_paragraphs, TextLine};
use super::preprocess::{preprocess_for_detection, preprocess_for_recognition, PreprocessConfig};
use super::TextRecognizer;
use crate::config::{ModelSettings, RecognitionSettings};

/// OCR engine backed by ONNX detection and recognition models
pub struct OcrEngine {
    detector: Mutex<OnnxSession>,
    recognizer: Mutex<OnnxSession>,
    decoder: CtcDecoder,
    preprocess: PreprocessConfig,
}

impl OcrEngine {
    /// Load and verify the models in `store`
    pub fn from_store(
        store: &ModelStore,
        recognition: &RecognitionSettings,
        models: &ModelSettings,
    ) -> Result<Self> {
        let start = Instant::now();
        store
            .verify(&recognition.languages)
            .with_context(|| format!("Model set in {:?} is not usable", store.models_dir()))?;

        let detector = OnnxSession::new(&store.require(ModelType::Detection)?, models.intra_threads)?;
        let recognizer = OnnxSession::new(&store.require(ModelType::Recognition)?, models.intra_threads)?;
        let decoder = CtcDecoder::from_file(&store.require(ModelType::Dictionary)?)?;

        info!(
            "OCR engine ready in {:?} ({} recognition classes)",
            start.elapsed(),
            decoder.class_count()
        );

        Ok(Self {
            detector: Mutex::new(detector),
            recognizer: Mutex::new(recognizer),
            decoder,
            preprocess: PreprocessConfig::default(),
        })
    }

    /// Line boxes in raster coordinates, in reading order
    fn detect(&self, raster: &GrayImage, settings: &RecognitionSettings) -> Result<Vec<(u32, u32, u32, u32)>> {
        let input = preprocess_for_detection(
            raster,
            settings.canvas_size,
            settings.mag_ratio,
            &self.preprocess,
        );
        let map = self
            .detector
            .lock()
            .run(&input.tensor, ProbabilityMap::from_tensor)
            .context("Text detection failed")?;

        Ok(extract_text_boxes(
            &map,
            settings,
            input.ratio,
            raster.width(),
            raster.height(),
        ))
    }

    /// Read every box, `batch_size` crops per forward pass
    fn recognize_lines(
        &self,
        raster: &GrayImage,
        boxes: &[(u32, u32, u32, u32)],
        settings: &RecognitionSettings,
    ) -> Result<Vec<TextLine>> {
        let mut lines = Vec::with_capacity(boxes.len());

        for batch in boxes.chunks(settings.batch_size.max(1)) {
            let crops: Vec<GrayImage> = batch.iter().map(|&bounds| crop(raster, bounds)).collect();
            let tensor = preprocess_for_recognition(
                &crops,
                settings.rec_height,
                settings.rec_max_width,
                &self.preprocess,
            );

            let texts = self
                .recognizer
                .lock()
                .run(&tensor, |shape, data| self.decoder.decode(shape, data))
                .context("Text recognition failed")?;

            for (&bounds, text) in batch.iter().zip(texts) {
                if text.is_empty() {
                    continue;
                }
                lines.push(TextLine::new(text, bounds));
            }
        }

        Ok(lines)
    }
}

impl TextRecognizer for OcrEngine {
    fn read_paragraphs(&self, raster: &GrayImage, settings: &RecognitionSettings) -> Result<Vec<String>> {
        let start = Instant::now();

        let boxes = self.detect(raster, settings)?;
        if boxes.is_empty() {
            debug!("No text regions detected");
            return Ok(vec![]);
        }

        let lines = self.recognize_lines(raster, &boxes, settings)?;
        let fragments = if settings.paragraph {
            group_paragraphs(&lines, settings.x_ths, settings.y_ths)
        } else {
            lines.into_iter().map(|line| line.text).collect()
        };

        debug!(
            "OCR complete in {:?}: {} boxes, {} fragments",
            start.elapsed(),
            boxes.len(),
            fragments.len()
        );
        Ok(fragments)
    }
}

/// Loads the OCR engine from its store on the first recognition call
pub struct LazyOcrEngine {
    store: ModelStore,
    models: ModelSettings,
    engine: OnceLock<OcrEngine>,
}

impl LazyOcrEngine {
    pub fn new(store: ModelStore, models: ModelSettings) -> Self {
        Self {
            store,
            models,
            engine: OnceLock::new(),
        }
    }

    fn engine(&self, settings: &RecognitionSettings) -> Result<&OcrEngine> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }
        let engine = OcrEngine::from_store(&self.store, settings, &self.models)?;
        Ok(self.engine.get_or_init(|| engine))
    }
}

impl TextRecognizer for LazyOcrEngine {
    fn read_paragraphs(&self, raster: &GrayImage, settings: &RecognitionSettings) -> Result<Vec<String>> {
        self.engine(settings)?.read_paragraphs(raster, settings)
    }
}

/// Copy a box out of the raster
fn crop(raster: &GrayImage, (x, y, width, height): (u32, u32, u32, u32)) -> GrayImage {
    imageops::crop_imm(raster, x, y, width, height).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use tempfile::TempDir;

    #[test]
    fn test_crop_copies_region() {
        let raster = GrayImage::from_fn(20, 10, |x, _| Luma([if x >= 10 { 255 } else { 0 }]));
        let piece = crop(&raster, (8, 2, 4, 3));

        assert_eq!(piece.dimensions(), (4, 3));
        assert_eq!(piece.get_pixel(0, 0)[0], 0);
        assert_eq!(piece.get_pixel(3, 2)[0], 255);
    }

    #[test]
    fn test_from_store_requires_models() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::with_dir(dir.path().to_path_buf());

        let result = OcrEngine::from_store(
            &store,
            &RecognitionSettings::default(),
            &ModelSettings::default(),
        );
        let message = format!("{:#}", result.err().unwrap());
        assert!(message.contains("det.onnx"));
    }

    #[test]
    fn test_lazy_engine_reports_missing_models_on_first_use() {
        let dir = TempDir::new().unwrap();
        let lazy = LazyOcrEngine::new(ModelStore::with_dir(dir.path().to_path_buf()), ModelSettings::default());
        assert!(lazy.engine.get().is_none());

        let raster = GrayImage::new(16, 16);
        let result = lazy.read_paragraphs(&raster, &RecognitionSettings::default());
        let message = format!("{:#}", result.err().unwrap());
        assert!(message.contains("model not found"));
        assert!(lazy.engine.get().is_none());
    }
}
