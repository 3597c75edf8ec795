//! Document pipeline
//!
//! decode → normalize → recognize → correct, strictly in sequence. The
//! lexicon and the recognizer are long-lived read-only handles owned by the
//! pipeline, so one `Pipeline` can serve any number of images.

use image::GrayImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, RecognitionSettings};
use crate::correction::Corrector;
use crate::error::PipelineError;
use crate::lexicon::Lexicon;
use crate::vision::{ImageNormalizer, TextRecognizer};

/// Separator between recognized paragraphs in the transcript
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

pub struct Pipeline<R: TextRecognizer> {
    normalizer: ImageNormalizer,
    recognizer: R,
    recognition: RecognitionSettings,
    corrector: Corrector,
    dump_raster: Option<PathBuf>,
}

impl<R: TextRecognizer> Pipeline<R> {
    pub fn new(config: &AppConfig, lexicon: Arc<Lexicon>, recognizer: R) -> Self {
        let words = lexicon.len();
        let corrector = Corrector::new(lexicon, &config.correction);
        debug!(
            "Pipeline ready: {} lexicon words, correction threshold {}",
            words,
            corrector.threshold()
        );

        Self {
            normalizer: ImageNormalizer::new(config.preprocess.clone()),
            recognizer,
            recognition: config.recognition.clone(),
            corrector,
            dump_raster: None,
        }
    }

    /// Also write each binarized raster to `path`
    pub fn with_dump_raster(mut self, path: Option<PathBuf>) -> Self {
        self.dump_raster = path;
        self
    }

    /// Corrected transcript of the image at `path`
    pub fn process(&self, path: &Path) -> Result<String, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::NotFound(path.to_path_buf()));
        }
        let start = Instant::now();

        let raster = self.normalizer.normalize_file(path)?;
        let corrected = self.transcribe(&raster)?;

        info!(
            "Processed {:?} in {:?} ({} chars)",
            path,
            start.elapsed(),
            corrected.chars().count()
        );
        Ok(corrected)
    }

    /// Recognize and correct an already normalized raster
    fn transcribe(&self, raster: &GrayImage) -> Result<String, PipelineError> {
        if let Some(dump) = &self.dump_raster {
            match raster.save(dump) {
                Ok(()) => info!("Wrote binarized raster to {:?}", dump),
                Err(e) => warn!("Could not write raster to {:?}: {}", dump, e),
            }
        }

        let fragments = self
            .recognizer
            .read_paragraphs(raster, &self.recognition)
            .map_err(PipelineError::Recognition)?;
        debug!("Recognized {} fragments", fragments.len());

        let raw = fragments.join(PARAGRAPH_SEPARATOR);
        Ok(self.corrector.correct_text(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NormalizeError;
    use image::Luma;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Returns fixed fragments and records the raster it was given
    struct StubRecognizer {
        fragments: Vec<String>,
        seen: Mutex<Option<GrayImage>>,
    }

    impl StubRecognizer {
        fn new(fragments: &[&str]) -> Self {
            Self {
                fragments: fragments.iter().map(|s| s.to_string()).collect(),
                seen: Mutex::new(None),
            }
        }
    }

    impl TextRecognizer for StubRecognizer {
        fn read_paragraphs(&self, raster: &GrayImage, _settings: &RecognitionSettings) -> anyhow::Result<Vec<String>> {
            *self.seen.lock() = Some(raster.clone());
            Ok(self.fragments.clone())
        }
    }

    struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn read_paragraphs(&self, _raster: &GrayImage, _settings: &RecognitionSettings) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("session crashed")
        }
    }

    /// White page with dark text-like bars
    fn write_page(dir: &TempDir, width: u32, height: u32) -> PathBuf {
        let page = GrayImage::from_fn(width, height, |x, y| {
            let in_bar = (y / 100) % 3 == 1 && x > width / 10 && x < width * 9 / 10;
            Luma([if in_bar { 30 } else { 235 }])
        });
        let path = dir.path().join("page.png");
        page.save(&path).unwrap();
        path
    }

    fn lexicon(words: &[&str]) -> Arc<Lexicon> {
        Arc::new(Lexicon::from_words(words.iter().copied()))
    }

    #[test]
    fn test_large_page_is_bounded_binarized_and_corrected() {
        let dir = TempDir::new().unwrap();
        let path = write_page(&dir, 3000, 2000);

        // "সোনাব" is an OCR slip for "সোনার"
        let recognizer = StubRecognizer::new(&["আমার সোনাব বাংলা"]);
        let pipeline = Pipeline::new(
            &AppConfig::default(),
            lexicon(&["আমার", "সোনার"]),
            recognizer,
        );

        let transcript = pipeline.process(&path).unwrap();
        assert_eq!(transcript, "আমার সোনার বাংলা");
        assert!(!transcript.contains("সোনাব"));

        let raster = pipeline.recognizer.seen.lock().take().unwrap();
        assert_eq!(raster.dimensions(), (1200, 800));
        assert!(raster.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_empty_lexicon_passes_text_through() {
        let dir = TempDir::new().unwrap();
        let path = write_page(&dir, 400, 300);

        let raw = ["Invoice  2024", "No. 17\tPaid"];
        let pipeline = Pipeline::new(&AppConfig::default(), Arc::new(Lexicon::empty()), StubRecognizer::new(&raw));

        assert_eq!(pipeline.process(&path).unwrap(), "Invoice  2024\n\nNo. 17\tPaid");
    }

    #[test]
    fn test_small_image_keeps_its_size() {
        let dir = TempDir::new().unwrap();
        let path = write_page(&dir, 640, 480);

        let pipeline = Pipeline::new(&AppConfig::default(), Arc::new(Lexicon::empty()), StubRecognizer::new(&[]));
        assert_eq!(pipeline.process(&path).unwrap(), "");

        let raster = pipeline.recognizer.seen.lock().take().unwrap();
        assert_eq!(raster.dimensions(), (640, 480));
    }

    #[test]
    fn test_paragraphs_separated_by_blank_line() {
        let dir = TempDir::new().unwrap();
        let path = write_page(&dir, 200, 200);

        let pipeline = Pipeline::new(
            &AppConfig::default(),
            lexicon(&["বাংলাদেশ"]),
            StubRecognizer::new(&["বাংলাদেস আমার", "first second"]),
        );
        let transcript = pipeline.process(&path).unwrap();

        let lines: Vec<&str> = transcript.split('\n').collect();
        assert_eq!(lines, vec!["বাংলাদেশ আমার", "", "first second"]);
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let pipeline = Pipeline::new(&AppConfig::default(), Arc::new(Lexicon::empty()), StubRecognizer::new(&["x"]));

        let err = pipeline.process(Path::new("missing.png")).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
        assert!(pipeline.recognizer.seen.lock().is_none());
    }

    #[test]
    fn test_undecodable_file_is_normalize_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let pipeline = Pipeline::new(&AppConfig::default(), Arc::new(Lexicon::empty()), StubRecognizer::new(&["x"]));
        let err = pipeline.process(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Normalize(NormalizeError::Decode { .. })));
    }

    #[test]
    fn test_recognizer_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_page(&dir, 100, 100);

        let pipeline = Pipeline::new(&AppConfig::default(), Arc::new(Lexicon::empty()), FailingRecognizer);
        let err = pipeline.process(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Recognition(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_dump_raster_writes_image() {
        let dir = TempDir::new().unwrap();
        let path = write_page(&dir, 300, 200);
        let dump = dir.path().join("raster.png");

        let pipeline = Pipeline::new(&AppConfig::default(), Arc::new(Lexicon::empty()), StubRecognizer::new(&[]))
            .with_dump_raster(Some(dump.clone()));
        pipeline.process(&path).unwrap();

        let written = image::open(&dump).unwrap().to_luma8();
        assert_eq!(written.dimensions(), (300, 200));
    }
}
