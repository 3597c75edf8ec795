//! Application Configuration
//!
//! Tuning parameters stored in TOML format. Every field defaults to the
//! fixed values the tool ships with, so running without a config file gives
//! the standard single-image, bounded-memory behavior.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Image normalization settings
    pub preprocess: PreprocessSettings,
    /// Detection/recognition settings
    pub recognition: RecognitionSettings,
    /// Lexical correction settings
    pub correction: CorrectionSettings,
    /// Reference word list
    pub lexicon: LexiconSettings,
    /// ONNX model location and runtime
    pub models: ModelSettings,
}

/// Image normalization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Largest allowed raster side; bigger images are downscaled to fit
    pub max_dimension: u32,
    /// Bilateral filter window diameter in pixels
    pub bilateral_diameter: u32,
    /// Bilateral filter intensity sigma
    pub sigma_color: f32,
    /// Bilateral filter spatial sigma
    pub sigma_space: f32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            max_dimension: 1200,
            bilateral_diameter: 7,
            sigma_color: 50.0,
            sigma_space: 50.0,
        }
    }
}

/// Text detection and recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Target language codes
    pub languages: Vec<String>,
    /// Merge detected lines into paragraphs
    pub paragraph: bool,
    /// Line crops per recognition forward pass
    pub batch_size: usize,
    /// Maximum side of the detection canvas
    pub canvas_size: u32,
    /// Detection magnification (1.0 = no upscaling)
    pub mag_ratio: f32,
    /// Probability floor for text pixels (0.0 - 1.0)
    pub low_text: f32,
    /// Minimum peak probability for a kept text region (0.0 - 1.0)
    pub text_threshold: f32,
    /// Link score that bridges gaps between characters (0.0 - 1.0)
    pub link_threshold: f32,
    /// Box expansion ratio applied to detected regions
    pub unclip_ratio: f32,
    /// Regions whose longest side is below this (raster pixels) are dropped
    pub min_size: u32,
    /// Horizontal paragraph merge distance, in mean line heights
    pub x_ths: f32,
    /// Vertical paragraph merge distance, in mean line heights
    pub y_ths: f32,
    /// Recognition input height
    pub rec_height: u32,
    /// Recognition input width cap
    pub rec_max_width: u32,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            languages: vec!["bn".to_string(), "en".to_string()],
            paragraph: true,
            batch_size: 1,
            canvas_size: 1024,
            mag_ratio: 1.0,
            low_text: 0.4,
            text_threshold: 0.6,
            link_threshold: 0.4,
            unclip_ratio: 1.5,
            min_size: 20,
            x_ths: 1.0,
            y_ths: 0.5,
            rec_height: 48,
            rec_max_width: 960,
        }
    }
}

/// Similarity scorer used by the corrector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Percentage of aligned characters (insertions/deletions only)
    #[default]
    Indel,
    /// Normalized Levenshtein similarity
    Levenshtein,
}

/// Lexical correction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionSettings {
    /// Minimum similarity (0 - 100) for replacing a token
    pub threshold: f64,
    /// Similarity scorer
    pub scorer: ScorerKind,
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        Self {
            threshold: 80.0,
            scorer: ScorerKind::Indel,
        }
    }
}

/// Reference word list location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconSettings {
    /// Word list path; defaults to `bn_words.txt` beside the executable
    pub path: Option<PathBuf>,
}

/// ONNX model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Directory holding det.onnx, rec.onnx and dict.txt
    pub dir: Option<PathBuf>,
    /// Intra-op threads per ONNX session
    pub intra_threads: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            dir: None,
            intra_threads: 4,
        }
    }
}

impl AppConfig {
    /// Reject values the pipeline cannot honor
    pub fn validate(&self) -> Result<()> {
        let pp = &self.preprocess;
        if pp.max_dimension == 0 {
            bail!("preprocess.max_dimension must be positive");
        }
        if pp.bilateral_diameter == 0 {
            bail!("preprocess.bilateral_diameter must be positive");
        }
        if pp.sigma_color <= 0.0 || pp.sigma_space <= 0.0 {
            bail!("preprocess sigmas must be positive");
        }

        let rec = &self.recognition;
        if rec.batch_size == 0 {
            bail!("recognition.batch_size must be at least 1");
        }
        if rec.canvas_size == 0 {
            bail!("recognition.canvas_size must be positive");
        }
        if rec.mag_ratio <= 0.0 {
            bail!("recognition.mag_ratio must be positive");
        }
        for (name, value) in [
            ("low_text", rec.low_text),
            ("text_threshold", rec.text_threshold),
            ("link_threshold", rec.link_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("recognition.{} must be within 0.0 - 1.0, got {}", name, value);
            }
        }
        if rec.rec_height == 0 || rec.rec_max_width == 0 {
            bail!("recognition input geometry must be positive");
        }
        if rec.languages.is_empty() {
            bail!("recognition.languages must name at least one language");
        }

        if !(0.0..=100.0).contains(&self.correction.threshold) {
            bail!(
                "correction.threshold must be within 0 - 100, got {}",
                self.correction.threshold
            );
        }

        if self.models.intra_threads == 0 {
            bail!("models.intra_threads must be at least 1");
        }

        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.preprocess.max_dimension, 1200);
        assert_eq!(config.preprocess.bilateral_diameter, 7);
        assert!((config.preprocess.sigma_color - 50.0).abs() < 0.01);
        assert!((config.preprocess.sigma_space - 50.0).abs() < 0.01);

        assert_eq!(config.recognition.languages, vec!["bn", "en"]);
        assert!(config.recognition.paragraph);
        assert_eq!(config.recognition.batch_size, 1);
        assert_eq!(config.recognition.canvas_size, 1024);
        assert!((config.recognition.mag_ratio - 1.0).abs() < 0.001);
        assert!((config.recognition.low_text - 0.4).abs() < 0.001);
        assert!((config.recognition.text_threshold - 0.6).abs() < 0.001);
        assert!((config.recognition.link_threshold - 0.4).abs() < 0.001);

        assert!((config.correction.threshold - 80.0).abs() < 0.001);
        assert_eq!(config.correction.scorer, ScorerKind::Indel);

        assert!(config.lexicon.path.is_none());
        assert!(config.models.dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.correction.threshold = 85.0;
        config.correction.scorer = ScorerKind::Levenshtein;
        config.models.dir = Some(PathBuf::from("/opt/models"));

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!((loaded.correction.threshold - 85.0).abs() < 0.001);
        assert_eq!(loaded.correction.scorer, ScorerKind::Levenshtein);
        assert_eq!(loaded.models.dir, Some(PathBuf::from("/opt/models")));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[preprocess]\nmax_dimension = 800").unwrap();

        let loaded = load_config(temp_file.path()).unwrap();
        assert_eq!(loaded.preprocess.max_dimension, 800);
        assert_eq!(loaded.preprocess.bilateral_diameter, 7);
        assert_eq!(loaded.recognition.canvas_size, 1024);
        assert!((loaded.correction.threshold - 80.0).abs() < 0.001);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = AppConfig::default();
        config.correction.threshold = 120.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.recognition.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.recognition.low_text = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.preprocess.max_dimension = 0;
        assert!(config.validate().is_err());
    }
}
