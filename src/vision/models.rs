//! Model management for ONNX Runtime
//!
//! Locates the detection/recognition models and the character dictionary in
//! a local directory, verifies them against an optional manifest, and loads
//! ONNX sessions. Models are never fetched over the network.

use anyhow::{bail, Context, Result};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the optional model manifest
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Model identifier for the recognition components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Text detection model (DBNet-style probability map)
    Detection,
    /// Text recognition model (CRNN with CTC head)
    Recognition,
    /// Character dictionary for recognition
    Dictionary,
}

impl ModelType {
    /// All components required by the engine
    pub const REQUIRED: [ModelType; 3] = [
        ModelType::Detection,
        ModelType::Recognition,
        ModelType::Dictionary,
    ];

    /// Get the filename for this model type
    pub fn filename(&self) -> &'static str {
        match self {
            ModelType::Detection => "det.onnx",
            ModelType::Recognition => "rec.onnx",
            ModelType::Dictionary => "dict.txt",
        }
    }

    /// Display name for log messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::Detection => "Text Detection",
            ModelType::Recognition => "Text Recognition",
            ModelType::Dictionary => "Character Dictionary",
        }
    }
}

/// Model manifest describing the installed model set
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    #[serde(default)]
    pub version: String,
    /// Language codes the recognition model covers
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub filename: String,
    /// Lowercase hex SHA-256 of the file
    pub sha256: Option<String>,
}

/// Local model directory
#[derive(Debug, Clone)]
pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    /// Model store rooted at the default data directory
    pub fn new() -> Result<Self> {
        Ok(Self::with_dir(crate::storage::default_models_dir()?))
    }

    /// Model store with custom directory
    pub fn with_dir(models_dir: PathBuf) -> Self {
        Self { models_dir }
    }

    /// Get the models directory path
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Get the path to a specific model file
    pub fn model_path(&self, model_type: ModelType) -> PathBuf {
        self.models_dir.join(model_type.filename())
    }

    /// Path to a model that must exist
    pub fn require(&self, model_type: ModelType) -> Result<PathBuf> {
        let path = self.model_path(model_type);
        if !path.is_file() {
            bail!(
                "{} model not found: expected {:?}",
                model_type.display_name(),
                path
            );
        }
        Ok(path)
    }

    /// Load the model manifest, if the directory has one
    pub fn load_manifest(&self) -> Result<Option<ModelManifest>> {
        let manifest_path = self.models_dir.join(MANIFEST_FILE_NAME);
        if !manifest_path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read {:?}", manifest_path))?;
        let manifest: ModelManifest = serde_json::from_str(&content)
            .with_context(|| format!("Invalid model manifest {:?}", manifest_path))?;
        Ok(Some(manifest))
    }

    /// Check required files, checksums and language coverage.
    ///
    /// Without a manifest only file presence is checked.
    pub fn verify(&self, languages: &[String]) -> Result<()> {
        for model_type in ModelType::REQUIRED {
            self.require(model_type)?;
        }

        let Some(manifest) = self.load_manifest()? else {
            debug!("No model manifest in {:?}; skipping verification", self.models_dir);
            return Ok(());
        };

        for info in &manifest.models {
            let Some(expected) = &info.sha256 else {
                continue;
            };
            let path = self.models_dir.join(&info.filename);
            let actual = file_sha256(&path)?;
            if !actual.eq_ignore_ascii_case(expected) {
                bail!(
                    "Checksum mismatch for {}: expected {}, got {}",
                    info.filename,
                    expected,
                    actual
                );
            }
            debug!("Checksum verified for {}", info.filename);
        }

        if manifest.languages.is_empty() {
            warn!("Model manifest does not list languages");
        } else {
            let missing: Vec<&String> = languages
                .iter()
                .filter(|lang| !manifest.languages.contains(lang))
                .collect();
            if !missing.is_empty() {
                bail!(
                    "Models in {:?} do not cover languages {:?} (manifest lists {:?})",
                    self.models_dir,
                    missing,
                    manifest.languages
                );
            }
        }

        info!(
            "Model set {} verified for {:?}",
            if manifest.version.is_empty() { "(unversioned)" } else { manifest.version.as_str() },
            languages
        );
        Ok(())
    }
}

/// Lowercase hex SHA-256 of a file
pub fn file_sha256(path: &Path) -> Result<String> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}

/// ONNX Runtime session wrapper
pub struct OnnxSession {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxSession {
    /// Create a new ONNX session from a model file
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model {:?}", model_path))?;

        let input_names: Vec<String> = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect();

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        if input_names.is_empty() || output_names.is_empty() {
            bail!("ONNX model {:?} has no inputs or outputs", model_path);
        }

        debug!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        Ok(Self {
            session,
            input_names,
            output_names,
        })
    }

    /// Run the model on a single f32 tensor and hand its first output to
    /// `process` as (shape, data)
    pub fn run<T>(
        &mut self,
        input: &Array4<f32>,
        process: impl FnOnce(&[i64], &[f32]) -> Result<T>,
    ) -> Result<T> {
        let tensor = TensorRef::from_array_view(input.view())
            .with_context(|| format!("Failed to convert input tensor {:?}", input.shape()))?;
        let inputs = ort::inputs![self.input_names[0].as_str() => tensor];

        let outputs = self
            .session
            .run(inputs)
            .with_context(|| format!("Inference failed for input shape {:?}", input.shape()))?;
        let (shape, data) = outputs[self.output_names[0].as_str()]
            .try_extract_tensor::<f32>()
            .with_context(|| format!("Failed to extract output '{}' as f32", self.output_names[0]))?;

        process(shape, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with_files(files: &[(&str, &[u8])]) -> (TempDir, ModelStore) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let store = ModelStore::with_dir(dir.path().to_path_buf());
        (dir, store)
    }

    fn complete_set() -> Vec<(&'static str, &'static [u8])> {
        vec![
            ("det.onnx", b"det".as_slice()),
            ("rec.onnx", b"rec".as_slice()),
            ("dict.txt", "অ\nআ\n".as_bytes()),
        ]
    }

    fn save_manifest(store: &ModelStore, manifest: &ModelManifest) {
        let content = serde_json::to_string_pretty(manifest).unwrap();
        std::fs::write(store.models_dir().join(MANIFEST_FILE_NAME), content).unwrap();
    }

    fn langs() -> Vec<String> {
        vec!["bn".to_string(), "en".to_string()]
    }

    #[test]
    fn test_model_type_filenames() {
        assert_eq!(ModelType::Detection.filename(), "det.onnx");
        assert_eq!(ModelType::Recognition.filename(), "rec.onnx");
        assert_eq!(ModelType::Dictionary.filename(), "dict.txt");
    }

    #[test]
    fn test_require_names_missing_path() {
        let (_dir, store) = store_with_files(&[("det.onnx", b"det".as_slice())]);

        assert!(store.require(ModelType::Detection).is_ok());
        let err = store.require(ModelType::Recognition).unwrap_err();
        assert!(err.to_string().contains("rec.onnx"));
    }

    #[test]
    fn test_verify_without_manifest() {
        let (_dir, store) = store_with_files(&complete_set());
        assert!(store.load_manifest().unwrap().is_none());
        assert!(store.verify(&langs()).is_ok());
    }

    #[test]
    fn test_verify_checksums() {
        let (dir, store) = store_with_files(&complete_set());
        let good = file_sha256(&dir.path().join("det.onnx")).unwrap();

        let mut manifest = ModelManifest {
            version: "1".to_string(),
            languages: langs(),
            models: vec![ModelInfo {
                filename: "det.onnx".to_string(),
                sha256: Some(good),
            }],
        };
        save_manifest(&store, &manifest);
        assert!(store.verify(&langs()).is_ok());

        manifest.models[0].sha256 = Some("00".repeat(32));
        save_manifest(&store, &manifest);
        let err = store.verify(&langs()).unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn test_verify_language_coverage() {
        let (_dir, store) = store_with_files(&complete_set());
        let manifest = ModelManifest {
            version: "1".to_string(),
            languages: vec!["en".to_string()],
            models: vec![],
        };
        save_manifest(&store, &manifest);

        let err = store.verify(&langs()).unwrap_err();
        assert!(err.to_string().contains("bn"));
        assert!(store.verify(&["en".to_string()]).is_ok());
    }

    #[test]
    fn test_invalid_manifest_is_error() {
        let mut files = complete_set();
        files.push((MANIFEST_FILE_NAME, b"{ not json".as_slice()));
        let (_dir, store) = store_with_files(&files);

        assert!(store.load_manifest().is_err());
    }

    #[test]
    fn test_sha256_of_known_content() {
        let (dir, _store) = store_with_files(&[("abc.txt", b"abc".as_slice())]);
        assert_eq!(
            file_sha256(&dir.path().join("abc.txt")).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
