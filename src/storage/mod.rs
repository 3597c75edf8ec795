//! Storage Layer
//!
//! Resolves the default on-disk locations of the lexicon and the models.
//! Nothing is written here; the tool keeps no state between runs.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// File name of the reference word list
pub const LEXICON_FILE_NAME: &str = "bn_words.txt";

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "bengali-ocr", "bengali-ocr")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    Ok(proj_dirs.data_dir().to_path_buf())
}

/// Default model directory (`<data dir>/models`)
pub fn default_models_dir() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("models"))
}

/// Default lexicon path: the word list co-located with the executable
pub fn default_lexicon_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Could not locate the running executable")?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(LEXICON_FILE_NAME))
}
