//! Error types
//!
//! Every fatal condition ends the process with exit status 1 and nothing on
//! standard output. Missing lexicons and unmatched tokens are not errors.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reading a lexicon file that exists
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("failed to read lexicon {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure turning an input file into a binarized raster
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to decode image {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("raster has no pixels ({width}x{height}) after {stage}")]
    EmptyRaster {
        stage: &'static str,
        width: u32,
        height: u32,
    },
}

/// Top-level pipeline failure
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input image not found: {0:?}")]
    NotFound(PathBuf),

    #[error("invalid configuration")]
    Config(#[source] anyhow::Error),

    #[error(transparent)]
    Lexicon(#[from] LexiconError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("text recognition failed")]
    Recognition(#[source] anyhow::Error),

    #[error("failed to write output")]
    Output(#[source] std::io::Error),
}

impl PipelineError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        1
    }
}
