//! CTC greedy decoding for the recognition model

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::warn;

/// Greedy CTC decoder with the blank token at index 0
#[derive(Debug, Clone)]
pub struct CtcDecoder {
    /// Class labels; index 0 is the blank
    labels: Vec<String>,
}

impl CtcDecoder {
    /// Build from dictionary entries (one label per class, blank excluded).
    ///
    /// With `use_space_char` a trailing space class is appended, matching
    /// models trained to emit word gaps.
    pub fn new(dictionary: Vec<String>, use_space_char: bool) -> Self {
        let mut labels = Vec::with_capacity(dictionary.len() + 2);
        labels.push(String::new());
        labels.extend(dictionary);
        if use_space_char {
            labels.push(" ".to_string());
        }
        Self { labels }
    }

    /// Load a dictionary file with one label per line
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read character dictionary {:?}", path))?;
        let dictionary: Vec<String> = content
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if dictionary.is_empty() {
            bail!("Character dictionary {:?} is empty", path);
        }
        Ok(Self::new(dictionary, true))
    }

    /// Number of classes including the blank
    pub fn class_count(&self) -> usize {
        self.labels.len()
    }

    /// Decode a [N, T, C] probability tensor into one string per item
    pub fn decode(&self, shape: &[i64], data: &[f32]) -> Result<Vec<String>> {
        let (batch, steps, classes) = match shape {
            [n, t, c] => (*n as usize, *t as usize, *c as usize),
            _ => bail!("Unexpected recognition output shape {:?}", shape),
        };
        if data.len() != batch * steps * classes {
            bail!("Recognition output has {} values for shape {:?}", data.len(), shape);
        }
        if steps == 0 || classes == 0 {
            return Ok(vec![String::new(); batch]);
        }
        if classes != self.class_count() {
            warn!(
                "Model emits {} classes but dictionary has {}",
                classes,
                self.class_count()
            );
        }

        Ok(data
            .chunks_exact(steps * classes)
            .map(|item| self.decode_sequence(item.chunks_exact(classes)))
            .collect())
    }

    fn decode_sequence<'a>(&self, steps: impl Iterator<Item = &'a [f32]>) -> String {
        let mut text = String::new();
        let mut previous = 0usize;

        for row in steps {
            let best = row
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(idx, _)| idx)
                .unwrap_or(0);

            if best != 0 && best != previous {
                if let Some(label) = self.labels.get(best) {
                    text.push_str(label);
                }
            }
            previous = best;
        }

        text.trim().to_string()
    }
}
