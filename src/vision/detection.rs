//! Text region detection post-processing
//!
//! Converts the detector's per-pixel text probability map into axis-aligned
//! line boxes in raster coordinates.

use anyhow::{bail, Result};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

use crate::config::RecognitionSettings;

/// Regions with fewer pixels than this are noise
const MIN_REGION_PIXELS: u32 = 10;

/// Half-width of the horizontal window forming the link map
const LINK_RADIUS: usize = 2;

/// Per-pixel text probability from the detection model
#[derive(Debug, Clone)]
pub struct ProbabilityMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ProbabilityMap {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            bail!(
                "Probability map has {} values, expected {}x{}",
                data.len(),
                width,
                height
            );
        }
        Ok(Self { width, height, data })
    }

    /// Build from a detector output shaped [1, 1, H, W] or [1, H, W]
    pub fn from_tensor(shape: &[i64], data: &[f32]) -> Result<Self> {
        let (height, width) = match shape {
            [1, 1, h, w] | [1, h, w] => (*h as usize, *w as usize),
            _ => bail!("Unexpected detection output shape {:?}", shape),
        };
        Self::new(width, height, data.to_vec())
    }

    fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Horizontal max filter: how strongly each pixel sits between
    /// characters of the same line
    pub fn link_map(&self) -> Vec<f32> {
        let mut link = vec![0.0f32; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let from = x.saturating_sub(LINK_RADIUS);
                let to = (x + LINK_RADIUS).min(self.width - 1);
                link[y * self.width + x] = (from..=to)
                    .map(|nx| self.get(nx, y))
                    .fold(0.0f32, f32::max);
            }
        }
        link
    }

    /// Text mask: probable text pixels plus the gaps that link them
    fn text_mask(&self, low_text: f32, link_threshold: f32) -> GrayImage {
        let link = self.link_map();
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let idx = y as usize * self.width + x as usize;
            if self.data[idx] >= low_text || link[idx] >= link_threshold {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct RegionStats {
    pixels: u32,
    peak: f32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl RegionStats {
    fn new(x: u32, y: u32) -> Self {
        Self {
            pixels: 0,
            peak: 0.0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn add(&mut self, x: u32, y: u32, score: f32) {
        self.pixels += 1;
        self.peak = self.peak.max(score);
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
}

/// Extract line boxes (x, y, width, height) in raster coordinates.
///
/// `ratio` is canvas pixels per raster pixel; boxes are clamped to the
/// raster and returned in reading order (top to bottom, then left to right).
pub fn extract_text_boxes(
    map: &ProbabilityMap,
    settings: &RecognitionSettings,
    ratio: f32,
    raster_width: u32,
    raster_height: u32,
) -> Vec<(u32, u32, u32, u32)> {
    if map.width == 0 || map.height == 0 {
        return vec![];
    }

    let mask = map.text_mask(settings.low_text, settings.link_threshold);
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut regions: Vec<Option<RegionStats>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if regions.len() <= label {
            regions.resize(label + 1, None);
        }
        regions[label]
            .get_or_insert_with(|| RegionStats::new(x, y))
            .add(x, y, map.get(x as usize, y as usize));
    }

    let mut boxes = Vec::new();
    let mut dropped = 0usize;

    for stats in regions.into_iter().flatten() {
        if stats.pixels < MIN_REGION_PIXELS || stats.peak < settings.text_threshold {
            dropped += 1;
            continue;
        }

        let w = (stats.max_x - stats.min_x + 1) as f32;
        let h = (stats.max_y - stats.min_y + 1) as f32;
        let distance = w * h * settings.unclip_ratio / (2.0 * (w + h));

        let x0 = ((stats.min_x as f32 - distance) / ratio).floor().max(0.0);
        let y0 = ((stats.min_y as f32 - distance) / ratio).floor().max(0.0);
        let x1 = ((stats.max_x as f32 + 1.0 + distance) / ratio)
            .ceil()
            .min(raster_width as f32);
        let y1 = ((stats.max_y as f32 + 1.0 + distance) / ratio)
            .ceil()
            .min(raster_height as f32);

        if x1 <= x0 || y1 <= y0 {
            dropped += 1;
            continue;
        }

        let bounds = (x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);
        if bounds.2.max(bounds.3) < settings.min_size {
            dropped += 1;
            continue;
        }
        boxes.push(bounds);
    }

    boxes.sort_by_key(|&(x, y, _, _)| (y, x));
    debug!("Detected {} text boxes ({} candidates dropped)", boxes.len(), dropped);
    boxes
}
