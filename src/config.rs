//! Assay array layout description and segmentation parameters.
//!
//! A [`GridSpec`] is loaded once per batch (typically from a JSON file),
//! validated up front, and shared read-only across every strip in the run.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{BlotError, Result};

const DEFAULT_MEDIAN_SIZE: u32 = 7;
const DEFAULT_BLOCK_SIZE: u32 = 101;
const DEFAULT_CLOSING_SIZE: u8 = 3;
const DEFAULT_EROSION_RADIUS: u8 = 7;
const DEFAULT_MIN_AREA: u32 = 100;
const DEFAULT_MIN_CIRCULARITY: f64 = 0.3;

/// How the denoised image is binarized before morphology.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ThresholdMode {
    /// Local adaptive threshold over a square block of the given size.
    Local { block_size: u32 },
    /// Single global Otsu threshold.
    Global,
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Local {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Segmentation parameters for spot detection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Side of the square median-filter window, in pixels. Must be odd.
    pub median_size: u32,
    pub threshold: ThresholdMode,
    /// Side of the square closing kernel.
    pub closing_size: u8,
    /// Radius of the erosion element used to separate touching blobs.
    pub erosion_radius: u8,
    /// Regions with area <= min_area are discarded.
    pub min_area: u32,
    /// Regions with circularity (4πA/P²) <= min_circularity are discarded.
    pub min_circularity: f64,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            median_size: DEFAULT_MEDIAN_SIZE,
            threshold: ThresholdMode::default(),
            closing_size: DEFAULT_CLOSING_SIZE,
            erosion_radius: DEFAULT_EROSION_RADIUS,
            min_area: DEFAULT_MIN_AREA,
            min_circularity: DEFAULT_MIN_CIRCULARITY,
        }
    }
}

/// Immutable description of one assay array: grid dimensions, the ordered
/// row/column labels used to build dot names, and the segmentation
/// parameters for the control channel.
#[derive(Debug, Clone, Deserialize)]
pub struct GridSpec {
    n_rows: usize,
    n_cols: usize,
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    #[serde(default)]
    segmentation: SegmentationParams,
}

impl GridSpec {
    pub fn new(
        row_labels: Vec<String>,
        col_labels: Vec<String>,
        segmentation: SegmentationParams,
    ) -> Result<Self> {
        let spec = Self {
            n_rows: row_labels.len(),
            n_cols: col_labels.len(),
            row_labels,
            col_labels,
            segmentation,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Loads and validates a grid spec from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let spec: GridSpec = serde_json::from_str(&text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Fails fast on an inconsistent layout, before any image work starts.
    pub fn validate(&self) -> Result<()> {
        if self.n_rows == 0 || self.n_cols == 0 {
            return Err(BlotError::Config(format!(
                "grid dimensions must be positive, got {}x{}",
                self.n_rows, self.n_cols
            )));
        }
        if self.row_labels.len() != self.n_rows {
            return Err(BlotError::Config(format!(
                "{} row labels declared for {} rows",
                self.row_labels.len(),
                self.n_rows
            )));
        }
        if self.col_labels.len() != self.n_cols {
            return Err(BlotError::Config(format!(
                "{} col labels declared for {} cols",
                self.col_labels.len(),
                self.n_cols
            )));
        }
        for (axis, labels) in [("row", &self.row_labels), ("col", &self.col_labels)] {
            let unique: HashSet<&str> = labels.iter().map(String::as_str).collect();
            if unique.len() != labels.len() {
                return Err(BlotError::Config(format!("duplicate {axis} labels")));
            }
        }
        if self.segmentation.median_size == 0 || self.segmentation.median_size % 2 == 0 {
            return Err(BlotError::Config(format!(
                "median_size must be odd and positive, got {}",
                self.segmentation.median_size
            )));
        }
        if let ThresholdMode::Local { block_size } = self.segmentation.threshold
            && (block_size == 0 || block_size % 2 == 0)
        {
            return Err(BlotError::Config(format!(
                "threshold block_size must be odd and positive, got {block_size}"
            )));
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row_label(&self, row_index: usize) -> &str {
        &self.row_labels[row_index]
    }

    pub fn col_label(&self, col_index: usize) -> &str {
        &self.col_labels[col_index]
    }

    /// Dot names are the row label and column label concatenated with no
    /// separator; this exact convention is the join key across the whole
    /// pipeline.
    pub fn dot_name(&self, row_index: usize, col_index: usize) -> String {
        format!("{}{}", self.row_labels[row_index], self.col_labels[col_index])
    }

    pub fn segmentation(&self) -> &SegmentationParams {
        &self.segmentation
    }
}
