//! Assay layout: the static table describing every dot printed on a strip.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{BlotError, Result};

/// Experimental group name marking negative-control dots.
pub const NEG_GROUP: &str = "neg";

/// One intended dot position: identity, source-plate provenance,
/// experimental group, and the z-score multiplier used for hit calling.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub dot_name: String,
    pub source_plate_id: String,
    pub source_plate_row: String,
    pub source_plate_column: String,
    pub exp_group: String,
    pub zscore_threshold: f64,
}

/// The full layout for one assay, loaded from a headered CSV with columns
/// `dot_name,source_plate_id,source_plate_row,source_plate_column,exp_group,zscore_threshold`.
#[derive(Debug, Clone)]
pub struct AssayLayout {
    pub assay_id: String,
    entries: Vec<LayoutEntry>,
}

impl AssayLayout {
    pub fn new(assay_id: impl Into<String>, entries: Vec<LayoutEntry>) -> Self {
        Self {
            assay_id: assay_id.into(),
            entries,
        }
    }

    /// Reads the layout from a CSV file. The assay id is the file name,
    /// mirroring how results are tagged downstream.
    pub fn from_csv_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let assay_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file = File::open(path).map_err(|e| BlotError::Layout {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(line) => line?,
            None => {
                return Err(BlotError::Layout {
                    path: path.to_path_buf(),
                    reason: "empty file".into(),
                });
            }
        };
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let col = |name: &str| -> Result<usize> {
            columns
                .iter()
                .position(|c| *c == name)
                .ok_or_else(|| BlotError::Layout {
                    path: path.to_path_buf(),
                    reason: format!("missing column '{name}'"),
                })
        };
        let i_name = col("dot_name")?;
        let i_plate = col("source_plate_id")?;
        let i_plate_row = col("source_plate_row")?;
        let i_plate_col = col("source_plate_column")?;
        let i_group = col("exp_group")?;
        let i_z = col("zscore_threshold")?;

        let mut entries = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != columns.len() {
                return Err(BlotError::Layout {
                    path: path.to_path_buf(),
                    reason: format!(
                        "line {}: expected {} fields, got {}",
                        line_no + 2,
                        columns.len(),
                        fields.len()
                    ),
                });
            }
            let zscore_threshold: f64 =
                fields[i_z].parse().map_err(|_| BlotError::Layout {
                    path: path.to_path_buf(),
                    reason: format!(
                        "line {}: invalid zscore_threshold '{}'",
                        line_no + 2,
                        fields[i_z]
                    ),
                })?;
            entries.push(LayoutEntry {
                dot_name: fields[i_name].to_string(),
                source_plate_id: fields[i_plate].to_string(),
                source_plate_row: fields[i_plate_row].to_string(),
                source_plate_column: fields[i_plate_col].to_string(),
                exp_group: fields[i_group].to_string(),
                zscore_threshold,
            });
        }

        Ok(Self { assay_id, entries })
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
