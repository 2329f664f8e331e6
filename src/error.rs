//! Crate-wide error type.

use std::path::PathBuf;

/// Errors produced by the quantification pipeline.
///
/// Per-strip failures (`DetectionQuality`, `NoNegativeControls`) carry the
/// strip identity so a batch run can report them without aborting the
/// remaining strips.
#[derive(Debug, thiserror::Error)]
pub enum BlotError {
    #[error("grid config: {0}")]
    Config(String),

    #[error(
        "strip {strip_id}: detected {found} regions on the {axis} axis, \
         but the grid declares {needed} {axis}s"
    )]
    DetectionQuality {
        strip_id: String,
        axis: &'static str,
        needed: usize,
        found: usize,
    },

    #[error(
        "strip {strip_id}: {found} negative-control dots measured, \
         at least 2 required to compute the hit threshold"
    )]
    NoNegativeControls { strip_id: String, found: usize },

    #[error("assay layout {path}: {reason}")]
    Layout { path: PathBuf, reason: String },

    #[error("image {path}: expected a channel index < {channels}, got {requested}")]
    MissingChannel {
        path: PathBuf,
        channels: usize,
        requested: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plot error: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, BlotError>;
