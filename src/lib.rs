//! Quantification of dot-blot assay strips.
//!
//! A strip is imaged in two pixel-aligned channels: a control channel used
//! to locate the printed dots and a probe channel carrying the assay
//! signal. The pipeline detects dot-shaped regions in the control channel,
//! assigns each region to a named grid cell, re-measures the probe channel
//! through the identical spatial mask, normalizes probe intensities against
//! the control, and scores each dot against the strip's negative controls.
//! Batch runs process strips in parallel and aggregate per-dot hit counts
//! across strips.

pub mod analysis;
pub mod assign;
pub mod batch;
pub mod channels;
pub mod config;
pub mod detect;
pub mod error;
pub mod layout;
pub mod measure;
pub mod viz;

pub use analysis::{AssayRecord, HitCount, call_hits, hit_counts};
pub use assign::{LabelMap, assign_grid};
pub use batch::{BatchResult, StripFailure, process_dir, process_image_list, quantify_strip};
pub use channels::open_rgb;
pub use config::{GridSpec, SegmentationParams, ThresholdMode};
pub use detect::{LabelImage, Region, find_spots};
pub use error::{BlotError, Result};
pub use layout::{AssayLayout, LayoutEntry, NEG_GROUP};
pub use measure::{SpotRecord, StripMeasurement, measure_fresh, measure_with_mask};
