//! Strip-level pipeline and the parallel batch driver.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::analysis::counts::HitCount;
use crate::analysis::hits::{AssayRecord, call_hits};
use crate::config::GridSpec;
use crate::error::{BlotError, Result};
use crate::channels::{CONTROL_CHANNEL, PROBE_CHANNEL, open_rgb};
use crate::measure::{measure_fresh, measure_with_mask};
use crate::layout::AssayLayout;

/// A strip that failed, with the error that stopped it. Other strips in the
/// batch are unaffected.
#[derive(Debug)]
pub struct StripFailure {
    pub strip_id: String,
    pub error: BlotError,
}

/// Outcome of a batch run: scored rows from every successful strip plus the
/// per-strip failures.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub records: Vec<AssayRecord>,
    pub failures: Vec<StripFailure>,
}

/// Runs the full pipeline for one strip image: split channels, detect and
/// measure the control channel, re-measure the probe channel through the
/// control's mask, and score hits.
pub fn quantify_strip(
    im_path: impl AsRef<Path>,
    strip_id: &str,
    spec: &GridSpec,
    layout: &AssayLayout,
) -> Result<Vec<AssayRecord>> {
    let (control_im, probe_im) = open_rgb(&im_path, CONTROL_CHANNEL, PROBE_CHANNEL)?;
    let control = measure_fresh(&control_im, spec, strip_id)?;
    let probe = measure_with_mask(&probe_im, &control, format!("{strip_id}:probe"));
    call_hits(&control, &probe, layout, strip_id)
}

/// Quantifies a list of strips in parallel. Each strip is independent; the
/// grid spec and layout are shared read-only. Failures are collected per
/// strip and never abort the batch.
pub fn process_image_list(
    strips: &[(PathBuf, String)],
    spec: &GridSpec,
    layout: &AssayLayout,
) -> BatchResult {
    let outcomes: Vec<(String, Result<Vec<AssayRecord>>)> = strips
        .par_iter()
        .map(|(path, strip_id)| {
            (
                strip_id.clone(),
                quantify_strip(path, strip_id, spec, layout),
            )
        })
        .collect();

    let mut result = BatchResult::default();
    for (strip_id, outcome) in outcomes {
        match outcome {
            Ok(mut records) => result.records.append(&mut records),
            Err(error) => {
                warn!(%strip_id, %error, "strip failed");
                result.failures.push(StripFailure { strip_id, error });
            }
        }
    }
    info!(
        strips = strips.len(),
        failed = result.failures.len(),
        rows = result.records.len(),
        "batch finished"
    );
    result
}

/// Quantifies every image with the given extension in a directory. Strip
/// ids are the file stems, matching how result rows are keyed downstream.
pub fn process_dir(
    dir: impl AsRef<Path>,
    spec: &GridSpec,
    layout: &AssayLayout,
    extension: &str,
) -> Result<BatchResult> {
    let extension = extension.trim_start_matches('.');
    let mut strips: Vec<(PathBuf, String)> = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(OsStr::to_str)
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .filter_map(|path| {
            let stem = path.file_stem()?.to_string_lossy().into_owned();
            Some((path, stem))
        })
        .collect();
    strips.sort();

    Ok(process_image_list(&strips, spec, layout))
}

const RESULTS_HEADER: &str = "assay_id,strip_id,dot_name,source_plate_id,source_plate_row,\
source_plate_column,exp_group,zscore_threshold,row,col,x,y,mean_intensity_control,\
mean_intensity_probe,norm_probe_intensity,positive_threshold,pos_hit";

/// Writes the batch result table as CSV, one row per scored dot per strip.
pub fn write_results_csv(path: impl AsRef<Path>, records: &[AssayRecord]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{RESULTS_HEADER}")?;
    for r in records {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            r.assay_id,
            r.strip_id,
            r.dot_name,
            r.source_plate_id,
            r.source_plate_row,
            r.source_plate_column,
            r.exp_group,
            r.zscore_threshold,
            r.row,
            r.col,
            r.x,
            r.y,
            r.mean_intensity_control,
            r.mean_intensity_probe,
            r.norm_probe_intensity,
            r.positive_threshold,
            r.pos_hit
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Writes per-assay hit counts as CSV.
pub fn write_hit_counts_csv(path: impl AsRef<Path>, counts: &[HitCount]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(
        out,
        "assay_id,dot_name,source_plate_id,source_plate_row,source_plate_column,exp_group,n_hits"
    )?;
    for c in counts {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            c.assay_id,
            c.dot_name,
            c.source_plate_id,
            c.source_plate_row,
            c.source_plate_column,
            c.exp_group,
            c.n_hits
        )?;
    }
    out.flush()?;
    Ok(())
}
