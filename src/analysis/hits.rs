//! Hit calling: normalize probe intensities against the control channel and
//! score each dot against the strip's negative controls.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{BlotError, Result};
use crate::measure::{SpotRecord, StripMeasurement};
use crate::layout::{AssayLayout, NEG_GROUP};

/// One scored dot on one strip.
#[derive(Debug, Clone, PartialEq)]
pub struct AssayRecord {
    pub assay_id: String,
    pub strip_id: String,
    pub dot_name: String,
    pub source_plate_id: String,
    pub source_plate_row: String,
    pub source_plate_column: String,
    pub exp_group: String,
    pub zscore_threshold: f64,
    pub row: usize,
    pub col: usize,
    pub x: f64,
    pub y: f64,
    pub mean_intensity_control: f64,
    pub mean_intensity_probe: f64,
    pub norm_probe_intensity: f64,
    pub positive_threshold: f64,
    pub pos_hit: bool,
}

/// Scores every layout dot that was measured on this strip.
///
/// Layout entries with no matching control measurement are dropped (a
/// partially detected strip still yields a result). The probe intensity is
/// taken from the measurement made through the identical mask, so a control
/// intensity of 0 simply leaves a non-finite ratio in the row. The per-strip
/// threshold is `mean + z · std` of the negative-control group's normalized
/// intensities, with the sample (n−1) standard deviation; fewer than two
/// negative-control rows on the strip is an error, never a silent NaN.
pub fn call_hits(
    control: &StripMeasurement,
    probe: &StripMeasurement,
    layout: &AssayLayout,
    strip_id: &str,
) -> Result<Vec<AssayRecord>> {
    // Probe rows come from the same spatial mask, so blob ids match exactly
    // even when detection put two blobs on one grid cell.
    let probe_by_blob: HashMap<u32, f64> = probe
        .table
        .iter()
        .map(|r| (r.blob_id, r.mean_intensity))
        .collect();

    let mut controls_by_name: HashMap<&str, Vec<&SpotRecord>> = HashMap::new();
    for record in &control.table {
        controls_by_name
            .entry(record.dot_name.as_str())
            .or_default()
            .push(record);
    }

    let mut records = Vec::new();
    for entry in layout.entries() {
        let Some(measured) = controls_by_name.get(entry.dot_name.as_str()) else {
            continue;
        };
        for spot in measured {
            let Some(&probe_intensity) = probe_by_blob.get(&spot.blob_id) else {
                continue;
            };
            let norm = probe_intensity / spot.mean_intensity;
            records.push(AssayRecord {
                assay_id: layout.assay_id.clone(),
                strip_id: strip_id.to_string(),
                dot_name: entry.dot_name.clone(),
                source_plate_id: entry.source_plate_id.clone(),
                source_plate_row: entry.source_plate_row.clone(),
                source_plate_column: entry.source_plate_column.clone(),
                exp_group: entry.exp_group.clone(),
                zscore_threshold: entry.zscore_threshold,
                row: spot.row,
                col: spot.col,
                x: spot.x,
                y: spot.y,
                mean_intensity_control: spot.mean_intensity,
                mean_intensity_probe: probe_intensity,
                norm_probe_intensity: norm,
                positive_threshold: f64::NAN,
                pos_hit: false,
            });
        }
    }

    let neg: Vec<f64> = records
        .iter()
        .filter(|r| r.exp_group == NEG_GROUP)
        .map(|r| r.norm_probe_intensity)
        .collect();
    if neg.len() < 2 {
        return Err(BlotError::NoNegativeControls {
            strip_id: strip_id.to_string(),
            found: neg.len(),
        });
    }
    let neg_mean = mean(&neg);
    let neg_std = sample_std(&neg, neg_mean);
    debug!(strip_id, neg_mean, neg_std, n_neg = neg.len(), "hit threshold");

    for record in &mut records {
        record.positive_threshold = neg_mean + record.zscore_threshold * neg_std;
        record.pos_hit = record.norm_probe_intensity > record.positive_threshold;
    }

    Ok(records)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n−1 denominator). Callers guarantee n ≥ 2.
fn sample_std(values: &[f64], mean: f64) -> f64 {
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::LabelMap;
    use crate::detect::LabelImage;
    use crate::layout::LayoutEntry;
    use std::sync::Arc;

    fn entry(dot_name: &str, group: &str, z: f64) -> LayoutEntry {
        LayoutEntry {
            dot_name: dot_name.into(),
            source_plate_id: "p1".into(),
            source_plate_row: dot_name[..1].into(),
            source_plate_column: dot_name[1..].into(),
            exp_group: group.into(),
            zscore_threshold: z,
        }
    }

    fn spot(dot_name: &str, blob_id: u32, intensity: f64) -> SpotRecord {
        SpotRecord {
            dot_name: dot_name.into(),
            blob_id,
            row: 0,
            col: blob_id as usize,
            x: 10.0 * blob_id as f64,
            y: 10.0,
            mean_intensity: intensity,
            area: 150,
        }
    }

    fn measurement(table: Vec<SpotRecord>, source: &str) -> StripMeasurement {
        StripMeasurement {
            table,
            label_image: Arc::new(LabelImage::new(1, 1)),
            label_map: Arc::new(LabelMap::default()),
            source: source.into(),
            mask_source: None,
        }
    }

    /// Six dots: five negatives at norm [1,1,1,1,3] and one test dot.
    fn fixture(test_probe: f64) -> (StripMeasurement, StripMeasurement, AssayLayout) {
        let names = ["A1", "A2", "A3", "A4", "A5", "A6"];
        let control: Vec<SpotRecord> = names
            .iter()
            .enumerate()
            .map(|(i, n)| spot(n, i as u32 + 1, 100.0))
            .collect();
        let probe_values = [100.0, 100.0, 100.0, 100.0, 300.0, test_probe];
        let probe: Vec<SpotRecord> = names
            .iter()
            .zip(probe_values)
            .enumerate()
            .map(|(i, (n, v))| spot(n, i as u32 + 1, v))
            .collect();
        let entries: Vec<LayoutEntry> = names
            .iter()
            .map(|n| entry(n, if *n == "A6" { "test" } else { NEG_GROUP }, 2.0))
            .collect();
        (
            measurement(control, "control"),
            measurement(probe, "probe"),
            AssayLayout::new("assay.csv", entries),
        )
    }

    #[test]
    fn threshold_uses_sample_std() {
        let (control, probe, layout) = fixture(500.0);
        let records = call_hits(&control, &probe, &layout, "s1").unwrap();
        // neg norms [1,1,1,1,3]: mean 1.4, sample std sqrt(0.8).
        let expected = 1.4 + 2.0 * 0.8f64.sqrt();
        for r in &records {
            assert!((r.positive_threshold - expected).abs() < 1e-12);
        }
        let test_dot = records.iter().find(|r| r.dot_name == "A6").unwrap();
        assert_eq!(test_dot.norm_probe_intensity, 5.0);
        assert!(test_dot.pos_hit);
    }

    #[test]
    fn call_hits_is_deterministic() {
        let (control, probe, layout) = fixture(120.0);
        let a = call_hits(&control, &probe, &layout, "s1").unwrap();
        let b = call_hits(&control, &probe, &layout, "s1").unwrap();
        assert_eq!(a, b);
        assert!(!a.iter().find(|r| r.dot_name == "A6").unwrap().pos_hit);
    }

    #[test]
    fn undetected_layout_dots_are_dropped() {
        let (control, probe, mut layout) = fixture(500.0);
        let mut entries = layout.entries().to_vec();
        entries.push(entry("Z9", "test", 2.0));
        layout = AssayLayout::new(layout.assay_id, entries);
        let records = call_hits(&control, &probe, &layout, "s1").unwrap();
        assert!(records.iter().all(|r| r.dot_name != "Z9"));
        assert_eq!(records.len(), 6);
    }

    #[test]
    fn zero_control_intensity_passes_through_nonfinite() {
        let (mut control, probe, layout) = fixture(500.0);
        control.table[5].mean_intensity = 0.0;
        let records = call_hits(&control, &probe, &layout, "s1").unwrap();
        let test_dot = records.iter().find(|r| r.dot_name == "A6").unwrap();
        assert!(test_dot.norm_probe_intensity.is_infinite());
    }

    #[test]
    fn missing_negative_controls_is_an_error() {
        let control = measurement(vec![spot("A1", 1, 100.0), spot("A2", 2, 100.0)], "c");
        let probe = measurement(vec![spot("A1", 1, 90.0), spot("A2", 2, 90.0)], "p");
        let layout = AssayLayout::new(
            "assay.csv",
            vec![entry("A1", "test", 2.0), entry("A2", NEG_GROUP, 2.0)],
        );
        let err = call_hits(&control, &probe, &layout, "strip_4").unwrap_err();
        match err {
            BlotError::NoNegativeControls { strip_id, found } => {
                assert_eq!(strip_id, "strip_4");
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
