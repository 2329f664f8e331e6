//! Cross-strip aggregation: how often each dot position was called a hit.

use std::collections::BTreeMap;

use tracing::warn;

use crate::analysis::hits::AssayRecord;

/// Per-assay hit count for one dot name, with the dot's static layout
/// metadata carried along from a representative row.
#[derive(Debug, Clone, PartialEq)]
pub struct HitCount {
    pub assay_id: String,
    pub dot_name: String,
    pub source_plate_id: String,
    pub source_plate_row: String,
    pub source_plate_column: String,
    pub exp_group: String,
    pub n_hits: u32,
}

/// Aggregates scored rows from many strips into per-assay hit counts.
///
/// Every dot name that was evaluated on at least one strip appears exactly
/// once per assay; names that were measured but never positive get an
/// explicit `n_hits = 0` row. Names never evaluated on any strip do not
/// appear. Static metadata should be identical across a name's rows by
/// construction of the layout; disagreement is logged, and the first row's
/// values are kept.
pub fn hit_counts(results: &[AssayRecord]) -> Vec<HitCount> {
    // BTreeMap keeps the output ordering stable across runs.
    let mut counts: BTreeMap<(&str, &str), HitCount> = BTreeMap::new();

    for record in results {
        let key = (record.assay_id.as_str(), record.dot_name.as_str());
        let entry = counts.entry(key).or_insert_with(|| HitCount {
            assay_id: record.assay_id.clone(),
            dot_name: record.dot_name.clone(),
            source_plate_id: record.source_plate_id.clone(),
            source_plate_row: record.source_plate_row.clone(),
            source_plate_column: record.source_plate_column.clone(),
            exp_group: record.exp_group.clone(),
            n_hits: 0,
        });
        if entry.source_plate_id != record.source_plate_id
            || entry.source_plate_row != record.source_plate_row
            || entry.source_plate_column != record.source_plate_column
            || entry.exp_group != record.exp_group
        {
            warn!(
                assay_id = %record.assay_id,
                dot_name = %record.dot_name,
                strip_id = %record.strip_id,
                "layout metadata differs across strips; keeping first seen"
            );
        }
        if record.pos_hit {
            entry.n_hits += 1;
        }
    }

    counts.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(strip_id: &str, dot_name: &str, pos_hit: bool) -> AssayRecord {
        AssayRecord {
            assay_id: "assay.csv".into(),
            strip_id: strip_id.into(),
            dot_name: dot_name.into(),
            source_plate_id: "p1".into(),
            source_plate_row: dot_name[..1].into(),
            source_plate_column: dot_name[1..].into(),
            exp_group: "test".into(),
            zscore_threshold: 2.0,
            row: 0,
            col: 0,
            x: 0.0,
            y: 0.0,
            mean_intensity_control: 100.0,
            mean_intensity_probe: 100.0,
            norm_probe_intensity: 1.0,
            positive_threshold: 2.0,
            pos_hit,
        }
    }

    #[test]
    fn counts_hits_and_emits_explicit_zero_rows() {
        // Layout has A1 and A2. Strip 1 measures both (A1 positive, A2
        // negative); strip 2 measures only A1 (positive).
        let results = vec![
            record("s1", "A1", true),
            record("s1", "A2", false),
            record("s2", "A1", true),
        ];
        let counts = hit_counts(&results);
        assert_eq!(counts.len(), 2);
        let a1 = counts.iter().find(|c| c.dot_name == "A1").unwrap();
        let a2 = counts.iter().find(|c| c.dot_name == "A2").unwrap();
        assert_eq!(a1.n_hits, 2);
        assert_eq!(a2.n_hits, 0);
    }

    #[test]
    fn never_evaluated_dots_do_not_appear() {
        let results = vec![record("s1", "A1", false)];
        let counts = hit_counts(&results);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].dot_name, "A1");
        assert_eq!(counts[0].n_hits, 0);
    }

    #[test]
    fn assays_are_aggregated_separately() {
        let mut r1 = record("s1", "A1", true);
        let mut r2 = record("s1", "A1", true);
        r1.assay_id = "assay_a.csv".into();
        r2.assay_id = "assay_b.csv".into();
        let counts = hit_counts(&[r1, r2]);
        assert_eq!(counts.len(), 2);
        assert!(counts.iter().all(|c| c.n_hits == 1));
    }

    #[test]
    fn metadata_comes_from_representative_row() {
        let mut r1 = record("s1", "A1", false);
        let r2 = record("s2", "A1", true);
        r1.source_plate_id = "p_first".into();
        let counts = hit_counts(&[r1, r2]);
        assert_eq!(counts[0].source_plate_id, "p_first");
        assert_eq!(counts[0].n_hits, 1);
    }
}
