//! Grid assignment: map unordered region centroids to named grid cells.

use std::collections::HashMap;

use tracing::debug;

use crate::config::GridSpec;
use crate::error::{BlotError, Result};
use crate::detect::Region;

const KMEANS_MAX_ITERS: usize = 100;

/// Region-label → dot-name mapping plus the parallel region-label →
/// (row, col) mapping, computed once per strip from the control channel and
/// reused verbatim for the probe channel.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    names: HashMap<u32, String>,
    grid: HashMap<u32, (usize, usize)>,
}

impl LabelMap {
    pub fn dot_name(&self, region_label: u32) -> Option<&str> {
        self.names.get(&region_label).map(String::as_str)
    }

    pub fn grid_position(&self, region_label: u32) -> Option<(usize, usize)> {
        self.grid.get(&region_label).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Assigns every region a (row, col) grid index and a dot name.
///
/// Each axis is clustered independently: 1-D k-means with k equal to the
/// declared axis count. Cluster ids carry no order, so each cluster's rank
/// among the sorted cluster centers is used as the axis index (rank 0 is the
/// smallest coordinate, i.e. the first row or column). Two regions may map
/// to the same cell when detection split one dot; that is not deduplicated
/// here.
pub fn assign_grid(regions: &[Region], spec: &GridSpec, strip_id: &str) -> Result<LabelMap> {
    let row_coords: Vec<f64> = regions.iter().map(|r| r.centroid.0).collect();
    let col_coords: Vec<f64> = regions.iter().map(|r| r.centroid.1).collect();

    let (row_clusters, row_ranks) =
        cluster_axis(&row_coords, spec.n_rows(), "row", strip_id)?;
    let (col_clusters, col_ranks) =
        cluster_axis(&col_coords, spec.n_cols(), "col", strip_id)?;

    let mut map = LabelMap::default();
    for (i, region) in regions.iter().enumerate() {
        let row_index = row_ranks[row_clusters[i]];
        let col_index = col_ranks[col_clusters[i]];
        map.names
            .insert(region.label, spec.dot_name(row_index, col_index));
        map.grid.insert(region.label, (row_index, col_index));
    }
    debug!(strip_id, regions = regions.len(), "grid assignment done");
    Ok(map)
}

/// Clusters one axis and returns per-region cluster ids plus the rank of
/// each cluster's center among all centers (cluster id → axis index).
fn cluster_axis(
    coords: &[f64],
    k: usize,
    axis: &'static str,
    strip_id: &str,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let (assignments, centers) =
        kmeans_1d(coords, k).ok_or_else(|| BlotError::DetectionQuality {
            strip_id: strip_id.to_string(),
            axis,
            needed: k,
            found: coords.len(),
        })?;
    Ok((assignments, center_ranks(&centers)))
}

/// Lloyd's algorithm in one dimension with deterministic quantile seeding.
///
/// Returns `None` when fewer points than clusters are given or a cluster
/// ends up empty; callers surface that as a detection-quality failure.
fn kmeans_1d(values: &[f64], k: usize) -> Option<(Vec<usize>, Vec<f64>)> {
    if k == 0 || values.len() < k {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    // Seed centers at evenly spaced quantiles of the sorted values. With
    // ordered seeds, Lloyd updates keep clusters as contiguous intervals,
    // which is what makes the later center ranking spatially meaningful.
    let mut centers: Vec<f64> = (0..k)
        .map(|i| sorted[(2 * i + 1) * sorted.len() / (2 * k)])
        .collect();

    let mut assignments = vec![0usize; values.len()];
    for _ in 0..KMEANS_MAX_ITERS {
        for (value, slot) in values.iter().zip(assignments.iter_mut()) {
            *slot = nearest_center(*value, &centers);
        }

        let mut sums = vec![0.0f64; k];
        let mut counts = vec![0usize; k];
        for (value, &cluster) in values.iter().zip(assignments.iter()) {
            sums[cluster] += value;
            counts[cluster] += 1;
        }
        if counts.iter().any(|&c| c == 0) {
            return None;
        }

        let mut moved = false;
        for c in 0..k {
            let next = sums[c] / counts[c] as f64;
            if (next - centers[c]).abs() > f64::EPSILON {
                moved = true;
            }
            centers[c] = next;
        }
        if !moved {
            break;
        }
    }

    Some((assignments, centers))
}

fn nearest_center(value: f64, centers: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let d = (value - center).abs();
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }
    best
}

/// Rank of each center among the sorted centers (double argsort): the
/// returned vector maps cluster id → axis index.
fn center_ranks(centers: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..centers.len()).collect();
    order.sort_by(|&a, &b| centers[a].total_cmp(&centers[b]));
    let mut ranks = vec![0usize; centers.len()];
    for (rank, &cluster) in order.iter().enumerate() {
        ranks[cluster] = rank;
    }
    ranks
}
