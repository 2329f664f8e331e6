//! Spot detection: segment dot-shaped regions from a single-channel image.

use std::collections::{BTreeMap, HashSet};

use image::{GrayImage, Luma};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology::{close, erode};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::debug;

use crate::config::{SegmentationParams, ThresholdMode};

/// Integer-labeled image: 0 is background, each surviving region keeps the
/// label id it received during connected-component labeling. This is the
/// reusable spatial mask for measuring other channels at identical pixels.
pub type LabelImage = image::ImageBuffer<Luma<u32>, Vec<u32>>;

/// One connected component that survived filtering.
///
/// `centroid` is (y, x) in pixel coordinates, row axis first. Labels are
/// unique within one detection run only.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub label: u32,
    pub centroid: (f64, f64),
    pub area: u32,
    pub perimeter: f64,
    pub mean_intensity: f64,
}

/// Circularity `4πA/P²`, defined as 0 for a zero perimeter so degenerate
/// regions are rejected by any positive threshold instead of dividing by 0.
pub fn circularity(area: u32, perimeter: f64) -> f64 {
    if perimeter > 0.0 {
        4.0 * std::f64::consts::PI * area as f64 / (perimeter * perimeter)
    } else {
        0.0
    }
}

/// Detects dot-shaped regions in `im`.
///
/// Median filter, binarization (local adaptive or global Otsu), closing,
/// erosion, border clearing, labeling, then area and circularity filters.
/// Intensity statistics are computed against the original unfiltered image.
/// Labels removed by filtering are zeroed out of the returned label image so
/// the region list and the mask stay consistent. Zero surviving regions is
/// a valid result, not an error.
pub fn find_spots(im: &GrayImage, params: &SegmentationParams) -> (Vec<Region>, LabelImage) {
    let median_radius = params.median_size / 2;
    let filtered = median_filter(im, median_radius, median_radius);

    let bw = match params.threshold {
        ThresholdMode::Local { block_size } => local_threshold(&filtered, block_size),
        ThresholdMode::Global => {
            let level = otsu_level(&filtered);
            threshold(&filtered, level, ThresholdType::Binary)
        }
    };

    let closed = close(&bw, Norm::LInf, params.closing_size / 2);
    let eroded = erode(&closed, Norm::L1, params.erosion_radius);

    let mut label_image = connected_components(&eroded, Connectivity::Eight, Luma([0u8]));
    clear_border_labels(&mut label_image);

    let regions = region_stats(&label_image, im);
    let total = regions.len();

    let surviving: Vec<Region> = regions
        .into_iter()
        .filter(|r| r.area > params.min_area)
        .filter(|r| circularity(r.area, r.perimeter) > params.min_circularity)
        .collect();
    debug!(
        detected = total,
        surviving = surviving.len(),
        "spot detection"
    );

    let keep: HashSet<u32> = surviving.iter().map(|r| r.label).collect();
    for px in label_image.pixels_mut() {
        if px[0] != 0 && !keep.contains(&px[0]) {
            px[0] = 0;
        }
    }

    (surviving, label_image)
}

/// Computes per-region statistics from a label image against an intensity
/// image of the same dimensions. Shared between fresh detection and masked
/// re-measurement, so both channels use the exact same estimators.
///
/// The perimeter is the 4-neighbor boundary edge count (edges between a
/// region pixel and background, another region, or the image edge).
pub fn region_stats(label_image: &LabelImage, intensity: &GrayImage) -> Vec<Region> {
    assert_eq!(label_image.dimensions(), intensity.dimensions());
    let (width, height) = label_image.dimensions();

    #[derive(Default)]
    struct Acc {
        count: u64,
        sum_x: f64,
        sum_y: f64,
        sum_intensity: f64,
        edges: u64,
    }

    let mut accs: BTreeMap<u32, Acc> = BTreeMap::new();
    for y in 0..height {
        for x in 0..width {
            let label = label_image.get_pixel(x, y)[0];
            if label == 0 {
                continue;
            }
            let acc = accs.entry(label).or_default();
            acc.count += 1;
            acc.sum_x += x as f64;
            acc.sum_y += y as f64;
            acc.sum_intensity += intensity.get_pixel(x, y)[0] as f64;
            for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                let neighbor = if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    0
                } else {
                    label_image.get_pixel(nx as u32, ny as u32)[0]
                };
                if neighbor != label {
                    acc.edges += 1;
                }
            }
        }
    }

    accs.into_iter()
        .map(|(label, acc)| Region {
            label,
            centroid: (acc.sum_y / acc.count as f64, acc.sum_x / acc.count as f64),
            area: acc.count as u32,
            perimeter: acc.edges as f64,
            mean_intensity: acc.sum_intensity / acc.count as f64,
        })
        .collect()
}

/// Local adaptive binarization: a pixel is foreground when it is strictly
/// brighter than the mean of the `block_size` x `block_size` window around
/// it (clamped at the image edges). Flat background therefore stays
/// background. Window sums come from an integral image.
fn local_threshold(im: &GrayImage, block_size: u32) -> GrayImage {
    let (width, height) = im.dimensions();
    let mut bw = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return bw;
    }

    // integral[y][x] = sum of pixels in the rectangle [0, x) x [0, y).
    let w1 = width as usize + 1;
    let h1 = height as usize + 1;
    let mut integral = vec![0u64; w1 * h1];
    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += im.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * w1 + (x + 1)] = integral[y * w1 + (x + 1)] + row_sum;
        }
    }

    let radius = (block_size / 2) as i64;
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let x0 = (x - radius).max(0) as usize;
            let y0 = (y - radius).max(0) as usize;
            let x1 = (x + radius + 1).min(width as i64) as usize;
            let y1 = (y + radius + 1).min(height as i64) as usize;
            let sum = integral[y1 * w1 + x1] + integral[y0 * w1 + x0]
                - integral[y0 * w1 + x1]
                - integral[y1 * w1 + x0];
            let count = ((x1 - x0) * (y1 - y0)) as u64;
            let value = im.get_pixel(x as u32, y as u32)[0] as u64;
            if value * count > sum {
                bw.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
    }
    bw
}

/// Zeroes every label connected to the image border, so partially visible
/// dots do not contribute biased centroids or areas.
fn clear_border_labels(label_image: &mut LabelImage) {
    let (width, height) = label_image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let mut border: HashSet<u32> = HashSet::new();
    for x in 0..width {
        border.insert(label_image.get_pixel(x, 0)[0]);
        border.insert(label_image.get_pixel(x, height - 1)[0]);
    }
    for y in 0..height {
        border.insert(label_image.get_pixel(0, y)[0]);
        border.insert(label_image.get_pixel(width - 1, y)[0]);
    }
    border.remove(&0);
    if border.is_empty() {
        return;
    }

    for px in label_image.pixels_mut() {
        if border.contains(&px[0]) {
            px[0] = 0;
        }
    }
}

/// Draws a filled circle of the given intensity. Test helper shared by the
/// image-side unit tests.
#[cfg(test)]
pub(crate) fn draw_dot(im: &mut GrayImage, cx: i64, cy: i64, radius: i64, value: u8) {
    for y in (cy - radius)..=(cy + radius) {
        for x in (cx - radius)..=(cx + radius) {
            if x < 0 || y < 0 || x >= im.width() as i64 || y >= im.height() as i64 {
                continue;
            }
            let dx = x - cx;
            let dy = y - cy;
            if dx * dx + dy * dy <= radius * radius {
                im.put_pixel(x as u32, y as u32, Luma([value]));
            }
        }
    }
}
