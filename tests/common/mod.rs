//! Synthetic strip images for integration tests: a regular grid of filled
//! circles, control signal in channel 0 and probe signal in channel 1.
#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, RgbImage};

use blotquant::{GridSpec, SegmentationParams, ThresholdMode};

pub const DOT_RADIUS: i64 = 9;
pub const PITCH: i64 = 40;
pub const OFFSET: i64 = 30;
pub const CONTROL_INTENSITY: u8 = 200;

pub fn test_params() -> SegmentationParams {
    SegmentationParams {
        median_size: 3,
        threshold: ThresholdMode::Global,
        closing_size: 3,
        erosion_radius: 2,
        min_area: 20,
        min_circularity: 0.3,
    }
}

/// 2 rows (A, B) by 3 columns (1, 2, 3).
pub fn grid_2x3() -> GridSpec {
    GridSpec::new(
        vec!["A".into(), "B".into()],
        vec!["1".into(), "2".into(), "3".into()],
        test_params(),
    )
    .unwrap()
}

pub fn dot_center(row: usize, col: usize) -> (i64, i64) {
    (OFFSET + PITCH * col as i64, OFFSET + PITCH * row as i64)
}

fn draw_circle(set: &mut impl FnMut(u32, u32), cx: i64, cy: i64, radius: i64, w: u32, h: u32) {
    for y in (cy - radius)..=(cy + radius) {
        for x in (cx - radius)..=(cx + radius) {
            if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
                continue;
            }
            let dx = x - cx;
            let dy = y - cy;
            if dx * dx + dy * dy <= radius * radius {
                set(x as u32, y as u32);
            }
        }
    }
}

/// Control plane only, for direct detection tests; `printed` lists the
/// (row, col) cells that carry a dot.
pub fn control_plane(n_rows: usize, n_cols: usize, printed: &[(usize, usize)]) -> GrayImage {
    let w = (OFFSET + PITCH * n_cols as i64) as u32;
    let h = (OFFSET + PITCH * n_rows as i64) as u32;
    let mut im = GrayImage::new(w, h);
    for &(row, col) in printed {
        let (cx, cy) = dot_center(row, col);
        draw_circle(
            &mut |x, y| im.put_pixel(x, y, Luma([CONTROL_INTENSITY])),
            cx,
            cy,
            DOT_RADIUS,
            w,
            h,
        );
    }
    im
}

/// Two-channel strip image. Every entry in `dots` is
/// `(row, col, probe_intensity)`; the control channel gets a constant
/// intensity at every printed dot.
pub fn strip_image(n_rows: usize, n_cols: usize, dots: &[(usize, usize, u8)]) -> RgbImage {
    let w = (OFFSET + PITCH * n_cols as i64) as u32;
    let h = (OFFSET + PITCH * n_rows as i64) as u32;
    let mut im = RgbImage::new(w, h);
    for &(row, col, probe) in dots {
        let (cx, cy) = dot_center(row, col);
        draw_circle(
            &mut |x, y| im.put_pixel(x, y, Rgb([CONTROL_INTENSITY, probe, 0])),
            cx,
            cy,
            DOT_RADIUS,
            w,
            h,
        );
    }
    im
}

/// Unique scratch directory for one test.
pub fn scratch_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("blotquant_{tag}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
