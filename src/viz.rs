//! QC rendering: detection overlays on the strip image and a per-strip
//! normalized-intensity plot.

use std::path::Path;

use image::{Rgba, RgbaImage};
use plotters::prelude::*;

use crate::analysis::hits::AssayRecord;
use crate::error::{BlotError, Result};
use crate::measure::SpotRecord;

const RING_COLOR: Rgba<u8> = Rgba([110, 170, 90, 255]);
const HIT_COLOR: RGBColor = RGBColor(200, 60, 40);
const MISS_COLOR: RGBColor = RGBColor(70, 100, 190);
const GRID_COLOR: RGBColor = RGBColor(210, 210, 210);

/// Draws a ring around every measured spot on a copy of the strip image.
pub fn render_detection_overlay(source: &RgbaImage, spots: &[SpotRecord]) -> RgbaImage {
    let mut canvas = source.clone();
    for spot in spots {
        let radius = (spot.area as f32 / std::f32::consts::PI).sqrt() + 2.0;
        draw_ring(&mut canvas, (spot.x as f32, spot.y as f32), radius, RING_COLOR);
    }
    canvas
}

/// Renders the overlay and writes it as a PNG.
pub fn save_detection_overlay(
    source: &RgbaImage,
    spots: &[SpotRecord],
    path: impl AsRef<Path>,
) -> Result<()> {
    let canvas = render_detection_overlay(source, spots);
    canvas.save(path)?;
    Ok(())
}

fn draw_ring(canvas: &mut RgbaImage, center: (f32, f32), radius: f32, color: Rgba<u8>) {
    let (cx, cy) = center;
    let radius = radius.max(2.0);
    let half_stroke = 0.75;

    let width = canvas.width() as i32;
    let height = canvas.height() as i32;
    let max_r = (radius + 1.5).ceil() as i32;
    let cx_i = cx.round() as i32;
    let cy_i = cy.round() as i32;

    let min_x = (cx_i - max_r).max(0);
    let max_x = (cx_i + max_r).min(width - 1);
    let min_y = (cy_i - max_r).max(0);
    let max_y = (cy_i + max_r).min(height - 1);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            if (dist - radius).abs() < half_stroke + 0.5 {
                *canvas.get_pixel_mut(x as u32, y as u32) = color;
            }
        }
    }
}

/// Renders a per-strip plot of the scored dots in image coordinates: grid
/// lines through every dot center, a filled marker per dot, hits in red.
/// Returns an RGB pixel buffer of the requested size.
pub fn render_strip_plot(width: u32, height: u32, records: &[AssayRecord]) -> Result<Vec<u8>> {
    let pixel_count = width as usize * height as usize;
    let mut rgb = vec![255u8; pixel_count * 3];
    if pixel_count == 0 {
        return Ok(rgb);
    }

    {
        let root = BitMapBackend::with_buffer(&mut rgb, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| BlotError::Plot(e.to_string()))?;

        let mut xs: Vec<i32> = records.iter().map(|r| r.x.round() as i32).collect();
        let mut ys: Vec<i32> = records.iter().map(|r| r.y.round() as i32).collect();
        xs.sort_unstable();
        xs.dedup();
        ys.sort_unstable();
        ys.dedup();

        for x in xs {
            let x = x.clamp(0, width.saturating_sub(1) as i32);
            root.draw(&PathElement::new(
                [(x, 0), (x, height.saturating_sub(1) as i32)],
                GRID_COLOR,
            ))
            .map_err(|e| BlotError::Plot(e.to_string()))?;
        }
        for y in ys {
            let y = y.clamp(0, height.saturating_sub(1) as i32);
            root.draw(&PathElement::new(
                [(0, y), (width.saturating_sub(1) as i32, y)],
                GRID_COLOR,
            ))
            .map_err(|e| BlotError::Plot(e.to_string()))?;
        }

        for record in records {
            let x = (record.x.round() as i32).clamp(0, width.saturating_sub(1) as i32);
            let y = (record.y.round() as i32).clamp(0, height.saturating_sub(1) as i32);
            let color = if record.pos_hit { HIT_COLOR } else { MISS_COLOR };
            root.draw(&Circle::new((x, y), 4, color.filled()))
                .map_err(|e| BlotError::Plot(e.to_string()))?;
        }

        root.present().map_err(|e| BlotError::Plot(e.to_string()))?;
    }

    Ok(rgb)
}

/// Renders the strip plot and writes it as a PNG.
pub fn save_strip_plot(
    width: u32,
    height: u32,
    records: &[AssayRecord],
    path: impl AsRef<Path>,
) -> Result<()> {
    let rgb = render_strip_plot(width, height, records)?;
    image::save_buffer(
        path.as_ref(),
        &rgb,
        width,
        height,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}
