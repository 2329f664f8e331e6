//! Loading strip images and splitting channels.

use std::path::Path;

use image::GrayImage;

use crate::error::{BlotError, Result};

/// Default channel holding the control (localization) signal.
pub const CONTROL_CHANNEL: usize = 0;
/// Default channel holding the probe (assay) signal.
pub const PROBE_CHANNEL: usize = 1;

/// Opens an RGB strip image and returns the control and probe planes as
/// single-channel images.
pub fn open_rgb(
    path: impl AsRef<Path>,
    control_channel: usize,
    probe_channel: usize,
) -> Result<(GrayImage, GrayImage)> {
    let path = path.as_ref();
    let rgb = image::open(path)?.to_rgb8();

    for requested in [control_channel, probe_channel] {
        if requested >= 3 {
            return Err(BlotError::MissingChannel {
                path: path.to_path_buf(),
                channels: 3,
                requested,
            });
        }
    }

    let control = extract_channel(&rgb, control_channel);
    let probe = extract_channel(&rgb, probe_channel);
    Ok((control, probe))
}

fn extract_channel(rgb: &image::RgbImage, channel: usize) -> GrayImage {
    let (width, height) = rgb.dimensions();
    let mut plane = GrayImage::new(width, height);
    for (x, y, px) in rgb.enumerate_pixels() {
        plane.put_pixel(x, y, image::Luma([px[channel]]));
    }
    plane
}
