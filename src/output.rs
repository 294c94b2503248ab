//! Readback resolve and on-disk encoding of output buffers.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec4;
use image::{ImageBuffer, Rgb};

/// Resolves a raw accumulation buffer into display rows.
///
/// The renderer stores row 0 at the bottom and RGB scaled by the
/// accumulation weight in the alpha channel; this flips the rows and divides
/// the weight out. Pixels that never accumulated (zero weight) resolve to
/// black rather than NaN.
pub fn resolve_frame(data: &[Vec4], width: u32, height: u32) -> Vec<[f32; 3]> {
    let (width, height) = (width as usize, height as usize);
    let mut frame = vec![[0.0f32; 3]; width * height];
    for y in 0..height {
        for x in 0..width {
            let value = data[(height - 1 - y) * width + x];
            if value.w != 0.0 {
                let rgb = value.truncate() / value.w;
                frame[y * width + x] = [rgb.x, rgb.y, rgb.z];
            }
        }
    }
    frame
}

/// Encodes resolved pixels to `path` according to `file_ext`.
///
/// `exr` stores the linear values exactly; `png` stores them clamped at
/// 16 bit, which is the conversion any integer-format writer applies to
/// float data. No gamma or tone mapping.
pub fn write_image(
    path: &Path,
    pixels: &[[f32; 3]],
    width: u32,
    height: u32,
    file_ext: &str,
) -> Result<()> {
    match file_ext {
        "png" => {
            let raw: Vec<u16> = pixels
                .iter()
                .flatten()
                .map(|channel| (channel.clamp(0.0, 1.0) * f32::from(u16::MAX)) as u16)
                .collect();
            let img: ImageBuffer<Rgb<u16>, Vec<u16>> =
                ImageBuffer::from_raw(width, height, raw)
                    .ok_or_else(|| anyhow!("pixel buffer does not match {width}x{height}"))?;
            img.save(path)
        }
        "exr" => {
            let raw: Vec<f32> = pixels.iter().flatten().copied().collect();
            let img: ImageBuffer<Rgb<f32>, Vec<f32>> =
                ImageBuffer::from_raw(width, height, raw)
                    .ok_or_else(|| anyhow!("pixel buffer does not match {width}x{height}"))?;
            img.save(path)
        }
        other => bail!("no image encoder available for extension '{other}'"),
    }
    .with_context(|| format!("failed to write image '{}'", path.display()))
}
