use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array2;

use crate::error::{Result, StackError};
use crate::sequence::SampleFormat;
use crate::source::ImageWriter;

/// Writes the assembled stack as TIFF or PNG (format chosen from the file
/// extension). Integer stacks are written at their native depth; f32 stacks
/// are written as 16-bit with values capped at the 16-bit range.
pub struct ImageFileWriter;

impl ImageWriter for ImageFileWriter {
    fn write_image(
        &self,
        channels: &[Array2<f32>],
        format: SampleFormat,
        path: &Path,
    ) -> Result<()> {
        match channels {
            [mono] => write_mono(mono, format, path),
            [r, g, b] => write_rgb(r, g, b, format, path),
            other => Err(StackError::Configuration(format!(
                "unsupported channel count {} for image output",
                other.len()
            ))),
        }
    }
}

fn to_u16(v: f32) -> u16 {
    v.clamp(0.0, 65535.0) as u16
}

fn write_mono(plane: &Array2<f32>, format: SampleFormat, path: &Path) -> Result<()> {
    let (h, w) = plane.dim();
    match format {
        SampleFormat::U8 => {
            let mut img = GrayImage::new(w as u32, h as u32);
            for row in 0..h {
                for col in 0..w {
                    let v = plane[[row, col]].clamp(0.0, 255.0) as u8;
                    img.put_pixel(col as u32, row as u32, Luma([v]));
                }
            }
            img.save(path)?;
        }
        SampleFormat::U16 | SampleFormat::F32 => {
            let mut pixels: Vec<u16> = Vec::with_capacity(h * w);
            for row in 0..h {
                for col in 0..w {
                    pixels.push(to_u16(plane[[row, col]]));
                }
            }
            let img =
                image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
                    .expect("buffer size matches dimensions");
            img.save(path)?;
        }
    }
    Ok(())
}

fn write_rgb(
    r: &Array2<f32>,
    g: &Array2<f32>,
    b: &Array2<f32>,
    format: SampleFormat,
    path: &Path,
) -> Result<()> {
    let (h, w) = r.dim();
    match format {
        SampleFormat::U8 => {
            let mut img = RgbImage::new(w as u32, h as u32);
            for row in 0..h {
                for col in 0..w {
                    let px = Rgb([
                        r[[row, col]].clamp(0.0, 255.0) as u8,
                        g[[row, col]].clamp(0.0, 255.0) as u8,
                        b[[row, col]].clamp(0.0, 255.0) as u8,
                    ]);
                    img.put_pixel(col as u32, row as u32, px);
                }
            }
            img.save(path)?;
        }
        SampleFormat::U16 | SampleFormat::F32 => {
            let mut pixels: Vec<u16> = Vec::with_capacity(h * w * 3);
            for row in 0..h {
                for col in 0..w {
                    pixels.push(to_u16(r[[row, col]]));
                    pixels.push(to_u16(g[[row, col]]));
                    pixels.push(to_u16(b[[row, col]]));
                }
            }
            let img = image::ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
                .expect("buffer size matches dimensions");
            img.save(path)?;
        }
    }
    Ok(())
}
