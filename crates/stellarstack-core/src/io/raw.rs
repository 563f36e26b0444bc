use std::fs::File;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::error::{Result, StackError};
use crate::sequence::{Geometry, SampleFormat};
use crate::source::ImageSource;

/// Memory-mapped source over one raw planar file per frame.
///
/// Layout per file: channels back to back, each channel row-major, samples
/// little-endian in the sequence's format. File size must match the
/// geometry exactly.
#[derive(Debug)]
pub struct RawSequenceSource {
    geometry: Geometry,
    maps: Vec<Mmap>,
}

impl RawSequenceSource {
    pub fn open(geometry: Geometry, paths: &[PathBuf]) -> Result<Self> {
        let expected = geometry.frame_bytes();
        let mut maps = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            let map = map_frame(path).map_err(|e| StackError::FrameUnavailable {
                index,
                reason: format!("{}: {e}", path.display()),
            })?;
            if map.len() != expected {
                return Err(StackError::GeometryMismatch {
                    expected: format!("{expected} bytes ({geometry})"),
                    actual: format!("{} is {} bytes", path.display(), map.len()),
                });
            }
            maps.push(map);
        }
        Ok(Self { geometry, maps })
    }
}

fn map_frame(path: &Path) -> std::io::Result<Mmap> {
    let file = File::open(path)?;
    // Safety: the mapping is read-only and the file is not expected to be
    // truncated while the sequence is open.
    unsafe { Mmap::map(&file) }
}

impl ImageSource for RawSequenceSource {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn frame_count(&self) -> usize {
        self.maps.len()
    }

    fn read_rows(
        &self,
        frame: usize,
        channel: usize,
        row_start: usize,
        row_count: usize,
        out: &mut [f32],
    ) -> Result<()> {
        let g = self.geometry;
        let map = self.maps.get(frame).ok_or(StackError::FrameUnavailable {
            index: frame,
            reason: "frame index out of range".into(),
        })?;
        if channel >= g.channels || row_start + row_count > g.height {
            return Err(StackError::FrameUnavailable {
                index: frame,
                reason: format!("read of channel {channel} rows {row_start}+{row_count} out of bounds"),
            });
        }
        let samples = row_count * g.width;
        if out.len() < samples {
            return Err(StackError::FrameUnavailable {
                index: frame,
                reason: "output buffer too small".into(),
            });
        }

        let bps = g.format.bytes_per_sample();
        let start = (channel * g.channel_pixels() + row_start * g.width) * bps;
        let bytes = &map[start..start + samples * bps];
        match g.format {
            SampleFormat::U8 => {
                for (dst, &b) in out[..samples].iter_mut().zip(bytes) {
                    *dst = b as f32;
                }
            }
            SampleFormat::U16 => {
                for (i, dst) in out[..samples].iter_mut().enumerate() {
                    *dst = LittleEndian::read_u16(&bytes[i * 2..i * 2 + 2]) as f32;
                }
            }
            SampleFormat::F32 => {
                LittleEndian::read_f32_into(bytes, &mut out[..samples]);
            }
        }
        Ok(())
    }
}
