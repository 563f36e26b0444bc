use ndarray::Array2;

use crate::error::{Result, StackError};
use crate::sequence::Geometry;
use crate::source::ImageSource;

/// Image source backed by in-memory channel planes. Used by tests and by
/// callers that already hold decoded frames.
pub struct MemorySource {
    geometry: Geometry,
    /// `frames[frame][channel]`, each plane shaped (height, width).
    frames: Vec<Vec<Array2<f32>>>,
}

impl MemorySource {
    pub fn new(geometry: Geometry, frames: Vec<Vec<Array2<f32>>>) -> Result<Self> {
        for (i, planes) in frames.iter().enumerate() {
            if planes.len() != geometry.channels {
                return Err(StackError::GeometryMismatch {
                    expected: format!("{} channels", geometry.channels),
                    actual: format!("frame {i} has {}", planes.len()),
                });
            }
            for plane in planes {
                if plane.dim() != (geometry.height, geometry.width) {
                    return Err(StackError::GeometryMismatch {
                        expected: geometry.to_string(),
                        actual: format!("frame {i} plane is {:?}", plane.dim()),
                    });
                }
            }
        }
        Ok(Self { geometry, frames })
    }

    /// Convenience constructor for single-channel sequences.
    pub fn from_mono(geometry: Geometry, planes: Vec<Array2<f32>>) -> Result<Self> {
        Self::new(geometry, planes.into_iter().map(|p| vec![p]).collect())
    }
}

impl ImageSource for MemorySource {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn read_rows(
        &self,
        frame: usize,
        channel: usize,
        row_start: usize,
        row_count: usize,
        out: &mut [f32],
    ) -> Result<()> {
        let planes = self.frames.get(frame).ok_or(StackError::FrameUnavailable {
            index: frame,
            reason: "frame index out of range".into(),
        })?;
        let plane = planes.get(channel).ok_or(StackError::FrameUnavailable {
            index: frame,
            reason: format!("channel {channel} out of range"),
        })?;
        let width = self.geometry.width;
        if row_start + row_count > self.geometry.height || out.len() < row_count * width {
            return Err(StackError::FrameUnavailable {
                index: frame,
                reason: format!("row range {row_start}+{row_count} out of bounds"),
            });
        }
        for r in 0..row_count {
            for (c, &v) in plane.row(row_start + r).iter().enumerate() {
                out[r * width + c] = v;
            }
        }
        Ok(())
    }
}
