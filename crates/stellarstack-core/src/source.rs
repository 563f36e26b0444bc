use std::path::Path;

use ndarray::Array2;

use crate::consts::STATS_SAMPLE_ROW_TARGET;
use crate::error::{Result, StackError};
use crate::sequence::{Geometry, SampleFormat};
use crate::stats::{self, ChannelStats};

/// Access to the pixel data of a registered sequence. Implementations are
/// owned by the I/O layer; the engine only ever reads row ranges through
/// this trait, one chunk at a time.
pub trait ImageSource: Send + Sync {
    fn geometry(&self) -> Geometry;

    fn frame_count(&self) -> usize;

    /// Read `row_count` rows of one frame channel starting at `row_start`
    /// into `out` (row-major, `row_count * width` samples, raw units).
    fn read_rows(
        &self,
        frame: usize,
        channel: usize,
        row_start: usize,
        row_count: usize,
        out: &mut [f32],
    ) -> Result<()>;

    /// Per-frame background/dispersion statistics, computed once before the
    /// chunked combination loop. The default implementation does a coarse
    /// row-subsampled pass through `read_rows`; adapters with cached header
    /// stats can override it.
    fn channel_stats(&self, frame: usize, channel: usize) -> Result<ChannelStats> {
        let geometry = self.geometry();
        if geometry.width == 0 || geometry.height == 0 {
            return Err(StackError::FrameUnavailable {
                index: frame,
                reason: "degenerate geometry".into(),
            });
        }
        let step = (geometry.height / STATS_SAMPLE_ROW_TARGET).max(1);
        let mut row = vec![0.0f32; geometry.width];
        let mut samples = Vec::with_capacity(geometry.width * geometry.height.div_ceil(step));
        let mut r = 0;
        while r < geometry.height {
            self.read_rows(frame, channel, r, 1, &mut row)?;
            samples.extend_from_slice(&row);
            r += step;
        }
        Ok(stats::channel_stats(&mut samples))
    }
}

/// External writer for the assembled output image. The engine hands over
/// one buffer per channel and does not own persistence beyond this call.
pub trait ImageWriter: Send + Sync {
    fn write_image(
        &self,
        channels: &[Array2<f32>],
        format: SampleFormat,
        path: &Path,
    ) -> Result<()>;
}
