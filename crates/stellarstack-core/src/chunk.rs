use std::ops::Range;

use crate::consts::CHUNK_SAFETY_FACTOR;
use crate::error::{Result, StackError};

/// Deterministic row partition of the output image. The same inputs always
/// produce the same boundaries, so results are reproducible across runs and
/// thread counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    pub rows_per_chunk: usize,
    pub chunks: Vec<Range<usize>>,
}

impl ChunkPlan {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Size row chunks so that one row buffer per participating frame (f32
/// working samples) plus kernel scratch stays under the memory budget.
/// Failing to fit even a single row is fatal and is reported before any
/// frame I/O begins.
pub fn plan_chunks(
    height: usize,
    width: usize,
    frame_count: usize,
    budget_bytes: usize,
) -> Result<ChunkPlan> {
    if height == 0 || width == 0 {
        return Err(StackError::Configuration(
            "cannot plan chunks for a zero-sized image".into(),
        ));
    }
    if frame_count == 0 {
        return Err(StackError::EmptySequence);
    }

    let row_bytes = frame_count * width * std::mem::size_of::<f32>();
    let weighted_row = row_bytes as f64 * CHUNK_SAFETY_FACTOR;
    let rows = (budget_bytes as f64 / weighted_row).floor() as usize;
    if rows == 0 {
        return Err(StackError::InsufficientMemory {
            required: weighted_row.ceil() as usize,
            budget: budget_bytes,
        });
    }
    let rows_per_chunk = rows.min(height);

    let chunks = (0..height)
        .step_by(rows_per_chunk)
        .map(|start| start..(start + rows_per_chunk).min(height))
        .collect();

    Ok(ChunkPlan {
        rows_per_chunk,
        chunks,
    })
}
