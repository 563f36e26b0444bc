use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ndarray::Array2;
use tracing::{info, warn};

use crate::chunk::plan_chunks;
use crate::config::StackConfig;
use crate::error::{Result, StackError};
use crate::kernel::{combine_chunk, ChunkOutcome};
use crate::normalize::compute_normalization;
use crate::progress::{ProgressReporter, StackStage};
use crate::select::select_frames;
use crate::sequence::Sequence;
use crate::source::{ImageSource, ImageWriter};
use crate::stats::noise_sigma;

/// Cooperative cancellation flag, checked at chunk boundaries only. A
/// cancelled run stops before the next chunk's frame reads and never
/// flushes partial output to the writer.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run-level report handed back with the finished stack.
#[derive(Clone, Debug, Default)]
pub struct OutputSummary {
    pub frames_stacked: usize,
    /// Frames dropped between selection and combination (stats failures,
    /// degenerate normalization).
    pub frames_dropped: usize,
    pub chunk_count: usize,
    pub total_samples: u64,
    pub rejected_samples: u64,
    pub rejection_fallback_pixels: u64,
    /// Post-hoc per-channel noise estimate of the assembled image.
    pub noise: Vec<f64>,
}

impl OutputSummary {
    fn accumulate(&mut self, outcome: ChunkOutcome) {
        self.total_samples += outcome.total_samples;
        self.rejected_samples += outcome.rejected_samples;
        self.rejection_fallback_pixels += outcome.fallback_pixels;
    }

    /// Fraction of samples rejected as outliers, for reporting.
    pub fn rejection_rate(&self) -> f64 {
        if self.total_samples == 0 {
            0.0
        } else {
            self.rejected_samples as f64 / self.total_samples as f64
        }
    }
}

/// Stack a sequence into in-memory per-channel buffers.
///
/// Drives the full combination: selection, normalization, chunk planning,
/// then the chunked read/combine loop. Chunk progression is sequential (one
/// chunk's working set is live at a time, as the planner's budget assumes);
/// the kernel parallelizes rows within each chunk.
pub fn stack_sequence(
    sequence: &Sequence,
    config: &StackConfig,
    source: &dyn ImageSource,
    reporter: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<(Vec<Array2<f32>>, OutputSummary)> {
    config.validate()?;

    let geometry = sequence.geometry;
    if source.geometry() != geometry {
        return Err(StackError::GeometryMismatch {
            expected: geometry.to_string(),
            actual: source.geometry().to_string(),
        });
    }
    if sequence.len() > source.frame_count() {
        return Err(StackError::Configuration(format!(
            "sequence lists {} frames but the source holds {}",
            sequence.len(),
            source.frame_count()
        )));
    }

    reporter.begin_stage(StackStage::Selecting, None);
    let selected = select_frames(sequence, &config.filters)?;
    info!(
        selected = selected.len(),
        total = sequence.len(),
        filter = %selected.description,
        "Frames selected"
    );
    reporter.finish_stage();
    let selected_count = selected.len();

    reporter.begin_stage(StackStage::Normalizing, Some(selected_count));
    let (set, coeffs) = compute_normalization(source, sequence, &selected, config.normalization)?;
    if set.len() < selected_count {
        warn!(
            dropped = selected_count - set.len(),
            "Frames dropped during normalization"
        );
    }
    reporter.finish_stage();

    let n = set.len();
    let (width, height) = (geometry.width, geometry.height);

    reporter.begin_stage(StackStage::Planning, None);
    let plan = plan_chunks(height, width, n, config.memory_budget_bytes)?;
    info!(
        frames = n,
        rows_per_chunk = plan.rows_per_chunk,
        chunks = plan.chunk_count(),
        "Chunk plan ready"
    );
    reporter.finish_stage();

    let pool = match config.threads {
        Some(threads) => Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| StackError::Configuration(format!("thread pool: {e}")))?,
        ),
        None => None,
    };

    let mut summary = OutputSummary {
        frames_stacked: n,
        frames_dropped: selected_count - n,
        chunk_count: plan.chunk_count(),
        ..OutputSummary::default()
    };

    reporter.begin_stage(
        StackStage::Stacking,
        Some(plan.chunk_count() * geometry.channels),
    );
    let clamp_max = geometry.format.max_value();
    let mut outputs: Vec<Vec<f32>> = vec![vec![0.0; width * height]; geometry.channels];
    // Row buffers are allocated once and reused for every chunk; the last
    // chunk of a channel may use a prefix of each buffer.
    let mut row_bufs: Vec<Vec<f32>> = vec![vec![0.0; plan.rows_per_chunk * width]; n];
    let mut chunks_done = 0;

    for channel in 0..geometry.channels {
        let channel_coeffs: Vec<_> = coeffs.iter().map(|c| c[channel]).collect();
        for rows in &plan.chunks {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping at chunk boundary");
                return Err(StackError::Cancelled);
            }

            let n_rows = rows.len();
            for (buf, &frame) in row_bufs.iter_mut().zip(&set.indices) {
                source.read_rows(frame, channel, rows.start, n_rows, &mut buf[..n_rows * width])?;
            }
            let frames: Vec<&[f32]> = row_bufs.iter().map(|b| &b[..n_rows * width]).collect();
            let out = &mut outputs[channel][rows.start * width..rows.end * width];

            let mut combine = || {
                combine_chunk(
                    &frames,
                    &channel_coeffs,
                    config.method,
                    config.rejection,
                    width,
                    n_rows,
                    clamp_max,
                    out,
                )
            };
            let outcome = match &pool {
                Some(pool) => pool.install(combine),
                None => combine(),
            };
            if outcome.fallback_pixels > 0 {
                warn!(
                    channel,
                    rows = ?rows,
                    pixels = outcome.fallback_pixels,
                    "Rejection removed every sample; combined all samples unweighted"
                );
            }
            summary.accumulate(outcome);
            chunks_done += 1;
            reporter.advance(chunks_done);
        }
    }
    reporter.finish_stage();

    let mut buffers = Vec::with_capacity(geometry.channels);
    for data in outputs {
        summary.noise.push(noise_sigma(&data));
        let buffer = Array2::from_shape_vec((height, width), data)
            .map_err(|e| StackError::Configuration(format!("output assembly: {e}")))?;
        buffers.push(buffer);
    }
    info!(
        frames = summary.frames_stacked,
        rejected = summary.rejected_samples,
        rate = format!("{:.2}%", summary.rejection_rate() * 100.0),
        "Stack assembled"
    );

    Ok((buffers, summary))
}

/// Full run: stack the sequence and hand the result to the external writer.
/// A write failure is fatal; nothing partial is reported as success.
pub fn run(
    sequence: &Sequence,
    config: &StackConfig,
    source: &dyn ImageSource,
    writer: &dyn ImageWriter,
    reporter: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<OutputSummary> {
    let (buffers, summary) = stack_sequence(sequence, config, source, reporter, cancel)?;

    reporter.begin_stage(StackStage::Writing, None);
    writer.write_image(&buffers, sequence.geometry.format, &config.output)?;
    info!(output = %config.output.display(), "Stack written");
    reporter.finish_stage();

    Ok(summary)
}

/// Handle to a stacking run executing on a dedicated worker thread.
pub struct StackHandle {
    cancel: CancelToken,
    worker: JoinHandle<Result<OutputSummary>>,
}

impl StackHandle {
    /// Request cooperative cancellation; takes effect at the next chunk
    /// boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the run to finish and return its result.
    pub fn join(self) -> Result<OutputSummary> {
        self.worker.join().map_err(|_| StackError::WorkerPanic)?
    }
}

/// Spawn a stacking run on its own worker thread so the caller (GUI or CLI
/// loop) never blocks. The returned handle is cancellable and joinable.
pub fn spawn_stack(
    sequence: Sequence,
    config: StackConfig,
    source: Arc<dyn ImageSource>,
    writer: Arc<dyn ImageWriter>,
    reporter: Arc<dyn ProgressReporter>,
) -> StackHandle {
    let cancel = CancelToken::default();
    let token = cancel.clone();
    let worker = thread::spawn(move || {
        run(
            &sequence,
            &config,
            source.as_ref(),
            writer.as_ref(),
            reporter.as_ref(),
            &token,
        )
    });
    StackHandle { cancel, worker }
}
