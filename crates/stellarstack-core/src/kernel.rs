use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{
    EPSILON, MAX_WINSOR_ITERATIONS, MIN_REJECTION_STACK, SIGMA_CONVERGENCE_TOL,
    WINSOR_ANCHOR_SPREAD, WINSOR_STDDEV_CORRECTION,
};
use crate::normalize::NormCoeffs;
use crate::stats::{mean_std, median_in_place};

/// Per-pixel reduction applied to the retained corrected samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackMethod {
    Sum,
    Min,
    Max,
    Median,
    #[default]
    RejectionMean,
}

impl std::fmt::Display for StackMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Median => write!(f, "median"),
            Self::RejectionMean => write!(f, "rejection-mean"),
        }
    }
}

/// Outlier rejection applied before the reduction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum Rejection {
    #[default]
    None,
    /// Iterative Winsorized sigma-clipping with separate low/high bounds.
    Winsorized { sigma_low: f32, sigma_high: f32 },
}

/// Bookkeeping for one combined chunk. Counts are aggregated per chunk so
/// pathological pixels are logged once per chunk, not per pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub total_samples: u64,
    pub rejected_samples: u64,
    /// Pixels where rejection removed every sample and the kernel fell back
    /// to combining all samples unweighted.
    pub fallback_pixels: u64,
}

impl ChunkOutcome {
    fn merge(self, other: Self) -> Self {
        Self {
            total_samples: self.total_samples + other.total_samples,
            rejected_samples: self.rejected_samples + other.rejected_samples,
            fallback_pixels: self.fallback_pixels + other.fallback_pixels,
        }
    }
}

/// Combine one chunk of rows from every participating frame into `out`.
///
/// `frames` holds one row-major buffer per frame (`n_rows * width` samples,
/// raw units); `coeffs` the matching normalization coefficient per frame for
/// this channel. Rows are independent, so the loop parallelizes across rows;
/// within a pixel the reduction walks frames in order, which keeps results
/// bit-identical regardless of thread count.
#[allow(clippy::too_many_arguments)]
pub fn combine_chunk(
    frames: &[&[f32]],
    coeffs: &[NormCoeffs],
    method: StackMethod,
    rejection: Rejection,
    width: usize,
    n_rows: usize,
    clamp_max: Option<f32>,
    out: &mut [f32],
) -> ChunkOutcome {
    let n = frames.len();
    debug_assert_eq!(coeffs.len(), n);
    debug_assert!(frames.iter().all(|f| f.len() >= n_rows * width));
    debug_assert!(out.len() >= n_rows * width);

    let outcome = out[..n_rows * width]
        .par_chunks_mut(width)
        .enumerate()
        .map(|(row, out_row)| {
            let mut values = vec![0.0f32; n];
            let mut keep = vec![true; n];
            let mut scratch = vec![0.0f32; n];
            let mut outcome = ChunkOutcome::default();

            for (col, out_px) in out_row.iter_mut().enumerate() {
                let at = row * width + col;
                for i in 0..n {
                    values[i] = coeffs[i].apply(frames[i][at]);
                }
                keep.iter_mut().for_each(|k| *k = true);
                outcome.total_samples += n as u64;

                let mut kept = n;
                if let Rejection::Winsorized {
                    sigma_low,
                    sigma_high,
                } = rejection
                {
                    if n >= MIN_REJECTION_STACK {
                        let rejected =
                            winsorized_reject(&values, &mut keep, sigma_low, sigma_high, &mut scratch);
                        if rejected == n {
                            // Pathological sigma configuration: use all
                            // samples unweighted instead of an undefined value.
                            keep.iter_mut().for_each(|k| *k = true);
                            outcome.fallback_pixels += 1;
                        } else {
                            kept = n - rejected;
                            outcome.rejected_samples += rejected as u64;
                        }
                    }
                }

                let value = reduce(method, &values, &keep, kept, &mut scratch);
                *out_px = match clamp_max {
                    Some(max) => value.clamp(0.0, max),
                    None => value,
                };
            }
            outcome
        })
        .reduce(ChunkOutcome::default, ChunkOutcome::merge);

    outcome
}

/// Winsorized sigma-clipping for one corrected sample vector.
///
/// The refinement loop clamps the working copy at median +/- 1.5 sigma and
/// recomputes the Winsorized mean/sigma (with Huber's 1.134 correction)
/// until sigma converges or the iteration cap is hit. The final
/// `mean +/- sigma_low/high * sigma` bounds are then applied to the original
/// samples; values strictly outside are marked rejected in `keep`.
///
/// Returns the number of rejected samples.
fn winsorized_reject(
    values: &[f32],
    keep: &mut [bool],
    sigma_low: f32,
    sigma_high: f32,
    scratch: &mut [f32],
) -> usize {
    scratch.copy_from_slice(values);
    let (mut mean, mut sigma) = mean_std(scratch);

    for _ in 0..MAX_WINSOR_ITERATIONS {
        if sigma < EPSILON {
            break;
        }
        let median = median_in_place(scratch);
        let lo = median - WINSOR_ANCHOR_SPREAD * sigma;
        let hi = median + WINSOR_ANCHOR_SPREAD * sigma;
        for v in scratch.iter_mut() {
            if *v < lo {
                *v = lo;
            } else if *v > hi {
                *v = hi;
            }
        }
        let (new_mean, raw_sigma) = mean_std(scratch);
        let new_sigma = raw_sigma * WINSOR_STDDEV_CORRECTION;
        let converged = (sigma - new_sigma).abs() <= sigma * SIGMA_CONVERGENCE_TOL;
        mean = new_mean;
        sigma = new_sigma;
        if converged {
            break;
        }
    }

    let lo = mean - sigma_low * sigma;
    let hi = mean + sigma_high * sigma;
    let mut rejected = 0;
    for (i, &v) in values.iter().enumerate() {
        if v < lo || v > hi {
            keep[i] = false;
            rejected += 1;
        }
    }
    rejected
}

/// Reduce the retained corrected samples to one output value. Sum and mean
/// accumulate in f64 to avoid cumulative rounding bias.
fn reduce(
    method: StackMethod,
    values: &[f32],
    keep: &[bool],
    kept: usize,
    scratch: &mut [f32],
) -> f32 {
    match method {
        StackMethod::Sum => {
            let mut sum = 0.0f64;
            for (i, &v) in values.iter().enumerate() {
                if keep[i] {
                    sum += v as f64;
                }
            }
            sum as f32
        }
        StackMethod::Min => {
            let mut min = f32::INFINITY;
            for (i, &v) in values.iter().enumerate() {
                if keep[i] && v < min {
                    min = v;
                }
            }
            min
        }
        StackMethod::Max => {
            let mut max = f32::NEG_INFINITY;
            for (i, &v) in values.iter().enumerate() {
                if keep[i] && v > max {
                    max = v;
                }
            }
            max
        }
        StackMethod::Median => {
            let mut m = 0;
            for (i, &v) in values.iter().enumerate() {
                if keep[i] {
                    scratch[m] = v;
                    m += 1;
                }
            }
            median_in_place(&mut scratch[..m])
        }
        StackMethod::RejectionMean => {
            let mut sum = 0.0f64;
            for (i, &v) in values.iter().enumerate() {
                if keep[i] {
                    sum += v as f64;
                }
            }
            (sum / kept as f64) as f32
        }
    }
}
