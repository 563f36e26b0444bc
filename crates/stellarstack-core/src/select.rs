use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, StackError};
use crate::sequence::{FrameMeta, Sequence};

/// Per-frame metric a filter ranks or thresholds on. FWHM and roundness are
/// lower-is-better; quality is higher-is-better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMetric {
    Fwhm,
    Roundness,
    Quality,
}

impl FilterMetric {
    pub fn lower_is_better(&self) -> bool {
        !matches!(self, Self::Quality)
    }

    fn value(&self, meta: &FrameMeta) -> Option<f64> {
        match self {
            Self::Fwhm => meta.fwhm,
            Self::Roundness => meta.roundness,
            Self::Quality => meta.quality,
        }
    }
}

impl std::fmt::Display for FilterMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fwhm => write!(f, "fwhm"),
            Self::Roundness => write!(f, "roundness"),
            Self::Quality => write!(f, "quality"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterCriterion {
    /// Keep the best fraction (0, 1] of frames, ranked by the metric.
    Best(f32),
    /// Keep frames whose metric is on the good side of the bound
    /// (<= for lower-is-better metrics, >= for quality).
    Threshold(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameFilter {
    pub metric: FilterMetric,
    pub criterion: FilterCriterion,
}

impl std::fmt::Display for FrameFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.criterion {
            FilterCriterion::Best(fraction) => {
                write!(f, "best {:.0}% by {}", fraction * 100.0, self.metric)
            }
            FilterCriterion::Threshold(bound) => {
                let op = if self.metric.lower_is_better() { "<=" } else { ">=" };
                write!(f, "{} {} {:.3}", self.metric, op, bound)
            }
        }
    }
}

/// Ordered subset of frame indices participating in one stacking run.
/// Always non-empty and in sequence order.
#[derive(Clone, Debug)]
pub struct ParticipatingSet {
    pub indices: Vec<usize>,
    /// Human-readable account of how the set was derived, for logs.
    pub description: String,
}

impl ParticipatingSet {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Derive the participating set from inclusion flags and the configured
/// filters. Filters narrow the set in order; all conditions must hold.
/// Never touches pixel I/O, so an emptied set fails before any frame read.
pub fn select_frames(sequence: &Sequence, filters: &[FrameFilter]) -> Result<ParticipatingSet> {
    let mut indices: Vec<usize> = sequence
        .frames
        .iter()
        .filter(|f| f.included)
        .map(|f| f.index)
        .collect();
    if indices.is_empty() {
        return Err(StackError::EmptySequence);
    }

    let mut parts = vec![format!("{} of {} included", indices.len(), sequence.len())];
    for filter in filters {
        indices = apply_filter(sequence, indices, filter)?;
        if indices.is_empty() {
            return Err(StackError::Configuration(format!(
                "filter \"{filter}\" leaves no participating frames"
            )));
        }
        parts.push(format!("{filter} -> {}", indices.len()));
    }

    Ok(ParticipatingSet {
        indices,
        description: parts.join(", "),
    })
}

fn apply_filter(
    sequence: &Sequence,
    indices: Vec<usize>,
    filter: &FrameFilter,
) -> Result<Vec<usize>> {
    // Frames without a cached value for the metric cannot be ranked or
    // thresholded and are dropped.
    let mut scored: Vec<(usize, f64)> = Vec::with_capacity(indices.len());
    for idx in indices {
        match filter.metric.value(&sequence.frames[idx]) {
            Some(v) => scored.push((idx, v)),
            None => warn!(frame = idx, metric = %filter.metric, "No cached metric, frame dropped"),
        }
    }

    match filter.criterion {
        FilterCriterion::Best(fraction) => {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(StackError::Configuration(format!(
                    "best-fraction filter must be in (0, 1], got {fraction}"
                )));
            }
            // Stable sort keeps sequence order on ties.
            if filter.metric.lower_is_better() {
                scored.sort_by(|a, b| a.1.total_cmp(&b.1));
            } else {
                scored.sort_by(|a, b| b.1.total_cmp(&a.1));
            }
            let keep = ((scored.len() as f64 * fraction as f64).ceil() as usize)
                .clamp(1, scored.len().max(1));
            scored.truncate(keep);
            let mut kept: Vec<usize> = scored.into_iter().map(|(i, _)| i).collect();
            kept.sort_unstable();
            Ok(kept)
        }
        FilterCriterion::Threshold(bound) => {
            let keep_value = |v: f64| {
                if filter.metric.lower_is_better() {
                    v <= bound
                } else {
                    v >= bound
                }
            };
            Ok(scored
                .into_iter()
                .filter(|&(_, v)| keep_value(v))
                .map(|(i, _)| i)
                .collect())
        }
    }
}
