use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, StackError};
use crate::select::ParticipatingSet;
use crate::sequence::Sequence;
use crate::source::ImageSource;
use crate::stats::ChannelStats;

/// Inter-frame normalization mode. Additive modes equalize background by
/// subtraction, multiplicative modes by ratio; the scaled variants also
/// equalize dispersion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationMode {
    #[default]
    None,
    Additive,
    AdditiveScaled,
    Multiplicative,
    MultiplicativeScaled,
}

/// Per-frame, per-channel linear correction, applied by the kernel as
/// `corrected = sample * scale + offset`. Computed once before the chunked
/// loop, never mutated afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormCoeffs {
    pub offset: f64,
    pub scale: f64,
}

impl NormCoeffs {
    pub const IDENTITY: Self = Self {
        offset: 0.0,
        scale: 1.0,
    };

    #[inline]
    pub fn apply(&self, sample: f32) -> f32 {
        (sample as f64 * self.scale + self.offset) as f32
    }
}

/// Compute normalization coefficients for every participating frame and
/// channel. Frames whose statistics cannot be computed, or whose correction
/// would be degenerate, are dropped with a warning; the run only fails if
/// no usable frame remains. Returns the (possibly shrunk) set together with
/// one coefficient vector per remaining frame, indexed by channel.
pub fn compute_normalization(
    source: &dyn ImageSource,
    sequence: &Sequence,
    set: &ParticipatingSet,
    mode: NormalizationMode,
) -> Result<(ParticipatingSet, Vec<Vec<NormCoeffs>>)> {
    let channels = sequence.geometry.channels;
    if mode == NormalizationMode::None {
        let coeffs = vec![vec![NormCoeffs::IDENTITY; channels]; set.len()];
        return Ok((set.clone(), coeffs));
    }

    // One stats pass per frame, outside the chunked loop. This is the only
    // stage allowed to read full frames.
    let mut surviving: Vec<(usize, Vec<ChannelStats>)> = Vec::with_capacity(set.len());
    for &idx in &set.indices {
        match frame_stats(source, idx, channels) {
            Ok(stats) => surviving.push((idx, stats)),
            Err(err) => {
                warn!(frame = idx, error = %err, "Statistics unavailable, frame dropped");
            }
        }
    }
    if surviving.is_empty() {
        return Err(StackError::Configuration(
            "no participating frame has usable statistics".into(),
        ));
    }

    // Reference = designated frame if it survived, else the first survivor.
    let ref_pos = sequence
        .reference
        .and_then(|r| surviving.iter().position(|&(idx, _)| idx == r))
        .unwrap_or(0);
    let reference = surviving[ref_pos].1.clone();
    debug!(reference = surviving[ref_pos].0, ?mode, "Normalization reference chosen");

    let mut indices = Vec::with_capacity(surviving.len());
    let mut coeffs = Vec::with_capacity(surviving.len());
    'frames: for (idx, stats) in surviving {
        let mut per_channel = Vec::with_capacity(channels);
        for channel in 0..channels {
            match channel_coeffs(mode, &reference[channel], &stats[channel]) {
                Ok(c) => per_channel.push(c),
                Err(reason) => {
                    let err = StackError::Normalization { index: idx, reason };
                    warn!(frame = idx, channel, error = %err, "Frame dropped");
                    continue 'frames;
                }
            }
        }
        indices.push(idx);
        coeffs.push(per_channel);
    }

    if indices.is_empty() {
        return Err(StackError::Configuration(
            "normalization left no usable frames".into(),
        ));
    }
    let description = format!("{}, normalized ({mode:?}) -> {}", set.description, indices.len());
    Ok((ParticipatingSet { indices, description }, coeffs))
}

fn frame_stats(
    source: &dyn ImageSource,
    frame: usize,
    channels: usize,
) -> Result<Vec<ChannelStats>> {
    (0..channels)
        .map(|channel| source.channel_stats(frame, channel))
        .collect()
}

/// Coefficients that map this frame's background/dispersion onto the
/// reference frame's. Every mode reduces to one affine correction:
///
/// - additive:               x + (rb - b)
/// - additive-scaled:        x * (rd/d) + (rb - b * rd/d)
/// - multiplicative:         x * (rb/b)
/// - multiplicative-scaled:  (x + (rb/s - b)) * s, with s = rd/d
///
/// where rb/rd are the reference background/dispersion and b/d this frame's.
/// A non-finite or non-positive scale is a fatal normalization failure for
/// the frame.
fn channel_coeffs(
    mode: NormalizationMode,
    reference: &ChannelStats,
    frame: &ChannelStats,
) -> std::result::Result<NormCoeffs, String> {
    match mode {
        NormalizationMode::None => Ok(NormCoeffs::IDENTITY),
        NormalizationMode::Additive => Ok(NormCoeffs {
            offset: reference.background - frame.background,
            scale: 1.0,
        }),
        NormalizationMode::AdditiveScaled => {
            let scale = checked_scale(reference.dispersion, frame.dispersion, "dispersion")?;
            Ok(NormCoeffs {
                offset: reference.background - frame.background * scale,
                scale,
            })
        }
        NormalizationMode::Multiplicative => {
            let scale = checked_scale(reference.background, frame.background, "background")?;
            Ok(NormCoeffs { offset: 0.0, scale })
        }
        NormalizationMode::MultiplicativeScaled => {
            let scale = checked_scale(reference.dispersion, frame.dispersion, "dispersion")?;
            // (x + offset') * scale with offset' = rb/scale - b.
            Ok(NormCoeffs {
                offset: (reference.background / scale - frame.background) * scale,
                scale,
            })
        }
    }
}

fn checked_scale(
    reference: f64,
    frame: f64,
    what: &str,
) -> std::result::Result<f64, String> {
    let scale = reference / frame;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(format!(
            "degenerate {what} ratio {reference}/{frame}"
        ));
    }
    Ok(scale)
}
