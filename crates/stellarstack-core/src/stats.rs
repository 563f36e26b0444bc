use crate::consts::{MAD_TO_SIGMA, NOISE_MAX_SAMPLES};

/// Robust location/spread of one frame channel: median background and
/// MAD-based dispersion (scaled to Gaussian sigma).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelStats {
    pub background: f64,
    pub dispersion: f64,
}

/// Population mean and standard deviation, accumulated in f64.
pub fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean as f32, var.sqrt() as f32)
}

/// Median via `select_nth_unstable`, O(n) without a full sort. Permutes the
/// slice but preserves its values. Even counts average the two middle values.
pub fn median_in_place(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return values[0];
    }
    let mid = n / 2;
    if n % 2 == 1 {
        *values
            .select_nth_unstable_by(mid, |a, b| a.total_cmp(b))
            .1
    } else {
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Robust background/dispersion from a pixel sample. Permutes `samples`.
pub fn channel_stats(samples: &mut [f32]) -> ChannelStats {
    let background = median_in_place(samples) as f64;
    let mut deviations: Vec<f32> = samples
        .iter()
        .map(|&v| (v as f64 - background).abs() as f32)
        .collect();
    let mad = median_in_place(&mut deviations) as f64;
    ChannelStats {
        background,
        dispersion: mad * MAD_TO_SIGMA,
    }
}

/// Post-stack noise estimate: MAD-based sigma over a subsampled grid of the
/// assembled channel. Reporting only, never fed back into the combination.
pub fn noise_sigma(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let step = (values.len() / NOISE_MAX_SAMPLES).max(1);
    let mut sample: Vec<f32> = values.iter().step_by(step).copied().collect();
    channel_stats(&mut sample).dispersion
}
