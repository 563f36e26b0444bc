/// Headroom multiplier applied to the per-row working-set estimate when
/// planning chunks. Covers the output row, the rejection scratch vectors and
/// per-thread allocations on top of one row buffer per participating frame.
pub const CHUNK_SAFETY_FACTOR: f64 = 1.5;

/// Default stacking memory budget when none is configured: 2 GiB.
pub const DEFAULT_MEMORY_BUDGET_BYTES: usize = 2_147_483_648;

/// Upper bound on Winsorization refinement iterations per pixel.
pub const MAX_WINSOR_ITERATIONS: usize = 20;

/// Correction factor for the standard deviation of a Winsorized sample
/// (Huber's c = 1.134).
pub const WINSOR_STDDEV_CORRECTION: f32 = 1.134;

/// Winsorization clamp half-width, in sigmas around the running median.
pub const WINSOR_ANCHOR_SPREAD: f32 = 1.5;

/// Relative sigma change below which Winsorization is considered converged.
pub const SIGMA_CONVERGENCE_TOL: f32 = 5e-4;

/// Scale factor from median absolute deviation to Gaussian sigma.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Minimum stack depth for outlier rejection to engage. Below this the
/// per-pixel statistics are meaningless.
pub const MIN_REJECTION_STACK: usize = 3;

/// Target number of rows sampled by the default per-frame statistics pass.
pub const STATS_SAMPLE_ROW_TARGET: usize = 256;

/// Maximum number of pixels sampled for the post-stack noise estimate.
pub const NOISE_MAX_SAMPLES: usize = 1_048_576;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;
