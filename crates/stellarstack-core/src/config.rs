use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_MEMORY_BUDGET_BYTES;
use crate::error::{Result, StackError};
use crate::kernel::{Rejection, StackMethod};
use crate::normalize::NormalizationMode;
use crate::select::{FilterCriterion, FrameFilter};

/// Immutable configuration for one stacking run. Validated before any I/O;
/// string-level parsing (CLI flags, manifest files) happens in the front
/// ends, which hand over this typed struct.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StackConfig {
    pub output: PathBuf,
    #[serde(default)]
    pub method: StackMethod,
    #[serde(default)]
    pub rejection: Rejection,
    #[serde(default)]
    pub normalization: NormalizationMode,
    #[serde(default)]
    pub filters: Vec<FrameFilter>,
    #[serde(default = "default_memory_budget")]
    pub memory_budget_bytes: usize,
    /// Kernel thread pool size; defaults to available logical cores.
    #[serde(default)]
    pub threads: Option<usize>,
}

fn default_memory_budget() -> usize {
    DEFAULT_MEMORY_BUDGET_BYTES
}

impl StackConfig {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            method: StackMethod::default(),
            rejection: Rejection::default(),
            normalization: NormalizationMode::default(),
            filters: Vec::new(),
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET_BYTES,
            threads: None,
        }
    }

    /// Reject invalid or contradictory settings before the run starts.
    pub fn validate(&self) -> Result<()> {
        if self.memory_budget_bytes == 0 {
            return Err(StackError::Configuration(
                "memory budget must be positive".into(),
            ));
        }
        if self.threads == Some(0) {
            return Err(StackError::Configuration(
                "thread count must be positive".into(),
            ));
        }
        if let Rejection::Winsorized {
            sigma_low,
            sigma_high,
        } = self.rejection
        {
            if !(sigma_low > 0.0 && sigma_low.is_finite())
                || !(sigma_high > 0.0 && sigma_high.is_finite())
            {
                return Err(StackError::Configuration(format!(
                    "rejection sigmas must be positive and finite, got ({sigma_low}, {sigma_high})"
                )));
            }
        }
        for filter in &self.filters {
            match filter.criterion {
                FilterCriterion::Best(fraction) => {
                    if !(fraction > 0.0 && fraction <= 1.0) {
                        return Err(StackError::Configuration(format!(
                            "filter \"{filter}\": fraction must be in (0, 1]"
                        )));
                    }
                }
                FilterCriterion::Threshold(bound) => {
                    if !bound.is_finite() {
                        return Err(StackError::Configuration(format!(
                            "filter \"{filter}\": threshold must be finite"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
