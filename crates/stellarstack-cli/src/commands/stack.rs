use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use stellarstack_core::config::StackConfig;
use stellarstack_core::engine::{self, CancelToken};
use stellarstack_core::error::StackError;
use stellarstack_core::io::image_out::ImageFileWriter;
use stellarstack_core::kernel::{Rejection, StackMethod};
use stellarstack_core::normalize::NormalizationMode;
use stellarstack_core::progress::{ProgressReporter, StackStage};
use stellarstack_core::select::{FilterCriterion, FilterMetric, FrameFilter};

use crate::manifest::SequenceManifest;
use crate::summary::print_stack_summary;

#[derive(Clone, Copy, ValueEnum)]
pub enum MethodArg {
    Sum,
    Min,
    Max,
    Median,
    RejectionMean,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum NormArg {
    None,
    Additive,
    AdditiveScaled,
    Multiplicative,
    MultiplicativeScaled,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MetricArg {
    Fwhm,
    Roundness,
    Quality,
}

#[derive(Args)]
pub struct StackArgs {
    /// Sequence manifest (TOML)
    pub manifest: PathBuf,

    /// Stacking method
    #[arg(long, value_enum, default_value = "rejection-mean")]
    pub method: MethodArg,

    /// Low rejection bound in sigmas
    #[arg(long, default_value = "3.0")]
    pub sigma_low: f32,

    /// High rejection bound in sigmas
    #[arg(long, default_value = "3.0")]
    pub sigma_high: f32,

    /// Disable outlier rejection
    #[arg(long)]
    pub no_rejection: bool,

    /// Inter-frame normalization mode
    #[arg(long, value_enum, default_value = "none")]
    pub norm: NormArg,

    /// Percentage of best frames to keep (1-100)
    #[arg(long)]
    pub best: Option<u32>,

    /// Metric used to rank frames for --best
    #[arg(long, value_enum, default_value = "fwhm")]
    pub metric: MetricArg,

    /// Working memory budget in megabytes
    #[arg(long, default_value = "2048")]
    pub memory_mb: usize,

    /// Worker thread count (defaults to all logical cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Output file path
    #[arg(short, long, default_value = "stacked.tiff")]
    pub output: PathBuf,
}

/// Progress bar driven by the engine's stage callbacks.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(1);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:24} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: StackStage, total_items: Option<usize>) {
        self.bar.set_length(total_items.unwrap_or(1) as u64);
        self.bar.set_position(0);
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        self.bar.set_position(self.bar.length().unwrap_or(1));
    }
}

pub fn run(args: &StackArgs) -> Result<()> {
    let manifest = SequenceManifest::load(&args.manifest)?;
    let sequence = manifest.sequence();
    let source = manifest.open_source(&args.manifest)?;
    let config = build_config(args)?;

    let reporter = BarReporter::new()?;
    let cancel = CancelToken::default();
    let started = Instant::now();

    match engine::run(
        &sequence,
        &config,
        &source,
        &ImageFileWriter,
        &reporter,
        &cancel,
    ) {
        Ok(summary) => {
            reporter.bar.finish_with_message("Done");
            print_stack_summary(&config, &summary, started.elapsed());
            Ok(())
        }
        Err(StackError::Cancelled) => {
            reporter.bar.abandon_with_message("Cancelled");
            println!("Stacking cancelled, no output written");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn build_config(args: &StackArgs) -> Result<StackConfig> {
    let mut config = StackConfig::new(args.output.clone());
    config.method = match args.method {
        MethodArg::Sum => StackMethod::Sum,
        MethodArg::Min => StackMethod::Min,
        MethodArg::Max => StackMethod::Max,
        MethodArg::Median => StackMethod::Median,
        MethodArg::RejectionMean => StackMethod::RejectionMean,
    };
    config.rejection = if args.no_rejection {
        Rejection::None
    } else {
        Rejection::Winsorized {
            sigma_low: args.sigma_low,
            sigma_high: args.sigma_high,
        }
    };
    config.normalization = match args.norm {
        NormArg::None => NormalizationMode::None,
        NormArg::Additive => NormalizationMode::Additive,
        NormArg::AdditiveScaled => NormalizationMode::AdditiveScaled,
        NormArg::Multiplicative => NormalizationMode::Multiplicative,
        NormArg::MultiplicativeScaled => NormalizationMode::MultiplicativeScaled,
    };
    if let Some(best) = args.best {
        let fraction = (best as f32 / 100.0).clamp(0.01, 1.0);
        config.filters.push(FrameFilter {
            metric: match args.metric {
                MetricArg::Fwhm => FilterMetric::Fwhm,
                MetricArg::Roundness => FilterMetric::Roundness,
                MetricArg::Quality => FilterMetric::Quality,
            },
            criterion: FilterCriterion::Best(fraction),
        });
    }
    config.memory_budget_bytes = args.memory_mb * 1024 * 1024;
    config.threads = args.threads;
    config.validate()?;
    Ok(config)
}
