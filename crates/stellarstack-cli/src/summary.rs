use std::time::Duration;

use console::Style;

use stellarstack_core::config::StackConfig;
use stellarstack_core::engine::OutputSummary;
use stellarstack_core::kernel::Rejection;

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_stack_summary(config: &StackConfig, summary: &OutputSummary, elapsed: Duration) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Stack Summary"));
    println!("  {}", s.title.apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}"));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Method"),
        s.method.apply_to(config.method)
    );
    match config.rejection {
        Rejection::None => println!(
            "  {:<14}{}",
            s.label.apply_to("Rejection"),
            s.disabled.apply_to("disabled")
        ),
        Rejection::Winsorized {
            sigma_low,
            sigma_high,
        } => println!(
            "  {:<14}{}",
            s.label.apply_to("Rejection"),
            s.method
                .apply_to(format!("winsorized ({sigma_low} low, {sigma_high} high)"))
        ),
    }
    println!(
        "  {:<14}{:?}",
        s.label.apply_to("Normalize"),
        config.normalization
    );
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(format!(
            "{} stacked, {} dropped",
            summary.frames_stacked, summary.frames_dropped
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Chunks"),
        s.value.apply_to(summary.chunk_count)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Rejected"),
        s.value.apply_to(format!(
            "{} of {} samples ({:.2}%)",
            summary.rejected_samples,
            summary.total_samples,
            summary.rejection_rate() * 100.0
        ))
    );
    if summary.rejection_fallback_pixels > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Fallbacks"),
            s.disabled
                .apply_to(format!("{} pixels", summary.rejection_fallback_pixels))
        );
    }
    let noise: Vec<String> = summary.noise.iter().map(|n| format!("{n:.3}")).collect();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Noise"),
        s.value.apply_to(noise.join(", "))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Elapsed"),
        s.value.apply_to(format!("{:.1}s", elapsed.as_secs_f64()))
    );
    println!();
}
