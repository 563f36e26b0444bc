use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::manifest::SequenceManifest;

#[derive(Args)]
pub struct InfoArgs {
    /// Sequence manifest (TOML)
    pub manifest: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let manifest = SequenceManifest::load(&args.manifest)?;
    let seq = manifest.sequence();
    let g = seq.geometry;

    println!("Manifest:    {}", args.manifest.display());
    println!("Frames:      {} ({} included)", seq.len(), seq.included_count());
    println!("Dimensions:  {}x{}", g.width, g.height);
    println!("Channels:    {}", g.channels);
    println!("Format:      {:?}", g.format);
    if let Some(reference) = seq.reference {
        println!("Reference:   frame {}", reference);
    }

    let with_fwhm = seq.frames.iter().filter(|f| f.fwhm.is_some()).count();
    let with_quality = seq.frames.iter().filter(|f| f.quality.is_some()).count();
    println!("Metrics:     fwhm on {}, quality on {}", with_fwhm, with_quality);

    let total_mb = (g.frame_bytes() * seq.len()) as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}
