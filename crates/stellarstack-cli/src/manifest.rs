use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use stellarstack_core::io::raw::RawSequenceSource;
use stellarstack_core::sequence::{FrameMeta, Geometry, Sequence};

/// TOML description of a registered sequence: shared geometry plus one entry
/// per frame. Frame paths are resolved relative to the manifest file.
#[derive(Debug, Deserialize)]
pub struct SequenceManifest {
    pub geometry: Geometry,
    /// Index of the normalization reference frame, if designated.
    pub reference: Option<usize>,
    #[serde(rename = "frame")]
    pub frames: Vec<FrameEntry>,
}

#[derive(Debug, Deserialize)]
pub struct FrameEntry {
    pub path: PathBuf,
    #[serde(default = "default_included")]
    pub included: bool,
    pub fwhm: Option<f64>,
    pub roundness: Option<f64>,
    pub quality: Option<f64>,
}

fn default_included() -> bool {
    true
}

impl SequenceManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let manifest: SequenceManifest =
            toml::from_str(&contents).context("Invalid sequence manifest")?;
        if manifest.frames.is_empty() {
            anyhow::bail!("Manifest lists no frames");
        }
        Ok(manifest)
    }

    /// Frame paths resolved against the manifest's directory.
    pub fn frame_paths(&self, manifest_path: &Path) -> Vec<PathBuf> {
        let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        self.frames.iter().map(|f| base.join(&f.path)).collect()
    }

    pub fn sequence(&self) -> Sequence {
        let frames = self
            .frames
            .iter()
            .enumerate()
            .map(|(index, entry)| FrameMeta {
                index,
                included: entry.included,
                shift: None,
                fwhm: entry.fwhm,
                roundness: entry.roundness,
                quality: entry.quality,
                background: None,
            })
            .collect();
        Sequence {
            geometry: self.geometry,
            frames,
            reference: self.reference,
        }
    }

    pub fn open_source(&self, manifest_path: &Path) -> Result<RawSequenceSource> {
        let paths = self.frame_paths(manifest_path);
        RawSequenceSource::open(self.geometry, &paths).context("Failed to open frame files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stellarstack_core::sequence::SampleFormat;

    const MANIFEST: &str = r#"
reference = 1

[geometry]
width = 64
height = 48
channels = 1
format = "u16"

[[frame]]
path = "light_0001.raw"
fwhm = 2.1
quality = 0.9

[[frame]]
path = "light_0002.raw"
fwhm = 2.4

[[frame]]
path = "light_0003.raw"
included = false
"#;

    #[test]
    fn test_manifest_parses() {
        let manifest: SequenceManifest = toml::from_str(MANIFEST).unwrap();
        assert_eq!(manifest.geometry.width, 64);
        assert_eq!(manifest.geometry.format, SampleFormat::U16);
        assert_eq!(manifest.reference, Some(1));
        assert_eq!(manifest.frames.len(), 3);
        assert!(manifest.frames[0].included);
        assert!(!manifest.frames[2].included);
    }

    #[test]
    fn test_sequence_carries_metrics() {
        let manifest: SequenceManifest = toml::from_str(MANIFEST).unwrap();
        let seq = manifest.sequence();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.frames[0].fwhm, Some(2.1));
        assert_eq!(seq.frames[0].quality, Some(0.9));
        assert_eq!(seq.frames[1].quality, None);
        assert_eq!(seq.included_count(), 2);
        assert_eq!(seq.reference, Some(1));
    }

    #[test]
    fn test_paths_resolve_against_manifest_dir() {
        let manifest: SequenceManifest = toml::from_str(MANIFEST).unwrap();
        let paths = manifest.frame_paths(Path::new("/data/session/seq.toml"));
        assert_eq!(paths[0], Path::new("/data/session/light_0001.raw"));
    }
}
