use serde::{Deserialize, Serialize};

/// Sample width of the frames in a sequence. All arithmetic inside the
/// engine is f32/f64; the format determines input decoding and the clamp
/// ceiling applied to integer output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    U16,
    F32,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::F32 => 4,
        }
    }

    /// Clamp ceiling for integer formats. Float output is not clamped.
    pub fn max_value(&self) -> Option<f32> {
        match self {
            Self::U8 => Some(255.0),
            Self::U16 => Some(65535.0),
            Self::F32 => None,
        }
    }
}

/// Pixel geometry shared by every frame in a sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub format: SampleFormat,
}

impl Geometry {
    pub fn channel_pixels(&self) -> usize {
        self.width * self.height
    }

    /// On-disk byte size of one frame in planar layout.
    pub fn frame_bytes(&self) -> usize {
        self.channel_pixels() * self.channels * self.format.bytes_per_sample()
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}x{} {:?}",
            self.width, self.height, self.channels, self.format
        )
    }
}

/// Descriptor for one registered exposure. Metrics are opaque scores cached
/// by earlier pipeline stages (star detection, registration); the engine
/// only ranks and thresholds them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameMeta {
    pub index: usize,
    pub included: bool,
    /// Registration shift (dx, dy) against the reference, if any.
    pub shift: Option<(f32, f32)>,
    pub fwhm: Option<f64>,
    pub roundness: Option<f64>,
    pub quality: Option<f64>,
    pub background: Option<f64>,
}

impl FrameMeta {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            included: true,
            shift: None,
            fwhm: None,
            roundness: None,
            quality: None,
            background: None,
        }
    }
}

/// An ordered sequence of registered frames with identical geometry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sequence {
    pub geometry: Geometry,
    pub frames: Vec<FrameMeta>,
    /// Explicitly designated reference frame for normalization, if any.
    pub reference: Option<usize>,
}

impl Sequence {
    /// Build a sequence of `count` frames with default descriptors.
    pub fn new(geometry: Geometry, count: usize) -> Self {
        Self {
            geometry,
            frames: (0..count).map(FrameMeta::new).collect(),
            reference: None,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn included_count(&self) -> usize {
        self.frames.iter().filter(|f| f.included).count()
    }
}
