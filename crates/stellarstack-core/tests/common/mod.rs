#![allow(dead_code)]

use ndarray::Array2;

use stellarstack_core::io::memory::MemorySource;
use stellarstack_core::sequence::{Geometry, SampleFormat, Sequence};

/// Single-channel geometry with the given format.
pub fn mono_geometry(width: usize, height: usize, format: SampleFormat) -> Geometry {
    Geometry {
        width,
        height,
        channels: 1,
        format,
    }
}

pub fn uniform_plane(h: usize, w: usize, fill: f32) -> Array2<f32> {
    Array2::from_elem((h, w), fill)
}

/// Plane whose left half is `value - spread` and right half `value + spread`,
/// giving background `value` and a nonzero dispersion.
pub fn split_plane(h: usize, w: usize, value: f32, spread: f32) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(_, col)| {
        if col < w / 2 {
            value - spread
        } else {
            value + spread
        }
    })
}

/// Mono source of uniform frames, one per entry in `values`.
pub fn uniform_mono_source(geometry: Geometry, values: &[f32]) -> MemorySource {
    let planes = values
        .iter()
        .map(|&v| uniform_plane(geometry.height, geometry.width, v))
        .collect();
    MemorySource::from_mono(geometry, planes).unwrap()
}

/// Sequence of `count` default frames over the geometry.
pub fn sequence(geometry: Geometry, count: usize) -> Sequence {
    Sequence::new(geometry, count)
}
