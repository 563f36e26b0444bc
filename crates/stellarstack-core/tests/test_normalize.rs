mod common;

use approx::assert_abs_diff_eq;

use stellarstack_core::error::StackError;
use stellarstack_core::io::memory::MemorySource;
use stellarstack_core::normalize::{compute_normalization, NormalizationMode};
use stellarstack_core::select::select_frames;
use stellarstack_core::sequence::{SampleFormat, Sequence};
use stellarstack_core::source::ImageSource;

use common::{mono_geometry, split_plane, uniform_mono_source, uniform_plane};

fn normalize(
    source: &MemorySource,
    mode: NormalizationMode,
) -> (Vec<usize>, Vec<Vec<stellarstack_core::normalize::NormCoeffs>>) {
    let seq = Sequence::new(source.geometry(), source.frame_count());
    let set = select_frames(&seq, &[]).unwrap();
    let (set, coeffs) = compute_normalization(source, &seq, &set, mode).unwrap();
    (set.indices, coeffs)
}

// ---------------------------------------------------------------------------
// Identity cases
// ---------------------------------------------------------------------------

#[test]
fn test_mode_none_is_identity() {
    let g = mono_geometry(8, 8, SampleFormat::U16);
    let source = uniform_mono_source(g, &[100.0, 200.0, 300.0]);
    let (indices, coeffs) = normalize(&source, NormalizationMode::None);
    assert_eq!(indices, vec![0, 1, 2]);
    for frame in &coeffs {
        assert_abs_diff_eq!(frame[0].offset, 0.0);
        assert_abs_diff_eq!(frame[0].scale, 1.0);
    }
}

#[test]
fn test_identical_stats_give_identity_coefficients() {
    // Same background and dispersion in every frame: all modes must come
    // out as identity within float tolerance.
    let g = mono_geometry(8, 8, SampleFormat::U16);
    let planes = (0..4).map(|_| split_plane(8, 8, 100.0, 10.0)).collect();
    let source = MemorySource::from_mono(g, planes).unwrap();
    for mode in [
        NormalizationMode::Additive,
        NormalizationMode::AdditiveScaled,
        NormalizationMode::Multiplicative,
        NormalizationMode::MultiplicativeScaled,
    ] {
        let (indices, coeffs) = normalize(&source, mode);
        assert_eq!(indices.len(), 4, "mode {mode:?} dropped frames");
        for frame in &coeffs {
            assert_abs_diff_eq!(frame[0].offset, 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(frame[0].scale, 1.0, epsilon = 1e-9);
        }
    }
}

// ---------------------------------------------------------------------------
// Additive
// ---------------------------------------------------------------------------

#[test]
fn test_additive_offsets_background_difference() {
    let g = mono_geometry(8, 8, SampleFormat::U16);
    let source = uniform_mono_source(g, &[100.0, 120.0, 90.0]);
    let (indices, coeffs) = normalize(&source, NormalizationMode::Additive);
    assert_eq!(indices, vec![0, 1, 2]);
    // Reference is the first participating frame (background 100).
    assert_abs_diff_eq!(coeffs[0][0].offset, 0.0);
    assert_abs_diff_eq!(coeffs[1][0].offset, -20.0);
    assert_abs_diff_eq!(coeffs[2][0].offset, 10.0);
    for frame in &coeffs {
        assert_abs_diff_eq!(frame[0].scale, 1.0);
    }
}

#[test]
fn test_additive_scaled_matches_background_and_spread() {
    let g = mono_geometry(8, 8, SampleFormat::U16);
    let planes = vec![
        split_plane(8, 8, 100.0, 10.0),
        split_plane(8, 8, 200.0, 20.0),
    ];
    let source = MemorySource::from_mono(g, planes).unwrap();
    let (_, coeffs) = normalize(&source, NormalizationMode::AdditiveScaled);
    // scale = ref dispersion / frame dispersion = 0.5,
    // offset = 100 - 200 * 0.5 = 0.
    assert_abs_diff_eq!(coeffs[1][0].scale, 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(coeffs[1][0].offset, 0.0, epsilon = 1e-6);
    // Applying the coefficients maps the frame's background onto the
    // reference background.
    let corrected = coeffs[1][0].apply(200.0);
    assert_abs_diff_eq!(corrected, 100.0, epsilon = 1e-4);
}

// ---------------------------------------------------------------------------
// Multiplicative
// ---------------------------------------------------------------------------

#[test]
fn test_multiplicative_scales_background_ratio() {
    let g = mono_geometry(8, 8, SampleFormat::U16);
    let source = uniform_mono_source(g, &[100.0, 200.0]);
    let (_, coeffs) = normalize(&source, NormalizationMode::Multiplicative);
    assert_abs_diff_eq!(coeffs[1][0].scale, 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(coeffs[1][0].offset, 0.0);
}

#[test]
fn test_multiplicative_scaled_equalizes_both_stats() {
    let g = mono_geometry(8, 8, SampleFormat::U16);
    let planes = vec![
        split_plane(8, 8, 100.0, 10.0),
        split_plane(8, 8, 300.0, 40.0),
    ];
    let source = MemorySource::from_mono(g, planes).unwrap();
    let (_, coeffs) = normalize(&source, NormalizationMode::MultiplicativeScaled);
    let c = coeffs[1][0];
    // Background maps onto the reference background, dispersion onto the
    // reference dispersion (scale = 0.25).
    assert_abs_diff_eq!(c.scale, 0.25, epsilon = 1e-9);
    assert_abs_diff_eq!(c.apply(300.0), 100.0, epsilon = 1e-4);
}

// ---------------------------------------------------------------------------
// Degenerate statistics
// ---------------------------------------------------------------------------

#[test]
fn test_zero_dispersion_frame_dropped_in_scaled_mode() {
    let g = mono_geometry(8, 8, SampleFormat::U16);
    let planes = vec![
        split_plane(8, 8, 100.0, 10.0),
        uniform_plane(8, 8, 100.0), // zero dispersion
        split_plane(8, 8, 100.0, 10.0),
    ];
    let source = MemorySource::from_mono(g, planes).unwrap();
    let (indices, coeffs) = normalize(&source, NormalizationMode::AdditiveScaled);
    assert_eq!(indices, vec![0, 2]);
    assert_eq!(coeffs.len(), 2);
}

#[test]
fn test_all_degenerate_frames_is_an_error() {
    let g = mono_geometry(8, 8, SampleFormat::U16);
    let source = uniform_mono_source(g, &[100.0, 100.0]);
    let seq = Sequence::new(g, 2);
    let set = select_frames(&seq, &[]).unwrap();
    let result = compute_normalization(&source, &seq, &set, NormalizationMode::AdditiveScaled);
    assert!(matches!(result, Err(StackError::Configuration(_))));
}

#[test]
fn test_designated_reference_frame_used() {
    let g = mono_geometry(8, 8, SampleFormat::U16);
    let source = uniform_mono_source(g, &[100.0, 150.0, 200.0]);
    let mut seq = Sequence::new(g, 3);
    seq.reference = Some(2);
    let set = select_frames(&seq, &[]).unwrap();
    let (_, coeffs) =
        compute_normalization(&source, &seq, &set, NormalizationMode::Additive).unwrap();
    // Offsets are relative to frame 2's background of 200.
    assert_abs_diff_eq!(coeffs[0][0].offset, 100.0);
    assert_abs_diff_eq!(coeffs[2][0].offset, 0.0);
}
