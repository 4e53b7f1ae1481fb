//! Frame validation utilities for converted preview frames.
//!
//! This module provides functions to check that frames coming out of the
//! dispatcher have the expected size, content and ordering. Useful for
//! integration testing with virtual cameras.

use crate::convert::{expected_output_len, CropRect, OutputLayout};
use crate::preview::Frame;
use crate::traits::{CameraError, Result};

/// Minimum luma rise across the frame for a gradient to count.
const MIN_GRADIENT_RISE: i32 = 50;

/// Allowed per-step luma drop in a gradient (rounding, noise).
const GRADIENT_TOLERANCE: i32 = 1;

/// Validates that a frame holds exactly as many bytes as its layout implies.
///
/// # Arguments
///
/// * `frame` - The frame to validate
/// * `layout` - The layout the frame was converted to
///
/// # Errors
///
/// Returns `StreamError` if the byte count differs from the layout's size
/// rule. Passthrough frames only need to be non-empty.
pub fn validate_frame_size(frame: &Frame, layout: OutputLayout) -> Result<()> {
    let crop = CropRect::full(frame.size.width as usize, frame.size.height as usize);
    match expected_output_len(layout, &crop) {
        Some(expected) if frame.data.len() != expected => Err(CameraError::StreamError(format!(
            "Frame {} is {} bytes, expected {expected} for {layout:?} at {}",
            frame.sequence,
            frame.data.len(),
            frame.size
        ))),
        None if frame.data.is_empty() => Err(CameraError::StreamError(format!(
            "Frame {} is empty",
            frame.sequence
        ))),
        _ => Ok(()),
    }
}

/// Luma of pixel (`x`, `y`) in a converted frame.
fn luma_at(frame: &Frame, layout: OutputLayout, x: usize, y: usize) -> Option<u8> {
    let width = frame.size.width as usize;
    let index = y * width + x;
    match layout {
        OutputLayout::SemiPlanarVu | OutputLayout::Planar => frame.data.get(index).copied(),
        OutputLayout::GrayscaleArgb => frame.data.get(index * 4).copied(),
        OutputLayout::Passthrough => None,
    }
}

/// Validates that a frame contains a horizontal luma gradient.
///
/// This function samples a horizontal line at the center of the frame and
/// verifies that the luma increases monotonically from left to right. It also
/// checks that there is a significant overall change across the frame (not a
/// solid color).
///
/// # Arguments
///
/// * `frame` - The frame to validate
/// * `layout` - The layout the frame was converted to
///
/// # Errors
///
/// Returns `StreamError` if:
/// - The layout carries no luma (passthrough)
/// - The luma doesn't increase monotonically
/// - The total luma change is too small (solid color)
pub fn validate_gradient(frame: &Frame, layout: OutputLayout) -> Result<()> {
    let width = frame.size.width as usize;
    let center_y = frame.size.height as usize / 2;
    let sample_step = (width / 64).max(1);

    let mut first: Option<i32> = None;
    let mut prev: Option<i32> = None;

    for x in (0..width).step_by(sample_step) {
        let luma = luma_at(frame, layout, x, center_y).ok_or_else(|| {
            CameraError::StreamError(format!("Failed to get luma at ({x}, {center_y})"))
        })?;
        let luma = i32::from(luma);

        if let Some(prev) = prev {
            if luma < prev - GRADIENT_TOLERANCE {
                return Err(CameraError::StreamError(format!(
                    "Gradient not monotonically increasing at x={x}: \
                     luma {luma} < previous {prev}"
                )));
            }
        }

        first.get_or_insert(luma);
        prev = Some(luma);
    }

    if let (Some(first), Some(last)) = (first, prev) {
        let rise = last - first;
        if rise < MIN_GRADIENT_RISE {
            return Err(CameraError::StreamError(format!(
                "Insufficient luma change for gradient: {rise} \
                 (expected at least {MIN_GRADIENT_RISE})"
            )));
        }
    }

    Ok(())
}

/// Checks that dispatched frames carry contiguous dispatcher sequence numbers,
/// i.e. no frame was dropped between consumers registering and the capture
/// ending.
///
/// # Errors
///
/// Returns `StreamError` for an empty slice, or naming the first position
/// where the sequence number does not follow its predecessor.
pub fn validate_frame_sequence(frames: &[Frame]) -> Result<()> {
    let Some(first) = frames.first() else {
        return Err(CameraError::StreamError(
            "no frames to check for sequence gaps".to_owned(),
        ));
    };

    let mut expected = first.sequence;
    for (position, frame) in frames.iter().enumerate() {
        if frame.sequence != expected {
            return Err(CameraError::StreamError(format!(
                "sequence gap at position {position}: expected {expected}, got {}",
                frame.sequence
            )));
        }
        expected = frame.sequence.wrapping_add(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::PlanarPattern;
    use crate::preview::PreviewDispatcher;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn capture(pattern: &PlanarPattern, layout: OutputLayout, count: usize) -> Vec<Frame> {
        let dispatcher = PreviewDispatcher::new(layout);
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        dispatcher.register(Arc::new(move |frame: &Frame| sink.lock().push(frame.clone())));
        for _ in 0..count {
            dispatcher.on_buffer(&pattern.raw()).expect("dispatch failed");
        }
        let captured = frames.lock().clone();
        captured
    }

    #[test]
    fn test_validate_gradient_success() {
        let pattern = PlanarPattern::gradient(640, 480, 32);
        for layout in [
            OutputLayout::SemiPlanarVu,
            OutputLayout::Planar,
            OutputLayout::GrayscaleArgb,
        ] {
            let frames = capture(&pattern, layout, 1);
            let frame = frames.first().expect("one frame");
            let result = validate_gradient(frame, layout);
            assert!(
                result.is_ok(),
                "Gradient validation should succeed for {layout:?}: {result:?}"
            );
            let result = validate_frame_size(frame, layout);
            assert!(result.is_ok(), "Size validation should succeed for {layout:?}: {result:?}");
        }
    }

    #[test]
    fn test_validate_gradient_wrong_pattern() {
        let pattern = PlanarPattern::solid(640, 480, 0, 128);
        let frames = capture(&pattern, OutputLayout::Planar, 1);
        let result = validate_gradient(frames.first().expect("one frame"), OutputLayout::Planar);
        assert!(
            result.is_err(),
            "Gradient validation should fail for solid pattern"
        );
    }

    #[test]
    fn test_validate_frame_size_mismatch() {
        let pattern = PlanarPattern::gradient(64, 48, 0);
        let frames = capture(&pattern, OutputLayout::Planar, 1);
        let frame = frames.first().expect("one frame");
        let result = validate_frame_size(frame, OutputLayout::GrayscaleArgb);
        assert!(result.is_err(), "Planar frame is not grayscale-sized");
    }

    #[test]
    fn test_validate_frame_sequence_success() {
        let pattern = PlanarPattern::gradient(64, 48, 0);
        let frames = capture(&pattern, OutputLayout::SemiPlanarVu, 5);
        let result = validate_frame_sequence(&frames);
        assert!(
            result.is_ok(),
            "Frame sequence validation should succeed: {result:?}"
        );
    }

    #[test]
    fn test_validate_frame_sequence_empty() {
        let frames: Vec<Frame> = vec![];
        let result = validate_frame_sequence(&frames);
        assert!(
            result.is_err(),
            "Frame sequence validation should fail for empty sequence"
        );
    }

    #[test]
    fn test_validate_frame_sequence_with_gap() {
        let pattern = PlanarPattern::gradient(64, 48, 0);
        let mut frames = capture(&pattern, OutputLayout::SemiPlanarVu, 4);

        // Drop a frame to create a gap
        frames.remove(2);

        let result = validate_frame_sequence(&frames);
        assert!(
            result.is_err(),
            "Frame sequence validation should fail with gap"
        );
    }
}
