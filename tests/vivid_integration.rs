//! Integration tests using vivid virtual camera.
//!
//! These tests require:
//! - The `integration` feature flag: `cargo test --features integration`
//! - The vivid kernel module loaded (`modprobe vivid n_devs=2`)
//! - Access to /dev/video* devices (may require sudo or video group membership)
//!
//! Expected vivid configuration:
//! - First device: Gray Ramp pattern (gradient) - `test_pattern=20`
//! - Format: 640x480 YUYV
//!
//! Tests will fail if vivid is not available or not configured correctly.

#![cfg(feature = "integration")]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pi_cam_core::validation::{validate_frame_sequence, validate_frame_size, validate_gradient};
use pi_cam_core::{
    run_preview_loop, CapabilitySource, Frame, OutputLayout, ParameterNegotiator,
    PreviewDispatcher, Size, V4l2Camera,
};
use serial_test::serial;

/// Find all available vivid virtual camera devices.
///
/// Uses sysfs to check device driver name before opening, avoiding
/// unnecessary device opens on real cameras.
fn find_vivid_devices() -> Vec<u32> {
    let video4linux = Path::new("/sys/class/video4linux");
    if !video4linux.exists() {
        return Vec::new();
    }

    let mut devices = Vec::new();
    for index in 0..10 {
        let name_path = video4linux.join(format!("video{index}")).join("name");
        let Ok(name) = fs::read_to_string(&name_path) else {
            continue;
        };

        if !name.to_lowercase().contains("vivid") {
            continue;
        }

        // Verify we can actually open it
        if V4l2Camera::open(index).is_ok() {
            devices.push(index);
        }
    }
    devices
}

/// Macro to fail test if vivid is not available.
///
/// Returns the first vivid device index.
/// Integration tests MUST have vivid loaded - they should fail, not silently skip.
macro_rules! require_vivid {
    () => {
        match find_vivid_devices().first().copied() {
            Some(idx) => idx,
            None => {
                panic!(
                    "vivid virtual camera not available.\n\
                     Load vivid with: sudo modprobe vivid n_devs=2\n\
                     Or run unit tests only: cargo test --lib"
                );
            }
        }
    };
}

/// Stream `count` frames from a 640x480 vivid device through a dispatcher.
fn capture_frames(device_index: u32, layout: OutputLayout, count: usize) -> Vec<Frame> {
    let mut camera = V4l2Camera::open(device_index).expect("Failed to open vivid device");
    camera
        .configure(Size::new(640, 480))
        .expect("Failed to set format");

    let dispatcher = PreviewDispatcher::new(layout);
    let frames = Arc::new(Mutex::new(Vec::with_capacity(count)));
    let stop = Arc::new(AtomicBool::new(false));
    {
        let frames = Arc::clone(&frames);
        let stop = Arc::clone(&stop);
        dispatcher.register(Arc::new(move |frame: &Frame| {
            let mut frames = frames.lock();
            frames.push(frame.clone());
            if frames.len() >= count {
                stop.store(true, Ordering::Release);
            }
        }));
    }

    let mut stream = camera.stream(4).expect("Failed to create stream");
    let dispatched =
        run_preview_loop(&mut stream, &dispatcher, &stop).expect("Preview loop failed");
    assert_eq!(dispatched as usize, count, "Unexpected number of frames");

    let captured = frames.lock().clone();
    captured
}

#[test]
#[serial]
fn test_vivid_device_open() {
    let device_index = require_vivid!();

    let camera = V4l2Camera::open(device_index).expect("Failed to open vivid device");
    assert!(!camera.card().is_empty(), "Card name should be reported");

    println!("Opened vivid device: {}", camera.card());
    println!("  Format: {} {}", camera.size(), camera.fourcc());
}

#[test]
#[serial]
fn test_vivid_capabilities() {
    let device_index = require_vivid!();

    let camera = V4l2Camera::open(device_index).expect("Failed to open vivid device");
    let caps = camera.capabilities().expect("Failed to read capabilities");

    println!("Preview sizes: {:?}", caps.preview_sizes());
    println!("Fps ranges: {:?}", caps.preview_fps_ranges());

    assert!(!caps.preview_sizes().is_empty(), "vivid should advertise sizes");
    assert_eq!(caps.photo_sizes(), caps.preview_sizes());
}

#[test]
#[serial]
fn test_vivid_negotiation() {
    let device_index = require_vivid!();

    let mut camera = V4l2Camera::open(device_index).expect("Failed to open vivid device");
    let parameters = ParameterNegotiator::new()
        .negotiate_with(&camera)
        .expect("Negotiation failed");

    let preview = parameters.preview_size().expect("Preview size should be selected");
    println!("Negotiated preview size: {preview}");

    let actual = camera.configure(preview).expect("Failed to apply preview size");
    assert!(actual.width > 0, "Width should be positive");
    assert!(actual.height > 0, "Height should be positive");
}

#[test]
#[serial]
fn test_vivid_set_format() {
    let device_index = require_vivid!();

    let mut camera = V4l2Camera::open(device_index).expect("Failed to open vivid device");
    let actual = camera
        .configure(Size::new(640, 480))
        .expect("Failed to set format");

    println!("Actual: {actual} {}", camera.fourcc());
    assert_eq!(actual, Size::new(640, 480), "Size mismatch");
}

#[test]
#[serial]
fn test_vivid_capture_multiple_frames() {
    let device_index = require_vivid!();

    let frames = capture_frames(device_index, OutputLayout::SemiPlanarVu, 10);
    for frame in &frames {
        let result = validate_frame_size(frame, OutputLayout::SemiPlanarVu);
        assert!(result.is_ok(), "Frame size validation failed: {result:?}");
    }

    let result = validate_frame_sequence(&frames);
    assert!(
        result.is_ok(),
        "Frame sequence validation failed: {:?}",
        result.err()
    );
}

#[test]
#[serial]
fn test_vivid_gradient_pattern() {
    let device_index = require_vivid!();

    let frames = capture_frames(device_index, OutputLayout::GrayscaleArgb, 1);
    let frame = frames.first().expect("One frame expected");

    // First vivid device should be configured with Gray Ramp (gradient) pattern
    let result = validate_gradient(frame, OutputLayout::GrayscaleArgb);
    assert!(
        result.is_ok(),
        "Gradient validation failed on first vivid device.\n\
         Expected Gray Ramp pattern (test_pattern=20).\n\
         Error: {:?}",
        result.err()
    );
    println!("Gradient pattern validation passed");
}
