//! Pi-Cam-Core: camera parameter negotiation and frame plumbing
//!
//! This library sits between a camera hardware layer and application code. It
//! negotiates capture parameters against the sensor's advertised capabilities,
//! tracks auto-focus / auto-exposure convergence, converts strided multi-plane
//! YUV buffers into contiguous layouts and fans preview frames out to
//! consumers. The hardware itself is reached only through the traits in
//! [`traits`], so everything runs against mock devices in tests.

pub mod capabilities;
pub mod config;
pub mod convergence;
pub mod convert;
pub mod parameters;
pub mod preview;
pub mod selector;
pub mod still;
pub mod traits;
pub mod validation;

#[cfg(feature = "v4l2")]
pub mod v4l2;

#[cfg(test)]
pub mod mock;

pub use capabilities::{AntiBandingMode, CapabilitySet, Flash, FocusMode, Range, Size};
pub use config::CameraConfig;
pub use convergence::{
    classify_exposure_sample, classify_focus_sample, AutoExposureState, AutoFocusState,
    CaptureMetadata, ConvergenceState, Decision, MeteringAttempt, MeteringSample, MeteringTarget,
};
pub use convert::{convert_frame, CropRect, OutputLayout, PixelFormat, PlaneView, RawBuffer};
pub use parameters::{
    select_from_range, select_from_set, ParameterKind, ParameterNegotiator, ParameterSet,
    ParameterUpdate, ParameterValue,
};
pub use preview::{run_preview_loop, Frame, FrameConsumer, Orientation, PreviewDispatcher};
pub use selector::{RangeSelector, Selector};
pub use still::{capture_still, oneshot, Completer, Photo, Waiter};
pub use traits::{
    CameraError, CapabilitySource, FrameSource, MetadataSource, Result, StillCaptureDevice,
};

#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Camera;
