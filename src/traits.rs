//! Hardware-layer boundary: the traits the core consumes and its error type.
//!
//! The core never opens or drives a device itself. Whatever owns the platform
//! SDK implements these traits and feeds capability data, metadata samples and
//! raw buffers in.

use std::time::Duration;

use thiserror::Error;

use crate::capabilities::CapabilitySet;
use crate::convergence::MeteringSample;
use crate::convert::RawBuffer;
use crate::parameters::ParameterKind;
use crate::still::{Completer, Photo};

/// Error type for camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// A selector picked a value the sensor does not advertise.
    #[error("invalid {kind} parameter: {reason}")]
    InvalidParameter {
        /// Parameter that failed validation.
        kind: ParameterKind,
        /// What was wrong with it.
        reason: String,
    },

    /// A parameter declared as required was not selected.
    #[error("required parameter {0} was not selected")]
    MissingParameter(ParameterKind),

    /// The device was closed while an operation was in flight.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A raw buffer is shorter than its strides and crop imply.
    #[error("malformed buffer: {0}")]
    MalformedBuffer(String),

    /// Still capture did not complete within the caller's bound.
    #[error("capture timed out after {0:?}")]
    CaptureTimeout(Duration),

    /// Other failure reported by the platform layer.
    #[error("platform error: {0}")]
    Platform(String),

    /// Error during streaming operation.
    #[error("stream error: {0}")]
    StreamError(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CameraError {
    /// Map a platform failure message to a typed error.
    ///
    /// Platform SDKs report a closed device as a generic state error whose
    /// message mentions "already closed"; that becomes [`Self::DeviceUnavailable`].
    pub fn from_platform<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        if message.contains("already closed") {
            Self::DeviceUnavailable(message)
        } else {
            Self::Platform(message)
        }
    }

    /// Shorthand for an out-of-set selection.
    pub(crate) fn unsupported(kind: ParameterKind) -> Self {
        Self::InvalidParameter {
            kind,
            reason: "the selected value is not in the supported set".to_owned(),
        }
    }
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Source of the sensor's advertised capabilities.
pub trait CapabilitySource {
    /// Read the capability set. Called once per session or reconfiguration.
    fn capabilities(&self) -> Result<CapabilitySet>;
}

/// A fixed capability set is its own source.
impl CapabilitySource for CapabilitySet {
    fn capabilities(&self) -> Result<CapabilitySet> {
        Ok(self.clone())
    }
}

/// Source of per-capture metering metadata.
///
/// The core never polls; the metering loop pulls samples through this trait.
pub trait MetadataSource {
    /// Metadata of the next completed capture.
    fn next_sample(&mut self) -> Result<MeteringSample>;
}

/// Source of raw preview buffers.
pub trait FrameSource {
    /// Acquire the next buffer. It stays owned by the hardware layer and is
    /// only valid until the next call.
    fn next_buffer(&mut self) -> Result<RawBuffer<'_>>;
}

/// Device able to take a still picture asynchronously.
pub trait StillCaptureDevice {
    /// Start a capture. The hardware callback context must call
    /// [`Completer::complete`] exactly once with the photo or an error.
    ///
    /// Returns [`CameraError::DeviceUnavailable`] if the device is already closed.
    fn request_still(&self, completer: Completer<Result<Photo>>) -> Result<()>;
}
