//! Camera configuration
//!
//! Selector policies and stream settings, loadable from a TOML file. Every
//! field has a default, so an empty file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capabilities::{AntiBandingMode, Flash, FocusMode, Size};
use crate::convergence::{MeteringAttempt, MeteringTarget};
use crate::convert::OutputLayout;
use crate::parameters::{ParameterKind, ParameterNegotiator};
use crate::preview::{Orientation, PreviewDispatcher};
use crate::selector::{self, RangeSelector, Selector};
use crate::traits::{CameraError, Result};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Parameter selection policies
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Preview stream settings
    #[serde(default)]
    pub preview: PreviewConfig,

    /// Still capture settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Metering loop settings
    #[serde(default)]
    pub metering: MeteringConfig,
}

/// Size policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePolicy {
    /// Largest size no wider than the sanity ceiling
    Largest,
    /// Smallest size
    Smallest,
}

impl SizePolicy {
    fn selector(self) -> Selector<Size> {
        match self {
            Self::Largest => selector::largest_size(),
            Self::Smallest => selector::smallest_size(),
        }
    }
}

/// Preview fps range policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FpsPolicy {
    /// Highest maximum fps
    Highest,
    /// Lowest maximum fps
    Lowest,
}

/// Sensor sensitivity policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityPolicy {
    /// Top of the supported range
    Highest,
    /// Bottom of the supported range
    Lowest,
    /// A fixed ISO value
    Manual(u32),
    /// Leave it to the sensor
    None,
}

impl SensitivityPolicy {
    fn selector(self) -> RangeSelector<u32> {
        match self {
            Self::Highest => selector::range_highest(),
            Self::Lowest => selector::range_lowest(),
            Self::Manual(value) => selector::range_manual(value),
            Self::None => selector::range_nothing(),
        }
    }
}

/// Parameter selection policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Photo size policy
    #[serde(default = "default_size_policy")]
    pub photo_size: SizePolicy,

    /// Preview size policy, restricted to the photo aspect ratio when possible
    #[serde(default = "default_size_policy")]
    pub preview_size: SizePolicy,

    /// Focus modes in order of preference
    #[serde(default = "default_focus_modes")]
    pub focus_modes: Vec<FocusMode>,

    /// Flash modes in order of preference
    #[serde(default = "default_flash_modes")]
    pub flash_modes: Vec<Flash>,

    /// Anti-banding modes in order of preference
    #[serde(default = "default_anti_banding_modes")]
    pub anti_banding_modes: Vec<AntiBandingMode>,

    /// Preview fps policy
    #[serde(default = "default_fps_policy")]
    pub preview_fps: FpsPolicy,

    /// Sensor sensitivity policy
    #[serde(default = "default_sensitivity_policy")]
    pub sensor_sensitivity: SensitivityPolicy,

    /// JPEG quality, 1 to 100
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u32,

    /// Meter exposure at the image center
    #[serde(default)]
    pub center_exposure: bool,

    /// Re-apply the flash mode after each capture
    #[serde(default)]
    pub reinit_flash: bool,

    /// Kinds that must end up selected
    #[serde(default)]
    pub required: Vec<ParameterKind>,
}

const fn default_size_policy() -> SizePolicy {
    SizePolicy::Largest
}

fn default_focus_modes() -> Vec<FocusMode> {
    vec![FocusMode::ContinuousFocus, FocusMode::Auto, FocusMode::Fixed]
}

fn default_flash_modes() -> Vec<Flash> {
    vec![Flash::Auto, Flash::AutoRedEye, Flash::Off]
}

fn default_anti_banding_modes() -> Vec<AntiBandingMode> {
    vec![
        AntiBandingMode::Auto,
        AntiBandingMode::Hz50,
        AntiBandingMode::Hz60,
        AntiBandingMode::None,
    ]
}

const fn default_fps_policy() -> FpsPolicy {
    FpsPolicy::Highest
}

const fn default_sensitivity_policy() -> SensitivityPolicy {
    SensitivityPolicy::None
}

const fn default_jpeg_quality() -> u32 {
    90
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            photo_size: default_size_policy(),
            preview_size: default_size_policy(),
            focus_modes: default_focus_modes(),
            flash_modes: default_flash_modes(),
            anti_banding_modes: default_anti_banding_modes(),
            preview_fps: default_fps_policy(),
            sensor_sensitivity: default_sensitivity_policy(),
            jpeg_quality: default_jpeg_quality(),
            center_exposure: false,
            reinit_flash: false,
            required: Vec::new(),
        }
    }
}

/// Preview stream settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Layout of dispatched frames
    #[serde(default = "default_layout")]
    pub layout: OutputLayout,

    /// Clockwise display rotation in degrees
    #[serde(default)]
    pub orientation: Orientation,

    /// Number of driver buffers to queue
    #[serde(default = "default_buffer_count")]
    pub buffer_count: u32,
}

const fn default_layout() -> OutputLayout {
    OutputLayout::SemiPlanarVu
}

const fn default_buffer_count() -> u32 {
    4
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            layout: default_layout(),
            orientation: Orientation::Deg0,
            buffer_count: default_buffer_count(),
        }
    }
}

/// Still capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Wait bound in milliseconds; 0 waits forever
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Metering loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeteringConfig {
    /// Samples to observe before giving up
    #[serde(default = "default_max_samples")]
    pub max_samples: u32,
}

const fn default_max_samples() -> u32 {
    30
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
        }
    }
}

impl CameraConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|err| CameraError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no negotiation could accept
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.selection.jpeg_quality) {
            return Err(CameraError::Config(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.selection.jpeg_quality
            )));
        }
        if self.metering.max_samples == 0 {
            return Err(CameraError::Config(
                "metering.max_samples must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Build a negotiator carrying the configured policies
    pub fn negotiator(&self) -> ParameterNegotiator {
        let selection = &self.selection;
        let fps = match selection.preview_fps {
            FpsPolicy::Highest => selector::highest_fps(),
            FpsPolicy::Lowest => selector::lowest_fps(),
        };
        ParameterNegotiator::new()
            .photo_size(selection.photo_size.selector())
            .preview_size(selection.preview_size.selector())
            .focus_mode(selector::preferred(selection.focus_modes.clone()))
            .flash(selector::preferred(selection.flash_modes.clone()))
            .anti_banding_mode(selector::preferred(selection.anti_banding_modes.clone()))
            .preview_fps_range(fps)
            .sensor_sensitivity(selection.sensor_sensitivity.selector())
            .jpeg_quality(selection.jpeg_quality)
            .center_exposure(selection.center_exposure)
            .reinit_flash(selection.reinit_flash)
            .required(selection.required.clone())
    }

    /// Dispatcher for the configured layout and orientation
    pub fn dispatcher(&self) -> PreviewDispatcher {
        PreviewDispatcher::new(self.preview.layout).with_orientation(self.preview.orientation)
    }

    /// Metering attempt for `target` with the configured sample budget.
    pub const fn metering_attempt(&self, target: MeteringTarget) -> MeteringAttempt {
        MeteringAttempt::new(target, self.metering.max_samples)
    }

    /// Still capture wait bound, `None` when unbounded
    pub const fn capture_timeout(&self) -> Option<Duration> {
        match self.capture.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
