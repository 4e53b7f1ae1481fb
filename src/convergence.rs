//! Auto-focus / auto-exposure convergence classification.
//!
//! Every function here looks at exactly one [`MeteringSample`]. The only state
//! that spans samples is the caller-held [`MeteringAttempt`], which counts
//! samples against a budget the caller chooses.

use std::time::Duration;

use tracing::debug;

use crate::traits::{MetadataSource, Result};

/// Auto-focus state reported with a capture (Camera2 numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoFocusState {
    /// AF is off or not yet started.
    Inactive,
    /// Continuous AF is scanning.
    PassiveScan,
    /// Continuous AF believes the scene is in focus.
    PassiveFocused,
    /// A triggered AF scan is running.
    ActiveScan,
    /// AF locked with the scene in focus.
    FocusedLocked,
    /// AF locked without reaching focus.
    NotFocusedLocked,
    /// Continuous AF believes the scene is out of focus.
    PassiveUnfocused,
}

impl AutoFocusState {
    /// Decode the platform's raw code. Unknown codes are treated as absent.
    pub const fn from_raw(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Inactive),
            1 => Some(Self::PassiveScan),
            2 => Some(Self::PassiveFocused),
            3 => Some(Self::ActiveScan),
            4 => Some(Self::FocusedLocked),
            5 => Some(Self::NotFocusedLocked),
            6 => Some(Self::PassiveUnfocused),
            _ => None,
        }
    }
}

/// Auto-exposure state reported with a capture (Camera2 numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoExposureState {
    /// AE is off or not yet started.
    Inactive,
    /// AE has not converged yet.
    Searching,
    /// AE settled for the current scene.
    Converged,
    /// AE locked by request.
    Locked,
    /// Converged but the scene needs flash.
    FlashRequired,
    /// A precapture metering sequence is running.
    Precapture,
}

impl AutoExposureState {
    /// Decode the platform's raw code. Unknown codes are treated as absent.
    pub const fn from_raw(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Inactive),
            1 => Some(Self::Searching),
            2 => Some(Self::Converged),
            3 => Some(Self::Locked),
            4 => Some(Self::FlashRequired),
            5 => Some(Self::Precapture),
            _ => None,
        }
    }
}

/// Point-in-time sensor readings from one completed capture.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaptureMetadata {
    /// Lens focus distance in diopters.
    pub focus_distance: Option<f32>,
    /// ISO sensitivity.
    pub sensitivity: Option<u32>,
    /// Exposure time.
    pub exposure_time: Option<Duration>,
    /// Aperture as an f-number.
    pub aperture: Option<f32>,
}

/// One metadata sample taken while a metering or focus operation is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeteringSample {
    /// Auto-focus state, if reported.
    pub af_state: Option<AutoFocusState>,
    /// Auto-exposure state, if reported.
    pub ae_state: Option<AutoExposureState>,
    /// Whether AE lock was active, if reported.
    pub ae_locked: Option<bool>,
    /// Sensor readings.
    pub metadata: CaptureMetadata,
}

impl MeteringSample {
    /// Sample with the given 3A states and no readings.
    #[must_use]
    pub fn new(af_state: Option<AutoFocusState>, ae_state: Option<AutoExposureState>) -> Self {
        Self {
            af_state,
            ae_state,
            ..Self::default()
        }
    }

    /// Attach sensor readings.
    #[must_use]
    pub const fn with_metadata(mut self, metadata: CaptureMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Classification of a focus or exposure axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvergenceState {
    /// No sample observed yet.
    Pending,
    /// Focus is locked.
    Locked,
    /// Focus is not locked.
    Unlocked,
    /// Exposure has converged.
    Converged,
    /// Exposure has not converged.
    NotConverged,
}

/// Outcome of one focus-operation sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusResult {
    /// Focus reached a locked state.
    pub lock_succeeded: bool,
    /// Exposure has not converged and should be measured again.
    pub needs_exposure_measurement: bool,
}

/// Outcome of one exposure-measurement sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeteringResult {
    /// Exposure converged.
    pub succeeded: bool,
}

/// True iff AE reports `Converged` or `Precapture`. Absent counts as not converged.
pub const fn is_exposure_converged(sample: &MeteringSample) -> bool {
    matches!(
        sample.ae_state,
        Some(AutoExposureState::Converged | AutoExposureState::Precapture)
    )
}

/// True iff AF reports one of the locked states. Absent counts as unlocked.
pub const fn is_focus_locked(sample: &MeteringSample) -> bool {
    matches!(
        sample.af_state,
        Some(AutoFocusState::FocusedLocked | AutoFocusState::NotFocusedLocked)
    )
}

/// Focus axis state of one sample.
pub const fn focus_state(sample: &MeteringSample) -> ConvergenceState {
    if is_focus_locked(sample) {
        ConvergenceState::Locked
    } else {
        ConvergenceState::Unlocked
    }
}

/// Exposure axis state of one sample.
pub const fn exposure_state(sample: &MeteringSample) -> ConvergenceState {
    if is_exposure_converged(sample) {
        ConvergenceState::Converged
    } else {
        ConvergenceState::NotConverged
    }
}

/// Classify a sample taken during a focus operation.
pub fn classify_focus_sample(sample: &MeteringSample) -> FocusResult {
    let result = FocusResult {
        lock_succeeded: is_focus_locked(sample),
        needs_exposure_measurement: !is_exposure_converged(sample),
    };
    debug!(
        af = ?sample.af_state,
        ae = ?sample.ae_state,
        ae_locked = ?sample.ae_locked,
        lock_succeeded = result.lock_succeeded,
        remeasure = result.needs_exposure_measurement,
        "focus sample"
    );
    result
}

/// Classify a sample taken during an exposure measurement.
pub fn classify_exposure_sample(sample: &MeteringSample) -> MeteringResult {
    let result = MeteringResult {
        succeeded: is_exposure_converged(sample),
    };
    debug!(
        ae = ?sample.ae_state,
        ae_locked = ?sample.ae_locked,
        succeeded = result.succeeded,
        "exposure sample"
    );
    result
}

/// Which axes must reach their accepting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeteringTarget {
    /// Focus must lock.
    Focus,
    /// Exposure must converge.
    Exposure,
    /// Both.
    Both,
}

/// What the caller should do after a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Not there yet; feed another sample.
    Retry,
    /// Target reached; readings of the accepting sample.
    Success(CaptureMetadata),
    /// Budget spent without reaching the target.
    Failure,
}

/// Caller-held retry loop over metering samples.
///
/// The sample budget belongs to the caller; this type only counts.
#[derive(Debug, Clone)]
pub struct MeteringAttempt {
    target: MeteringTarget,
    max_samples: u32,
    samples_seen: u32,
    state: ConvergenceState,
}

impl MeteringAttempt {
    /// New attempt accepting after at most `max_samples` samples.
    #[must_use]
    pub const fn new(target: MeteringTarget, max_samples: u32) -> Self {
        Self {
            target,
            max_samples,
            samples_seen: 0,
            state: ConvergenceState::Pending,
        }
    }

    /// State after the most recent sample, `Pending` before the first one.
    pub const fn state(&self) -> ConvergenceState {
        self.state
    }

    /// Samples observed so far.
    pub const fn samples_seen(&self) -> u32 {
        self.samples_seen
    }

    /// Feed one sample.
    pub fn observe(&mut self, sample: &MeteringSample) -> Decision {
        self.samples_seen = self.samples_seen.saturating_add(1);
        self.state = match self.target {
            MeteringTarget::Focus => focus_state(sample),
            MeteringTarget::Exposure => exposure_state(sample),
            MeteringTarget::Both => {
                let focus = classify_focus_sample(sample);
                if !focus.lock_succeeded {
                    ConvergenceState::Unlocked
                } else if focus.needs_exposure_measurement {
                    ConvergenceState::NotConverged
                } else {
                    ConvergenceState::Converged
                }
            }
        };

        if matches!(self.state, ConvergenceState::Locked | ConvergenceState::Converged) {
            Decision::Success(sample.metadata)
        } else if self.samples_seen >= self.max_samples {
            debug!(
                target_axes = ?self.target,
                samples = self.samples_seen,
                state = ?self.state,
                "metering gave up"
            );
            Decision::Failure
        } else {
            Decision::Retry
        }
    }

    /// Pull samples from `source` until the attempt decides.
    pub fn run<S: MetadataSource + ?Sized>(&mut self, source: &mut S) -> Result<Decision> {
        loop {
            let sample = source.next_sample()?;
            match self.observe(&sample) {
                Decision::Retry => {}
                decided => return Ok(decided),
            }
        }
    }
}
