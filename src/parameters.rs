//! Parameter negotiation: running selectors against a [`CapabilitySet`] and
//! combining the validated picks into one [`ParameterSet`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capabilities::{AntiBandingMode, CapabilitySet, Flash, FocusMode, Range, Size};
use crate::selector::{self, RangeSelector, Selector};
use crate::traits::{CameraError, CapabilitySource, Result};

/// Kind of a negotiated parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Still picture size.
    PictureSize,
    /// Preview stream size.
    PreviewSize,
    /// Anti-banding mode.
    AntiBandingMode,
    /// Focus mode.
    FocusMode,
    /// Flash mode.
    Flash,
    /// Preview fps range.
    PreviewFpsRange,
    /// ISO sensitivity.
    SensorSensitivity,
    /// JPEG quality, 1 to 100.
    JpegQuality,
    /// Meter exposure on the frame centre.
    CenterExposure,
    /// Re-arm the flash before each capture.
    ReinitFlash,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PictureSize => "picture size",
            Self::PreviewSize => "preview size",
            Self::AntiBandingMode => "anti-banding mode",
            Self::FocusMode => "focus mode",
            Self::Flash => "flash",
            Self::PreviewFpsRange => "preview fps range",
            Self::SensorSensitivity => "sensor sensitivity",
            Self::JpegQuality => "jpeg quality",
            Self::CenterExposure => "center exposure",
            Self::ReinitFlash => "reinit flash",
        };
        f.write_str(name)
    }
}

/// A negotiated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterValue {
    /// A size.
    Size(Size),
    /// An anti-banding mode.
    AntiBanding(AntiBandingMode),
    /// A focus mode.
    Focus(FocusMode),
    /// A flash mode.
    Flash(Flash),
    /// An fps range.
    FpsRange(Range<u32>),
    /// An integer value.
    Int(u32),
    /// A flag.
    Bool(bool),
}

/// Validated mapping from parameter kind to chosen value.
///
/// Absent kinds mean "no preference": the hardware layer keeps its default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    values: BTreeMap<ParameterKind, ParameterValue>,
}

macro_rules! typed_getter {
    ($(#[$doc:meta])* $name:ident, $kind:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self) -> Option<$ty> {
            match self.values.get(&ParameterKind::$kind) {
                Some(ParameterValue::$variant(value)) => Some(*value),
                _ => None,
            }
        }
    };
}

impl ParameterSet {
    /// Empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding a single optional value; `None` yields an empty set.
    fn of(kind: ParameterKind, value: Option<ParameterValue>) -> Self {
        let mut set = Self::new();
        if let Some(value) = value {
            set.values.insert(kind, value);
        }
        set
    }

    /// Combine several sets. Later sets override earlier ones per kind.
    pub fn combine<I: IntoIterator<Item = Self>>(sets: I) -> Self {
        sets.into_iter().fold(Self::new(), |acc, next| acc.merge(&next))
    }

    /// Layer `other` over `self`, returning the result.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(kind, value)| (*kind, *value)));
        Self { values }
    }

    /// Value stored for `kind`.
    pub fn get(&self, kind: ParameterKind) -> Option<&ParameterValue> {
        self.values.get(&kind)
    }

    /// Whether `kind` was selected.
    pub fn contains(&self, kind: ParameterKind) -> bool {
        self.values.contains_key(&kind)
    }

    /// Number of selected values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over selected values in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (ParameterKind, &ParameterValue)> {
        self.values.iter().map(|(kind, value)| (*kind, value))
    }

    typed_getter!(
        /// Selected picture size.
        picture_size, PictureSize, Size, Size
    );
    typed_getter!(
        /// Selected preview size.
        preview_size, PreviewSize, Size, Size
    );
    typed_getter!(
        /// Selected anti-banding mode.
        anti_banding_mode, AntiBandingMode, AntiBanding, AntiBandingMode
    );
    typed_getter!(
        /// Selected focus mode.
        focus_mode, FocusMode, Focus, FocusMode
    );
    typed_getter!(
        /// Selected flash mode.
        flash, Flash, Flash, Flash
    );
    typed_getter!(
        /// Selected preview fps range.
        preview_fps_range, PreviewFpsRange, FpsRange, Range<u32>
    );
    typed_getter!(
        /// Selected ISO sensitivity.
        sensor_sensitivity, SensorSensitivity, Int, u32
    );
    typed_getter!(
        /// JPEG quality.
        jpeg_quality, JpegQuality, Int, u32
    );
    typed_getter!(
        /// Centre-weighted exposure flag.
        center_exposure, CenterExposure, Bool, bool
    );
    typed_getter!(
        /// Flash re-arm flag.
        reinit_flash, ReinitFlash, Bool, bool
    );
}

/// Select one value from a set-valued capability.
///
/// A `None` pick is returned as-is without validation. A pick outside
/// `candidates` is an [`CameraError::InvalidParameter`].
pub fn select_from_set<'a, T, I>(
    kind: ParameterKind,
    candidates: I,
    selector: &Selector<T>,
) -> Result<Option<T>>
where
    T: PartialEq + Clone + fmt::Debug + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let candidates: Vec<T> = candidates.into_iter().cloned().collect();
    let Some(picked) = selector.select(&candidates) else {
        debug!(%kind, "selector expressed no preference");
        return Ok(None);
    };
    if !candidates.contains(&picked) {
        return Err(CameraError::unsupported(kind));
    }
    debug!(%kind, value = ?picked, "selected");
    Ok(Some(picked))
}

/// Select one value from a range-valued capability.
///
/// Containment is only checked when the range has at least one known bound.
pub fn select_from_range<T>(
    kind: ParameterKind,
    range: &Range<T>,
    selector: &RangeSelector<T>,
) -> Result<Option<T>>
where
    T: PartialOrd + fmt::Debug,
{
    let Some(picked) = selector.select(range) else {
        debug!(%kind, "selector expressed no preference");
        return Ok(None);
    };
    if range.is_bypass() {
        debug!(%kind, value = ?picked, "range unknown, skipping validation");
        return Ok(Some(picked));
    }
    if !range.contains(&picked) {
        return Err(CameraError::unsupported(kind));
    }
    debug!(%kind, value = ?picked, "selected");
    Ok(Some(picked))
}

fn ensure_jpeg_quality(quality: u32) -> Result<u32> {
    if (1..=100).contains(&quality) {
        Ok(quality)
    } else {
        Err(CameraError::InvalidParameter {
            kind: ParameterKind::JpegQuality,
            reason: format!("{quality} is outside 1..=100"),
        })
    }
}

/// Builds the preview selector used once the picture size is known: a preview
/// with the picture's aspect ratio if any, otherwise whatever `fallback` picks.
pub fn valid_preview_size_selector(photo_size: Size, fallback: Selector<Size>) -> Selector<Size> {
    selector::first_available(vec![
        selector::aspect_ratio(photo_size, fallback.clone()),
        fallback,
    ])
}

/// Selectors for a partial reconfiguration. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct ParameterUpdate {
    /// New focus mode policy.
    pub focus_mode: Option<Selector<FocusMode>>,
    /// New flash policy.
    pub flash: Option<Selector<Flash>>,
    /// New fps range policy.
    pub preview_fps_range: Option<Selector<Range<u32>>>,
    /// New sensitivity policy.
    pub sensor_sensitivity: Option<RangeSelector<u32>>,
}

/// Holds one selector per parameter kind and turns capabilities into a
/// validated [`ParameterSet`].
#[derive(Debug, Clone)]
pub struct ParameterNegotiator {
    photo_size: Selector<Size>,
    preview_size: Selector<Size>,
    anti_banding_mode: Selector<AntiBandingMode>,
    focus_mode: Selector<FocusMode>,
    flash: Selector<Flash>,
    preview_fps_range: Selector<Range<u32>>,
    sensor_sensitivity: RangeSelector<u32>,
    jpeg_quality: u32,
    center_exposure: bool,
    reinit_flash: bool,
    required: Vec<ParameterKind>,
}

impl Default for ParameterNegotiator {
    fn default() -> Self {
        Self {
            photo_size: selector::largest_size(),
            preview_size: selector::largest_size(),
            anti_banding_mode: selector::preferred(vec![
                AntiBandingMode::Auto,
                AntiBandingMode::Hz50,
                AntiBandingMode::Hz60,
                AntiBandingMode::None,
            ]),
            focus_mode: selector::preferred(vec![
                FocusMode::ContinuousFocus,
                FocusMode::Auto,
                FocusMode::Fixed,
            ]),
            flash: selector::preferred(vec![Flash::Auto, Flash::AutoRedEye, Flash::Off]),
            preview_fps_range: selector::highest_fps(),
            sensor_sensitivity: selector::range_nothing(),
            jpeg_quality: 90,
            center_exposure: false,
            reinit_flash: false,
            required: Vec::new(),
        }
    }
}

impl ParameterNegotiator {
    /// Negotiator with the default policies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the photo size policy.
    #[must_use]
    pub fn photo_size(mut self, selector: Selector<Size>) -> Self {
        self.photo_size = selector;
        self
    }

    /// Set the preview size policy.
    #[must_use]
    pub fn preview_size(mut self, selector: Selector<Size>) -> Self {
        self.preview_size = selector;
        self
    }

    /// Set the anti-banding policy.
    #[must_use]
    pub fn anti_banding_mode(mut self, selector: Selector<AntiBandingMode>) -> Self {
        self.anti_banding_mode = selector;
        self
    }

    /// Set the focus mode policy.
    #[must_use]
    pub fn focus_mode(mut self, selector: Selector<FocusMode>) -> Self {
        self.focus_mode = selector;
        self
    }

    /// Set the flash policy.
    #[must_use]
    pub fn flash(mut self, selector: Selector<Flash>) -> Self {
        self.flash = selector;
        self
    }

    /// Set the fps range policy.
    #[must_use]
    pub fn preview_fps_range(mut self, selector: Selector<Range<u32>>) -> Self {
        self.preview_fps_range = selector;
        self
    }

    /// Set the sensitivity policy.
    #[must_use]
    pub fn sensor_sensitivity(mut self, selector: RangeSelector<u32>) -> Self {
        self.sensor_sensitivity = selector;
        self
    }

    /// Set the JPEG quality. Checked during negotiation.
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u32) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Enable centre-weighted exposure.
    #[must_use]
    pub fn center_exposure(mut self, enabled: bool) -> Self {
        self.center_exposure = enabled;
        self
    }

    /// Re-arm the flash before each capture.
    #[must_use]
    pub fn reinit_flash(mut self, enabled: bool) -> Self {
        self.reinit_flash = enabled;
        self
    }

    /// Kinds that must end up selected.
    #[must_use]
    pub fn required(mut self, kinds: Vec<ParameterKind>) -> Self {
        self.required = kinds;
        self
    }

    /// Negotiate the full parameter set. Any failing selector aborts the
    /// whole negotiation.
    pub fn negotiate(&self, capabilities: &CapabilitySet) -> Result<ParameterSet> {
        let photo_size = select_from_set(
            ParameterKind::PictureSize,
            capabilities.photo_sizes(),
            &self.photo_size,
        )?;

        let preview_selector = photo_size.map_or_else(
            || self.preview_size.clone(),
            |photo| valid_preview_size_selector(photo, self.preview_size.clone()),
        );
        let preview_size = select_from_set(
            ParameterKind::PreviewSize,
            capabilities.preview_sizes(),
            &preview_selector,
        )?;

        let anti_banding = select_from_set(
            ParameterKind::AntiBandingMode,
            capabilities.anti_banding_modes(),
            &self.anti_banding_mode,
        )?;
        let focus = select_from_set(
            ParameterKind::FocusMode,
            capabilities.focus_modes(),
            &self.focus_mode,
        )?;
        let flash = select_from_set(ParameterKind::Flash, capabilities.flash_modes(), &self.flash)?;
        let fps = select_from_set(
            ParameterKind::PreviewFpsRange,
            capabilities.preview_fps_ranges(),
            &self.preview_fps_range,
        )?;
        let sensitivity = select_from_range(
            ParameterKind::SensorSensitivity,
            capabilities.sensor_sensitivity(),
            &self.sensor_sensitivity,
        )?;
        let jpeg_quality = ensure_jpeg_quality(self.jpeg_quality)?;

        let parameters = ParameterSet::combine([
            ParameterSet::of(ParameterKind::PictureSize, photo_size.map(ParameterValue::Size)),
            ParameterSet::of(ParameterKind::PreviewSize, preview_size.map(ParameterValue::Size)),
            ParameterSet::of(
                ParameterKind::AntiBandingMode,
                anti_banding.map(ParameterValue::AntiBanding),
            ),
            ParameterSet::of(ParameterKind::FocusMode, focus.map(ParameterValue::Focus)),
            ParameterSet::of(ParameterKind::Flash, flash.map(ParameterValue::Flash)),
            ParameterSet::of(ParameterKind::PreviewFpsRange, fps.map(ParameterValue::FpsRange)),
            ParameterSet::of(
                ParameterKind::SensorSensitivity,
                sensitivity.map(ParameterValue::Int),
            ),
            ParameterSet::of(ParameterKind::JpegQuality, Some(ParameterValue::Int(jpeg_quality))),
            ParameterSet::of(
                ParameterKind::CenterExposure,
                Some(ParameterValue::Bool(self.center_exposure)),
            ),
            ParameterSet::of(
                ParameterKind::ReinitFlash,
                Some(ParameterValue::Bool(self.reinit_flash)),
            ),
        ]);

        if let Some(missing) = self.required.iter().find(|kind| !parameters.contains(**kind)) {
            return Err(CameraError::MissingParameter(*missing));
        }

        info!(
            picture = ?parameters.picture_size(),
            preview = ?parameters.preview_size(),
            focus = ?parameters.focus_mode(),
            flash = ?parameters.flash(),
            "negotiated camera parameters"
        );
        Ok(parameters)
    }

    /// Read capabilities from `source` and negotiate.
    pub fn negotiate_with<S: CapabilitySource + ?Sized>(&self, source: &S) -> Result<ParameterSet> {
        let capabilities = source.capabilities()?;
        self.negotiate(&capabilities)
    }

    /// Evaluate only the selectors present in `update`. The result is meant to
    /// be layered over the current set with [`ParameterSet::merge`].
    pub fn reconfigure(
        &self,
        capabilities: &CapabilitySet,
        update: &ParameterUpdate,
    ) -> Result<ParameterSet> {
        let mut sets = Vec::new();
        if let Some(selector) = &update.focus_mode {
            let focus =
                select_from_set(ParameterKind::FocusMode, capabilities.focus_modes(), selector)?;
            sets.push(ParameterSet::of(
                ParameterKind::FocusMode,
                focus.map(ParameterValue::Focus),
            ));
        }
        if let Some(selector) = &update.flash {
            let flash =
                select_from_set(ParameterKind::Flash, capabilities.flash_modes(), selector)?;
            sets.push(ParameterSet::of(ParameterKind::Flash, flash.map(ParameterValue::Flash)));
        }
        if let Some(selector) = &update.preview_fps_range {
            let fps = select_from_set(
                ParameterKind::PreviewFpsRange,
                capabilities.preview_fps_ranges(),
                selector,
            )?;
            sets.push(ParameterSet::of(
                ParameterKind::PreviewFpsRange,
                fps.map(ParameterValue::FpsRange),
            ));
        }
        if let Some(selector) = &update.sensor_sensitivity {
            let sensitivity = select_from_range(
                ParameterKind::SensorSensitivity,
                capabilities.sensor_sensitivity(),
                selector,
            )?;
            sets.push(ParameterSet::of(
                ParameterKind::SensorSensitivity,
                sensitivity.map(ParameterValue::Int),
            ));
        }
        Ok(ParameterSet::combine(sets))
    }
}
