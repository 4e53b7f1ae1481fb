//! Sensor capability description: discrete value sets and numeric ranges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Frame or picture dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered by this size.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width divided by height, or `None` for a zero height.
    #[must_use]
    pub fn aspect_ratio(&self) -> Option<f64> {
        (self.height != 0).then(|| f64::from(self.width) / f64::from(self.height))
    }

    /// Exact aspect ratio comparison (cross-multiplied, no rounding).
    #[must_use]
    pub const fn same_aspect_ratio(&self, other: &Self) -> bool {
        self.width as u64 * other.height as u64 == other.width as u64 * self.height as u64
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Inclusive range with optional bounds.
///
/// A bound of `None` is open on that side. When both bounds are `None` the
/// range is the "unknown" sentinel and [`Range::contains`] accepts anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Range<T> {
    low: Option<T>,
    high: Option<T>,
}

impl<T> Range<T> {
    /// Range with no known bounds.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            low: None,
            high: None,
        }
    }

    /// Lower bound, if known.
    pub const fn low(&self) -> Option<&T> {
        self.low.as_ref()
    }

    /// Upper bound, if known.
    pub const fn high(&self) -> Option<&T> {
        self.high.as_ref()
    }

    /// True when neither bound is known and validation must be skipped.
    pub const fn is_bypass(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }
}

impl<T: PartialOrd> Range<T> {
    /// Closed range `[low, high]`.
    #[must_use]
    pub const fn new(low: T, high: T) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }

    /// Range with individually optional bounds.
    #[must_use]
    pub const fn with_bounds(low: Option<T>, high: Option<T>) -> Self {
        Self { low, high }
    }

    /// Inclusive containment check. Always true for the bypass sentinel.
    pub fn contains(&self, value: &T) -> bool {
        let above_low = self.low.as_ref().is_none_or(|low| value >= low);
        let below_high = self.high.as_ref().is_none_or(|high| value <= high);
        above_low && below_high
    }
}

impl<T: PartialOrd + Clone> Range<T> {
    /// Single-value range.
    #[must_use]
    pub fn point(value: T) -> Self {
        Self::new(value.clone(), value)
    }
}

impl<T> Default for Range<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T: fmt::Display> fmt::Display for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.low, &self.high) {
            (Some(low), Some(high)) => write!(f, "[{low}, {high}]"),
            (Some(low), None) => write!(f, "[{low}, ..)"),
            (None, Some(high)) => write!(f, "(.., {high}]"),
            (None, None) => f.write_str("(..)"),
        }
    }
}

/// Auto-focus modes a lens may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    /// Lens cannot focus.
    Fixed,
    /// Focus locked at infinity.
    Infinity,
    /// Close-up focusing.
    Macro,
    /// Single-shot auto focus.
    Auto,
    /// Continuous focus suitable for pictures.
    ContinuousFocus,
    /// Extended depth of field.
    Edof,
}

/// Flash firing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flash {
    /// Never fire.
    Off,
    /// Always fire.
    On,
    /// Fire when metering decides it is needed.
    Auto,
    /// Auto with red-eye reduction.
    AutoRedEye,
    /// Continuous light.
    Torch,
}

/// Mains flicker compensation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiBandingMode {
    /// Detect automatically.
    Auto,
    /// 50 Hz mains.
    Hz50,
    /// 60 Hz mains.
    Hz60,
    /// No compensation.
    None,
}

/// Immutable description of what a sensor supports.
///
/// Built once per hardware session through [`CapabilitySetBuilder`] and read
/// only afterwards. [`CapabilitySet::empty`] means "capabilities unknown".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitySet {
    photo_sizes: BTreeSet<Size>,
    preview_sizes: BTreeSet<Size>,
    anti_banding_modes: BTreeSet<AntiBandingMode>,
    focus_modes: BTreeSet<FocusMode>,
    flash_modes: BTreeSet<Flash>,
    preview_fps_ranges: BTreeSet<Range<u32>>,
    sensor_sensitivity: Range<u32>,
    zoom_supported: bool,
    lens_min_focus_distance: Option<f32>,
}

impl CapabilitySet {
    /// The "capabilities unknown" sentinel: every set empty, range unbounded.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a capability set.
    #[must_use]
    pub fn builder() -> CapabilitySetBuilder {
        CapabilitySetBuilder::default()
    }

    /// Supported still picture sizes.
    pub const fn photo_sizes(&self) -> &BTreeSet<Size> {
        &self.photo_sizes
    }

    /// Supported preview stream sizes.
    pub const fn preview_sizes(&self) -> &BTreeSet<Size> {
        &self.preview_sizes
    }

    /// Supported anti-banding modes.
    pub const fn anti_banding_modes(&self) -> &BTreeSet<AntiBandingMode> {
        &self.anti_banding_modes
    }

    /// Supported focus modes.
    pub const fn focus_modes(&self) -> &BTreeSet<FocusMode> {
        &self.focus_modes
    }

    /// Supported flash modes.
    pub const fn flash_modes(&self) -> &BTreeSet<Flash> {
        &self.flash_modes
    }

    /// Supported preview frame-rate ranges.
    pub const fn preview_fps_ranges(&self) -> &BTreeSet<Range<u32>> {
        &self.preview_fps_ranges
    }

    /// Supported ISO sensitivity range.
    pub const fn sensor_sensitivity(&self) -> &Range<u32> {
        &self.sensor_sensitivity
    }

    /// Whether the sensor supports zoom.
    pub const fn zoom_supported(&self) -> bool {
        self.zoom_supported
    }

    /// Closest focusing distance in diopters, if reported.
    pub const fn lens_min_focus_distance(&self) -> Option<f32> {
        self.lens_min_focus_distance
    }

    /// True when nothing at all was reported.
    pub fn is_empty(&self) -> bool {
        self == &Self::empty()
    }
}

/// Builder for [`CapabilitySet`].
#[derive(Debug, Clone, Default)]
pub struct CapabilitySetBuilder {
    inner: CapabilitySet,
}

impl CapabilitySetBuilder {
    /// Add supported photo sizes.
    #[must_use]
    pub fn photo_sizes<I: IntoIterator<Item = Size>>(mut self, sizes: I) -> Self {
        self.inner.photo_sizes.extend(sizes);
        self
    }

    /// Add supported preview sizes.
    #[must_use]
    pub fn preview_sizes<I: IntoIterator<Item = Size>>(mut self, sizes: I) -> Self {
        self.inner.preview_sizes.extend(sizes);
        self
    }

    /// Add supported anti-banding modes.
    #[must_use]
    pub fn anti_banding_modes<I: IntoIterator<Item = AntiBandingMode>>(mut self, modes: I) -> Self {
        self.inner.anti_banding_modes.extend(modes);
        self
    }

    /// Add supported focus modes.
    #[must_use]
    pub fn focus_modes<I: IntoIterator<Item = FocusMode>>(mut self, modes: I) -> Self {
        self.inner.focus_modes.extend(modes);
        self
    }

    /// Add supported flash modes.
    #[must_use]
    pub fn flash_modes<I: IntoIterator<Item = Flash>>(mut self, modes: I) -> Self {
        self.inner.flash_modes.extend(modes);
        self
    }

    /// Add supported preview fps ranges.
    #[must_use]
    pub fn preview_fps_ranges<I: IntoIterator<Item = Range<u32>>>(mut self, ranges: I) -> Self {
        self.inner.preview_fps_ranges.extend(ranges);
        self
    }

    /// Set the ISO sensitivity range.
    #[must_use]
    pub fn sensor_sensitivity(mut self, range: Range<u32>) -> Self {
        self.inner.sensor_sensitivity = range;
        self
    }

    /// Mark zoom as supported or not.
    #[must_use]
    pub fn zoom_supported(mut self, supported: bool) -> Self {
        self.inner.zoom_supported = supported;
        self
    }

    /// Set the lens minimum focus distance.
    #[must_use]
    pub fn lens_min_focus_distance(mut self, diopters: Option<f32>) -> Self {
        self.inner.lens_min_focus_distance = diopters;
        self
    }

    /// Freeze the capability set.
    #[must_use]
    pub fn build(self) -> CapabilitySet {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_range_contains_everything() {
        let range: Range<u32> = Range::unbounded();
        assert!(range.is_bypass());
        assert!(range.contains(&0));
        assert!(range.contains(&u32::MAX));
    }

    #[test]
    fn test_closed_range_is_inclusive() {
        let range = Range::new(100, 800);
        assert!(!range.is_bypass());
        assert!(range.contains(&100));
        assert!(range.contains(&800));
        assert!(!range.contains(&99));
        assert!(!range.contains(&801));
    }

    #[test]
    fn test_half_open_range() {
        let range = Range::with_bounds(Some(50), None);
        assert!(!range.is_bypass());
        assert!(range.contains(&10_000));
        assert!(!range.contains(&49));
        assert_eq!(range.to_string(), "[50, ..)");

        let upper_only = Range::with_bounds(None, Some(30));
        assert!(upper_only.contains(&0));
        assert!(upper_only.contains(&30));
        assert!(!upper_only.contains(&31));
    }

    #[test]
    fn test_size_area_and_aspect_ratio() {
        let size = Size::new(4000, 3000);
        assert_eq!(size.area(), 12_000_000);
        assert!(size.same_aspect_ratio(&Size::new(640, 480)));
        assert!(!size.same_aspect_ratio(&Size::new(1920, 1080)));
        assert_eq!(Size::new(10, 0).aspect_ratio(), None);
    }

    #[test]
    fn test_empty_capabilities_sentinel() {
        let caps = CapabilitySet::empty();
        assert!(caps.is_empty());
        assert!(caps.photo_sizes().is_empty());
        assert!(caps.sensor_sensitivity().is_bypass());

        let caps = CapabilitySet::builder().zoom_supported(true).build();
        assert!(!caps.is_empty());
    }

    #[test]
    fn test_builder_deduplicates() {
        let caps = CapabilitySet::builder()
            .photo_sizes([Size::new(640, 480), Size::new(640, 480)])
            .focus_modes([FocusMode::Auto, FocusMode::Auto, FocusMode::Fixed])
            .build();
        assert_eq!(caps.photo_sizes().len(), 1);
        assert_eq!(caps.focus_modes().len(), 2);
    }
}
