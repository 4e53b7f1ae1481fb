//! Selector functions: pure policies that pick one value out of a candidate
//! set or range.
//!
//! Selectors never validate their own output. A `None` result means "no
//! preference" and is propagated as an absent parameter; validation against the
//! advertised capabilities happens in [`crate::parameters`].

use std::fmt;
use std::sync::Arc;

use crate::capabilities::{Range, Size};

/// Widest size the largest-size policy trusts. Some drivers report bogus
/// oversized modes.
pub const MAX_SANE_WIDTH: u32 = 5000;

type SetFn<T> = dyn Fn(&[T]) -> Option<T> + Send + Sync;
type RangeFn<T> = dyn Fn(&Range<T>) -> Option<T> + Send + Sync;

/// Picks one value from a set of candidates.
pub struct Selector<T> {
    func: Arc<SetFn<T>>,
}

impl<T> Selector<T> {
    /// Wrap a selection function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[T]) -> Option<T> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Run the selector over `candidates`.
    pub fn select(&self, candidates: &[T]) -> Option<T> {
        (self.func)(candidates)
    }
}

impl<T> Clone for Selector<T> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
        }
    }
}

impl<T> fmt::Debug for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector").finish_non_exhaustive()
    }
}

/// Picks one value from a numeric range.
pub struct RangeSelector<T> {
    func: Arc<RangeFn<T>>,
}

impl<T> RangeSelector<T> {
    /// Wrap a selection function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Range<T>) -> Option<T> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Run the selector over `range`.
    pub fn select(&self, range: &Range<T>) -> Option<T> {
        (self.func)(range)
    }
}

impl<T> Clone for RangeSelector<T> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
        }
    }
}

impl<T> fmt::Debug for RangeSelector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeSelector").finish_non_exhaustive()
    }
}

/// Never expresses a preference.
pub fn nothing<T>() -> Selector<T> {
    Selector::new(|_| None)
}

/// Selects `value` if it is among the candidates.
pub fn single<T>(value: T) -> Selector<T>
where
    T: PartialEq + Clone + Send + Sync + 'static,
{
    Selector::new(move |candidates: &[T]| candidates.contains(&value).then(|| value.clone()))
}

/// Tries each selector in order; the first non-`None` result wins.
pub fn first_available<T: 'static>(selectors: Vec<Selector<T>>) -> Selector<T> {
    Selector::new(move |candidates: &[T]| {
        selectors
            .iter()
            .find_map(|selector| selector.select(candidates))
    })
}

/// Drops candidates rejected by `predicate`, then delegates to `inner`.
pub fn filtered<T, P>(predicate: P, inner: Selector<T>) -> Selector<T>
where
    T: Clone + 'static,
    P: Fn(&T) -> bool + Send + Sync + 'static,
{
    Selector::new(move |candidates: &[T]| {
        let kept: Vec<T> = candidates
            .iter()
            .filter(|candidate| predicate(*candidate))
            .cloned()
            .collect();
        inner.select(&kept)
    })
}

/// First value of `preferences` that the sensor supports.
pub fn preferred<T>(preferences: Vec<T>) -> Selector<T>
where
    T: PartialEq + Clone + Send + Sync + 'static,
{
    first_available(preferences.into_iter().map(single).collect())
}

/// Largest size by area among candidates no wider than [`MAX_SANE_WIDTH`].
///
/// The width ceiling applies only here; [`smallest_size`] considers every
/// candidate. The two policies are intentionally not symmetric.
pub fn largest_size() -> Selector<Size> {
    Selector::new(|candidates: &[Size]| {
        candidates
            .iter()
            .filter(|size| size.width <= MAX_SANE_WIDTH)
            .max_by_key(|size| size.area())
            .copied()
    })
}

/// Smallest size by area, without any width filtering.
pub fn smallest_size() -> Selector<Size> {
    Selector::new(|candidates: &[Size]| candidates.iter().min_by_key(|size| size.area()).copied())
}

/// Restricts `inner` to sizes with exactly the aspect ratio of `reference`.
pub fn aspect_ratio(reference: Size, inner: Selector<Size>) -> Selector<Size> {
    filtered(move |size: &Size| size.same_aspect_ratio(&reference), inner)
}

/// Restricts `inner` to sizes whose aspect ratio is within `tolerance` of `ratio`.
pub fn aspect_ratio_within(ratio: f64, tolerance: f64, inner: Selector<Size>) -> Selector<Size> {
    filtered(
        move |size: &Size| {
            size.aspect_ratio()
                .is_some_and(|actual| (actual - ratio).abs() <= tolerance)
        },
        inner,
    )
}

/// Fps range with the highest maximum, ties broken by the highest minimum.
pub fn highest_fps() -> Selector<Range<u32>> {
    Selector::new(|candidates: &[Range<u32>]| {
        candidates
            .iter()
            .max_by_key(|range| (range.high().copied(), range.low().copied()))
            .copied()
    })
}

/// Fps range with the lowest maximum, ties broken by the lowest minimum.
pub fn lowest_fps() -> Selector<Range<u32>> {
    Selector::new(|candidates: &[Range<u32>]| {
        candidates
            .iter()
            .min_by_key(|range| (range.high().copied(), range.low().copied()))
            .copied()
    })
}

/// Upper bound of the range, if known.
pub fn range_highest<T: Copy + 'static>() -> RangeSelector<T> {
    RangeSelector::new(|range: &Range<T>| range.high().copied())
}

/// Lower bound of the range, if known.
pub fn range_lowest<T: Copy + 'static>() -> RangeSelector<T> {
    RangeSelector::new(|range: &Range<T>| range.low().copied())
}

/// A fixed value. Validated against the range like any other pick.
pub fn range_manual<T: Copy + Send + Sync + 'static>(value: T) -> RangeSelector<T> {
    RangeSelector::new(move |_: &Range<T>| Some(value))
}

/// Never expresses a preference for a range-valued parameter.
pub fn range_nothing<T>() -> RangeSelector<T> {
    RangeSelector::new(|_| None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::FocusMode;

    fn sizes() -> Vec<Size> {
        vec![
            Size::new(100, 100),
            Size::new(6000, 6000),
            Size::new(4000, 3000),
        ]
    }

    #[test]
    fn test_largest_size_skips_oversized_candidates() {
        assert_eq!(largest_size().select(&sizes()), Some(Size::new(4000, 3000)));
    }

    #[test]
    fn test_smallest_size_is_unfiltered() {
        assert_eq!(smallest_size().select(&sizes()), Some(Size::new(100, 100)));
        // The ceiling does not apply here, so an oversized-only set still yields a pick.
        let oversized = [Size::new(8000, 100), Size::new(9000, 9000)];
        assert_eq!(smallest_size().select(&oversized), Some(Size::new(8000, 100)));
        assert_eq!(largest_size().select(&oversized), None);
    }

    #[test]
    fn test_size_selectors_on_empty_set() {
        assert_eq!(largest_size().select(&[]), None);
        assert_eq!(smallest_size().select(&[]), None);
    }

    #[test]
    fn test_first_available_falls_through() {
        let selector = first_available(vec![nothing(), single(FocusMode::Auto)]);
        assert_eq!(
            selector.select(&[FocusMode::Fixed, FocusMode::Auto]),
            Some(FocusMode::Auto)
        );
        assert_eq!(selector.select(&[FocusMode::Fixed]), None);
    }

    #[test]
    fn test_preferred_respects_order() {
        let selector = preferred(vec![
            FocusMode::ContinuousFocus,
            FocusMode::Auto,
            FocusMode::Fixed,
        ]);
        assert_eq!(
            selector.select(&[FocusMode::Fixed, FocusMode::Auto]),
            Some(FocusMode::Auto)
        );
    }

    #[test]
    fn test_aspect_ratio_restricts_inner_selector() {
        let candidates = [
            Size::new(1920, 1080),
            Size::new(640, 480),
            Size::new(1280, 960),
        ];
        let selector = aspect_ratio(Size::new(4000, 3000), largest_size());
        assert_eq!(selector.select(&candidates), Some(Size::new(1280, 960)));

        let selector = aspect_ratio(Size::new(100, 37), largest_size());
        assert_eq!(selector.select(&candidates), None);
    }

    #[test]
    fn test_aspect_ratio_within_tolerance() {
        let candidates = [Size::new(1920, 1088), Size::new(640, 480)];
        let selector = aspect_ratio_within(16.0 / 9.0, 0.05, largest_size());
        assert_eq!(selector.select(&candidates), Some(Size::new(1920, 1088)));
    }

    #[test]
    fn test_fps_selectors() {
        let ranges = [Range::new(15, 30), Range::new(30, 30), Range::new(7, 15)];
        assert_eq!(highest_fps().select(&ranges), Some(Range::new(30, 30)));
        assert_eq!(lowest_fps().select(&ranges), Some(Range::new(7, 15)));
    }

    #[test]
    fn test_range_selectors() {
        let range = Range::new(100, 1600);
        assert_eq!(range_highest().select(&range), Some(1600));
        assert_eq!(range_lowest().select(&range), Some(100));
        assert_eq!(range_manual(400).select(&range), Some(400));
        assert_eq!(range_nothing::<u32>().select(&range), None);
        assert_eq!(range_highest::<u32>().select(&Range::unbounded()), None);
    }
}
