//! Synthetic hardware for testing without a camera.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::thread;

use crate::capabilities::{AntiBandingMode, CapabilitySet, Flash, FocusMode, Range, Size};
use crate::convergence::MeteringSample;
use crate::convert::{CropRect, PixelFormat, PlaneView, RawBuffer};
use crate::still::{Completer, Photo};
use crate::traits::{
    CameraError, CapabilitySource, FrameSource, MetadataSource, Result, StillCaptureDevice,
};

/// Capabilities of a typical 12 MP phone sensor.
pub fn sample_capabilities() -> CapabilitySet {
    CapabilitySet::builder()
        .photo_sizes([
            Size::new(4000, 3000),
            Size::new(6000, 4500),
            Size::new(1920, 1080),
            Size::new(640, 480),
        ])
        .preview_sizes([
            Size::new(1920, 1080),
            Size::new(1440, 1080),
            Size::new(640, 480),
        ])
        .focus_modes([FocusMode::ContinuousFocus, FocusMode::Auto, FocusMode::Fixed])
        .flash_modes([Flash::Off, Flash::On, Flash::Auto])
        .anti_banding_modes([AntiBandingMode::Auto, AntiBandingMode::Hz50])
        .preview_fps_ranges([Range::new(15, 30), Range::new(30, 30), Range::new(7, 15)])
        .sensor_sensitivity(Range::new(100, 1600))
        .zoom_supported(true)
        .lens_min_focus_distance(Some(10.0))
        .build()
}

/// Metadata source replaying a fixed list of samples, then reporting closed.
pub struct ScriptedMetadata {
    samples: VecDeque<MeteringSample>,
}

impl ScriptedMetadata {
    /// Replay `samples` in order.
    pub fn new(samples: Vec<MeteringSample>) -> Self {
        Self {
            samples: samples.into(),
        }
    }
}

impl MetadataSource for ScriptedMetadata {
    fn next_sample(&mut self) -> Result<MeteringSample> {
        self.samples.pop_front().ok_or_else(|| {
            CameraError::DeviceUnavailable("metadata script exhausted".to_owned())
        })
    }
}

/// Three-plane YUV 4:2:0 image with padded rows.
#[derive(Debug, Clone)]
pub struct PlanarPattern {
    width: usize,
    height: usize,
    luma_stride: usize,
    chroma_stride: usize,
    luma: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

/// Fill value of row padding, never a valid sample of the pattern.
const PADDING: u8 = 0xEE;

impl PlanarPattern {
    /// Chroma U value of every pattern.
    pub const U: u8 = 90;
    /// Chroma V value of every pattern.
    pub const V: u8 = 160;

    /// Horizontal luma gradient from dark to light.
    pub fn gradient(width: usize, height: usize, padding: usize) -> Self {
        Self::build(width, height, padding, |x| {
            u8::try_from(x * 255 / width.max(1)).unwrap_or(u8::MAX)
        })
    }

    /// Constant luma.
    pub fn solid(width: usize, height: usize, padding: usize, luma: u8) -> Self {
        Self::build(width, height, padding, |_| luma)
    }

    fn build<F: Fn(usize) -> u8>(width: usize, height: usize, padding: usize, luma_at: F) -> Self {
        let luma_stride = width + padding;
        let chroma_stride = width / 2 + padding;

        let mut luma = Vec::with_capacity(luma_stride * height);
        for _ in 0..height {
            luma.extend((0..width).map(&luma_at));
            luma.extend(std::iter::repeat_n(PADDING, padding));
        }

        let chroma_plane = |value: u8| {
            let mut plane = Vec::with_capacity(chroma_stride * (height / 2));
            for _ in 0..height / 2 {
                plane.extend(std::iter::repeat_n(value, width / 2));
                plane.extend(std::iter::repeat_n(PADDING, padding));
            }
            plane
        };

        Self {
            width,
            height,
            luma_stride,
            chroma_stride,
            luma,
            u: chroma_plane(Self::U),
            v: chroma_plane(Self::V),
        }
    }

    /// Borrow the pattern as a raw buffer with a full-frame crop.
    pub fn raw(&self) -> RawBuffer<'_> {
        RawBuffer {
            planes: vec![
                PlaneView::new(&self.luma, self.luma_stride, 1),
                PlaneView::new(&self.u, self.chroma_stride, 1),
                PlaneView::new(&self.v, self.chroma_stride, 1),
            ],
            crop: CropRect::full(self.width, self.height),
            format: PixelFormat::Yuv420,
        }
    }

    /// Luma samples of one row, without padding.
    pub fn luma_row(&self, row: usize) -> Option<Vec<u8>> {
        let start = row * self.luma_stride;
        self.luma.get(start..start + self.width).map(<[u8]>::to_vec)
    }
}

/// Frame source serving copies of one pattern.
pub struct MockFrameSource {
    pattern: PlanarPattern,
    remaining: usize,
    served: usize,
    truncated: Option<usize>,
}

impl MockFrameSource {
    /// Serve `frames` buffers, then report the device closed.
    pub fn new(pattern: PlanarPattern, frames: usize) -> Self {
        Self {
            pattern,
            remaining: frames,
            served: 0,
            truncated: None,
        }
    }

    /// Cut the luma plane of buffer `index` short.
    #[must_use]
    pub fn with_truncated_frame(mut self, index: usize) -> Self {
        self.truncated = Some(index);
        self
    }
}

impl FrameSource for MockFrameSource {
    fn next_buffer(&mut self) -> Result<RawBuffer<'_>> {
        if self.remaining == 0 {
            return Err(CameraError::DeviceUnavailable(
                "mock source exhausted".to_owned(),
            ));
        }
        self.remaining -= 1;
        let index = self.served;
        self.served += 1;

        let mut raw = self.pattern.raw();
        if self.truncated == Some(index) {
            if let Some(luma) = raw.planes.first_mut() {
                luma.data = luma.data.get(..luma.data.len() / 2).unwrap_or_default();
            }
        }
        Ok(raw)
    }
}

/// How [`MockStillDevice`] answers a capture request.
#[derive(Debug, Clone)]
pub enum StillBehavior {
    /// Complete from a background thread with these bytes.
    Complete(Vec<u8>),
    /// Fail from a background thread with this platform message.
    Fail(String),
    /// Refuse the request because the device is closed.
    Closed,
    /// Accept the request and never answer.
    Stall,
}

/// Still capture device completing on its own thread.
pub struct MockStillDevice {
    behavior: StillBehavior,
    pending: Mutex<Vec<Completer<Result<Photo>>>>,
}

impl MockStillDevice {
    /// Device answering every request with `behavior`.
    pub fn new(behavior: StillBehavior) -> Self {
        Self {
            behavior,
            pending: Mutex::new(Vec::new()),
        }
    }
}

impl StillCaptureDevice for MockStillDevice {
    fn request_still(&self, completer: Completer<Result<Photo>>) -> Result<()> {
        match &self.behavior {
            StillBehavior::Complete(bytes) => {
                let photo = Photo {
                    bytes: bytes.clone(),
                    rotation_degrees: 90,
                    metadata: None,
                };
                thread::spawn(move || completer.complete(Ok(photo)));
            }
            StillBehavior::Fail(message) => {
                let err = CameraError::from_platform(message.clone());
                thread::spawn(move || completer.complete(Err(err)));
            }
            StillBehavior::Closed => {
                return Err(CameraError::from_platform(
                    "CameraDevice was already closed",
                ));
            }
            StillBehavior::Stall => self.pending.lock().push(completer),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_capabilities_are_populated() {
        let caps = sample_capabilities();
        assert!(!caps.is_empty());
        assert_eq!(caps.photo_sizes().len(), 4);
        assert_eq!(
            caps.capabilities().expect("clone succeeds").preview_sizes().len(),
            3
        );
    }

    #[test]
    fn test_gradient_pattern_has_padding() {
        let pattern = PlanarPattern::gradient(8, 4, 3);
        let raw = pattern.raw();
        let luma = raw.planes.first().expect("luma plane");
        assert_eq!(luma.data.len(), 11 * 4);
        assert_eq!(luma.data.get(8), Some(&PADDING));

        let row = pattern.luma_row(0).expect("row 0");
        assert_eq!(row.first(), Some(&0));
        assert!(row.windows(2).all(|pair| pair.first() <= pair.get(1)));
    }

    #[test]
    fn test_scripted_metadata_runs_out() {
        let mut source = ScriptedMetadata::new(vec![MeteringSample::default()]);
        assert!(source.next_sample().is_ok());
        assert!(matches!(
            source.next_sample(),
            Err(CameraError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_frame_source_truncates_requested_frame() {
        let mut source =
            MockFrameSource::new(PlanarPattern::gradient(8, 4, 0), 2).with_truncated_frame(1);
        let first = source
            .next_buffer()
            .expect("first buffer")
            .planes
            .first()
            .map(|p| p.data.len());
        assert_eq!(first, Some(32));
        let second = source
            .next_buffer()
            .expect("second buffer")
            .planes
            .first()
            .map(|p| p.data.len());
        assert_eq!(second, Some(16));
        assert!(source.next_buffer().is_err());
    }
}
