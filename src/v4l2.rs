//! V4L2 hardware layer using the v4l crate.

use std::collections::BTreeSet;

use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::frameinterval::FrameIntervalEnum;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC, Fraction};

use crate::capabilities::{CapabilitySet, FocusMode, Range, Size};
use crate::convert::RawBuffer;
use crate::traits::{CameraError, CapabilitySource, FrameSource, Result};

/// Packed YUYV 4:2:2.
pub const YUYV: FourCC = FourCC { repr: *b"YUYV" };
/// Three-plane I420.
pub const YU12: FourCC = FourCC { repr: *b"YU12" };
/// Motion JPEG.
pub const MJPG: FourCC = FourCC { repr: *b"MJPG" };

const SUPPORTED: [FourCC; 3] = [YUYV, YU12, MJPG];

fn platform(err: &std::io::Error) -> CameraError {
    CameraError::from_platform(err.to_string())
}

/// Frames per second of a frame interval, rounded down.
fn fps(interval: &Fraction) -> Option<u32> {
    (interval.numerator != 0).then(|| interval.denominator / interval.numerator)
}

/// Offer each supported pixel format to `apply` in turn and keep the first
/// the driver settles on unchanged. A format the driver rejects outright moves
/// on to the next; if none is accepted the last rejection is reported.
fn first_accepted<F>(size: Size, mut apply: F) -> Result<Format>
where
    F: FnMut(FourCC) -> std::io::Result<Format>,
{
    let mut last_error = None;
    for fourcc in SUPPORTED {
        match apply(fourcc) {
            Ok(actual) if actual.fourcc == fourcc => return Ok(actual),
            Ok(actual) => {
                debug!(requested = %fourcc, actual = %actual.fourcc, "format substituted");
            }
            Err(err) => {
                debug!(%fourcc, error = %err, "format rejected");
                last_error = Some(platform(&err));
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        CameraError::StreamError(format!(
            "device accepts none of the supported pixel formats at {size}"
        ))
    }))
}

/// V4L2 capture device.
pub struct V4l2Camera {
    device: Device,
    card: String,
    format: Format,
}

impl V4l2Camera {
    /// Open a V4L2 device by index (e.g., 0 for /dev/video0).
    pub fn open(index: u32) -> Result<Self> {
        let device = Device::new(index as usize)
            .map_err(|err| CameraError::DeviceUnavailable(err.to_string()))?;
        Self::from_device(device)
    }

    /// Wrap a device the caller already opened.
    pub fn from_device(device: Device) -> Result<Self> {
        let caps = device
            .query_caps()
            .map_err(|err| CameraError::DeviceUnavailable(err.to_string()))?;
        let format = device.format().map_err(|err| platform(&err))?;

        info!(card = %caps.card, driver = %caps.driver, "opened V4L2 device");
        Ok(Self {
            device,
            card: caps.card,
            format,
        })
    }

    /// Human-readable device name.
    pub fn card(&self) -> &str {
        &self.card
    }

    /// Size of the active format.
    pub const fn size(&self) -> Size {
        Size::new(self.format.width, self.format.height)
    }

    /// Pixel format of the active format.
    pub const fn fourcc(&self) -> FourCC {
        self.format.fourcc
    }

    /// Apply a negotiated preview size, keeping the first supported pixel
    /// format the device accepts. Returns the size the driver settled on.
    pub fn configure(&mut self, size: Size) -> Result<Size> {
        let base = self.format;
        let device = &self.device;
        let actual = first_accepted(size, |fourcc| {
            let mut format = base;
            format.width = size.width;
            format.height = size.height;
            format.fourcc = fourcc;
            device.set_format(&format)
        })?;

        debug!(
            requested = %size,
            actual = %Size::new(actual.width, actual.height),
            "format applied"
        );
        self.format = actual;
        Ok(self.size())
    }

    /// Start mmap streaming with `buffer_count` driver buffers.
    pub fn stream(&mut self, buffer_count: u32) -> Result<V4l2Stream<'_>> {
        let stream = Stream::with_buffers(&self.device, Type::VideoCapture, buffer_count)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;
        Ok(V4l2Stream {
            stream,
            format: self.format,
        })
    }

    fn collect_sizes(&self, fourcc: FourCC) -> Result<Vec<Size>> {
        let sizes = self.device.enum_framesizes(fourcc).map_err(|err| platform(&err))?;
        Ok(sizes
            .into_iter()
            .flat_map(|size| match size.size {
                FrameSizeEnum::Discrete(discrete) => {
                    vec![Size::new(discrete.width, discrete.height)]
                }
                FrameSizeEnum::Stepwise(stepwise) => vec![
                    Size::new(stepwise.min_width, stepwise.min_height),
                    Size::new(stepwise.max_width, stepwise.max_height),
                ],
            })
            .collect())
    }

    fn collect_fps(&self, fourcc: FourCC, size: Size) -> Result<Vec<Range<u32>>> {
        let intervals = self
            .device
            .enum_frameintervals(fourcc, size.width, size.height)
            .map_err(|err| platform(&err))?;
        Ok(intervals
            .into_iter()
            .filter_map(|interval| match interval.interval {
                FrameIntervalEnum::Discrete(fraction) => fps(&fraction).map(Range::point),
                // Longest interval is the lowest rate.
                FrameIntervalEnum::Stepwise(stepwise) => {
                    Some(Range::with_bounds(fps(&stepwise.max), fps(&stepwise.min)))
                }
            })
            .collect())
    }
}

impl CapabilitySource for V4l2Camera {
    /// V4L2 has no separate still pipeline, so photo and preview sizes are
    /// the same set. Focus is reported fixed; 3A controls are not mapped.
    fn capabilities(&self) -> Result<CapabilitySet> {
        let advertised = self.device.enum_formats().map_err(|err| platform(&err))?;
        let mut sizes = BTreeSet::new();
        let mut fps_ranges = BTreeSet::new();

        for description in advertised.iter().filter(|desc| SUPPORTED.contains(&desc.fourcc)) {
            for size in self.collect_sizes(description.fourcc)? {
                fps_ranges.extend(self.collect_fps(description.fourcc, size)?);
                sizes.insert(size);
            }
        }

        debug!(sizes = sizes.len(), fps_ranges = fps_ranges.len(), "read V4L2 capabilities");
        Ok(CapabilitySet::builder()
            .photo_sizes(sizes.iter().copied())
            .preview_sizes(sizes)
            .preview_fps_ranges(fps_ranges)
            .focus_modes([FocusMode::Fixed])
            .build())
    }
}

/// V4L2 capture stream wrapping mmap-based streaming.
pub struct V4l2Stream<'a> {
    stream: Stream<'a>,
    format: Format,
}

impl FrameSource for V4l2Stream<'_> {
    fn next_buffer(&mut self) -> Result<RawBuffer<'_>> {
        let (buf, meta) = V4lCaptureStream::next(&mut self.stream)
            .map_err(|err| CameraError::StreamError(err.to_string()))?;
        let data = buf.get(..meta.bytesused as usize).unwrap_or(buf);

        let width = self.format.width as usize;
        let height = self.format.height as usize;
        let stride = self.format.stride as usize;
        let fourcc = self.format.fourcc;
        if fourcc == YUYV {
            Ok(RawBuffer::from_yuyv(data, width, height, stride))
        } else if fourcc == YU12 {
            RawBuffer::from_contiguous_i420(data, width, height, stride)
        } else if fourcc == MJPG {
            Ok(RawBuffer::jpeg(data, width, height))
        } else {
            Err(CameraError::StreamError(format!(
                "unsupported pixel format {fourcc}"
            )))
        }
    }
}
