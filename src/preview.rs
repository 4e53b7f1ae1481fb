//! Preview frame fan-out.
//!
//! A [`PreviewDispatcher`] converts each raw buffer once and hands the result
//! to every registered [`FrameConsumer`] on the calling thread.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capabilities::Size;
use crate::convert::{convert_frame, OutputLayout, PixelFormat, RawBuffer};
use crate::traits::{FrameSource, Result};

/// Clockwise rotation of a frame relative to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Orientation {
    /// Upright.
    #[default]
    Deg0,
    /// Rotated 90 degrees clockwise.
    Deg90,
    /// Upside down.
    Deg180,
    /// Rotated 270 degrees clockwise.
    Deg270,
}

impl Orientation {
    /// Orientation for a multiple of 90 degrees, wrapping at 360.
    pub const fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    /// Rotation in degrees.
    pub const fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

impl TryFrom<u32> for Orientation {
    type Error = String;

    fn try_from(degrees: u32) -> std::result::Result<Self, Self::Error> {
        Self::from_degrees(degrees)
            .ok_or_else(|| format!("orientation must be a multiple of 90 degrees, got {degrees}"))
    }
}

impl From<Orientation> for u32 {
    fn from(orientation: Orientation) -> Self {
        orientation.degrees()
    }
}

/// A converted preview frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Pixel bytes in the dispatcher's layout.
    pub data: Vec<u8>,
    /// Logical size after cropping.
    pub size: Size,
    /// Display rotation.
    pub orientation: Orientation,
    /// Monotonically increasing per dispatcher.
    pub sequence: u64,
}

/// Receives preview frames.
///
/// The frame is only borrowed for the duration of the call.
pub trait FrameConsumer: Send + Sync {
    /// Handle one frame.
    fn on_frame(&self, frame: &Frame);
}

impl<F> FrameConsumer for F
where
    F: Fn(&Frame) + Send + Sync,
{
    fn on_frame(&self, frame: &Frame) {
        self(frame);
    }
}

/// Turns a raw buffer into the bytes that get dispatched.
pub trait FramePreProcessor: Send + Sync {
    /// Produce the dispatch bytes for `raw`.
    fn process(&self, raw: &RawBuffer<'_>) -> Result<Vec<u8>>;
}

type ConsumerList = Vec<Arc<dyn FrameConsumer>>;

fn same_consumer(a: &Arc<dyn FrameConsumer>, b: &Arc<dyn FrameConsumer>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// Fans preview frames out to a dynamic set of consumers.
///
/// One reentrant lock covers registration and dispatch. Other threads block
/// while a dispatch runs; a consumer may register or unregister from inside
/// its own callback, and the change applies from the next frame.
pub struct PreviewDispatcher {
    consumers: ReentrantMutex<RefCell<ConsumerList>>,
    preprocessor: Mutex<Option<Arc<dyn FramePreProcessor>>>,
    layout: OutputLayout,
    orientation: Orientation,
    sequence: AtomicU64,
}

impl Default for PreviewDispatcher {
    fn default() -> Self {
        Self::new(OutputLayout::SemiPlanarVu)
    }
}

impl std::fmt::Debug for PreviewDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewDispatcher")
            .field("consumers", &self.len())
            .field("layout", &self.layout)
            .field("orientation", &self.orientation)
            .finish_non_exhaustive()
    }
}

impl PreviewDispatcher {
    /// Dispatcher converting YUV buffers to `layout`.
    #[must_use]
    pub fn new(layout: OutputLayout) -> Self {
        Self {
            consumers: ReentrantMutex::new(RefCell::new(Vec::new())),
            preprocessor: Mutex::new(None),
            layout,
            orientation: Orientation::Deg0,
            sequence: AtomicU64::new(0),
        }
    }

    /// Tag dispatched frames with `orientation`.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Add a consumer. Returns `false` if it was already registered.
    pub fn register(&self, consumer: Arc<dyn FrameConsumer>) -> bool {
        let guard = self.consumers.lock();
        let mut consumers = guard.borrow_mut();
        if consumers.iter().any(|known| same_consumer(known, &consumer)) {
            return false;
        }
        consumers.push(consumer);
        true
    }

    /// Remove a consumer. Returns `false` if it was not registered.
    pub fn unregister(&self, consumer: &Arc<dyn FrameConsumer>) -> bool {
        let guard = self.consumers.lock();
        let mut consumers = guard.borrow_mut();
        let before = consumers.len();
        consumers.retain(|known| !same_consumer(known, consumer));
        consumers.len() != before
    }

    /// Number of registered consumers.
    pub fn len(&self) -> usize {
        self.consumers.lock().borrow().len()
    }

    /// True if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install or clear the pre-processing hook.
    pub fn set_preprocessor(&self, hook: Option<Arc<dyn FramePreProcessor>>) {
        *self.preprocessor.lock() = hook;
    }

    /// Deliver `frame` to every consumer registered when the call started.
    pub fn dispatch(&self, frame: &Frame) {
        let guard = self.consumers.lock();
        let snapshot: ConsumerList = guard.borrow().clone();
        for consumer in &snapshot {
            consumer.on_frame(frame);
        }
        drop(guard);
    }

    /// Convert `raw`, stamp it with the next sequence number and dispatch it.
    ///
    /// Returns the sequence number used.
    pub fn on_buffer(&self, raw: &RawBuffer<'_>) -> Result<u64> {
        let hook = self.preprocessor.lock().clone();
        let data = match hook {
            Some(hook) => hook.process(raw)?,
            None => convert_frame(raw, self.layout_for(raw.format))?,
        };

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let frame = Frame {
            data,
            size: raw.crop.size(),
            orientation: self.orientation,
            sequence,
        };
        self.dispatch(&frame);
        Ok(sequence)
    }

    const fn layout_for(&self, format: PixelFormat) -> OutputLayout {
        match format {
            PixelFormat::Jpeg => OutputLayout::Passthrough,
            PixelFormat::Yuv420 | PixelFormat::Yuyv => self.layout,
        }
    }
}

/// Pull buffers from `source` and dispatch them until `stop` is set.
///
/// Runs on the caller's thread. Frames that fail conversion are logged and
/// skipped; errors from the source end the loop. Returns the number of frames
/// dispatched.
pub fn run_preview_loop<S: FrameSource + ?Sized>(
    source: &mut S,
    dispatcher: &PreviewDispatcher,
    stop: &AtomicBool,
) -> Result<u64> {
    let mut dispatched = 0u64;
    while !stop.load(Ordering::Acquire) {
        let raw = source.next_buffer()?;
        match dispatcher.on_buffer(&raw) {
            Ok(sequence) => {
                dispatched += 1;
                debug!(sequence, "preview frame dispatched");
            }
            Err(err) => warn!(error = %err, "dropping preview frame"),
        }
    }
    Ok(dispatched)
}
