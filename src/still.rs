//! One-shot completion gate for still capture.
//!
//! The hardware layer completes a capture on its own callback context. The
//! caller blocks on a [`Waiter`] until the matching [`Completer`] fires, the
//! completer is dropped, or the timeout expires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use crate::convergence::CaptureMetadata;
use crate::traits::{CameraError, Result, StillCaptureDevice};

#[derive(Debug)]
enum Slot<T> {
    Empty,
    Done(T),
    Abandoned,
    Taken,
}

#[derive(Debug)]
struct Gate<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Gate<T> {
    fn fill(&self, slot: Slot<T>) {
        let mut guard = self.slot.lock();
        if matches!(*guard, Slot::Empty) {
            *guard = slot;
            self.ready.notify_all();
        }
    }
}

/// Sending half of a one-shot gate.
#[derive(Debug)]
pub struct Completer<T> {
    gate: Option<Arc<Gate<T>>>,
}

/// Receiving half of a one-shot gate.
#[derive(Debug)]
pub struct Waiter<T> {
    gate: Arc<Gate<T>>,
}

/// Create a connected completer/waiter pair.
pub fn oneshot<T>() -> (Completer<T>, Waiter<T>) {
    let gate = Arc::new(Gate {
        slot: Mutex::new(Slot::Empty),
        ready: Condvar::new(),
    });
    (
        Completer {
            gate: Some(Arc::clone(&gate)),
        },
        Waiter { gate },
    )
}

impl<T> Completer<T> {
    /// Deliver the value and wake the waiter.
    pub fn complete(mut self, value: T) {
        if let Some(gate) = self.gate.take() {
            gate.fill(Slot::Done(value));
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.fill(Slot::Abandoned);
        }
    }
}

impl<T> Waiter<T> {
    /// Block until the value arrives.
    ///
    /// `None` waits without bound. With `Some(limit)`, expiry returns
    /// [`CameraError::CaptureTimeout`]. A completer dropped without completing
    /// returns [`CameraError::DeviceUnavailable`].
    pub fn wait(self, timeout: Option<Duration>) -> Result<T> {
        let deadline = timeout.map(|limit| (limit, Instant::now() + limit));
        let mut guard = self.gate.slot.lock();
        while matches!(*guard, Slot::Empty) {
            match deadline {
                None => self.gate.ready.wait(&mut guard),
                Some((limit, deadline)) => {
                    if self.gate.ready.wait_until(&mut guard, deadline).timed_out()
                        && matches!(*guard, Slot::Empty)
                    {
                        return Err(CameraError::CaptureTimeout(limit));
                    }
                }
            }
        }

        match std::mem::replace(&mut *guard, Slot::Taken) {
            Slot::Done(value) => Ok(value),
            Slot::Empty | Slot::Abandoned | Slot::Taken => Err(CameraError::DeviceUnavailable(
                "capture abandoned before completion".to_owned(),
            )),
        }
    }
}

/// A captured still picture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Photo {
    /// Encoded or converted image bytes.
    pub bytes: Vec<u8>,
    /// Clockwise rotation to apply for display.
    pub rotation_degrees: u32,
    /// Sensor readings at capture time, when available.
    pub metadata: Option<CaptureMetadata>,
}

impl Photo {
    /// Photo with no data.
    pub const fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            rotation_degrees: 0,
            metadata: None,
        }
    }

    /// True if no bytes were captured.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Take a still picture and wait for its completion.
///
/// `timeout` of `None` waits without bound.
pub fn capture_still<D: StillCaptureDevice + ?Sized>(
    device: &D,
    timeout: Option<Duration>,
) -> Result<Photo> {
    let (completer, waiter) = oneshot();
    device.request_still(completer)?;
    debug!(?timeout, "still capture requested");

    let photo = waiter.wait(timeout)??;
    info!(
        bytes = photo.bytes.len(),
        rotation = photo.rotation_degrees,
        "still capture complete"
    );
    Ok(photo)
}
