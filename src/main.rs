//! Pi-cam-core binary: negotiate parameters with a V4L2 camera and run the
//! preview pipeline for a fixed number of frames.
//!
//! Usage: `pi-cam-core [DEVICE_INDEX] [CONFIG.toml]`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use pi_cam_core::{run_preview_loop, CameraConfig, Frame, V4l2Camera};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const FRAME_LIMIT: u64 = 300;

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = run() {
        tracing::error!(error = %err, "camera run failed");
        std::process::exit(1);
    }
}

fn run() -> pi_cam_core::Result<()> {
    let mut args = std::env::args().skip(1);
    let index = match args.next() {
        Some(arg) => arg
            .parse()
            .map_err(|_| pi_cam_core::CameraError::Config(format!("invalid device index {arg}")))?,
        None => 0,
    };
    let config = match args.next() {
        Some(path) => CameraConfig::from_file(path)?,
        None => CameraConfig::default(),
    };

    let mut camera = V4l2Camera::open(index)?;
    let parameters = config.negotiator().negotiate_with(&camera)?;
    tracing::info!(
        card = camera.card(),
        picture = ?parameters.picture_size(),
        preview = ?parameters.preview_size(),
        fps = ?parameters.preview_fps_range(),
        "negotiated"
    );

    if let Some(preview) = parameters.preview_size() {
        let actual = camera.configure(preview)?;
        tracing::info!(size = %actual, fourcc = %camera.fourcc(), "preview format");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let frames = Arc::new(AtomicU64::new(0));
    let dispatcher = config.dispatcher();
    {
        let stop = Arc::clone(&stop);
        let frames = Arc::clone(&frames);
        dispatcher.register(Arc::new(move |frame: &Frame| {
            tracing::debug!(
                sequence = frame.sequence,
                bytes = frame.data.len(),
                size = %frame.size,
                "preview frame"
            );
            if frames.fetch_add(1, Ordering::Relaxed) + 1 >= FRAME_LIMIT {
                stop.store(true, Ordering::Release);
            }
        }));
    }

    let mut stream = camera.stream(config.preview.buffer_count)?;
    let dispatched = run_preview_loop(&mut stream, &dispatcher, &stop)?;
    tracing::info!(dispatched, "preview finished");
    Ok(())
}
