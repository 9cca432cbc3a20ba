use super::FrameSource;
use crate::run_context::CameraSettings;
use anyhow::{anyhow, Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH,
    },
};
use std::time::Duration;

/// Live camera source backed by an OpenCV capture session.
///
/// Resolution and frame rate are applied once before the first read; the
/// device is released when the source is dropped.
pub struct CameraSource {
    capture: VideoCapture,
}

impl CameraSource {
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        let mut capture = VideoCapture::new(settings.index, CAP_ANY)
            .with_context(|| format!("Failed to open camera index {}", settings.index))?;
        if !capture.is_opened()? {
            return Err(anyhow!("Camera {} is not available", settings.index));
        }

        capture.set(CAP_PROP_FRAME_WIDTH, settings.width as f64)?;
        capture.set(CAP_PROP_FRAME_HEIGHT, settings.height as f64)?;
        capture.set(CAP_PROP_FPS, settings.fps as f64)?;

        // The driver may negotiate a different geometry than requested
        let actual_width = capture.get(CAP_PROP_FRAME_WIDTH)? as i32;
        let actual_height = capture.get(CAP_PROP_FRAME_HEIGHT)? as i32;
        let actual_fps = capture.get(CAP_PROP_FPS)?;
        tracing::info!(
            "CameraSource: opened index {}, {}x{} @ {:.1} fps",
            settings.index,
            actual_width,
            actual_height,
            actual_fps
        );

        // Allow the sensor to warm up before the first read
        std::thread::sleep(Duration::from_millis(100));

        Ok(Self { capture })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        let success = self
            .capture
            .read(&mut frame)
            .context("Failed to read from camera")?;
        if !success || frame.empty() {
            return Err(anyhow!("Camera stream ended unexpectedly"));
        }
        Ok(frame)
    }
}
