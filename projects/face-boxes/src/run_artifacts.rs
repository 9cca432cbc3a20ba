// Detection log artifact definitions
//
// This module contains the struct definitions for the optional JSON artifact
// written on exit when --detections-out is set.

use crate::run_context::RunContext;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use opencv::core::Rect;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Axis-aligned face bounding box in frame pixel coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<Rect> for FaceBox {
    fn from(rect: Rect) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

/// Detections for one frame, one list per classifier in definition order.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FrameRecord {
    pub frame: u64,
    pub faces: Vec<Vec<FaceBox>>,
}

/// Session settings captured once at startup.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionInfo {
    pub started_at: DateTime<Utc>,
    pub camera_index: i32,
    pub width: i32,
    pub height: i32,
    pub fps: i32,
    pub classifiers: Vec<String>,
}

impl SessionInfo {
    pub fn from_context(ctx: &RunContext) -> Self {
        Self {
            started_at: Utc::now(),
            camera_index: ctx.camera.index,
            width: ctx.camera.width,
            height: ctx.camera.height,
            fps: ctx.camera.fps,
            classifiers: ctx.classifiers.iter().map(|c| c.label.clone()).collect(),
        }
    }
}

/// Accumulated per-frame detections for one capture session.
#[derive(Serialize, Deserialize, Debug)]
pub struct DetectionLog {
    pub session: SessionInfo,
    pub frames: Vec<FrameRecord>,
}

impl DetectionLog {
    pub fn new(session: SessionInfo) -> Self {
        Self {
            session,
            frames: Vec::new(),
        }
    }

    pub fn record(&mut self, frame: u64, detections: &[Vec<Rect>]) {
        self.frames.push(FrameRecord {
            frame,
            faces: detections
                .iter()
                .map(|faces| faces.iter().copied().map(FaceBox::from).collect())
                .collect(),
        });
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write detection log to {:?}", path))?;
        Ok(())
    }
}
