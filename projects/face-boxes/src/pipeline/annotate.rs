use anyhow::Result;
use opencv::core::{Mat, Rect, Scalar};
use opencv::imgproc::{rectangle, LINE_8};
use opencv::prelude::*;

/// Outline style for face boxes.
#[derive(Debug, Clone, Copy)]
pub struct BoxStyle {
    pub color: [u8; 3],
    pub thickness: i32,
}

impl BoxStyle {
    pub fn new(color: [u8; 3], thickness: i32) -> Self {
        Self { color, thickness }
    }

    fn scalar(&self) -> Scalar {
        Scalar::new(
            self.color[0] as f64,
            self.color[1] as f64,
            self.color[2] as f64,
            0.0,
        )
    }
}

/// Draws one rectangle outline per detected face, clamped to the frame.
///
/// Mutates the frame in place; an empty face list leaves it untouched.
/// Cumulative when called repeatedly for several classifier results within
/// one iteration.
pub fn draw_boxes(frame: &mut Mat, faces: &[Rect], style: &BoxStyle) -> Result<()> {
    let cols = frame.cols();
    let rows = frame.rows();
    for face in faces {
        let Some(rect) = clamp_to_frame(*face, cols, rows) else {
            continue;
        };
        rectangle(frame, rect, style.scalar(), style.thickness, LINE_8, 0)?;
    }
    Ok(())
}

/// Clamps a rectangle to frame bounds; regions entirely outside yield None.
fn clamp_to_frame(rect: Rect, cols: i32, rows: i32) -> Option<Rect> {
    let x = rect.x.clamp(0, cols);
    let y = rect.y.clamp(0, rows);
    let w = (rect.x + rect.width).clamp(0, cols) - x;
    let h = (rect.y + rect.height).clamp(0, rows) - y;

    if w <= 0 || h <= 0 {
        return None;
    }

    Some(Rect::new(x, y, w, h))
}
