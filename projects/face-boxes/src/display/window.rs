use super::FrameDisplay;
use anyhow::{Context, Result};
use opencv::core::Mat;
use opencv::highgui;

const KEY_POLL_TIMEOUT_MS: i32 = 1;

/// On-screen window backed by OpenCV's highgui.
///
/// The window exists for the lifetime of this value and is destroyed on drop.
pub struct HighguiDisplay {
    title: String,
}

impl HighguiDisplay {
    pub fn create(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("Failed to create display window '{}'", title))?;
        Ok(Self {
            title: title.to_string(),
        })
    }
}

impl FrameDisplay for HighguiDisplay {
    fn show(&mut self, frame: &Mat) -> Result<()> {
        highgui::imshow(&self.title, frame).context("Failed to render frame")
    }

    fn poll_key(&mut self) -> Result<Option<char>> {
        let code = highgui::wait_key(KEY_POLL_TIMEOUT_MS).context("Failed to poll keyboard")?;
        if code < 0 {
            return Ok(None);
        }
        Ok(Some(char::from((code & 0xff) as u8)))
    }
}

impl Drop for HighguiDisplay {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(&self.title) {
            tracing::warn!("Failed to destroy window '{}': {}", self.title, e);
        }
    }
}
