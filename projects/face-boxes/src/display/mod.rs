pub mod window;

use anyhow::Result;
use opencv::core::Mat;

/// Presentation surface for annotated frames.
///
/// `poll_key` waits for at most the sink's short polling timeout and reports
/// the pressed key, if any; the caller decides what the key means.
pub trait FrameDisplay {
    fn show(&mut self, frame: &Mat) -> Result<()>;
    fn poll_key(&mut self) -> Result<Option<char>>;
}
