pub mod camera;

use anyhow::Result;
use opencv::core::Mat;

/// A blocking, effectively infinite stream of BGR frames.
///
/// `next_frame` blocks until the hardware delivers the next frame and yields
/// a freshly written buffer every call; pixel data never carries over from
/// one call to the next. The stream is not restartable and ends only by
/// dropping the source or on a device error.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Mat>;
}
