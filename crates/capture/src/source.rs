use crate::error::CaptureError;
use crate::frame::RgbFrame;

/// A source of decoded camera frames.
///
/// The session manager owns the source for the lifetime of one start/stop
/// cycle; dropping it releases the underlying device.
pub trait FrameSource: Send {
    /// Blocking read of the next frame, decoded to RGB.
    fn read_frame(&mut self) -> Result<RgbFrame, CaptureError>;
}

/// Factory the session manager calls on every `start` to (re)acquire the
/// device. Injected so tests can substitute a fake source.
pub type SourceFactory =
    Box<dyn Fn() -> Result<Box<dyn FrameSource>, CaptureError> + Send + Sync>;
