use thiserror::Error;

/// Failures surfaced by the camera session manager.
///
/// Never retried internally; every variant carries enough information for
/// the HTTP boundary to choose a status code.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The camera could not be opened.
    #[error("unable to access the camera: {0}")]
    DeviceUnavailable(String),

    /// An operation requiring an open device was invoked while inactive.
    /// Client-correctable: call start first.
    #[error("the camera is inactive")]
    NotActive,

    /// The device was open but a read (or the render/encode step) failed.
    /// Possibly transient; the session stays active so a fresh stream may
    /// succeed, but repeated failures call for a stop/start cycle.
    #[error("can't receive frame (stream end?): {0}")]
    CaptureFailed(String),

    /// Snapshot requested before any frame was captured this session.
    #[error("no frame captured yet in this session")]
    NoFrameAvailable,

    /// The description collaborator rejected or failed the request.
    #[error("caption generation failed: {0}")]
    DescriptionFailed(String),
}

/// Raised when the frame stream cannot continue.
///
/// Distinguishes "frame production failed" from the clean channel close an
/// external stop produces.
#[derive(Error, Debug)]
#[error("webcam stream failed: {0}")]
pub struct StreamError(#[from] pub SessionError);
