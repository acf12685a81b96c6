pub mod decoder;
pub mod device;
pub mod error;
pub mod frame;
pub mod source;

pub use decoder::{FrameDecoder, MjpegDecoder, YuyvDecoder};
pub use device::{CameraConfig, V4lCamera};
pub use error::CaptureError;
pub use frame::RgbFrame;
pub use source::{FrameSource, SourceFactory};
