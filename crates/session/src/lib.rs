pub mod collaborators;
pub mod error;
pub mod manager;
pub mod render;
pub mod stream;

pub use collaborators::{Captioner, Detection, Detector};
pub use error::{SessionError, StreamError};
pub use manager::{SessionConfig, WebcamSession};
pub use stream::frame_stream;
