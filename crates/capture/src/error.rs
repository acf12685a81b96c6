use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("unable to access the camera: {0}")]
    Open(String),

    #[error("frame read failed: {0}")]
    Read(String),

    #[error("frame decode failed: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CaptureError::Open("no such device".to_string());
        assert_eq!(err.to_string(), "unable to access the camera: no such device");

        let err = CaptureError::Read("timeout".to_string());
        assert_eq!(err.to_string(), "frame read failed: timeout");

        let err = CaptureError::Decode("truncated buffer".to_string());
        assert_eq!(err.to_string(), "frame decode failed: truncated buffer");
    }
}
