use capture::RgbFrame;

/// One detected object in pixel coordinates of the captured frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    /// Confidence in 0.0..=1.0, already above the collaborator's cutoff.
    pub score: f32,
    /// [x1, y1, x2, y2], clamped to the frame bounds.
    pub bbox: [f32; 4],
}

/// Object-detection collaborator: a synchronous transform from one frame to
/// a set of labeled boxes. No side effects on session state beyond the
/// return value.
pub trait Detector: Send {
    fn detect(&mut self, frame: &RgbFrame) -> anyhow::Result<Vec<Detection>>;
}

/// Image-captioning collaborator: a synchronous transform from one still
/// image to a natural-language description.
pub trait Captioner: Send + Sync {
    fn describe(&self, frame: &RgbFrame) -> anyhow::Result<String>;
}
