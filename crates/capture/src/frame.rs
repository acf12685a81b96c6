/// A decoded camera frame, 3 bytes per pixel (RGB), row-major.
#[derive(Debug, Clone)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 3) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn byte_len(&self) -> usize {
        (self.width * self.height * 3) as usize
    }
}
