use capture::RgbFrame;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::{Array, IxDyn};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resizes frames to the model input size and normalizes to the NCHW float
/// tensor the DETR family expects.
pub struct PreProcessor {
    input_size: (u32, u32),
}

impl PreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self { input_size }
    }

    /// Produce the `[1, 3, H, W]` input tensor for one frame.
    ///
    /// Plain resize (no letterbox): the model receives the original frame
    /// size separately and reports boxes in original pixel coordinates.
    pub fn preprocess_frame(&mut self, frame: &RgbFrame) -> anyhow::Result<Array<f32, IxDyn>> {
        let expected = frame.byte_len();
        if frame.pixels.len() != expected {
            anyhow::bail!(
                "pixel buffer size mismatch: expected {}, got {} bytes",
                expected,
                frame.pixels.len()
            );
        }

        let src = ImageRef::new(frame.width, frame.height, &frame.pixels, PixelType::U8x3)?;

        let (in_w, in_h) = self.input_size;
        let mut resized = Image::new(in_w, in_h, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        Ok(normalize(resized.buffer(), in_w, in_h))
    }
}

/// HWC u8 -> normalized NCHW f32.
fn normalize(pixels: &[u8], width: u32, height: u32) -> Array<f32, IxDyn> {
    let (w, h) = (width as usize, height as usize);
    let mut input = Array::<f32, _>::zeros(IxDyn(&[1, 3, h, w]));

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) * 3;
            for c in 0..3 {
                input[[0, c, y, x]] =
                    (pixels[idx + c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
    }

    input
}
