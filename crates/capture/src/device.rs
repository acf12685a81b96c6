use crate::decoder::{FrameDecoder, MjpegDecoder, YuyvDecoder};
use crate::error::CaptureError;
use crate::frame::RgbFrame;
use crate::source::FrameSource;
use ouroboros::self_referencing;
use v4l::{
    Device, FourCC,
    buffer::Type,
    io::traits::CaptureStream,
    prelude::MmapStream,
    video::Capture,
    video::capture::Parameters,
};

const BUFFER_COUNT: u32 = 4;

const FOURCC_YUYV: FourCC = FourCC { repr: *b"YUYV" };
const FOURCC_MJPG: FourCC = FourCC { repr: *b"MJPG" };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    Yuyv,
    Mjpeg,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub device_id: u32,
    /// Reduced capture rate bounding the cost of per-frame processing.
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            fps: 5,
        }
    }
}

fn find_usable_camera() -> Option<u32> {
    v4l::context::enum_devices()
        .into_iter()
        .find(|dev| {
            Device::with_path(dev.path())
                .and_then(|d| d.query_caps())
                .map(|caps| {
                    caps.capabilities
                        .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                })
                .unwrap_or(false)
        })
        .map(|dev| dev.index() as u32)
}

fn open_device(index: u32) -> Result<Device, CaptureError> {
    if let Ok(dev) = Device::new(index as usize)
        && dev.query_caps().is_ok()
    {
        return Ok(dev);
    }

    tracing::debug!(
        "Camera index {} busy or missing, scanning alternatives...",
        index
    );

    let best_idx = find_usable_camera()
        .ok_or_else(|| CaptureError::Open("no usable video devices found".to_string()))?;
    Device::new(best_idx as usize)
        .map_err(|e| CaptureError::Open(format!("fallback device {best_idx}: {e}")))
}

/// Select best pixel format: prefer YUYV (faster decode), fallback to MJPEG
fn select_format(device: &Device) -> Result<PixelFormat, CaptureError> {
    let formats = device
        .enum_formats()
        .map_err(|e| CaptureError::Open(e.to_string()))?;

    tracing::debug!("Available formats:");
    for fmt in &formats {
        tracing::debug!("  {:?}: {}", fmt.fourcc, fmt.description);
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_YUYV) {
        return Ok(PixelFormat::Yuyv);
    }

    if formats.iter().any(|f| f.fourcc == FOURCC_MJPG) {
        return Ok(PixelFormat::Mjpeg);
    }

    Err(CaptureError::Open(format!(
        "camera supports neither YUYV nor MJPEG - available: {:?}",
        formats.iter().map(|f| f.fourcc).collect::<Vec<_>>()
    )))
}

#[self_referencing]
struct DeviceState {
    device: Device,
    #[borrows(mut device)]
    #[covariant]
    stream: MmapStream<'this>,
}

/// V4L2 camera owning both the device handle and its capture stream.
///
/// Dropping the camera tears down the stream and closes the device, so the
/// session's release-on-stop (and release-on-panic) falls out of ownership.
pub struct V4lCamera {
    state: DeviceState,
    decoder: Box<dyn FrameDecoder>,
    width: u32,
    height: u32,
}

impl V4lCamera {
    pub fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        let device = open_device(config.device_id)?;

        let caps = device
            .query_caps()
            .map_err(|e| CaptureError::Open(e.to_string()))?;
        tracing::info!("Camera opened: {} ({})", caps.card, caps.driver);

        let pixel_format = select_format(&device)?;
        let fourcc = match pixel_format {
            PixelFormat::Yuyv => FOURCC_YUYV,
            PixelFormat::Mjpeg => FOURCC_MJPG,
        };

        let mut format = device
            .format()
            .map_err(|e| CaptureError::Open(e.to_string()))?;
        format.fourcc = fourcc;
        let format = device
            .set_format(&format)
            .map_err(|e| CaptureError::Open(e.to_string()))?;

        tracing::info!(
            "Capture format: {}x{} {:?} ({:?})",
            format.width,
            format.height,
            format.fourcc,
            pixel_format
        );

        if config.fps > 0
            && let Err(e) = device.set_params(&Parameters::with_fps(config.fps))
        {
            tracing::warn!("Failed to set {} fps capture rate: {}", config.fps, e);
        }

        let decoder: Box<dyn FrameDecoder> = match pixel_format {
            PixelFormat::Yuyv => Box::new(YuyvDecoder::new()),
            PixelFormat::Mjpeg => Box::new(MjpegDecoder::new()?),
        };

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
                    .map_err(|e| CaptureError::Open(format!("create capture stream: {e}")))
            },
        }
        .try_build()?;

        Ok(Self {
            state,
            decoder,
            width: format.width,
            height: format.height,
        })
    }
}

impl FrameSource for V4lCamera {
    fn read_frame(&mut self) -> Result<RgbFrame, CaptureError> {
        let (buf, _meta) = self
            .state
            .with_stream_mut(|stream| stream.next())
            .map_err(|e| CaptureError::Read(e.to_string()))?;

        let rgb = self.decoder.decode(buf, self.width, self.height)?;
        Ok(RgbFrame::new(self.width, self.height, rgb.to_vec()))
    }
}
