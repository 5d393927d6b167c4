//! Frame conversion and encoding utilities.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use super::types::{CameraError, Frame, FrameFormat};

/// Default JPEG quality for captured photos.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Convert a nokhwa buffer to our RGB Frame format.
///
/// nokhwa's `decode_image` handles the camera's native format (MJPEG,
/// YUYV, NV12, ...). Returns `None` if the conversion fails.
#[cfg(feature = "camera")]
pub fn convert_to_rgb(buffer: &nokhwa::Buffer) -> Option<Frame> {
    use nokhwa::pixel_format::RgbFormat;

    let decoded = buffer.decode_image::<RgbFormat>().ok()?;
    let resolution = buffer.resolution();

    Some(Frame::rgb(
        decoded.into_raw(),
        resolution.width(),
        resolution.height(),
    ))
}

/// Encode a frame as JPEG at its own resolution.
///
/// `quality` is clamped to 1..=100.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, CameraError> {
    if !frame.is_complete() {
        return Err(CameraError::CaptureFailed(format!(
            "incomplete frame: {} bytes for {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    }

    let image = match frame.format {
        FrameFormat::Rgb => RgbImage::from_raw(frame.width, frame.height, frame.data.clone()),
    }
    .ok_or_else(|| CameraError::CaptureFailed("frame buffer size mismatch".to_string()))?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode_image(&image)
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

    if jpeg.is_empty() {
        return Err(CameraError::CaptureFailed(
            "encoder produced no data".to_string(),
        ));
    }

    Ok(jpeg)
}
