//! Platform media seam: device enumeration, stream acquisition, preview.

use super::types::{CameraError, CaptureDevice, Frame, PlatformError, Resolution, StreamConstraints};

/// Access to the host's video input devices.
pub trait MediaDevices {
    /// List the video input devices the platform currently exposes.
    fn enumerate_video_inputs(&mut self) -> Result<Vec<CaptureDevice>, PlatformError>;

    /// Open a live stream matching `constraints`.
    fn get_user_media(
        &mut self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError>;
}

/// A live video stream holding the capture hardware open.
pub trait MediaStream {
    /// Device the stream is bound to.
    fn device_id(&self) -> &str;

    /// Resolution the device is actually delivering.
    fn native_resolution(&self) -> Resolution;

    /// Grab the current frame.
    fn grab_frame(&mut self) -> Result<Frame, PlatformError>;

    /// Stop every track of the stream. Calling it twice is harmless.
    fn stop(&mut self);

    /// Whether the tracks are still running.
    fn is_live(&self) -> bool;
}

/// Where a live stream is shown while the user lines up their face.
pub trait PreviewSurface {
    /// Bind the stream and start playback.
    fn attach(&mut self, stream: &dyn MediaStream) -> Result<(), PlatformError>;

    /// Unbind whatever stream is attached.
    fn detach(&mut self);
}

/// Preview surface that shows nothing.
#[derive(Debug, Default)]
pub struct NoPreview;

impl PreviewSurface for NoPreview {
    fn attach(&mut self, _stream: &dyn MediaStream) -> Result<(), PlatformError> {
        Ok(())
    }

    fn detach(&mut self) {}
}

/// Preview surface for terminals: reports the attached stream in the log.
#[derive(Debug, Default)]
pub struct LogPreview {
    attached: Option<String>,
}

impl PreviewSurface for LogPreview {
    fn attach(&mut self, stream: &dyn MediaStream) -> Result<(), PlatformError> {
        log::info!(
            "Previewing camera {} at {}",
            stream.device_id(),
            stream.native_resolution()
        );
        self.attached = Some(stream.device_id().to_string());
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(id) = self.attached.take() {
            log::debug!("Preview detached from camera {}", id);
        }
    }
}

/// Map a platform error identifier onto the closed camera error taxonomy.
pub fn classify_platform_error(err: &PlatformError) -> CameraError {
    match err.name.as_str() {
        "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
            CameraError::PermissionDenied
        }
        "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
            CameraError::DeviceNotFound
        }
        "NotReadableError" | "TrackStartError" | "AbortError" => CameraError::DeviceBusy,
        _ => CameraError::Unknown(err.message.clone()),
    }
}
