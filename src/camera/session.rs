//! Camera session: owns at most one live stream and captures stills from it.

use super::frame_utils::{encode_jpeg, DEFAULT_JPEG_QUALITY};
use super::platform::{
    classify_platform_error, MediaDevices, MediaStream, NoPreview, PreviewSurface,
};
use super::types::{
    CameraError, CaptureDevice, CapturedPhoto, PlatformError, Resolution, StreamConstraints,
};

/// Observable state of a [`CameraSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No stream held.
    Uninitialized,
    /// Waiting on the platform for a stream.
    Requesting,
    /// A stream is live and attached to the preview.
    Active { device_id: String },
    /// The last activation failed.
    Error(CameraError),
}

/// Internal state. The live stream only exists inside `Active`, so a
/// session can never hold a stream without being active.
enum State {
    Uninitialized,
    Requesting,
    Active(Box<dyn MediaStream>),
    Error(CameraError),
}

/// Settings applied to every stream the session opens.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Resolution hint passed to the platform
    pub resolution: Option<Resolution>,
    /// JPEG quality for captured photos (1-100)
    pub jpeg_quality: u8,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            resolution: Some(Resolution::default()),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Camera session handle.
///
/// Mediates access to the platform camera: enumerates devices, keeps a
/// single live stream attached to a preview surface, and captures a JPEG
/// still on request. The stream is stopped on [`release`](Self::release),
/// on device switch, and when the session is dropped.
pub struct CameraSession {
    media: Box<dyn MediaDevices>,
    preview: Box<dyn PreviewSurface>,
    settings: SessionSettings,
    state: State,
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CameraSession {
    /// Create a session over a platform media backend with no preview.
    pub fn new(media: Box<dyn MediaDevices>) -> Self {
        Self::with_preview(media, Box::new(NoPreview))
    }

    /// Create a session that shows live streams on `preview`.
    pub fn with_preview(media: Box<dyn MediaDevices>, preview: Box<dyn PreviewSurface>) -> Self {
        Self {
            media,
            preview,
            settings: SessionSettings::default(),
            state: State::Uninitialized,
        }
    }

    /// Replace the stream settings. Applies to the next activation.
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Current state of the session.
    pub fn state(&self) -> SessionState {
        match &self.state {
            State::Uninitialized => SessionState::Uninitialized,
            State::Requesting => SessionState::Requesting,
            State::Active(stream) => SessionState::Active {
                device_id: stream.device_id().to_string(),
            },
            State::Error(e) => SessionState::Error(e.clone()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active(_))
    }

    /// Device bound to the live stream, if any.
    pub fn active_device(&self) -> Option<&str> {
        match &self.state {
            State::Active(stream) => Some(stream.device_id()),
            _ => None,
        }
    }

    /// Query the platform for video input devices.
    ///
    /// Platforms withhold device labels until access has been granted, so a
    /// throwaway stream is opened and stopped before enumerating. An active
    /// session already holds access and enumerates directly, keeping a
    /// single live stream. Does not change the session state.
    ///
    /// # Errors
    /// * `CameraError::PermissionDenied` - If the throwaway stream is refused
    /// * `CameraError::NoDeviceFound` - If no video input exists
    pub fn list_devices(&mut self) -> Result<Vec<CaptureDevice>, CameraError> {
        if !self.is_active() {
            match self.media.get_user_media(&StreamConstraints::any()) {
                Ok(mut unlock) => unlock.stop(),
                Err(e) => {
                    log::warn!("Camera permission check failed: {}", e);
                    return Err(match classify_platform_error(&e) {
                        CameraError::DeviceNotFound => CameraError::NoDeviceFound,
                        _ => CameraError::PermissionDenied,
                    });
                }
            }
        }

        let devices = self.media.enumerate_video_inputs().map_err(|e| {
            log::warn!("Camera enumeration failed: {}", e);
            match classify_platform_error(&e) {
                CameraError::PermissionDenied => CameraError::PermissionDenied,
                _ => CameraError::NoDeviceFound,
            }
        })?;

        if devices.is_empty() {
            return Err(CameraError::NoDeviceFound);
        }

        log::debug!("Found {} camera device(s)", devices.len());
        Ok(devices)
    }

    /// Open a live stream on `device_id`, or on any camera when `None`.
    ///
    /// An already active stream is released first, so at most one stream
    /// is ever held. On failure the session enters the error state and the
    /// classified error is returned.
    pub fn activate(&mut self, device_id: Option<&str>) -> Result<(), CameraError> {
        if self.is_active() {
            log::debug!("Switching camera, releasing current stream");
            self.release();
        }

        self.state = State::Requesting;
        let constraints = StreamConstraints {
            device_id: device_id.map(str::to_string),
            resolution: self.settings.resolution,
        };

        let stream = match self.media.get_user_media(&constraints) {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(&e)),
        };

        if let Err(e) = self.preview.attach(stream.as_ref()) {
            let mut stream = stream;
            stream.stop();
            return Err(self.fail(&e));
        }

        log::debug!(
            "Camera {} active at {}",
            stream.device_id(),
            stream.native_resolution()
        );
        self.state = State::Active(stream);
        Ok(())
    }

    fn fail(&mut self, err: &PlatformError) -> CameraError {
        let classified = classify_platform_error(err);
        log::warn!("Camera activation failed: {} ({})", classified, err);
        self.state = State::Error(classified.clone());
        classified
    }

    /// Capture the current frame of the live stream as a JPEG photo.
    ///
    /// # Errors
    /// * `CameraError::CameraNotReady` - If the session is not active
    /// * `CameraError::CaptureFailed` - If no frame data is available or
    ///   encoding yields nothing
    pub fn capture(&mut self) -> Result<CapturedPhoto, CameraError> {
        let stream = match &mut self.state {
            State::Active(stream) => stream,
            _ => return Err(CameraError::CameraNotReady),
        };

        let frame = stream
            .grab_frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let jpeg = encode_jpeg(&frame, self.settings.jpeg_quality)?;

        log::debug!(
            "Captured {}x{} photo ({} bytes)",
            frame.width,
            frame.height,
            jpeg.len()
        );

        Ok(CapturedPhoto {
            jpeg,
            width: frame.width,
            height: frame.height,
        })
    }

    /// Stop the live stream, if any, and return to `Uninitialized`.
    ///
    /// Idempotent: a second call does nothing.
    pub fn release(&mut self) {
        match std::mem::replace(&mut self.state, State::Uninitialized) {
            State::Active(mut stream) => {
                self.preview.detach();
                stream.stop();
                log::debug!("Released camera {}", stream.device_id());
            }
            State::Uninitialized => {}
            State::Requesting | State::Error(_) => {
                log::debug!("Camera session reset");
            }
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::synthetic::SyntheticMedia;

    fn session_with(media: &SyntheticMedia) -> CameraSession {
        CameraSession::new(Box::new(media.clone()))
    }

    #[test]
    fn test_new_session_is_uninitialized() {
        let media = SyntheticMedia::with_devices(1);
        let session = session_with(&media);
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.active_device().is_none());
    }

    #[test]
    fn test_list_devices_releases_unlock_stream() {
        let media = SyntheticMedia::with_devices(2);
        let mut session = session_with(&media);

        let devices = session.list_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(media.live_streams(), 0);
        assert_eq!(media.streams_opened(), 1);
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_list_devices_while_active_keeps_one_stream() {
        let media = SyntheticMedia::with_devices(2);
        let mut session = session_with(&media);
        session.activate(Some("synthetic-0")).unwrap();

        let devices = session.list_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(media.peak_live_streams(), 1);
        assert_eq!(media.streams_opened(), 1);
        assert_eq!(session.active_device(), Some("synthetic-0"));
    }

    #[test]
    fn test_list_devices_permission_denied() {
        let media = SyntheticMedia::with_devices(1);
        media.deny_permission();
        let mut session = session_with(&media);

        assert_eq!(session.list_devices(), Err(CameraError::PermissionDenied));
    }

    #[test]
    fn test_list_devices_without_cameras() {
        let media = SyntheticMedia::with_devices(0);
        let mut session = session_with(&media);

        assert_eq!(session.list_devices(), Err(CameraError::NoDeviceFound));
    }

    #[test]
    fn test_activate_specific_device() {
        let media = SyntheticMedia::with_devices(2);
        let mut session = session_with(&media);

        session.activate(Some("synthetic-1")).unwrap();
        assert_eq!(
            session.state(),
            SessionState::Active {
                device_id: "synthetic-1".to_string()
            }
        );
        assert_eq!(media.live_streams(), 1);
    }

    #[test]
    fn test_activate_any_camera() {
        let media = SyntheticMedia::with_devices(2);
        let mut session = session_with(&media);

        session.activate(None).unwrap();
        assert_eq!(session.active_device(), Some("synthetic-0"));
    }

    #[test]
    fn test_activate_unknown_device_enters_error() {
        let media = SyntheticMedia::with_devices(1);
        let mut session = session_with(&media);

        let err = session.activate(Some("missing")).unwrap_err();
        assert_eq!(err, CameraError::DeviceNotFound);
        assert_eq!(session.state(), SessionState::Error(CameraError::DeviceNotFound));
        assert_eq!(media.live_streams(), 0);
    }

    #[test]
    fn test_activate_busy_device() {
        let media = SyntheticMedia::with_devices(1);
        media.fail_next_activation(PlatformError::not_readable("held by another app"));
        let mut session = session_with(&media);

        assert_eq!(session.activate(None), Err(CameraError::DeviceBusy));
    }

    #[test]
    fn test_recover_from_error_state() {
        let media = SyntheticMedia::with_devices(1);
        media.fail_next_activation(PlatformError::not_allowed("denied"));
        let mut session = session_with(&media);

        assert!(session.activate(None).is_err());
        session.activate(None).unwrap();
        assert!(session.is_active());
    }

    #[test]
    fn test_switching_device_keeps_one_live_stream() {
        let media = SyntheticMedia::with_devices(3);
        let mut session = session_with(&media);

        session.activate(Some("synthetic-0")).unwrap();
        session.activate(Some("synthetic-2")).unwrap();
        session.activate(Some("synthetic-1")).unwrap();

        assert_eq!(media.live_streams(), 1);
        assert_eq!(session.active_device(), Some("synthetic-1"));
    }

    #[test]
    fn test_release_is_idempotent() {
        let media = SyntheticMedia::with_devices(1);
        let mut session = session_with(&media);
        session.activate(None).unwrap();

        session.release();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(media.live_streams(), 0);

        session.release();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(media.live_streams(), 0);
    }

    #[test]
    fn test_release_from_error_state() {
        let media = SyntheticMedia::with_devices(1);
        let mut session = session_with(&media);
        let _ = session.activate(Some("missing"));

        session.release();
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_capture_requires_active_stream() {
        let media = SyntheticMedia::with_devices(1);
        let mut session = session_with(&media);

        assert!(matches!(session.capture(), Err(CameraError::CameraNotReady)));
    }

    #[test]
    fn test_capture_uses_native_resolution() {
        let media = SyntheticMedia::with_devices(1);
        media.set_native_resolution(Resolution::LOW);
        let mut session = session_with(&media);
        session.activate(None).unwrap();

        let photo = session.capture().unwrap();
        assert_eq!(photo.width, 320);
        assert_eq!(photo.height, 240);
        assert_eq!(&photo.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_capture_blank_frame_fails() {
        let media = SyntheticMedia::with_devices(1);
        media.produce_blank_frames();
        let mut session = session_with(&media);
        session.activate(None).unwrap();

        assert!(matches!(session.capture(), Err(CameraError::CaptureFailed(_))));
    }

    #[test]
    fn test_drop_stops_stream() {
        let media = SyntheticMedia::with_devices(1);
        {
            let mut session = session_with(&media);
            session.activate(None).unwrap();
            assert_eq!(media.live_streams(), 1);
        }
        assert_eq!(media.live_streams(), 0);
    }
}
