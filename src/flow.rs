//! Login/registration flow as an explicit state machine.
//!
//! The flow moves between three views: the email form, the camera scan,
//! and the authenticated landing. Every transition is driven by an
//! [`Event`]; events that make no sense in the current view are ignored.
//! The camera is released on every exit from the scanning view.

use crate::camera::{CameraError, CameraSession, CaptureDevice};
use crate::error::{AuthError, NOT_RECOGNIZED};
use crate::identity::{IdentityClaim, ValidationError};
use crate::service::{Mode, Outcome, RecognitionClient};

/// Message shown after a successful registration.
pub const REGISTRATION_SUCCESS: &str = "Registration successful!";

/// Message shown when cameras cannot be listed at startup.
pub const CAMERA_REQUIRED: &str = "Camera access is required for this feature";

/// Which screen the flow is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Email entry, camera picker, mode toggle.
    Form,
    /// Live camera, waiting for the user to trigger a capture.
    Scanning,
    /// Recognition matched.
    Authenticated { identity: String },
}

/// Discrete user actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Switch between login and registration.
    ToggleMode,
    /// Pick a camera from the enumerated devices.
    SelectCamera(String),
    /// Submit the form with the entered email.
    Submit { email: String },
    /// Take the photo and send it to the service.
    Capture,
    /// Leave the scan and reset the form.
    GoBack,
    /// Leave the authenticated view.
    Logout,
}

/// The login flow.
#[derive(Debug)]
pub struct AuthFlow {
    camera: CameraSession,
    client: RecognitionClient,
    view: View,
    mode: Mode,
    email: String,
    claim: Option<IdentityClaim>,
    devices: Vec<CaptureDevice>,
    selected_camera: Option<String>,
    error: Option<String>,
    success: Option<String>,
    busy: bool,
}

impl AuthFlow {
    pub fn new(camera: CameraSession, client: RecognitionClient) -> Self {
        Self {
            camera,
            client,
            view: View::Form,
            mode: Mode::Recognize,
            email: String::new(),
            claim: None,
            devices: Vec::new(),
            selected_camera: None,
            error: None,
            success: None,
            busy: false,
        }
    }

    /// Start in `mode` instead of login.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Preselect a camera before [`initialize`](Self::initialize).
    pub fn with_camera(mut self, device_id: Option<String>) -> Self {
        self.selected_camera = device_id;
        self
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.view, View::Authenticated { .. })
    }

    pub fn devices(&self) -> &[CaptureDevice] {
        &self.devices
    }

    pub fn selected_camera(&self) -> Option<&str> {
        self.selected_camera.as_deref()
    }

    pub fn camera(&self) -> &CameraSession {
        &self.camera
    }

    /// Enumerate cameras once at startup.
    ///
    /// On success the first device becomes the selection unless one was
    /// preselected. On failure the form stays usable and shows
    /// [`CAMERA_REQUIRED`].
    pub fn initialize(&mut self) -> Result<(), CameraError> {
        match self.camera.list_devices() {
            Ok(devices) => {
                if self.selected_camera.is_none() {
                    self.selected_camera = devices.first().map(|d| d.id.clone());
                }
                self.devices = devices;
                Ok(())
            }
            Err(e) => {
                log::warn!("Camera initialization failed: {}", e);
                self.error = Some(CAMERA_REQUIRED.to_string());
                Err(e)
            }
        }
    }

    /// Apply one event. Failures are also recorded as the flow's error
    /// message.
    pub async fn dispatch(&mut self, event: Event) -> Result<(), AuthError> {
        log::debug!("{:?} in {:?}", event, self.view);

        let view = self.view.clone();
        match (view, event) {
            (View::Form, Event::ToggleMode) => {
                self.mode = self.mode.toggled();
                self.clear_messages();
                Ok(())
            }
            (View::Form, Event::SelectCamera(id)) => {
                self.selected_camera = Some(id);
                Ok(())
            }
            (View::Scanning, Event::SelectCamera(id)) => {
                self.selected_camera = Some(id);
                self.start_scanning()
            }
            (View::Form, Event::Submit { email }) => self.submit(email),
            (View::Scanning, Event::Capture) => self.run_face_operation().await,
            (_, Event::GoBack) => {
                self.reset();
                Ok(())
            }
            (View::Authenticated { .. }, Event::Logout) => {
                self.reset();
                Ok(())
            }
            (view, event) => {
                log::debug!("Ignoring {:?} in {:?}", event, view);
                Ok(())
            }
        }
    }

    fn submit(&mut self, email: String) -> Result<(), AuthError> {
        self.clear_messages();
        self.email = email;

        let claim = match IdentityClaim::email(&self.email) {
            Ok(claim) => claim,
            Err(e) => return Err(self.record(e.into())),
        };
        self.claim = Some(claim);
        self.start_scanning()
    }

    /// Enter the scanning view with a live stream on the selected camera.
    fn start_scanning(&mut self) -> Result<(), AuthError> {
        self.view = View::Scanning;
        if let Err(e) = self.camera.activate(self.selected_camera.as_deref()) {
            self.camera.release();
            self.view = View::Form;
            return Err(self.record(e.into()));
        }
        Ok(())
    }

    async fn run_face_operation(&mut self) -> Result<(), AuthError> {
        self.busy = true;
        self.clear_messages();

        let result = self.capture_and_submit().await;

        self.busy = false;
        self.camera.release();
        self.view = View::Form;

        match result {
            Ok(Outcome::Registered { message }) => {
                log::info!(
                    "Registered {} ({})",
                    self.email,
                    message.as_deref().unwrap_or("no message")
                );
                self.success = Some(REGISTRATION_SUCCESS.to_string());
                self.mode = Mode::Recognize;
                self.claim = None;
                Ok(())
            }
            Ok(Outcome::Recognized { identity }) => {
                log::info!("Authenticated as {}", identity);
                self.view = View::Authenticated { identity };
                Ok(())
            }
            Ok(Outcome::NotRecognized) => {
                self.error = Some(NOT_RECOGNIZED.to_string());
                Err(AuthError::RecognitionMismatch)
            }
            Err(e) => Err(self.record(e)),
        }
    }

    async fn capture_and_submit(&mut self) -> Result<Outcome, AuthError> {
        let photo = self.camera.capture()?;
        let claim = self.claim.as_ref().ok_or(ValidationError::MissingEmail)?;
        Ok(self.client.submit(self.mode, &photo, claim).await?)
    }

    /// Back to an empty login form with the camera released.
    fn reset(&mut self) {
        self.camera.release();
        self.view = View::Form;
        self.mode = Mode::Recognize;
        self.email.clear();
        self.claim = None;
        self.busy = false;
        self.clear_messages();
    }

    fn clear_messages(&mut self) {
        self.error = None;
        self.success = None;
    }

    fn record(&mut self, err: AuthError) -> AuthError {
        log::warn!("{}", err);
        self.error = Some(err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{PlatformError, SessionState, SyntheticMedia};

    // Nothing listens here; tests below never reach the network.
    const UNUSED_SERVICE: &str = "http://127.0.0.1:9";

    fn flow_with(media: &SyntheticMedia) -> AuthFlow {
        let camera = CameraSession::new(Box::new(media.clone()));
        let client = RecognitionClient::with_base_url(UNUSED_SERVICE).unwrap();
        AuthFlow::new(camera, client)
    }

    #[tokio::test]
    async fn test_initialize_selects_first_camera() {
        let media = SyntheticMedia::with_devices(2);
        let mut flow = flow_with(&media);

        flow.initialize().unwrap();
        assert_eq!(flow.devices().len(), 2);
        assert_eq!(flow.selected_camera(), Some("synthetic-0"));
        assert_eq!(media.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_initialize_keeps_preselected_camera() {
        let media = SyntheticMedia::with_devices(2);
        let mut flow = flow_with(&media).with_camera(Some("synthetic-1".to_string()));

        flow.initialize().unwrap();
        assert_eq!(flow.selected_camera(), Some("synthetic-1"));
    }

    #[tokio::test]
    async fn test_initialize_failure_leaves_form_usable() {
        let media = SyntheticMedia::with_devices(1);
        media.deny_permission();
        let mut flow = flow_with(&media);

        assert_eq!(flow.initialize(), Err(CameraError::PermissionDenied));
        assert_eq!(flow.error(), Some(CAMERA_REQUIRED));
        assert_eq!(flow.view(), &View::Form);
    }

    #[tokio::test]
    async fn test_toggle_mode_only_on_form() {
        let media = SyntheticMedia::with_devices(1);
        let mut flow = flow_with(&media);

        flow.dispatch(Event::ToggleMode).await.unwrap();
        assert_eq!(flow.mode(), Mode::Register);

        flow.dispatch(Event::Submit {
            email: "a@b.com".to_string(),
        })
        .await
        .unwrap();
        flow.dispatch(Event::ToggleMode).await.unwrap();
        assert_eq!(flow.mode(), Mode::Register);
    }

    #[tokio::test]
    async fn test_empty_email_is_required() {
        let media = SyntheticMedia::with_devices(1);
        let mut flow = flow_with(&media);

        let err = flow
            .dispatch(Event::Submit {
                email: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(ValidationError::MissingEmail)));
        assert_eq!(flow.error(), Some("Email is required"));
        assert_eq!(media.streams_opened(), 0);
    }

    #[tokio::test]
    async fn test_malformed_emails_never_touch_camera() {
        let media = SyntheticMedia::with_devices(1);
        let mut flow = flow_with(&media);

        for email in ["nope", "a@b", "@b.com", "a b@c.com", "a@b@c.com"] {
            let result = flow
                .dispatch(Event::Submit {
                    email: email.to_string(),
                })
                .await;
            assert!(result.is_err(), "{} should be rejected", email);
            assert_eq!(flow.error(), Some("Please enter a valid email address"));
            assert_eq!(flow.view(), &View::Form);
        }
        assert_eq!(media.streams_opened(), 0);
    }

    #[tokio::test]
    async fn test_submit_starts_scanning() {
        let media = SyntheticMedia::with_devices(1);
        let mut flow = flow_with(&media);
        flow.initialize().unwrap();

        flow.dispatch(Event::Submit {
            email: "a@b.com".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(flow.view(), &View::Scanning);
        assert!(flow.camera().is_active());
        assert_eq!(media.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_camera_failure_returns_to_form() {
        let media = SyntheticMedia::with_devices(1);
        media.fail_next_activation(PlatformError::not_readable("in use"));
        let mut flow = flow_with(&media);

        let err = flow
            .dispatch(Event::Submit {
                email: "a@b.com".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Camera(CameraError::DeviceBusy)));
        assert_eq!(flow.error(), Some("Camera already in use"));
        assert_eq!(flow.view(), &View::Form);
        assert_eq!(flow.camera().state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_select_camera_while_scanning_switches_stream() {
        let media = SyntheticMedia::with_devices(2);
        let mut flow = flow_with(&media);
        flow.initialize().unwrap();
        flow.dispatch(Event::Submit {
            email: "a@b.com".to_string(),
        })
        .await
        .unwrap();

        flow.dispatch(Event::SelectCamera("synthetic-1".to_string()))
            .await
            .unwrap();

        assert_eq!(flow.camera().active_device(), Some("synthetic-1"));
        assert_eq!(media.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_go_back_releases_camera_and_resets() {
        let media = SyntheticMedia::with_devices(1);
        let mut flow = flow_with(&media).with_mode(Mode::Register);
        flow.dispatch(Event::Submit {
            email: "a@b.com".to_string(),
        })
        .await
        .unwrap();

        flow.dispatch(Event::GoBack).await.unwrap();

        assert_eq!(flow.view(), &View::Form);
        assert_eq!(flow.mode(), Mode::Recognize);
        assert_eq!(flow.email(), "");
        assert_eq!(media.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_capture_ignored_outside_scanning() {
        let media = SyntheticMedia::with_devices(1);
        let mut flow = flow_with(&media);

        flow.dispatch(Event::Capture).await.unwrap();
        assert_eq!(flow.view(), &View::Form);
        assert!(flow.error().is_none());
    }

    #[tokio::test]
    async fn test_capture_failure_releases_camera() {
        let media = SyntheticMedia::with_devices(1);
        media.produce_blank_frames();
        let mut flow = flow_with(&media);
        flow.dispatch(Event::Submit {
            email: "a@b.com".to_string(),
        })
        .await
        .unwrap();

        let err = flow.dispatch(Event::Capture).await.unwrap_err();

        assert!(matches!(err, AuthError::Camera(CameraError::CaptureFailed(_))));
        assert_eq!(flow.error(), Some("Failed to capture photo"));
        assert_eq!(flow.view(), &View::Form);
        assert!(!flow.is_busy());
        assert_eq!(media.live_streams(), 0);
    }
}
