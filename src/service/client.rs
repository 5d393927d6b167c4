//! RecognitionClient - handles communication with the face recognition service.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::camera::CapturedPhoto;
use crate::identity::IdentityClaim;

/// The environment variable that overrides the service base URL.
pub const SERVICE_URL_ENV: &str = "FACE_LOGIN_SERVICE_URL";

/// Default base URL of the recognition service.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:5000";

/// Identity the service reports when a face matches nobody.
pub const UNKNOWN_IDENTITY: &str = "Unknown";

/// Message shown when a failed response carries no usable error text.
pub const GENERIC_FAILURE: &str = "Operation failed";

/// Default timeout for HTTP requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which endpoint a photo is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Enroll a face under the claimed identity.
    Register,
    /// Check a face against the claimed identity.
    Recognize,
}

impl Mode {
    /// Endpoint path on the service.
    pub fn path(&self) -> &'static str {
        match self {
            Mode::Register => "/register",
            Mode::Recognize => "/recognize",
        }
    }

    /// The other mode.
    pub fn toggled(&self) -> Self {
        match self {
            Mode::Register => Mode::Recognize,
            Mode::Recognize => Mode::Register,
        }
    }
}

/// Result of a well-formed, successful exchange with the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The face was enrolled.
    Registered { message: Option<String> },
    /// The face matched `identity`.
    Recognized { identity: String },
    /// The service answered but matched nobody.
    NotRecognized,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Body of a successful `/register` response.
#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Body of a successful `/recognize` response.
#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    result: Option<String>,
}

/// Interpret a `/recognize` result field.
///
/// The exact sentinel `"Unknown"`, an empty string, or a missing field mean
/// no match. Any other value is the matched identity, verbatim.
pub fn interpret_recognition(result: Option<&str>) -> Outcome {
    match result {
        Some(identity) if !identity.is_empty() && identity != UNKNOWN_IDENTITY => {
            Outcome::Recognized {
                identity: identity.to_string(),
            }
        }
        _ => Outcome::NotRecognized,
    }
}

/// Pull the user-facing message out of a failed response body.
///
/// Uses the JSON `error` field when present and non-empty, otherwise the
/// generic failure message.
pub fn error_message_from_body(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

/// Client for the face recognition service.
pub struct RecognitionClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for RecognitionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RecognitionClient {
    /// Create a client for a specific base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let base_url = base_url.into();
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ServiceError::MissingBaseUrl);
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Enroll `photo` under `claim`.
    pub async fn register(
        &self,
        photo: &CapturedPhoto,
        claim: &IdentityClaim,
    ) -> Result<Outcome, ServiceError> {
        self.submit(Mode::Register, photo, claim).await
    }

    /// Check `photo` against `claim`.
    pub async fn recognize(
        &self,
        photo: &CapturedPhoto,
        claim: &IdentityClaim,
    ) -> Result<Outcome, ServiceError> {
        self.submit(Mode::Recognize, photo, claim).await
    }

    /// Submit a captured photo to the endpoint for `mode`.
    ///
    /// Sends a multipart form with an `email` text field holding the
    /// normalized claim and an `image` part (`face.jpg`, `image/jpeg`).
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Rejected` for non-2xx responses,
    /// `ServiceError::InvalidResponse` if a recognition answer is not JSON,
    /// or `ServiceError::HttpError` if the request itself fails.
    pub async fn submit(
        &self,
        mode: Mode,
        photo: &CapturedPhoto,
        claim: &IdentityClaim,
    ) -> Result<Outcome, ServiceError> {
        let url = format!("{}{}", self.base_url, mode.path());

        let image = Part::bytes(photo.jpeg.clone())
            .file_name(CapturedPhoto::FILE_NAME)
            .mime_str(CapturedPhoto::MIME_TYPE)?;
        // Text field first so the binary image part ends the body
        let form = Form::new()
            .text("email", claim.as_str().to_string())
            .part("image", image);

        log::info!(
            "Submitting {}x{} photo for {} to {}",
            photo.width,
            photo.height,
            claim,
            url
        );

        let response = self.http_client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = error_message_from_body(&body);
            log::warn!("Recognition service returned {}: {}", status, message);
            return Err(ServiceError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        match mode {
            Mode::Register => {
                // Any 2xx counts; the body is informational only
                let message = serde_json::from_slice::<RegisterResponse>(&body)
                    .ok()
                    .and_then(|r| r.message);
                log::info!("Registration accepted for {}", claim);
                Ok(Outcome::Registered { message })
            }
            Mode::Recognize => {
                let parsed: RecognizeResponse = serde_json::from_slice(&body).map_err(|e| {
                    log::warn!("Unparseable recognition response: {}", e);
                    ServiceError::InvalidResponse(e.to_string())
                })?;
                let outcome = interpret_recognition(parsed.result.as_deref());
                log::info!("Recognition outcome for {}: {:?}", claim, outcome);
                Ok(outcome)
            }
        }
    }
}

/// Errors from talking to the recognition service.
///
/// The `Display` text is what the user sees.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Recognition service URL not configured")]
    MissingBaseUrl,

    #[error("Could not reach recognition service: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Non-2xx response. `message` is the service's error text or the
    /// generic failure message.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from recognition service")]
    InvalidResponse(String),
}
