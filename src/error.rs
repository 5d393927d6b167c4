//! Errors surfaced to the user by the login flow.

use crate::camera::CameraError;
use crate::identity::ValidationError;
use crate::service::ServiceError;

/// Message shown when the service answers but matches nobody.
pub const NOT_RECOGNIZED: &str = "Face not recognized";

/// Every failure the flow can report. None are fatal: the flow shows the
/// message and resets so the user can try again.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Face not recognized")]
    RecognitionMismatch,
}
