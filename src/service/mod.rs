//! Face recognition service integration.
//!
//! The service is an external HTTP backend with two endpoints, `/register`
//! and `/recognize`, both taking a multipart photo upload plus the claimed
//! email. This module only speaks its contract; matching happens remotely.

mod client;

pub use client::{
    error_message_from_body, interpret_recognition, Mode, Outcome, RecognitionClient,
    ServiceError, DEFAULT_SERVICE_URL, DEFAULT_TIMEOUT, GENERIC_FAILURE, SERVICE_URL_ENV,
    UNKNOWN_IDENTITY,
};
