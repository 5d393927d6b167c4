//! Camera access for face capture.
//!
//! This module provides:
//! - The platform seam via [`MediaDevices`], [`MediaStream`] and [`PreviewSurface`]
//! - The single-stream session via [`CameraSession`]
//! - Backends: [`SyntheticMedia`] always, `NativeMedia` with the `camera` feature

mod frame_utils;
#[cfg(feature = "camera")]
mod native;
mod platform;
mod session;
mod synthetic;
mod types;

pub use frame_utils::{encode_jpeg, DEFAULT_JPEG_QUALITY};
#[cfg(feature = "camera")]
pub use native::NativeMedia;
pub use platform::{
    classify_platform_error, LogPreview, MediaDevices, MediaStream, NoPreview, PreviewSurface,
};
pub use session::{CameraSession, SessionSettings, SessionState};
pub use synthetic::SyntheticMedia;
pub use types::{
    CameraError, CaptureDevice, CapturedPhoto, Frame, FrameFormat, PlatformError, Resolution,
    StreamConstraints,
};
