//! Camera types and data structures.

use std::fmt;
use std::time::Instant;

/// A video input device reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    /// Opaque platform identifier
    pub id: String,
    /// Human-readable label, when the platform exposes one
    pub label: Option<String>,
}

impl CaptureDevice {
    pub fn new(id: impl Into<String>, label: Option<String>) -> Self {
        Self {
            id: id.into(),
            label,
        }
    }

    /// Label to show in device pickers.
    ///
    /// Platforms hide labels until camera permission is granted, so an
    /// unlabeled device is named after the first characters of its id.
    pub fn display_label(&self) -> String {
        match self.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => format!("Camera {}", self.id.chars().take(5).collect::<String>()),
        }
    }
}

impl fmt::Display for CaptureDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.id, self.display_label())
    }
}

/// Camera resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Low resolution (320x240)
    pub const LOW: Resolution = Resolution {
        width: 320,
        height: 240,
    };

    /// Medium resolution (640x480) - enough for face detection
    pub const MEDIUM: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// High resolution (1280x720)
    pub const HIGH: Resolution = Resolution {
        width: 1280,
        height: 720,
    };

    /// Number of pixels in a frame of this size.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// RGB format (3 bytes per pixel)
    Rgb,
}

/// A raw video frame grabbed from a live stream.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data in RGB format
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub format: FrameFormat,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl Frame {
    /// Create an RGB frame.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            format: FrameFormat::Rgb,
            timestamp: Instant::now(),
        }
    }

    /// Get the number of bytes per pixel (3 for RGB).
    pub fn bytes_per_pixel(&self) -> usize {
        match self.format {
            FrameFormat::Rgb => 3,
        }
    }

    /// True when the buffer holds exactly one full frame of pixel data.
    pub fn is_complete(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * self.bytes_per_pixel()
    }
}

/// A still image encoded from a single video frame.
///
/// Exists only long enough to be attached to an outgoing request.
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    /// JPEG-encoded bytes
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedPhoto {
    /// File name used when the photo is attached to a form upload.
    pub const FILE_NAME: &'static str = "face.jpg";

    /// MIME type of the encoded bytes.
    pub const MIME_TYPE: &'static str = "image/jpeg";
}

/// Constraints passed to the platform when requesting a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Exact device to bind to; `None` accepts any camera.
    pub device_id: Option<String>,
    /// Preferred resolution. Platforms may deliver something else.
    pub resolution: Option<Resolution>,
}

impl StreamConstraints {
    /// Any camera, no resolution preference.
    pub fn any() -> Self {
        Self::default()
    }
}

/// A failure reported by the platform media subsystem.
///
/// `name` is the platform's error identifier (e.g. `NotAllowedError`),
/// which [`classify_platform_error`](super::classify_platform_error) maps
/// onto [`CameraError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub name: String,
    pub message: String,
}

impl PlatformError {
    pub const NOT_ALLOWED: &'static str = "NotAllowedError";
    pub const NOT_FOUND: &'static str = "NotFoundError";
    pub const NOT_READABLE: &'static str = "NotReadableError";
    pub const UNKNOWN: &'static str = "UnknownError";

    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_ALLOWED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, message)
    }

    pub fn not_readable(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_READABLE, message)
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for PlatformError {}

/// Errors that can occur during camera operations.
///
/// The `Display` text is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    /// Camera permission refused by the user or the OS
    #[error("Please allow camera access")]
    PermissionDenied,

    /// No video input devices available at all
    #[error("Camera access is required for this feature")]
    NoDeviceFound,

    /// The requested device does not exist
    #[error("No camera detected")]
    DeviceNotFound,

    /// The device exists but another process holds it
    #[error("Camera already in use")]
    DeviceBusy,

    /// Capture requested while no stream is active
    #[error("Camera not ready")]
    CameraNotReady,

    /// The frame could not be grabbed or encoded
    #[error("Failed to capture photo")]
    CaptureFailed(String),

    /// Any other platform failure
    #[error("Camera access denied")]
    Unknown(String),
}
