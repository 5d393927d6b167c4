//! Configuration file handling for face-login.
//!
//! Loads configuration from `<config dir>/face-login/config.toml` or a custom path.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::{Resolution, SessionSettings, DEFAULT_JPEG_QUALITY};
use crate::service::{DEFAULT_SERVICE_URL, DEFAULT_TIMEOUT, SERVICE_URL_ENV};

/// Configuration file structure for face-login.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Which camera implementation to drive.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The machine's cameras
    #[default]
    Native,
    /// Generated frames, no hardware needed
    Synthetic,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::Synthetic => write!(f, "synthetic"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Preferred device id; the first enumerated camera when unset
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub backend: BackendKind,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            width: default_width(),
            height: default_height(),
            jpeg_quality: default_jpeg_quality(),
            backend: BackendKind::default(),
        }
    }
}

impl CameraConfig {
    /// Stream settings for a camera session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            resolution: Some(Resolution {
                width: self.width,
                height: self.height,
            }),
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_width() -> u32 {
    Resolution::default().width
}

fn default_height() -> u32 {
    Resolution::default().height
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl Config {
    /// Load configuration from the default path.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_path();
        if path.exists() {
            Self::load_from_explicit(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a path the user named. The file must exist.
    pub fn load_from_explicit(path: PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| ConfigError::ParseError { path, source: e })
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `FACE_LOGIN_SERVICE_URL` if set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(SERVICE_URL_ENV) {
            if !url.trim().is_empty() {
                self.service.base_url = url;
            }
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("face-login").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/face-login/config.toml")
        })
}

/// Commented default configuration written by `config init`.
pub const DEFAULT_CONFIG: &str = r#"# face-login configuration

[service]
# Recognition service base URL (FACE_LOGIN_SERVICE_URL overrides this)
base_url = "http://localhost:5000"
# Request timeout in seconds
timeout_secs = 30

[camera]
# Camera backend: native, synthetic
backend = "native"
# Device id from `face-login list-cameras` (default: first camera)
# device = "0"
# Requested capture resolution
width = 640
height = 480
# JPEG quality of the submitted photo (1-100)
jpeg_quality = 90
"#;

/// Write the default config to `path`, refusing to overwrite.
pub fn write_default(path: &Path) -> Result<(), std::io::Error> {
    if path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("config file already exists: {}", path.display()),
        ));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.service.base_url, "http://localhost:5000");
        assert_eq!(config.service.timeout_secs, 30);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert_eq!(config.camera.jpeg_quality, 90);
        assert_eq!(config.camera.backend, BackendKind::Native);
        assert!(config.camera.device.is_none());
    }

    #[test]
    fn test_default_config_text_parses_to_defaults() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
[service]
base_url = "https://faces.example.com"

[camera]
device = "2"
backend = "synthetic"
"#,
        )
        .unwrap();
        assert_eq!(config.service.base_url, "https://faces.example.com");
        assert_eq!(config.service.timeout_secs, 30);
        assert_eq!(config.camera.device.as_deref(), Some("2"));
        assert_eq!(config.camera.backend, BackendKind::Synthetic);
    }

    #[test]
    fn test_invalid_backend_is_rejected() {
        assert!(Config::parse("[camera]\nbackend = \"webgl\"\n").is_err());
    }

    #[test]
    fn test_session_settings_clamp_quality() {
        let camera = CameraConfig {
            jpeg_quality: 0,
            width: 320,
            height: 240,
            ..CameraConfig::default()
        };
        let settings = camera.session_settings();
        assert_eq!(settings.jpeg_quality, 1);
        assert_eq!(settings.resolution, Some(Resolution::LOW));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[service]\ntimeout_secs = 5\n").unwrap();

        let config = Config::load_from_explicit(path).unwrap();
        assert_eq!(config.service.timeout(), Duration::from_secs(5));
        assert_eq!(config.service.base_url, DEFAULT_SERVICE_URL);
    }

    #[test]
    fn test_load_from_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_explicit(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[service\n").unwrap();

        let err = Config::load_from_explicit(path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = default_path();
        assert!(path.ends_with("face-login/config.toml"));
    }
}
