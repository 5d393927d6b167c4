//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use face_login::config::BackendKind;

/// Log in or register with face recognition from the terminal
#[derive(Parser, Debug)]
#[command(name = "face-login")]
#[command(version, about = "Face recognition login client", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Recognition service base URL
    #[arg(long, global = true)]
    pub service_url: Option<String>,

    /// Camera backend
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available cameras
    ListCameras,
    /// Log in by matching your face against your registered email
    Login(ScanArgs),
    /// Register your face under an email
    Register(ScanArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ScanArgs {
    /// Email address (prompted for when omitted)
    #[arg(long, short)]
    pub email: Option<String>,

    /// Camera device id (from list-cameras)
    #[arg(long)]
    pub camera: Option<String>,

    /// Capture as soon as the camera is live instead of waiting for Enter
    #[arg(long)]
    pub auto: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_args() {
        let args = Args::parse_from(["face-login", "login", "--email", "a@b.com"]);
        match args.command {
            Command::Login(scan) => {
                assert_eq!(scan.email.as_deref(), Some("a@b.com"));
                assert!(scan.camera.is_none());
                assert!(!scan.auto);
            }
            other => panic!("Expected Login, got {:?}", other),
        }
        assert!(args.config.is_none());
        assert!(args.service_url.is_none());
        assert!(args.backend.is_none());
    }

    #[test]
    fn test_register_args_with_camera_and_auto() {
        let args = Args::parse_from([
            "face-login",
            "register",
            "-e",
            "a@b.com",
            "--camera",
            "1",
            "--auto",
        ]);
        match args.command {
            Command::Register(scan) => {
                assert_eq!(scan.camera.as_deref(), Some("1"));
                assert!(scan.auto);
            }
            other => panic!("Expected Register, got {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "face-login",
            "list-cameras",
            "--backend",
            "synthetic",
            "--service-url",
            "http://faces:5000",
        ]);
        assert!(matches!(args.command, Command::ListCameras));
        assert_eq!(args.backend, Some(BackendKind::Synthetic));
        assert_eq!(args.service_url.as_deref(), Some("http://faces:5000"));
    }

    #[test]
    fn test_config_subcommands() {
        let args = Args::parse_from(["face-login", "config", "show"]);
        assert!(matches!(
            args.command,
            Command::Config {
                action: ConfigAction::Show
            }
        ));

        let args = Args::parse_from(["face-login", "config", "init"]);
        assert!(matches!(
            args.command,
            Command::Config {
                action: ConfigAction::Init
            }
        ));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = Args::try_parse_from(["face-login", "list-cameras", "--backend", "webgl"]);
        assert!(result.is_err());
    }
}
