mod cli;

use clap::Parser;

use cli::{Args, Command};
use face_login::camera::{MediaDevices, SyntheticMedia};
use face_login::config::{self, BackendKind, Config};
use face_login::service::{Mode, SERVICE_URL_ENV};

fn load_env() {
    // Load .env file, don't override existing env vars
    let _ = dotenv::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

/// Load config: an explicit --config must exist, the default path may not.
fn load_config(args: &Args) -> Config {
    let mut cfg = match &args.config {
        Some(path) => match Config::load_from_explicit(path.clone()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => match Config::load() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                eprintln!("Using default settings.\n");
                Config::default()
            }
        },
    };

    // CLI > env > config file > defaults
    cfg.apply_env();
    if let Some(url) = &args.service_url {
        cfg.service.base_url = url.clone();
    }
    if let Some(backend) = args.backend {
        cfg.camera.backend = backend;
    }

    log::debug!(
        "Service {} (override with {}), backend {}",
        cfg.service.base_url,
        SERVICE_URL_ENV,
        cfg.camera.backend
    );
    cfg
}

fn build_media(kind: BackendKind) -> Result<Box<dyn MediaDevices>, String> {
    match kind {
        BackendKind::Synthetic => Ok(Box::new(SyntheticMedia::with_devices(1))),
        #[cfg(feature = "camera")]
        BackendKind::Native => Ok(Box::new(face_login::camera::NativeMedia::new())),
        #[cfg(not(feature = "camera"))]
        BackendKind::Native => Err("face-login was built without camera support.\n\n\
            Rebuild with:\n\n    cargo build --features camera\n\n\
            or pass --backend synthetic to try the flow with generated frames."
            .to_string()),
    }
}

fn main() {
    load_env();

    let args = Args::parse();
    let cfg = load_config(&args);

    let result = match args.command {
        Command::ListCameras => build_media(cfg.camera.backend).and_then(cli::list_cameras),
        Command::Login(scan) => build_media(cfg.camera.backend)
            .and_then(|media| cli::run_scan(Mode::Recognize, scan, &cfg, media))
            .map(|ok| {
                if !ok {
                    std::process::exit(1);
                }
            }),
        Command::Register(scan) => build_media(cfg.camera.backend)
            .and_then(|media| cli::run_scan(Mode::Register, scan, &cfg, media))
            .map(|ok| {
                if !ok {
                    std::process::exit(1);
                }
            }),
        Command::Config { action } => {
            let path = args.config.clone().unwrap_or_else(config::default_path);
            cli::handle_config_action(action, &cfg, &path)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
