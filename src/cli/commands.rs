//! Subcommand handlers.

use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use face_login::camera::{CameraSession, LogPreview, MediaDevices};
use face_login::config::{self, Config};
use face_login::flow::{AuthFlow, Event, View, CAMERA_REQUIRED};
use face_login::service::{Mode, RecognitionClient};

use super::args::{ConfigAction, ScanArgs};

/// List available cameras and print them to stdout.
pub fn list_cameras(media: Box<dyn MediaDevices>) -> Result<(), String> {
    let mut session = CameraSession::new(media);
    let devices = session.list_devices().map_err(|e| e.to_string())?;

    println!("Available cameras:");
    for device in devices {
        println!("  {}", device);
    }
    println!();
    println!("Use --camera <id> to select a camera.");
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: ConfigAction,
    config: &Config,
    config_path: &Path,
) -> Result<(), String> {
    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!("  Service URL: {}", config.service.base_url);
            println!("  Timeout: {}s", config.service.timeout_secs);
            println!("  Backend: {}", config.camera.backend);
            println!(
                "  Camera: {}",
                config.camera.device.as_deref().unwrap_or("first available")
            );
            println!(
                "  Resolution: {}x{}",
                config.camera.width, config.camera.height
            );
            println!("  JPEG quality: {}", config.camera.jpeg_quality);
            println!();

            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
            Ok(())
        }
        ConfigAction::Init => {
            config::write_default(config_path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    format!(
                        "Config file already exists: {}\nUse 'face-login config show' to view current settings.",
                        config_path.display()
                    )
                } else {
                    format!("Error writing config file: {}", e)
                }
            })?;
            println!("Created config file: {}", config_path.display());
            Ok(())
        }
    }
}

/// What the user typed while the camera was live.
enum ScanInput {
    Capture,
    SwitchCamera(String),
    Back,
}

fn parse_scan_input(line: &str) -> ScanInput {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") {
        return ScanInput::Back;
    }
    match line.strip_prefix("camera ") {
        Some(id) if !id.trim().is_empty() => ScanInput::SwitchCamera(id.trim().to_string()),
        _ => ScanInput::Capture,
    }
}

/// One read from the terminal.
enum Input {
    Line(String),
    Interrupted,
    Eof,
}

async fn next_input<R>(lines: &mut Lines<R>) -> Result<Input, String>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => match line {
            Ok(Some(line)) => Ok(Input::Line(line)),
            Ok(None) => Ok(Input::Eof),
            Err(e) => Err(format!("Failed to read input: {}", e)),
        },
        _ = tokio::signal::ctrl_c() => Ok(Input::Interrupted),
    }
}

/// Run the login or registration flow. Returns true on success.
pub fn run_scan(
    mode: Mode,
    scan: ScanArgs,
    config: &Config,
    media: Box<dyn MediaDevices>,
) -> Result<bool, String> {
    let client = RecognitionClient::with_timeout(&config.service.base_url, config.service.timeout())
        .map_err(|e| format!("Failed to create recognition client: {}", e))?;
    let camera = CameraSession::with_preview(media, Box::new(LogPreview::default()))
        .with_settings(config.camera.session_settings());
    let preselected = scan.camera.clone().or_else(|| config.camera.device.clone());
    let mut flow = AuthFlow::new(camera, client)
        .with_mode(mode)
        .with_camera(preselected);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create async runtime: {}", e))?;

    rt.block_on(async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        scan_loop(&mut flow, scan, &mut lines).await
    })
}

/// Interactive session. Failed attempts return to the email prompt; the
/// loop ends on success, on `q` at the prompt, on Ctrl-C at the prompt, or
/// at end of input.
async fn scan_loop<R>(
    flow: &mut AuthFlow,
    scan: ScanArgs,
    lines: &mut Lines<R>,
) -> Result<bool, String>
where
    R: AsyncBufRead + Unpin,
{
    let requested = flow.mode();

    match flow.initialize() {
        Ok(()) if flow.devices().len() > 1 => {
            println!("Cameras:");
            for device in flow.devices() {
                println!("  {}", device);
            }
        }
        Ok(()) => {}
        Err(_) => println!("{}", flow.error().unwrap_or(CAMERA_REQUIRED)),
    }

    let mut preset_email = scan.email;
    loop {
        // Going back resets the flow to login
        if flow.mode() != requested {
            let _ = flow.dispatch(Event::ToggleMode).await;
        }

        let email = match preset_email.take() {
            Some(email) => email,
            None => {
                let previous = flow.email().to_string();
                if previous.is_empty() {
                    println!("Email ('q' to quit):");
                } else {
                    println!("Email [{}] ('q' to quit):", previous);
                }
                match next_input(lines).await? {
                    Input::Line(line) if line.trim().eq_ignore_ascii_case("q") => {
                        return Ok(false)
                    }
                    Input::Line(line) if line.trim().is_empty() && !previous.is_empty() => {
                        previous
                    }
                    Input::Line(line) => line,
                    Input::Interrupted | Input::Eof => return Ok(false),
                }
            }
        };

        if let Err(e) = flow.dispatch(Event::Submit { email }).await {
            println!("{}", e);
            continue;
        }

        match flow.mode() {
            Mode::Register => println!("Face Registration"),
            Mode::Recognize => println!("Face Recognition"),
        }
        println!("Please look directly at your camera.");

        if !scan.auto && !wait_for_capture(flow, lines).await? {
            if flow.view() == &View::Scanning {
                // End of input while the camera was live
                let _ = flow.dispatch(Event::GoBack).await;
                return Ok(false);
            }
            println!("Cancelled.");
            continue;
        }

        println!("Capturing...");
        let result = flow.dispatch(Event::Capture).await;

        match (result, flow.view()) {
            (Ok(()), View::Authenticated { identity }) => {
                println!("Welcome, {}! You have successfully logged in.", identity);
                return Ok(true);
            }
            (Ok(()), _) => {
                if let Some(message) = flow.success() {
                    println!("{}", message);
                    return Ok(true);
                }
            }
            (Err(e), _) => {
                println!("{}", e);
                println!("Try again, or enter 'q' to quit.");
            }
        }
    }
}

/// Wait while the camera is live. Returns true to capture; false when the
/// scan was abandoned, in which case the flow is back on the form unless
/// input ended.
async fn wait_for_capture<R>(flow: &mut AuthFlow, lines: &mut Lines<R>) -> Result<bool, String>
where
    R: AsyncBufRead + Unpin,
{
    println!("Press Enter to capture, 'camera <id>' to switch camera, 'q' to go back.");
    loop {
        let input = match next_input(lines).await? {
            Input::Line(line) => parse_scan_input(&line),
            Input::Interrupted => ScanInput::Back,
            Input::Eof => return Ok(false),
        };

        match input {
            ScanInput::Capture => return Ok(true),
            ScanInput::SwitchCamera(id) => match flow.dispatch(Event::SelectCamera(id)).await {
                Ok(()) => println!("Switched camera. Press Enter to capture."),
                Err(e) => {
                    println!("{}", e);
                    return Ok(false);
                }
            },
            ScanInput::Back => {
                let _ = flow.dispatch(Event::GoBack).await;
                return Ok(false);
            }
        }
    }
}
