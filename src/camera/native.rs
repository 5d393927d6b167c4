//! Native camera backend built on nokhwa.
//!
//! Device ids are nokhwa device indices rendered as strings. Each stream
//! runs a background thread that keeps the latest decoded frame in a shared
//! buffer; the camera itself is opened inside that thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat as NokhwaFrameFormat, RequestedFormat,
    RequestedFormatType,
};
use nokhwa::Camera;

use super::frame_utils::convert_to_rgb;
use super::platform::{MediaDevices, MediaStream};
use super::types::{CaptureDevice, Frame, PlatformError, Resolution, StreamConstraints};

/// How long `grab_frame` waits for the first frame after the stream opens.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(3);

/// Target frame rate requested from the device.
const DEFAULT_FPS: u32 = 30;

/// Platform camera access through nokhwa.
#[derive(Debug, Default)]
pub struct NativeMedia;

impl NativeMedia {
    pub fn new() -> Self {
        Self
    }
}

impl MediaDevices for NativeMedia {
    fn enumerate_video_inputs(&mut self) -> Result<Vec<CaptureDevice>, PlatformError> {
        let devices = nokhwa::query(ApiBackend::Auto).map_err(|e| map_nokhwa_error(&e.to_string()))?;

        Ok(devices
            .into_iter()
            .map(|d| {
                let id = match d.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.clone(),
                };
                CaptureDevice::new(id, Some(d.human_name()))
            })
            .collect())
    }

    fn get_user_media(
        &mut self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError> {
        let index = match constraints.device_id.as_deref() {
            Some(id) => match id.parse::<u32>() {
                Ok(i) => CameraIndex::Index(i),
                Err(_) => CameraIndex::String(id.to_string()),
            },
            None => CameraIndex::Index(0),
        };
        let resolution = constraints.resolution.unwrap_or_default();

        NativeStream::open(index, resolution).map(|s| Box::new(s) as Box<dyn MediaStream>)
    }
}

/// Latest frame shared with the capture thread. Waiters are woken when a
/// frame is published or the capture thread exits.
#[derive(Default)]
struct FrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

#[derive(Default)]
struct SlotState {
    frame: Option<Frame>,
    closed: bool,
}

impl FrameSlot {
    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish(&self, frame: Frame) {
        self.lock().frame = Some(frame);
        self.ready.notify_all();
    }

    fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Block until a frame is available, the slot closes, or `timeout`
    /// passes.
    fn wait_for_frame(&self, timeout: Duration) -> Result<Frame, PlatformError> {
        let guard = self.lock();
        let (guard, _) = match self
            .ready
            .wait_timeout_while(guard, timeout, |s| s.frame.is_none() && !s.closed)
        {
            Ok(res) => res,
            Err(poisoned) => poisoned.into_inner(),
        };

        match (&guard.frame, guard.closed) {
            (_, true) => Err(PlatformError::new("InvalidStateError", "stream stopped")),
            (Some(frame), false) => Ok(frame.clone()),
            (None, false) => Err(PlatformError::new(
                PlatformError::NOT_READABLE,
                "no frame received from camera",
            )),
        }
    }
}

/// Commands sent to the capture thread.
enum CaptureCommand {
    Stop,
}

/// A live nokhwa stream.
struct NativeStream {
    device_id: String,
    resolution: Resolution,
    /// Latest captured frame (shared with capture thread)
    frame_slot: Arc<FrameSlot>,
    capture_thread: Option<JoinHandle<()>>,
    command_tx: Option<Sender<CaptureCommand>>,
    stop_signal: Arc<AtomicBool>,
}

impl NativeStream {
    /// Spawn the capture thread and wait for it to report the opened format.
    fn open(index: CameraIndex, requested: Resolution) -> Result<Self, PlatformError> {
        let device_id = match &index {
            CameraIndex::Index(i) => i.to_string(),
            CameraIndex::String(s) => s.clone(),
        };

        let frame_slot = Arc::new(FrameSlot::default());
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let (info_tx, info_rx) = mpsc::channel::<Result<Resolution, PlatformError>>();

        let slot = Arc::clone(&frame_slot);
        let stop = Arc::clone(&stop_signal);
        let handle = thread::spawn(move || {
            run_capture_loop(index, requested, &slot, stop, rx, info_tx);
            slot.close();
        });

        let mut stream = Self {
            device_id,
            resolution: requested,
            frame_slot,
            capture_thread: Some(handle),
            command_tx: Some(tx),
            stop_signal,
        };

        match info_rx.recv() {
            Ok(Ok(actual)) => {
                stream.resolution = actual;
                Ok(stream)
            }
            Ok(Err(e)) => {
                stream.stop();
                Err(e)
            }
            Err(_) => {
                stream.stop();
                Err(PlatformError::new(
                    PlatformError::UNKNOWN,
                    "capture thread terminated unexpectedly",
                ))
            }
        }
    }
}

impl MediaStream for NativeStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn native_resolution(&self) -> Resolution {
        self.resolution
    }

    fn grab_frame(&mut self) -> Result<Frame, PlatformError> {
        self.frame_slot.wait_for_frame(FIRST_FRAME_TIMEOUT)
    }

    fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);

        // Also send stop command via channel (in case thread is blocked)
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(CaptureCommand::Stop);
        }

        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
        }
    }

    fn is_live(&self) -> bool {
        self.capture_thread
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture_loop(
    index: CameraIndex,
    requested: Resolution,
    slot: &FrameSlot,
    stop: Arc<AtomicBool>,
    rx: Receiver<CaptureCommand>,
    info_tx: Sender<Result<Resolution, PlatformError>>,
) {
    let mut camera = match open_camera_with_fallback(&index, requested) {
        Ok(cam) => cam,
        Err(e) => {
            let _ = info_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = info_tx.send(Err(map_nokhwa_error(&e.to_string())));
        return;
    }

    let res = camera.resolution();
    let _ = info_tx.send(Ok(Resolution {
        width: res.width(),
        height: res.height(),
    }));

    while !stop.load(Ordering::Relaxed) {
        if let Ok(CaptureCommand::Stop) = rx.try_recv() {
            break;
        }

        if let Ok(raw_frame) = camera.frame() {
            // Undecodable frames are skipped
            if let Some(frame) = convert_to_rgb(&raw_frame) {
                slot.publish(frame);
            }
        }

        thread::sleep(Duration::from_millis(1));
    }

    let _ = camera.stop_stream();
}

/// Open a camera, trying NV12, then MJPEG, then whatever the device prefers.
fn open_camera_with_fallback(
    index: &CameraIndex,
    requested: Resolution,
) -> Result<Camera, PlatformError> {
    let wanted = nokhwa::utils::Resolution::new(requested.width, requested.height);
    let format_attempts = [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            wanted,
            NokhwaFrameFormat::NV12,
            DEFAULT_FPS,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            wanted,
            NokhwaFrameFormat::MJPEG,
            DEFAULT_FPS,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = String::from("no usable camera format");
    for format in format_attempts {
        match Camera::new(index.clone(), format) {
            Ok(cam) => return Ok(cam),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(map_nokhwa_error(&last_error))
}

/// Name a nokhwa failure the way a platform media API would.
fn map_nokhwa_error(message: &str) -> PlatformError {
    let msg = message.to_lowercase();
    let name = if ["permission", "denied", "authorization", "not authorized"]
        .iter()
        .any(|k| msg.contains(k))
    {
        PlatformError::NOT_ALLOWED
    } else if ["busy", "in use", "resource temporarily unavailable"]
        .iter()
        .any(|k| msg.contains(k))
    {
        PlatformError::NOT_READABLE
    } else if ["not found", "no such", "no device", "out of range"]
        .iter()
        .any(|k| msg.contains(k))
    {
        PlatformError::NOT_FOUND
    } else {
        PlatformError::UNKNOWN
    };
    PlatformError::new(name, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_nokhwa_permission_error() {
        let err = map_nokhwa_error("Camera access Denied by the user");
        assert_eq!(err.name, PlatformError::NOT_ALLOWED);
    }

    #[test]
    fn test_map_nokhwa_busy_error() {
        let err = map_nokhwa_error("Device or resource busy");
        assert_eq!(err.name, PlatformError::NOT_READABLE);
    }

    #[test]
    fn test_map_nokhwa_missing_device() {
        let err = map_nokhwa_error("Could not open /dev/video9: No such file or directory");
        assert_eq!(err.name, PlatformError::NOT_FOUND);
    }

    #[test]
    fn test_map_nokhwa_other_error() {
        let err = map_nokhwa_error("unsupported pixel format");
        assert_eq!(err.name, PlatformError::UNKNOWN);
        assert_eq!(err.message, "unsupported pixel format");
    }

    fn tiny_frame() -> Frame {
        Frame::rgb(vec![0; 2 * 2 * 3], 2, 2)
    }

    #[test]
    fn test_frame_slot_times_out_without_frames() {
        let slot = FrameSlot::default();
        let err = slot.wait_for_frame(Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.name, PlatformError::NOT_READABLE);
    }

    #[test]
    fn test_frame_slot_wakes_on_publish() {
        let slot = Arc::new(FrameSlot::default());
        let publisher = Arc::clone(&slot);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            publisher.publish(tiny_frame());
        });

        let frame = slot.wait_for_frame(Duration::from_secs(5)).unwrap();
        assert_eq!((frame.width, frame.height), (2, 2));
        handle.join().unwrap();
    }

    #[test]
    fn test_frame_slot_close_wakes_waiter() {
        let slot = Arc::new(FrameSlot::default());
        let closer = Arc::clone(&slot);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.close();
        });

        let err = slot.wait_for_frame(Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.name, "InvalidStateError");
        handle.join().unwrap();
    }

    #[test]
    fn test_open_invalid_device_fails() {
        let result = NativeMedia::new().get_user_media(&StreamConstraints {
            device_id: Some("999".to_string()),
            resolution: None,
        });
        assert!(result.is_err());
    }
}
