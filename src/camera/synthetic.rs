//! In-process camera backend producing generated frames.
//!
//! Useful for exercising the login flow on machines without a camera, and
//! for tests: failures can be injected and live streams are counted so
//! leaked tracks show up.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::platform::{MediaDevices, MediaStream};
use super::types::{CaptureDevice, Frame, PlatformError, Resolution, StreamConstraints};

#[derive(Debug)]
struct Shared {
    devices: Vec<CaptureDevice>,
    resolution: Resolution,
    permission_denied: bool,
    blank_frames: bool,
    busy: Vec<String>,
    pending_failures: VecDeque<PlatformError>,
}

/// Synthetic media backend. Clones share the same devices and counters.
#[derive(Debug, Clone)]
pub struct SyntheticMedia {
    shared: Arc<Mutex<Shared>>,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

impl SyntheticMedia {
    /// Backend exposing `count` cameras named `synthetic-0`, `synthetic-1`, ...
    pub fn with_devices(count: usize) -> Self {
        let devices = (0..count)
            .map(|i| {
                CaptureDevice::new(
                    format!("synthetic-{}", i),
                    Some(format!("Synthetic Camera {}", i)),
                )
            })
            .collect();

        Self {
            shared: Arc::new(Mutex::new(Shared {
                devices,
                resolution: Resolution::default(),
                permission_denied: false,
                blank_frames: false,
                busy: Vec::new(),
                pending_failures: VecDeque::new(),
            })),
            live: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_shared<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        let mut guard = match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Refuse every stream request, as if the user denied access.
    pub fn deny_permission(&self) {
        self.with_shared(|s| s.permission_denied = true);
    }

    /// Make the next stream request fail with `error`.
    pub fn fail_next_activation(&self, error: PlatformError) {
        self.with_shared(|s| s.pending_failures.push_back(error));
    }

    /// Report `device_id` as held by another process.
    pub fn mark_busy(&self, device_id: &str) {
        self.with_shared(|s| s.busy.push(device_id.to_string()));
    }

    /// Resolution delivered by streams opened after this call.
    pub fn set_native_resolution(&self, resolution: Resolution) {
        self.with_shared(|s| s.resolution = resolution);
    }

    /// Streams opened after this call deliver empty frames.
    pub fn produce_blank_frames(&self) {
        self.with_shared(|s| s.blank_frames = true);
    }

    /// Number of streams whose tracks are still running.
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Most streams ever live at the same time.
    pub fn peak_live_streams(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of streams opened since creation.
    pub fn streams_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl MediaDevices for SyntheticMedia {
    fn enumerate_video_inputs(&mut self) -> Result<Vec<CaptureDevice>, PlatformError> {
        self.with_shared(|s| {
            if s.permission_denied {
                return Err(PlatformError::not_allowed("camera access denied"));
            }
            Ok(s.devices.clone())
        })
    }

    fn get_user_media(
        &mut self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError> {
        let (device_id, resolution, blank) = self.with_shared(|s| {
            if let Some(err) = s.pending_failures.pop_front() {
                return Err(err);
            }
            if s.permission_denied {
                return Err(PlatformError::not_allowed("camera access denied"));
            }

            let device = match &constraints.device_id {
                Some(id) => s.devices.iter().find(|d| &d.id == id),
                None => s.devices.first(),
            }
            .ok_or_else(|| PlatformError::not_found("requested device not found"))?;

            if s.busy.contains(&device.id) {
                return Err(PlatformError::not_readable("device in use"));
            }

            Ok((device.id.clone(), s.resolution, s.blank_frames))
        })?;

        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SyntheticStream {
            device_id,
            resolution,
            blank,
            running: AtomicBool::new(true),
            live: Arc::clone(&self.live),
        }))
    }
}

struct SyntheticStream {
    device_id: String,
    resolution: Resolution,
    blank: bool,
    running: AtomicBool,
    live: Arc<AtomicUsize>,
}

impl MediaStream for SyntheticStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn native_resolution(&self) -> Resolution {
        self.resolution
    }

    fn grab_frame(&mut self) -> Result<Frame, PlatformError> {
        if !self.is_live() {
            return Err(PlatformError::new("InvalidStateError", "stream stopped"));
        }
        if self.blank {
            return Ok(Frame::rgb(Vec::new(), 0, 0));
        }

        let Resolution { width, height } = self.resolution;
        let mut data = Vec::with_capacity(self.resolution.pixel_count() * 3);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(128);
            }
        }
        Ok(Frame::rgb(data, width, height))
    }

    fn stop(&mut self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}
