//! Live webcam source backed by nokhwa.
//!
//! The device is driven from a dedicated worker thread (nokhwa's capture
//! calls are blocking); decoded RGB frames are published through a `watch`
//! channel so the sampler always sees the most recent one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use log::{error, info, warn};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::{Camera, NokhwaError, query};
use tokio::sync::watch;

use crate::capture::traits::FrameSource;
use crate::capture::{AcquireError, CapturePrefs};
use crate::pipeline::types::{RawFrame, SourceKind, Timestamp};

/// Outcome of the worker's device-open handshake
type ReadyResult = Result<(u32, u32), AcquireError>;

pub struct CameraSource {
    dimensions: (u32, u32),
    frames_rx: watch::Receiver<Option<RawFrame>>,
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CameraSource {
    /// Open the video input device at `index` and start streaming.
    ///
    /// Blocks until the device reports an open stream with known
    /// dimensions, or fails with a typed acquisition error. No automatic
    /// retry: a denied permission stays denied until the user re-triggers
    /// acquisition.
    pub fn open(index: u32, prefs: CapturePrefs) -> Result<Self, AcquireError> {
        let devices =
            query(ApiBackend::Auto).map_err(|e| AcquireError::Backend(e.to_string()))?;
        if devices.is_empty() {
            return Err(AcquireError::NoDeviceFound);
        }
        if index as usize >= devices.len() {
            warn!(
                "Camera index {} out of range ({} devices found)",
                index,
                devices.len()
            );
            return Err(AcquireError::NoDeviceFound);
        }

        let (frames_tx, frames_rx) = watch::channel(None);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<ReadyResult>();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_flag);

        let worker = std::thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                    CameraFormat::new(
                        Resolution::new(prefs.width, prefs.height),
                        FrameFormat::MJPEG,
                        prefs.fps,
                    ),
                ));

                let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
                    Ok(camera) => camera,
                    Err(e) => {
                        let _ = ready_tx.send(Err(classify(e)));
                        return;
                    }
                };
                if let Err(e) = camera.open_stream() {
                    let _ = ready_tx.send(Err(classify(e)));
                    return;
                }

                let resolution = camera.resolution();
                let _ = ready_tx.send(Ok((resolution.width(), resolution.height())));

                while !stop.load(Ordering::Acquire) {
                    match camera.frame() {
                        Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                            Ok(image) => {
                                let (width, height) = (image.width(), image.height());
                                let frame = RawFrame {
                                    data: Bytes::from(image.into_raw()),
                                    width,
                                    height,
                                    captured_at: Timestamp::now(),
                                    source: SourceKind::Camera,
                                };
                                if frames_tx.send(Some(frame)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Camera frame decode failed: {}", e),
                        },
                        Err(e) => {
                            // transient reads happen on some backends
                            warn!("Camera read failed: {}", e);
                            std::thread::sleep(Duration::from_millis(50));
                        }
                    }
                }

                if let Err(e) = camera.stop_stream() {
                    error!("Failed to stop camera stream: {}", e);
                }
                info!("Camera released");
            })
            .map_err(|e| AcquireError::Backend(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(dimensions)) => {
                info!(
                    "Camera {} open at {}x{}",
                    index, dimensions.0, dimensions.1
                );
                Ok(Self {
                    dimensions,
                    frames_rx,
                    stop_flag,
                    worker: Some(worker),
                })
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => Err(AcquireError::Backend(
                "camera worker exited before reporting".into(),
            )),
        }
    }
}

/// Map backend errors onto the acquisition taxonomy. nokhwa reports
/// platform errors as strings, so classification is by message probe.
fn classify(err: NokhwaError) -> AcquireError {
    let text = err.to_string();
    let lower = text.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("access") {
        AcquireError::PermissionDenied(text)
    } else if lower.contains("not found") || lower.contains("no device") {
        AcquireError::NoDeviceFound
    } else {
        AcquireError::Backend(text)
    }
}

impl FrameSource for CameraSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn frames(&self) -> watch::Receiver<Option<RawFrame>> {
        self.frames_rx.clone()
    }

    fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}
