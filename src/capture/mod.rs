//! Media source acquisition
//!
//! Two source implementations behind one trait: a live webcam
//! (`CameraSource`, via nokhwa) and a pre-recorded video file
//! (`FileSource`, via ac-ffmpeg). At most one source is active per
//! session; acquiring a new one requires releasing the previous one
//! first, which the coordinator enforces.

pub mod camera;
pub mod file;
pub mod traits;

pub use camera::CameraSource;
pub use file::FileSource;
pub use traits::FrameSource;

use thiserror::Error;

/// Acquisition errors. Terminal for the current attempt; the caller
/// surfaces them and re-invokes acquisition on user request.
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("no video input device found")]
    NoDeviceFound,

    #[error("unsupported video file: {0}")]
    UnsupportedFormat(String),

    #[error("capture backend error: {0}")]
    Backend(String),
}

/// Preferred capture parameters for camera acquisition.
///
/// The device is free to pick the closest format it supports; the actual
/// dimensions are reported by the source once the stream is open.
#[derive(Debug, Clone, Copy)]
pub struct CapturePrefs {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CapturePrefs {
    fn default() -> Self {
        Self {
            width: crate::assets::PREFERRED_WIDTH,
            height: crate::assets::PREFERRED_HEIGHT,
            fps: crate::assets::CAMERA_FPS,
        }
    }
}
