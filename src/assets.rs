use std::time::Duration;

// sampling
pub const SAMPLE_RATE: u32 = 10;
pub const JPEG_QUALITY: u8 = 80;

// camera preferences
pub const PREFERRED_WIDTH: u32 = 1280;
pub const PREFERRED_HEIGHT: u32 = 720;
pub const CAMERA_FPS: u32 = 30;

// connection
pub const DEFAULT_SERVER: &str = "ws://127.0.0.1:8000";
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
pub const FRAME_CHANNEL_CAPACITY: usize = 32;

pub const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);
