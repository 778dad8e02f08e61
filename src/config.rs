use std::path::PathBuf;
use std::time::Duration;

use crate::assets::{JPEG_QUALITY, SAMPLE_RATE};
use crate::capture::CapturePrefs;
use crate::transport::ReconnectPolicy;

/// Which media source the session runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelector {
    Camera { index: u32 },
    File { path: PathBuf },
}

pub struct Config {
    /// Analyzer endpoint, e.g. `ws://127.0.0.1:8000`
    pub server: String,

    /// Opaque token identifying this client to the backend, generated
    /// once and stable for the lifetime of the session
    pub session_id: String,

    pub source: SourceSelector,
    pub sample_interval: Duration,
    pub jpeg_quality: u8,
    pub prefs: CapturePrefs,
    pub reconnect: ReconnectPolicy,
}

impl Config {
    pub fn new(server: String, source: SourceSelector) -> Self {
        Config {
            server,
            session_id: uuid::Uuid::new_v4().to_string(),
            source,
            sample_interval: Duration::from_millis(1000 / SAMPLE_RATE as u64),
            jpeg_quality: JPEG_QUALITY,
            prefs: CapturePrefs::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Per-session WebSocket URL
    pub fn ws_url(&self) -> String {
        format!("{}/ws/{}", self.server.trim_end_matches('/'), self.session_id)
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_carries_session_id() {
        let config = Config::new(
            "ws://localhost:8000/".to_string(),
            SourceSelector::Camera { index: 0 },
        );
        let url = config.ws_url();
        assert_eq!(url, format!("ws://localhost:8000/ws/{}", config.session_id));
    }

    #[test]
    fn test_session_ids_are_unique_per_config() {
        let a = Config::new("ws://x".into(), SourceSelector::Camera { index: 0 });
        let b = Config::new("ws://x".into(), SourceSelector::Camera { index: 0 });
        assert_ne!(a.session_id, b.session_id);
    }
}
