//! Core types for the capture pipeline

use bytes::Bytes;

/// Wall-clock timestamp attached to captured frames.
///
/// The analyzer protocol carries milliseconds, so that is the native unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// Milliseconds since the Unix epoch
    pub millis: i64,
}

impl Timestamp {
    /// Create a timestamp from epoch milliseconds
    pub fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self {
            millis: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn as_millis(&self) -> i64 {
        self.millis
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.millis)
    }
}

/// Kind of media source a frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Live camera feed
    Camera,
    /// Pre-recorded video file
    File,
}

impl SourceKind {
    /// Camera feeds are mirrored for the user-facing view; file playback
    /// keeps true orientation for downstream analysis.
    pub fn mirrored(&self) -> bool {
        matches!(self, SourceKind::Camera)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Camera => write!(f, "Camera"),
            SourceKind::File => write!(f, "File"),
        }
    }
}

/// A decoded video frame in packed RGB24, ready for sampling.
///
/// Sources publish the most recent frame they decoded; the sampler picks
/// it up on its own cadence.
#[derive(Clone)]
pub struct RawFrame {
    /// Packed RGB24 pixel data, `width * height * 3` bytes
    pub data: Bytes,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Wall-clock capture time
    pub captured_at: Timestamp,

    /// Which kind of source produced this frame
    pub source: SourceKind,
}

impl RawFrame {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("source", &self.source)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirroring_rule() {
        assert!(SourceKind::Camera.mirrored());
        assert!(!SourceKind::File.mirrored());
    }
}
