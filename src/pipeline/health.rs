//! Health counters for the capture pipeline

use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline health metrics.
///
/// All fields use atomic operations for thread-safe access; the sampler,
/// the transport, and the summary logger share one instance.
pub struct PipelineHealth {
    /// Frames grabbed from the source by the sampler
    pub frames_sampled: AtomicU64,

    /// Frames actually sent over the transport
    pub frames_sent: AtomicU64,

    /// Sampler ticks that skipped encode+send because the transport was
    /// not connected
    pub send_skips: AtomicU64,

    /// Frames dropped because JPEG encoding failed
    pub encode_failures: AtomicU64,

    /// Inbound payloads dropped as malformed
    pub parse_failures: AtomicU64,

    /// Socket-level errors (failed connects, dropped connections)
    pub network_errors: AtomicU64,
}

impl PipelineHealth {
    pub fn new() -> Self {
        Self {
            frames_sampled: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            send_skips: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            network_errors: AtomicU64::new(0),
        }
    }

    pub fn record_frame_sampled(&self) {
        self.frames_sampled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_skip(&self) {
        self.send_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_error(&self) {
        self.network_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_sampled(&self) -> u64 {
        self.frames_sampled.load(Ordering::Relaxed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn send_skips(&self) -> u64 {
        self.send_skips.load(Ordering::Relaxed)
    }

    pub fn encode_failures(&self) -> u64 {
        self.encode_failures.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    pub fn network_errors(&self) -> u64 {
        self.network_errors.load(Ordering::Relaxed)
    }

    /// Snapshot for the periodic summary log
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_sampled: self.frames_sampled(),
            frames_sent: self.frames_sent(),
            send_skips: self.send_skips(),
            encode_failures: self.encode_failures(),
            parse_failures: self.parse_failures(),
            network_errors: self.network_errors(),
        }
    }
}

impl Default for PipelineHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub frames_sampled: u64,
    pub frames_sent: u64,
    pub send_skips: u64,
    pub encode_failures: u64,
    pub parse_failures: u64,
    pub network_errors: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} sampled, {} sent, {} offline skips, {} encode failures, {} parse failures, {} network errors",
            self.frames_sampled,
            self.frames_sent,
            self.send_skips,
            self.encode_failures,
            self.parse_failures,
            self.network_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_counters() {
        let health = PipelineHealth::new();

        health.record_frame_sampled();
        health.record_frame_sampled();
        health.record_frame_sent();
        health.record_send_skip();
        health.record_parse_failure();

        assert_eq!(health.frames_sampled(), 2);
        assert_eq!(health.frames_sent(), 1);
        assert_eq!(health.send_skips(), 1);
        assert_eq!(health.parse_failures(), 1);
        assert_eq!(health.encode_failures(), 0);

        let summary = health.summary();
        assert_eq!(summary.frames_sampled, 2);
        assert!(summary.to_string().contains("2 sampled"));
    }
}
