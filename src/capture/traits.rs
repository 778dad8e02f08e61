//! Trait seam between the sampler and the concrete media sources

use crate::pipeline::types::{RawFrame, SourceKind};
use tokio::sync::watch;

/// A live frame source the sampler can poll.
///
/// Implementations decode on their own worker thread and publish the most
/// recent frame through a `watch` channel; the channel holds `None` until
/// the source has produced its first full frame.
pub trait FrameSource: Send {
    /// Which kind of source this is (decides the mirroring rule)
    fn kind(&self) -> SourceKind;

    /// Native dimensions reported by the device/stream
    fn dimensions(&self) -> (u32, u32);

    /// Subscribe to the most-recent-frame channel
    fn frames(&self) -> watch::Receiver<Option<RawFrame>>;

    /// Pause or resume playback. File playback only; live sources ignore
    /// it.
    fn set_paused(&self, _paused: bool) {}

    /// Restart playback from the beginning. File playback only.
    fn rewind(&self) {}

    /// Stop decoding and release the underlying device/demuxer.
    ///
    /// Idempotent. Must not return before the resources are actually
    /// released: acquisition of the next source relies on it.
    fn stop(&mut self);
}
