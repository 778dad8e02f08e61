//! Latest-frame buffer for presentation consumers.
//!
//! The sampler writes every grabbed frame here, connected or not, so the
//! preview stays live even while the analyzer is unreachable. Consumers
//! (GUI surfaces, snapshot writers) subscribe and always see the most
//! recent frame; there is no backlog to drain.

use tokio::sync::watch;

use crate::pipeline::types::RawFrame;

#[derive(Clone)]
pub struct PreviewBuffer {
    tx: std::sync::Arc<watch::Sender<Option<RawFrame>>>,
}

impl PreviewBuffer {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Replace the current frame
    pub fn publish(&self, frame: RawFrame) {
        self.tx.send_replace(Some(frame));
    }

    /// Subscribe to frame replacements
    pub fn subscribe(&self) -> watch::Receiver<Option<RawFrame>> {
        self.tx.subscribe()
    }

    /// Most recent frame, if any was published yet
    pub fn latest(&self) -> Option<RawFrame> {
        self.tx.borrow().clone()
    }
}

impl Default for PreviewBuffer {
    fn default() -> Self {
        Self::new()
    }
}
