//! Sampling stage for the capture pipeline
//!
//! Grabs the source's most recent frame on a fixed cadence, keeps the
//! preview buffer fresh, and encodes+sends only while the transport has a
//! live connection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::display::preview::PreviewBuffer;
use crate::encoder::FrameEncoder;
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::types::RawFrame;
use crate::protocol::ClientMessage;
use crate::transport::TransportHandle;

pub struct SamplerStage {
    interval: Duration,
    encoder: FrameEncoder,
    frames_rx: watch::Receiver<Option<RawFrame>>,
    transport: TransportHandle,
    preview: PreviewBuffer,
    health: Arc<PipelineHealth>,
    cancel: CancellationToken,
}

impl SamplerStage {
    pub fn new(
        interval: Duration,
        encoder: FrameEncoder,
        frames_rx: watch::Receiver<Option<RawFrame>>,
        transport: TransportHandle,
        preview: PreviewBuffer,
        health: Arc<PipelineHealth>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            interval,
            encoder,
            frames_rx,
            transport,
            preview,
            health,
            cancel,
        }
    }

    /// One sampling tick
    fn sample(&mut self) {
        // nothing to do until the source has produced a full frame
        let Some(frame) = self.frames_rx.borrow().clone() else {
            return;
        };
        self.health.record_frame_sampled();

        // the preview stays fresh regardless of connectivity
        self.preview.publish(frame.clone());

        // encoding cost is only paid when a destination exists
        if !self.transport.is_connected() {
            self.health.record_send_skip();
            return;
        }

        let mirror = frame.source.mirrored();
        match self.encoder.encode(&frame, mirror) {
            Ok(data) => {
                self.transport.send(ClientMessage::Frame {
                    data,
                    timestamp: frame.captured_at.as_millis(),
                });
            }
            Err(e) => {
                warn!("Frame encode failed, dropping: {:#}", e);
                self.health.record_encode_failure();
            }
        }
    }
}

#[async_trait]
impl PipelineStage for SamplerStage {
    async fn run(&mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Sampler started, one frame every {:?}", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.sample(),
            }
        }

        info!("Sampler stopped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Sampler"
    }
}
