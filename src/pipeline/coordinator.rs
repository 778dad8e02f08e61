//! Session coordinator
//!
//! One `SessionCoordinator` per capture session: it owns the media
//! source, the sampler stage, and the transport, and sequences their
//! lifecycles. No ambient singletons; constructing a second session
//! yields fully independent instances.

use std::sync::Arc;

use log::{error, info};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::assets::HEALTH_LOG_INTERVAL;
use crate::capture::traits::FrameSource;
use crate::capture::{AcquireError, CameraSource, FileSource};
use crate::config::{Config, SourceSelector};
use crate::display::preview::PreviewBuffer;
use crate::encoder::FrameEncoder;
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::sampler::SamplerStage;
use crate::pipeline::stage::PipelineStage;
use crate::pipeline::types::RawFrame;
use crate::transport::{ConnectionSnapshot, WsTransport};

pub struct SessionCoordinator {
    config: Config,
    health: Arc<PipelineHealth>,
    preview: PreviewBuffer,

    transport: Option<WsTransport>,
    source: Option<Box<dyn FrameSource>>,

    sampler_cancel: Option<CancellationToken>,
    sampler_task: Option<tokio::task::JoinHandle<()>>,

    session_cancel: CancellationToken,
}

impl SessionCoordinator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            health: Arc::new(PipelineHealth::new()),
            preview: PreviewBuffer::new(),
            transport: None,
            source: None,
            sampler_cancel: None,
            sampler_task: None,
            session_cancel: CancellationToken::new(),
        }
    }

    pub fn health(&self) -> Arc<PipelineHealth> {
        Arc::clone(&self.health)
    }

    pub fn preview(&self) -> &PreviewBuffer {
        &self.preview
    }

    /// Connection snapshot channel; available once started
    pub fn subscribe(&self) -> Option<watch::Receiver<ConnectionSnapshot>> {
        self.transport.as_ref().map(|t| t.subscribe())
    }

    /// Bring the session up: transport first, then the configured source
    /// and its sampler.
    pub async fn start(&mut self) -> Result<(), AcquireError> {
        self.start_transport();
        let selector = self.config.source.clone();
        let prefs = self.config.prefs;
        self.switch_with(move || open_source(&selector, prefs)).await
    }

    /// Switch to a different media source. The currently active source is
    /// fully released before the next one is acquired; on failure the
    /// session is left source-less but otherwise intact, ready for a
    /// retry with the same or different parameters.
    pub async fn switch_source(&mut self, selector: SourceSelector) -> Result<(), AcquireError> {
        let prefs = self.config.prefs;
        self.switch_with(move || open_source(&selector, prefs)).await
    }

    /// Clear the locally held workout state
    pub fn reset_workout(&self) {
        if let Some(transport) = &self.transport {
            transport.reset_workout();
        }
    }

    /// Pause or resume file playback; no-op for camera sources
    pub fn set_playback_paused(&self, paused: bool) {
        if let Some(source) = &self.source {
            source.set_paused(paused);
        }
    }

    /// Tear the session down: sampler, then source, then transport. Every
    /// step runs even if an earlier one misbehaved.
    pub async fn stop(&mut self) {
        self.stop_sampler().await;
        self.release_source().await;
        self.session_cancel.cancel();
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown().await;
        }
        info!("Session stopped");
    }

    pub(crate) fn start_transport(&mut self) {
        if self.transport.is_some() {
            return;
        }
        let transport = WsTransport::start(
            self.config.ws_url(),
            self.config.reconnect,
            Arc::clone(&self.health),
        );
        self.transport = Some(transport);

        // periodic health summary
        let health = Arc::clone(&self.health);
        let cancel = self.session_cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_LOG_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => info!("{}", health.summary()),
                }
            }
        });
    }

    /// Replace the active source with whatever `open` produces.
    ///
    /// Order matters: sampler down, previous source released, then the
    /// new acquisition. There is never a window with two active sources.
    pub(crate) async fn switch_with<F>(&mut self, open: F) -> Result<(), AcquireError>
    where
        F: FnOnce() -> Result<Box<dyn FrameSource>, AcquireError> + Send + 'static,
    {
        self.stop_sampler().await;
        self.release_source().await;

        // constructors block on the device/probe handshake
        let source = tokio::task::spawn_blocking(open)
            .await
            .map_err(|e| AcquireError::Backend(e.to_string()))??;

        info!(
            "Source active: {} at {}x{}",
            source.kind(),
            source.dimensions().0,
            source.dimensions().1
        );

        self.spawn_sampler(source.frames());
        self.source = Some(source);
        Ok(())
    }

    fn spawn_sampler(&mut self, frames_rx: watch::Receiver<Option<RawFrame>>) {
        let transport = self
            .transport
            .as_ref()
            .expect("transport must be started before the sampler")
            .handle();

        let cancel = CancellationToken::new();
        let mut stage = SamplerStage::new(
            self.config.sample_interval,
            FrameEncoder::new(self.config.jpeg_quality),
            frames_rx,
            transport,
            self.preview.clone(),
            Arc::clone(&self.health),
            cancel.clone(),
        );

        self.sampler_cancel = Some(cancel);
        self.sampler_task = Some(tokio::spawn(async move {
            if let Err(e) = stage.run().await {
                error!("{} failed: {:#}", stage.name(), e);
            }
        }));
    }

    async fn stop_sampler(&mut self) {
        if let Some(cancel) = self.sampler_cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.sampler_task.take() {
            let _ = task.await;
        }
    }

    async fn release_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            // stop() joins the capture thread; keep that off the runtime
            let released = tokio::task::spawn_blocking(move || {
                source.stop();
            })
            .await;
            if let Err(e) = released {
                error!("Source release task failed: {}", e);
            }
        }
    }
}

/// Open the selected source. Blocking: call from `spawn_blocking`.
fn open_source(
    selector: &SourceSelector,
    prefs: crate::capture::CapturePrefs,
) -> Result<Box<dyn FrameSource>, AcquireError> {
    match selector {
        SourceSelector::Camera { index } => {
            Ok(Box::new(CameraSource::open(*index, prefs)?) as Box<dyn FrameSource>)
        }
        SourceSelector::File { path } => {
            Ok(Box::new(FileSource::open(path)?) as Box<dyn FrameSource>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{RawFrame, SourceKind};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted source that records when it gets released
    struct TestSource {
        id: &'static str,
        kind: SourceKind,
        frames_tx: watch::Sender<Option<RawFrame>>,
        log: Arc<Mutex<Vec<String>>>,
        paused: Arc<Mutex<bool>>,
    }

    impl TestSource {
        fn boxed(
            id: &'static str,
            kind: SourceKind,
            log: Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn FrameSource> {
            log.lock().unwrap().push(format!("open {}", id));
            let (frames_tx, _) = watch::channel(None);
            Box::new(Self {
                id,
                kind,
                frames_tx,
                log,
                paused: Arc::new(Mutex::new(false)),
            })
        }
    }

    impl FrameSource for TestSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn dimensions(&self) -> (u32, u32) {
            (16, 8)
        }

        fn frames(&self) -> watch::Receiver<Option<RawFrame>> {
            self.frames_tx.subscribe()
        }

        fn set_paused(&self, paused: bool) {
            *self.paused.lock().unwrap() = paused;
        }

        fn stop(&mut self) {
            self.log.lock().unwrap().push(format!("stop {}", self.id));
        }
    }

    fn test_config() -> Config {
        let mut config = Config::new(
            // nothing listens here; the transport just retries quietly
            "ws://127.0.0.1:9".to_string(),
            SourceSelector::Camera { index: 0 },
        );
        config.reconnect.delay = Duration::from_millis(50);
        config
    }

    #[tokio::test]
    async fn test_switch_releases_previous_source_before_acquiring_next() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut coordinator = SessionCoordinator::new(test_config());
        coordinator.start_transport();

        let first = Arc::clone(&log);
        coordinator
            .switch_with(move || Ok(TestSource::boxed("camera", SourceKind::Camera, first)))
            .await
            .unwrap();

        let second = Arc::clone(&log);
        coordinator
            .switch_with(move || Ok(TestSource::boxed("file", SourceKind::File, second)))
            .await
            .unwrap();

        coordinator.stop().await;

        let entries = log.lock().unwrap().clone();
        assert_eq!(
            entries,
            vec![
                "open camera".to_string(),
                "stop camera".to_string(),
                "open file".to_string(),
                "stop file".to_string(),
            ],
            "previous source must be released before the next is acquired"
        );
    }

    #[tokio::test]
    async fn test_failed_acquisition_leaves_session_retryable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut coordinator = SessionCoordinator::new(test_config());
        coordinator.start_transport();

        let denied = coordinator
            .switch_with(|| Err(AcquireError::PermissionDenied("device refused".into())))
            .await;
        assert!(matches!(denied, Err(AcquireError::PermissionDenied(_))));

        // retrying with identical parameters now succeeds
        let retry = Arc::clone(&log);
        coordinator
            .switch_with(move || Ok(TestSource::boxed("camera", SourceKind::Camera, retry)))
            .await
            .unwrap();

        coordinator.stop().await;
        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, vec!["open camera".to_string(), "stop camera".to_string()]);
    }
}
