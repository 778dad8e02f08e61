//! Pre-recorded video file source backed by ac-ffmpeg.
//!
//! The file is demuxed and decoded on a worker thread, paced by the
//! stream's presentation timestamps so playback advances in real time.
//! Frames are published unmirrored: recorded material keeps its true
//! orientation for analysis.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ac_ffmpeg::codec::video::{VideoDecoder, VideoFrameScaler};
use ac_ffmpeg::codec::{Decoder, video};
use ac_ffmpeg::format::demuxer::Demuxer;
use ac_ffmpeg::format::io::IO;
use anyhow::{Context, Result};
use bytes::Bytes;
use log::{error, info, warn};
use tokio::sync::watch;

use crate::capture::AcquireError;
use crate::capture::traits::FrameSource;
use crate::pipeline::types::{RawFrame, SourceKind, Timestamp};

/// Poll interval for the pause gate on the playback thread
const PAUSE_POLL: Duration = Duration::from_millis(20);

/// Shared playback flags, owned by the source handle and read by the
/// worker between frames.
struct PlaybackControl {
    stop: AtomicBool,
    paused: AtomicBool,
    rewind: AtomicBool,
}

enum PlayOutcome {
    /// Reached end of stream
    Finished,
    /// Stop requested
    Stopped,
    /// Rewind requested, caller reopens the file
    Rewound,
}

pub struct FileSource {
    path: PathBuf,
    dimensions: (u32, u32),
    frames_rx: watch::Receiver<Option<RawFrame>>,
    control: Arc<PlaybackControl>,
    worker: Option<JoinHandle<()>>,
}

impl FileSource {
    /// Open `path` as a playable source.
    ///
    /// Blocks until the container is probed and the first video stream's
    /// decoder is ready, or fails with `UnsupportedFormat`.
    pub fn open(path: &Path) -> Result<Self, AcquireError> {
        let (frames_tx, frames_rx) = watch::channel(None);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(u32, u32), AcquireError>>();
        let control = Arc::new(PlaybackControl {
            stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            rewind: AtomicBool::new(false),
        });

        let worker_path = path.to_path_buf();
        let worker_control = Arc::clone(&control);
        let worker = std::thread::Builder::new()
            .name("file-playback".into())
            .spawn(move || {
                let mut handshake = Some(ready_tx);
                loop {
                    match play_once(&worker_path, &frames_tx, &worker_control, &mut handshake) {
                        Ok(PlayOutcome::Stopped) => break,
                        Ok(PlayOutcome::Rewound) => {
                            worker_control.rewind.store(false, Ordering::Release);
                            info!("Rewinding {}", worker_path.display());
                        }
                        Ok(PlayOutcome::Finished) => {
                            // keep the last frame in the preview; wait for
                            // rewind or stop
                            info!("Playback finished: {}", worker_path.display());
                            loop {
                                if worker_control.stop.load(Ordering::Acquire) {
                                    return;
                                }
                                if worker_control.rewind.swap(false, Ordering::AcqRel) {
                                    break;
                                }
                                std::thread::sleep(PAUSE_POLL);
                            }
                        }
                        Err(e) => {
                            error!("Playback failed: {:#}", e);
                            break;
                        }
                    }
                }
            })
            .map_err(|e| AcquireError::Backend(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(dimensions)) => {
                info!(
                    "Opened {} at {}x{}",
                    path.display(),
                    dimensions.0,
                    dimensions.1
                );
                Ok(Self {
                    path: path.to_path_buf(),
                    dimensions,
                    frames_rx,
                    control,
                    worker: Some(worker),
                })
            }
            Ok(Err(e)) => {
                control.stop.store(true, Ordering::Release);
                let _ = worker.join();
                Err(e)
            }
            Err(_) => Err(AcquireError::Backend(
                "playback worker exited before reporting".into(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pause or resume playback. While paused the last decoded frame stays
    /// current and pacing is suspended.
    pub fn set_paused(&self, paused: bool) {
        self.control.paused.store(paused, Ordering::Release);
        info!("Playback paused: {}", paused);
    }

    pub fn is_paused(&self) -> bool {
        self.control.paused.load(Ordering::Acquire)
    }

    /// Restart playback from the beginning of the file
    pub fn rewind(&self) {
        self.control.rewind.store(true, Ordering::Release);
    }
}

impl FrameSource for FileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn frames(&self) -> watch::Receiver<Option<RawFrame>> {
        self.frames_rx.clone()
    }

    fn set_paused(&self, paused: bool) {
        FileSource::set_paused(self, paused);
    }

    fn rewind(&self) {
        FileSource::rewind(self);
    }

    fn stop(&mut self) {
        self.control.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Demux and decode the file once, start to finish.
///
/// The first invocation reports probe results (dimensions or an
/// `UnsupportedFormat`) through `handshake`; later invocations (rewind)
/// have already consumed it.
fn play_once(
    path: &Path,
    frames_tx: &watch::Sender<Option<RawFrame>>,
    control: &PlaybackControl,
    handshake: &mut Option<std::sync::mpsc::Sender<Result<(u32, u32), AcquireError>>>,
) -> Result<PlayOutcome> {
    let probe = open_video(path);

    let (mut demuxer, stream_index, mut decoder, mut scaler, width, height) = match probe {
        Ok(opened) => {
            if let Some(tx) = handshake.take() {
                let _ = tx.send(Ok((opened.4, opened.5)));
            }
            opened
        }
        Err(e) => {
            if let Some(tx) = handshake.take() {
                let _ = tx.send(Err(e));
                return Ok(PlayOutcome::Stopped);
            }
            return Err(anyhow::anyhow!(e));
        }
    };

    let start = Instant::now();
    let mut paused_total = Duration::ZERO;

    loop {
        if control.stop.load(Ordering::Acquire) {
            return Ok(PlayOutcome::Stopped);
        }
        if control.rewind.load(Ordering::Acquire) {
            return Ok(PlayOutcome::Rewound);
        }

        // pause gate; paused time is excluded from pacing
        if control.paused.load(Ordering::Acquire) {
            let pause_start = Instant::now();
            while control.paused.load(Ordering::Acquire)
                && !control.stop.load(Ordering::Acquire)
                && !control.rewind.load(Ordering::Acquire)
            {
                std::thread::sleep(PAUSE_POLL);
            }
            paused_total += pause_start.elapsed();
            continue;
        }

        let Some(packet) = demuxer.take().context("demuxing failed")? else {
            break;
        };
        if packet.stream_index() != stream_index {
            continue;
        }

        decoder.push(packet).context("decoder rejected packet")?;
        while let Some(frame) = decoder.take().context("decoding failed")? {
            publish_frame(
                &frame, &mut scaler, frames_tx, width, height, start, paused_total,
            )?;
        }
    }

    decoder.flush().context("decoder flush failed")?;
    while let Some(frame) = decoder.take().context("decoding failed")? {
        publish_frame(
            &frame, &mut scaler, frames_tx, width, height, start, paused_total,
        )?;
    }

    Ok(PlayOutcome::Finished)
}

type OpenedVideo = (
    ac_ffmpeg::format::demuxer::DemuxerWithStreamInfo<IO<File>>,
    usize,
    VideoDecoder,
    VideoFrameScaler,
    u32,
    u32,
);

/// Probe the container and build the decode chain for its first video
/// stream, scaling decoder output to packed RGB24 at native size.
fn open_video(path: &Path) -> Result<OpenedVideo, AcquireError> {
    let file = File::open(path)
        .map_err(|e| AcquireError::Backend(format!("{}: {}", path.display(), e)))?;
    let io = IO::from_seekable_read_stream(file);

    let demuxer = Demuxer::builder()
        .build(io)
        .map_err(|e| AcquireError::UnsupportedFormat(e.to_string()))?
        .find_stream_info(None)
        .map_err(|(_, e)| AcquireError::UnsupportedFormat(e.to_string()))?;

    let (stream_index, params) = demuxer
        .streams()
        .iter()
        .enumerate()
        .find_map(|(index, stream)| {
            let params = stream.codec_parameters();
            if params.is_video_codec() {
                params
                    .into_video_codec_parameters()
                    .map(|video_params| (index, video_params))
            } else {
                None
            }
        })
        .ok_or_else(|| AcquireError::UnsupportedFormat("no video stream".into()))?;

    let decoder = VideoDecoder::from_codec_parameters(&params)
        .map_err(|e| AcquireError::UnsupportedFormat(e.to_string()))?
        .build()
        .map_err(|e| AcquireError::UnsupportedFormat(e.to_string()))?;

    let width = params.width();
    let height = params.height();

    let scaler = VideoFrameScaler::builder()
        .source_pixel_format(params.pixel_format())
        .source_width(width)
        .source_height(height)
        .target_pixel_format(video::frame::get_pixel_format("rgb24"))
        .target_width(width)
        .target_height(height)
        .build()
        .map_err(|e| AcquireError::UnsupportedFormat(e.to_string()))?;

    Ok((
        demuxer,
        stream_index,
        decoder,
        scaler,
        width as u32,
        height as u32,
    ))
}

/// Scale one decoded frame to RGB24, pace against its presentation
/// timestamp, and publish it.
fn publish_frame(
    frame: &ac_ffmpeg::codec::video::VideoFrame,
    scaler: &mut VideoFrameScaler,
    frames_tx: &watch::Sender<Option<RawFrame>>,
    width: u32,
    height: u32,
    start: Instant,
    paused_total: Duration,
) -> Result<()> {
    let pts_millis = frame.pts().as_millis().unwrap_or(0).max(0) as u64;
    let target = Duration::from_millis(pts_millis);
    let elapsed = start.elapsed().saturating_sub(paused_total);
    if target > elapsed {
        std::thread::sleep(target - elapsed);
    }

    let rgb = scaler.scale(frame).context("pixel format conversion failed")?;
    let data = strip_stride(&rgb, width as usize, height as usize);

    let published = frames_tx.send(Some(RawFrame {
        data,
        width,
        height,
        captured_at: Timestamp::now(),
        source: SourceKind::File,
    }));
    if published.is_err() {
        warn!("Frame channel closed, stopping playback");
        anyhow::bail!("frame channel closed");
    }
    Ok(())
}

/// Copy the RGB plane row by row, dropping the line-size padding ffmpeg
/// may add for alignment.
fn strip_stride(rgb: &ac_ffmpeg::codec::video::VideoFrame, width: usize, height: usize) -> Bytes {
    let planes = rgb.planes();
    let data = planes[0].data();
    let stride = planes[0].line_size();
    let row_len = width * 3;

    if stride == row_len {
        return Bytes::copy_from_slice(&data[..row_len * height]);
    }

    let mut packed = Vec::with_capacity(row_len * height);
    for row in 0..height {
        let offset = row * stride;
        packed.extend_from_slice(&data[offset..offset + row_len]);
    }
    Bytes::from(packed)
}
