use crate::assets::DEFAULT_SERVER;
use crate::config::{Config, SourceSelector, app_name, version};
use crate::pipeline::SessionCoordinator;
use clap::{Arg, Command};
use log::{error, info};
use std::time::Duration;
use std::{panic, process};
use tokio_util::sync::CancellationToken;

pub mod assets;
pub mod capture;
pub mod config;
pub mod display;
pub mod encoder;
pub mod pipeline;
pub mod protocol;
pub mod stats;
pub mod transport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("server")
                .short('s')
                .long("server")
                .value_name("URL")
                .help("Analyzer WebSocket endpoint.")
                .default_value(DEFAULT_SERVER),
        )
        .arg(
            Arg::new("camera")
                .short('c')
                .long("camera")
                .value_name("INDEX")
                .help("Camera device index to stream from.")
                .value_parser(clap::value_parser!(u32))
                .default_value("0")
                .conflicts_with("video"),
        )
        .arg(
            Arg::new("video")
                .short('v')
                .long("video")
                .value_name("PATH")
                .help("Analyze a pre-recorded video file instead of the camera."),
        )
        .arg(
            Arg::new("rate")
                .short('r')
                .long("rate")
                .value_name("FPS")
                .help("Frames sampled and sent per second.")
                .value_parser(clap::value_parser!(u32).range(1..=60))
                .default_value("10"),
        )
        .arg(
            Arg::new("quality")
                .short('q')
                .long("quality")
                .value_name("1-100")
                .help("JPEG quality factor for outbound frames.")
                .value_parser(clap::value_parser!(u8).range(1..=100))
                .default_value("80"),
        )
        .arg(
            Arg::new("reconnect-delay")
                .long("reconnect-delay")
                .value_name("SECONDS")
                .help("Fixed delay between reconnection attempts.")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("2"),
        )
        .arg(
            Arg::new("max-retries")
                .long("max-retries")
                .value_name("COUNT")
                .help("Give up after this many consecutive reconnection attempts (default: retry forever).")
                .value_parser(clap::value_parser!(u32)),
        )
        .get_matches();

    let source = match matches.get_one::<String>("video") {
        Some(path) => SourceSelector::File { path: path.into() },
        None => SourceSelector::Camera {
            index: *matches.get_one::<u32>("camera").unwrap_or(&0),
        },
    };

    let server = matches
        .get_one::<String>("server")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let mut config = Config::new(server, source);
    if let Some(rate) = matches.get_one::<u32>("rate") {
        config.sample_interval = Duration::from_millis(1000 / *rate as u64);
    }
    if let Some(quality) = matches.get_one::<u8>("quality") {
        config.jpeg_quality = *quality;
    }
    if let Some(delay) = matches.get_one::<u64>("reconnect-delay") {
        config.reconnect.delay = Duration::from_secs(*delay);
    }
    config.reconnect.max_attempts = matches.get_one::<u32>("max-retries").copied();

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(105);
    }));

    // gracefully close the session on SIGINT, SIGTERM, or SIGHUP
    let shutdown = CancellationToken::new();
    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        ctrlc_shutdown.cancel();
    })
    .expect("Error setting Ctrl-C handler");

    info!(
        "{} {} starting, session {}",
        app_name(),
        version(),
        config.session_id
    );

    let mut session = SessionCoordinator::new(config);
    if let Err(e) = session.start().await {
        error!("Could not acquire media source: {}", e);
        session.stop().await;
        return Err(e.into());
    }

    let mut snapshot_rx = session
        .subscribe()
        .expect("transport is started with the session");
    tokio::spawn(display::console::run(snapshot_rx.clone(), shutdown.clone()));

    // run until ctrl-c, or until the transport gives up for good
    tokio::select! {
        _ = shutdown.cancelled() => info!("Shutting down"),
        _ = async {
            loop {
                if snapshot_rx.borrow().state.is_closed() {
                    break;
                }
                if snapshot_rx.changed().await.is_err() {
                    break;
                }
            }
        } => info!("Transport closed, shutting down"),
    }
    session.stop().await;

    Ok(())
}
