//! Terminal stats consumer.
//!
//! Logs a stat line whenever the projected view changes. Any richer
//! surface (GUI, web overlay) would subscribe to the same snapshot
//! channel and project it the same way; this one just happens to print.

use log::{debug, info};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::stats::{self, StatsView};
use crate::transport::ConnectionSnapshot;

pub async fn run(mut snapshot_rx: watch::Receiver<ConnectionSnapshot>, cancel: CancellationToken) {
    let mut last_view: Option<StatsView> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshot_rx.borrow_and_update().clone();
                let view = stats::project(
                    snapshot.last_update.as_ref(),
                    snapshot.state.is_connected(),
                );
                if last_view.as_ref() != Some(&view) {
                    render(&view);
                    last_view = Some(view);
                }
            }
        }
    }
}

fn render(view: &StatsView) {
    info!("{}", view);
    if let Some(roi) = view.roi_overlay {
        info!(
            "Ball detection zone: ({}, {}) {}x{}",
            roi.x, roi.y, roi.width, roi.height
        );
    }
    for line in &view.debug_lines {
        debug!("debug {}", line);
    }
}
