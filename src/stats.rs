//! Projection of analyzer updates into renderable view state.
//!
//! Pure mapping, no hidden state: presentation consumers (terminal
//! renderer, debug panels, future GUIs) all derive their display from the
//! `StatsView` produced here and never re-derive workout logic.

use crate::protocol::{Phase, RoiBox, WorkoutUpdate};

/// Renderable snapshot of the workout state
#[derive(Debug, Clone, PartialEq)]
pub struct StatsView {
    /// Transport connectivity indicator
    pub connected: bool,

    pub phase: Phase,
    pub phase_label: &'static str,

    pub valid_squats: u32,
    pub invalid_squats: u32,
    pub valid_throws: u32,
    pub invalid_throws: u32,

    /// Authoritative rep total from the most recent update
    pub total_reps: u32,

    pub athlete_height: Option<f64>,

    /// Ball-detection overlay, present only while the phase is `ThrowWindow`
    pub roi_overlay: Option<RoiBox>,

    /// Flattened `debugInfo` map, one `key: value` line per entry
    pub debug_lines: Vec<String>,
}

/// Map the latest received update (if any) to view state.
///
/// Prior to the first update everything defaults to the zeroed "ready"
/// placeholder.
pub fn project(latest: Option<&WorkoutUpdate>, connected: bool) -> StatsView {
    let placeholder = WorkoutUpdate::default();
    let update = latest.unwrap_or(&placeholder);

    let roi_overlay = if update.current_state == Phase::ThrowWindow {
        update.roi_box
    } else {
        None
    };

    let debug_lines = update
        .debug_info
        .as_ref()
        .map(|map| {
            map.iter()
                .map(|(key, value)| format!("{}: {}", key, value))
                .collect()
        })
        .unwrap_or_default();

    StatsView {
        connected,
        phase: update.current_state,
        phase_label: update.current_state.label(),
        valid_squats: update.valid_squats,
        invalid_squats: update.invalid_squats,
        valid_throws: update.valid_throws,
        invalid_throws: update.invalid_throws,
        total_reps: update.total_wall_ball_reps,
        athlete_height: update.athlete_height,
        roi_overlay,
        debug_lines,
    }
}

impl std::fmt::Display for StatsView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} | squats {}/{} | throws {}/{} | total {}",
            if self.connected { "online" } else { "offline" },
            self.phase_label,
            self.valid_squats,
            self.valid_squats + self.invalid_squats,
            self.valid_throws,
            self.valid_throws + self.invalid_throws,
            self.total_reps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(total: u32, phase: Phase) -> WorkoutUpdate {
        WorkoutUpdate {
            valid_squats: total,
            valid_throws: total,
            total_wall_ball_reps: total,
            current_state: phase,
            ..Default::default()
        }
    }

    #[test]
    fn test_placeholder_before_first_update() {
        let view = project(None, false);
        assert_eq!(view.total_reps, 0);
        assert_eq!(view.phase, Phase::Ready);
        assert_eq!(view.phase_label, "Ready");
        assert!(view.roi_overlay.is_none());
        assert!(view.debug_lines.is_empty());
        assert!(!view.connected);
    }

    #[test]
    fn test_total_mirrors_latest_update() {
        let view = project(Some(&update(7, Phase::Scoring)), true);
        assert_eq!(view.total_reps, 7);
        assert_eq!(view.phase_label, "Scoring");
        assert!(view.connected);
    }

    #[test]
    fn test_roi_overlay_only_during_throw_window() {
        let roi = RoiBox {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 150.0,
        };

        let mut u = update(1, Phase::ThrowWindow);
        u.roi_box = Some(roi);
        let view = project(Some(&u), true);
        assert_eq!(view.roi_overlay, Some(roi));

        // Same box reported outside the throw window is not overlaid
        u.current_state = Phase::Scoring;
        let view = project(Some(&u), true);
        assert!(view.roi_overlay.is_none());

        // Throw window with no box reported: nothing to overlay
        let u = update(1, Phase::ThrowWindow);
        let view = project(Some(&u), true);
        assert!(view.roi_overlay.is_none());
    }

    #[test]
    fn test_debug_lines_flattened() {
        let mut u = update(0, Phase::Ready);
        let mut map = serde_json::Map::new();
        map.insert("hipPosition".into(), serde_json::json!(0.42));
        u.debug_info = Some(map);

        let view = project(Some(&u), true);
        assert_eq!(view.debug_lines, vec!["hipPosition: 0.42".to_string()]);
    }
}
