//! Wire protocol spoken with the analyzer backend.
//!
//! One JSON document per WebSocket text frame, in both directions. The
//! message shapes are owned by the backend; this module only mirrors them.

use log::warn;
use serde::{Deserialize, Serialize};

/// Outbound message, client → analyzer.
///
/// Serializes as `{"type":"frame","data":"<base64 JPEG>","timestamp":<ms>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Frame {
        /// Base64-encoded JPEG payload, no data-URL prefix
        data: String,
        /// Capture time, epoch milliseconds
        timestamp: i64,
    },
}

/// Workout phase driven by the analyzer's rep state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Ready,
    Squatting,
    ThrowWindow,
    Scoring,
}

impl Phase {
    /// Human-readable label, matching what the presentation layer shows
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Ready => "Ready",
            Phase::Squatting => "Squatting",
            Phase::ThrowWindow => "Throw Ball!",
            Phase::Scoring => "Scoring",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Active ball-detection zone reported during the throw phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Inbound message, analyzer → client.
///
/// Counters are cumulative for the session; `total_wall_ball_reps` is the
/// authoritative total and is never recomputed locally.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutUpdate {
    pub valid_squats: u32,
    pub invalid_squats: u32,
    pub valid_throws: u32,
    pub invalid_throws: u32,
    pub total_wall_ball_reps: u32,
    pub current_state: Phase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub athlete_height: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi_box: Option<RoiBox>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Parse one inbound payload. Malformed or unexpectedly shaped documents
/// are dropped with a warning; they never affect the connection.
pub fn parse_update(payload: &str) -> Option<WorkoutUpdate> {
    match serde_json::from_str::<WorkoutUpdate>(payload) {
        Ok(update) => Some(update),
        Err(e) => {
            warn!("Dropping malformed analyzer message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_message_shape() {
        let msg = ClientMessage::Frame {
            data: "aGVsbG8=".into(),
            timestamp: 1_700_000_000_123,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "frame",
                "data": "aGVsbG8=",
                "timestamp": 1_700_000_000_123i64,
            })
        );
    }

    #[test]
    fn test_parse_full_update() {
        let payload = r#"{
            "validSquats": 3, "invalidSquats": 1,
            "validThrows": 2, "invalidThrows": 0,
            "totalWallBallReps": 2,
            "currentState": "throw_window",
            "athleteHeight": 1.82,
            "roiBox": {"x": 10.0, "y": 20.0, "width": 100.0, "height": 150.0},
            "debugInfo": {"hipPosition": 0.42, "throwWindowActive": true}
        }"#;
        let update = parse_update(payload).unwrap();
        assert_eq!(update.total_wall_ball_reps, 2);
        assert_eq!(update.current_state, Phase::ThrowWindow);
        let roi = update.roi_box.unwrap();
        assert_eq!(roi.x, 10.0);
        assert_eq!(roi.height, 150.0);
        assert!(update.debug_info.unwrap().contains_key("hipPosition"));
    }

    #[test]
    fn test_parse_minimal_update() {
        let payload = r#"{
            "validSquats": 0, "invalidSquats": 0,
            "validThrows": 0, "invalidThrows": 0,
            "totalWallBallReps": 0,
            "currentState": "ready"
        }"#;
        let update = parse_update(payload).unwrap();
        assert_eq!(update.current_state, Phase::Ready);
        assert!(update.roi_box.is_none());
        assert!(update.debug_info.is_none());
    }

    #[test]
    fn test_malformed_payloads_are_dropped() {
        assert!(parse_update("not json at all").is_none());
        assert!(parse_update("{}").is_none());
        assert!(parse_update(r#"{"currentState": "moonwalking"}"#).is_none());
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Ready.label(), "Ready");
        assert_eq!(Phase::ThrowWindow.label(), "Throw Ball!");
    }
}
