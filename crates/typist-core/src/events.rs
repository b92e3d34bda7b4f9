use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::SessionSnapshot;

/// Everything a typing session reports to its observers.
///
/// Events are emitted by the session worker (and by the pause/resume/speed
/// commands) in strict session order and consumed by:
/// - The SSE stream (for live UI updates)
/// - The CLI progress printer
/// - Tests asserting on the ordering guarantees
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    // =========================================================================
    // Lifecycle
    // =========================================================================
    /// One second of the pre-typing countdown.
    Countdown { count: u32 },

    /// The first keystroke is about to be sent.
    Started,

    /// The session was paused by a command.
    Paused { chars_typed: usize },

    /// The session was resumed by a command.
    Resumed,

    /// The effective typing speed was changed mid-session.
    SpeedChanged { wpm: f64 },

    // =========================================================================
    // Typing activity
    // =========================================================================
    /// A character position was completed.
    Progress {
        chars_typed: usize,
        total_chars: usize,
        wpm: f64,
        accuracy: f64,
    },

    /// A typo was made (immediately fixed or scheduled for later).
    Typo { typos_made: u64 },

    /// A natural pause between characters.
    NaturalPause { pauses_taken: u64, duration_ms: u64 },

    /// An extended idle gap.
    ZoneOut { duration_ms: u64 },

    /// A short extra delay with no keystroke.
    MicroHesitation { count: u64 },

    /// A draft phrase was typed and deleted.
    AiFiller { fillers_used: u64 },

    /// Deferred typos were backtracked over and retyped.
    CorrectionApplied { corrections: u64 },

    // =========================================================================
    // Terminal
    // =========================================================================
    /// Every character was typed and every correction resolved.
    Complete {
        final_wpm: f64,
        final_accuracy: f64,
        chars_typed: usize,
    },

    /// The session was cancelled.
    Stopped,

    /// The session hit an unrecoverable fault.
    Error { message: String },
}

impl SessionEvent {
    /// Returns a stable event name for logging and SSE.
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::Countdown { .. } => "countdown",
            SessionEvent::Started => "started",
            SessionEvent::Paused { .. } => "paused",
            SessionEvent::Resumed => "resumed",
            SessionEvent::SpeedChanged { .. } => "speed_changed",
            SessionEvent::Progress { .. } => "progress",
            SessionEvent::Typo { .. } => "typo",
            SessionEvent::NaturalPause { .. } => "natural_pause",
            SessionEvent::ZoneOut { .. } => "zone_out",
            SessionEvent::MicroHesitation { .. } => "micro_hesitation",
            SessionEvent::AiFiller { .. } => "ai_filler",
            SessionEvent::CorrectionApplied { .. } => "correction_applied",
            SessionEvent::Complete { .. } => "complete",
            SessionEvent::Stopped => "stopped",
            SessionEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the session's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Complete { .. } | SessionEvent::Stopped | SessionEvent::Error { .. }
        )
    }
}

/// A published event with its ordering metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub session_id: Uuid,
    /// Position in the session's stream, starting at 1.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event: SessionEvent,
}

/// What an observer receives first when it subscribes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadySnapshot {
    pub session: Option<SessionSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        assert_eq!(SessionEvent::Started.event_name(), "started");
        assert_eq!(
            SessionEvent::NaturalPause {
                pauses_taken: 1,
                duration_ms: 400
            }
            .event_name(),
            "natural_pause"
        );
        assert_eq!(SessionEvent::ZoneOut { duration_ms: 3000 }.event_name(), "zone_out");
    }

    #[test]
    fn test_terminal_events() {
        assert!(SessionEvent::Stopped.is_terminal());
        assert!(SessionEvent::Error {
            message: "boom".into()
        }
        .is_terminal());
        assert!(SessionEvent::Complete {
            final_wpm: 60.0,
            final_accuracy: 100.0,
            chars_typed: 19
        }
        .is_terminal());
        assert!(!SessionEvent::Started.is_terminal());
        assert!(!SessionEvent::Typo { typos_made: 1 }.is_terminal());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = SessionEvent::Progress {
            chars_typed: 3,
            total_chars: 19,
            wpm: 61.5,
            accuracy: 100.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["chars_typed"], 3);
        assert_eq!(json["total_chars"], 19);
    }

    #[test]
    fn test_unit_variant_serialization() {
        let json = serde_json::to_string(&SessionEvent::Stopped).unwrap();
        assert_eq!(json, r#"{"type":"stopped"}"#);
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SessionEvent::Stopped);
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = EventEnvelope {
            session_id: Uuid::new_v4(),
            seq: 7,
            timestamp: Utc::now(),
            event: SessionEvent::Typo { typos_made: 2 },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["event"]["type"], "typo");
        assert_eq!(json["event"]["typos_made"], 2);
    }
}
