//! Typist Engine crate - the typing session engine and its collaborators.
//!
//! A session converts a block of text and a behavioural profile into a timed
//! stream of keystrokes. The `SessionEngine` owns the session state machine
//! and runs each session on its own worker task; the `CadenceGenerator`
//! decides delays, typos, pauses and fillers; the `CorrectionQueue` schedules
//! delayed fixes; the `EventPublisher` fans events out to observers. The
//! `CalibrationService` derives a Custom profile from a measured typing test.

pub mod cadence;
pub mod calibration;
pub mod corrections;
pub mod engine;
pub mod provider;
pub mod publisher;
pub mod session;
pub mod state;
pub mod text_inject;
mod worker;

pub use cadence::{CadenceAction, CadenceGenerator, CadenceStep, TickContext};
pub use calibration::{CalibrationProgress, CalibrationResult, CalibrationService, CalibrationTester};
pub use corrections::{CorrectionQueue, MAX_PENDING_CORRECTIONS};
pub use engine::SessionEngine;
pub use provider::{fetch_text, StaticTextProvider, TextProvider};
pub use publisher::{EventPublisher, Subscription};
pub use session::{SessionOptions, SessionRequest, WpmTracker};
pub use text_inject::{
    ConsoleInjector, Keystroke, KeystrokeInjector, RecordingInjector, SendInputInjector,
};
