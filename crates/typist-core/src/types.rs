use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TypistError};

/// Lowest speed accepted by `update_speed`, in words per minute.
pub const MIN_WPM: f64 = 20.0;
/// Highest speed accepted by `update_speed`, in words per minute.
pub const MAX_WPM: f64 = 500.0;
/// Characters per word for every WPM figure in the system.
pub const CHARS_PER_WORD: f64 = 5.0;
/// Fraction of the centre delay used on each side when a profile is derived from a WPM.
pub const WPM_DELAY_SPREAD: f64 = 0.2;

/// Name of the single mutable profile.
pub const CUSTOM_PROFILE: &str = "Custom";

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle state of a typing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, not yet started.
    Idle,
    /// Counting down before the first keystroke.
    Starting,
    /// Worker is emitting keystrokes.
    Typing,
    /// Suspended by `pause`; the in-flight delay is preserved.
    Paused,
    /// Every character is typed; outstanding corrections are being resolved.
    Completing,
    /// Finished normally.
    Completed,
    /// Cancelled by `stop`.
    Stopped,
    /// Aborted by an unrecoverable fault.
    Error,
}

impl SessionState {
    /// Terminal states accept no further commands.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Stopped | SessionState::Error
        )
    }

    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;
        match (self, target) {
            (Idle, Starting)
            | (Starting, Typing)
            | (Typing, Paused)
            | (Paused, Typing)
            | (Typing, Completing)
            | (Completing, Completed)
            | (Starting, Stopped)
            | (Typing, Stopped)
            | (Paused, Stopped)
            | (Completing, Stopped) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Typing => write!(f, "typing"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Completing => write!(f, "completing"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Stopped => write!(f, "stopped"),
            SessionState::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Profile
// =============================================================================

/// A named bundle of timing and behaviour parameters for the cadence generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    /// Lower bound of the per-character delay, in milliseconds.
    pub min_delay_ms: u64,
    /// Upper bound of the per-character delay, in milliseconds.
    pub max_delay_ms: u64,
    pub typos_enabled: bool,
    /// Per-character typo probability.
    pub typo_chance: f64,
    /// Average characters between natural pauses. Zero disables them.
    pub pause_frequency: u32,
    pub ai_filler_enabled: bool,
    pub micro_hesitations_enabled: bool,
    pub zone_out_enabled: bool,
    /// Fractional jitter applied around the base delay.
    pub burst_variability: f64,
    /// Per-character probability of a zone-out when enabled.
    pub zone_out_chance: f64,
    /// Per-character probability of a micro-hesitation when enabled.
    pub micro_hesitation_chance: f64,
}

impl Default for Profile {
    fn default() -> Self {
        Self::medium()
    }
}

impl Profile {
    pub fn slow() -> Self {
        Self {
            name: "Slow".to_string(),
            min_delay_ms: 280,
            max_delay_ms: 400,
            typo_chance: 0.04,
            pause_frequency: 40,
            burst_variability: 0.25,
            ..Self::base()
        }
    }

    pub fn medium() -> Self {
        Self {
            name: "Medium".to_string(),
            min_delay_ms: 160,
            max_delay_ms: 240,
            typo_chance: 0.03,
            pause_frequency: 60,
            burst_variability: 0.2,
            ..Self::base()
        }
    }

    pub fn fast() -> Self {
        Self {
            name: "Fast".to_string(),
            min_delay_ms: 110,
            max_delay_ms: 160,
            typo_chance: 0.02,
            pause_frequency: 80,
            burst_variability: 0.15,
            ..Self::base()
        }
    }

    pub fn lightning() -> Self {
        Self {
            name: "Lightning".to_string(),
            min_delay_ms: 65,
            max_delay_ms: 95,
            typo_chance: 0.01,
            pause_frequency: 120,
            burst_variability: 0.1,
            ..Self::base()
        }
    }

    /// The four fixed profiles, slowest first.
    pub fn builtins() -> Vec<Profile> {
        vec![Self::slow(), Self::medium(), Self::fast(), Self::lightning()]
    }

    /// Initial value of the mutable profile before anything is saved.
    pub fn default_custom() -> Self {
        Self {
            name: CUSTOM_PROFILE.to_string(),
            ..Self::medium()
        }
    }

    fn base() -> Self {
        Self {
            name: String::new(),
            min_delay_ms: 160,
            max_delay_ms: 240,
            typos_enabled: true,
            typo_chance: 0.03,
            pause_frequency: 60,
            ai_filler_enabled: false,
            micro_hesitations_enabled: true,
            zone_out_enabled: true,
            burst_variability: 0.2,
            zone_out_chance: 0.005,
            micro_hesitation_chance: 0.02,
        }
    }

    /// Check the numeric invariants.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TypistError::Validation("profile name must not be empty".into()));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(TypistError::Validation(format!(
                "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        for (field, value) in [
            ("typo_chance", self.typo_chance),
            ("zone_out_chance", self.zone_out_chance),
            ("micro_hesitation_chance", self.micro_hesitation_chance),
            ("burst_variability", self.burst_variability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TypistError::Validation(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    field, value
                )));
            }
        }
        Ok(())
    }

    /// Recentre the delay bounds on the per-character delay implied by `wpm`.
    pub fn retarget_wpm(&mut self, wpm: f64) {
        let center = delay_for_wpm(wpm);
        self.min_delay_ms = (center * (1.0 - WPM_DELAY_SPREAD)).round() as u64;
        self.max_delay_ms = (center * (1.0 + WPM_DELAY_SPREAD)).round() as u64;
    }

    /// Words per minute implied by the midpoint of the delay bounds.
    pub fn nominal_wpm(&self) -> f64 {
        let mid = (self.min_delay_ms + self.max_delay_ms) as f64 / 2.0;
        if mid <= 0.0 {
            return MAX_WPM;
        }
        60_000.0 / (mid * CHARS_PER_WORD)
    }
}

/// Per-character delay in milliseconds for a given typing speed.
pub fn delay_for_wpm(wpm: f64) -> f64 {
    60_000.0 / (wpm * CHARS_PER_WORD)
}

/// Profile listing entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub builtin: bool,
    #[serde(flatten)]
    pub profile: Profile,
}

// =============================================================================
// Session request types
// =============================================================================

/// Delayed correction settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayedCorrection {
    pub enabled: bool,
    /// Hesitation before the backtrack starts, in seconds.
    pub delay_seconds: f64,
}

/// Per-session adjustments applied on top of a resolved profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOverrides {
    pub custom_wpm: Option<f64>,
    pub typos_enabled: Option<bool>,
    pub ai_filler_enabled: Option<bool>,
    pub pause_frequency: Option<u32>,
    pub delayed_correction: Option<DelayedCorrection>,
    pub countdown_secs: Option<u32>,
}

/// Settings recorded after each start so the next run can reuse them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LastUsedSettings {
    pub profile_name: String,
    #[serde(default)]
    pub overrides: SessionOverrides,
}

// =============================================================================
// Corrections
// =============================================================================

/// A typo whose fix is deferred until typing reaches `scheduled_fix_at_char_index`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionTask {
    pub wrong_fragment: String,
    pub correct_fragment: String,
    pub inserted_at_char_index: usize,
    pub scheduled_fix_at_char_index: usize,
}

impl CorrectionTask {
    /// Number of characters occupied by the fragment in the typed text.
    pub fn len(&self) -> usize {
        self.correct_fragment.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.correct_fragment.is_empty()
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Counters maintained by the session worker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub chars_typed: usize,
    pub total_chars: usize,
    pub typos_made: u64,
    pub pauses_taken: u64,
    pub micro_hesitations: u64,
    pub ai_fillers_used: u64,
    pub zone_outs: u64,
    pub corrections_applied: u64,
    pub pending_corrections: usize,
    pub current_wpm: f64,
}

impl SessionCounters {
    pub fn new(total_chars: usize) -> Self {
        Self {
            total_chars,
            ..Self::default()
        }
    }

    /// Share of typed characters that were not typos, rounded to a percentage.
    pub fn accuracy(&self) -> f64 {
        if self.chars_typed == 0 {
            return 100.0;
        }
        let typed = self.chars_typed as f64;
        (((typed - self.typos_made as f64) / typed) * 100.0)
            .round()
            .clamp(0.0, 100.0)
    }
}

/// Point-in-time view of a session, returned by `status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub state: SessionState,
    pub profile_name: String,
    #[serde(flatten)]
    pub counters: SessionCounters,
    pub accuracy: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}
