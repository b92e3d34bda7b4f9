//! Session request resolution and live WPM measurement.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use typist_core::config::EngineConfig;
use typist_core::error::{Result, TypistError};
use typist_core::types::{
    DelayedCorrection, LastUsedSettings, Profile, SessionOverrides, CHARS_PER_WORD, MAX_WPM,
    MIN_WPM,
};
use typist_storage::ProfileStore;

/// Per-session settings that are not part of the profile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionOptions {
    /// Seconds of countdown before the first keystroke.
    pub countdown_secs: u32,
    /// Present when typos are fixed later rather than immediately.
    pub delayed_correction: Option<DelayedCorrection>,
}

impl SessionOptions {
    /// Hesitation before a delayed correction starts backtracking, if configured.
    pub fn correction_hesitation(&self) -> Option<Duration> {
        self.delayed_correction
            .as_ref()
            .filter(|d| d.delay_seconds > 0.0)
            .map(|d| Duration::from_secs_f64(d.delay_seconds))
    }
}

/// A start request as callers express it: a profile name plus overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub profile_name: String,
    #[serde(default)]
    pub overrides: SessionOverrides,
}

impl SessionRequest {
    pub fn new(profile_name: impl Into<String>) -> Self {
        Self {
            profile_name: profile_name.into(),
            overrides: SessionOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: SessionOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Resolve the profile by name and apply the overrides.
    ///
    /// Unknown profile names and malformed overrides are validation errors.
    pub fn resolve(
        &self,
        store: &ProfileStore,
        defaults: &EngineConfig,
    ) -> Result<(Profile, SessionOptions)> {
        let mut profile = store.get(&self.profile_name).map_err(|e| match e {
            TypistError::NotFound(_) => {
                TypistError::Validation(format!("unknown profile: {}", self.profile_name))
            }
            other => other,
        })?;

        let o = &self.overrides;
        if let Some(wpm) = o.custom_wpm {
            if !wpm.is_finite() || wpm <= 0.0 {
                return Err(TypistError::Validation(format!(
                    "custom_wpm must be a positive number, got {}",
                    wpm
                )));
            }
            profile.retarget_wpm(wpm.clamp(MIN_WPM, MAX_WPM));
        }
        if let Some(enabled) = o.typos_enabled {
            profile.typos_enabled = enabled;
        }
        if let Some(enabled) = o.ai_filler_enabled {
            profile.ai_filler_enabled = enabled;
        }
        if let Some(frequency) = o.pause_frequency {
            profile.pause_frequency = frequency;
        }
        profile.validate()?;

        let delayed_correction = match &o.delayed_correction {
            Some(d) if d.enabled => {
                if !d.delay_seconds.is_finite() || d.delay_seconds < 0.0 {
                    return Err(TypistError::Validation(format!(
                        "delay_seconds must be zero or positive, got {}",
                        d.delay_seconds
                    )));
                }
                Some(d.clone())
            }
            _ => None,
        };

        let options = SessionOptions {
            countdown_secs: o.countdown_secs.unwrap_or(defaults.countdown_secs),
            delayed_correction,
        };
        Ok((profile, options))
    }

    pub fn to_last_used(&self) -> LastUsedSettings {
        LastUsedSettings {
            profile_name: self.profile_name.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

/// Rolling words-per-minute over a window of active typing time.
#[derive(Debug)]
pub struct WpmTracker {
    window: Duration,
    samples: VecDeque<(Duration, usize)>,
}

impl WpmTracker {
    pub fn new(window: Duration) -> Self {
        let mut samples = VecDeque::new();
        samples.push_back((Duration::ZERO, 0));
        Self { window, samples }
    }

    /// Record `chars` typed after `active` time and return the current rate.
    pub fn record(&mut self, active: Duration, chars: usize) -> f64 {
        self.samples.push_back((active, chars));
        while self.samples.len() > 2 && active.saturating_sub(self.samples[1].0) >= self.window {
            self.samples.pop_front();
        }
        self.current()
    }

    pub fn current(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => {
                wpm_between(last.1.saturating_sub(first.1), last.0.saturating_sub(first.0))
            }
            _ => 0.0,
        }
    }
}

/// Words per minute for `chars` over `elapsed`, to one decimal place.
pub fn wpm_between(chars: usize, elapsed: Duration) -> f64 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes <= 0.0 {
        return 0.0;
    }
    let wpm = (chars as f64 / CHARS_PER_WORD) / minutes;
    (wpm * 10.0).round() / 10.0
}
