//! Calibration: derive a Custom profile from a measured typing sample.
//!
//! The user types a reference passage; mismatches against it give the
//! accuracy, and the elapsed time gives the speed. The derived profile is
//! centred on the measured speed and saved as the Custom profile.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use typist_core::config::CalibrationConfig;
use typist_core::error::{Result, TypistError};
use typist_core::types::{Profile, SessionState, CHARS_PER_WORD, MAX_WPM, MIN_WPM};
use typist_storage::ProfileStore;

/// Running totals after an input update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub typed: usize,
    pub errors: usize,
    /// Accuracy over the characters typed so far.
    pub accuracy: f64,
    /// True once the input covers the whole reference passage.
    pub complete: bool,
    /// Set by the input that completed the measurement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CalibrationResult>,
}

/// Outcome of a completed measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub wpm: f64,
    pub accuracy: f64,
    pub elapsed_secs: f64,
    pub derived_profile: Profile,
}

/// One measurement against a reference passage.
#[derive(Debug)]
pub struct CalibrationTester {
    id: Uuid,
    reference: Vec<char>,
    started: Option<Instant>,
    finished: Option<Instant>,
    typed: usize,
    errors: usize,
}

impl CalibrationTester {
    pub fn new(reference: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference: reference.chars().collect(),
            started: None,
            finished: None,
            typed: 0,
            errors: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn reference(&self) -> String {
        self.reference.iter().collect()
    }

    /// Start the clock and clear any previous input.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.finished = None;
        self.typed = 0;
        self.errors = 0;
    }

    /// Diff the full input so far against the reference.
    ///
    /// The clock stops once the input is at least as long as the reference.
    pub fn on_input(&mut self, partial: &str) -> Result<CalibrationProgress> {
        if self.started.is_none() {
            return Err(TypistError::InvalidState {
                command: "record calibration input",
                state: SessionState::Idle,
            });
        }
        let (typed, errors) = count_mismatches(&self.reference, partial);
        self.typed = typed;
        self.errors = errors;

        let complete = typed >= self.reference.len();
        if complete && self.finished.is_none() {
            self.finished = Some(Instant::now());
        }

        let accuracy = if typed == 0 {
            100.0
        } else {
            (((typed - errors.min(typed)) as f64 / typed as f64) * 100.0).round()
        };
        Ok(CalibrationProgress {
            typed,
            errors,
            accuracy,
            complete,
            result: None,
        })
    }

    /// Compute the result from the input recorded so far.
    pub fn complete(&self, max_typo_chance: f64) -> Result<CalibrationResult> {
        let Some(started) = self.started else {
            return Err(TypistError::InvalidState {
                command: "complete calibration",
                state: SessionState::Idle,
            });
        };
        let end = self.finished.unwrap_or_else(Instant::now);
        measure(
            self.reference.len(),
            self.typed,
            self.errors,
            end.saturating_duration_since(started),
            max_typo_chance,
        )
    }
}

/// Characters typed and mismatches against `reference`. Characters past the
/// end of the reference count as mismatches.
fn count_mismatches(reference: &[char], partial: &str) -> (usize, usize) {
    let mut typed = 0;
    let mut errors = 0;
    for (i, ch) in partial.chars().enumerate() {
        typed += 1;
        if reference.get(i) != Some(&ch) {
            errors += 1;
        }
    }
    (typed, errors)
}

/// Derive speed, accuracy and a Custom profile from raw measurements.
pub fn measure(
    reference_len: usize,
    typed: usize,
    errors: usize,
    elapsed: Duration,
    max_typo_chance: f64,
) -> Result<CalibrationResult> {
    if elapsed.is_zero() {
        return Err(TypistError::InvalidMeasurement("zero elapsed time".into()));
    }
    if reference_len == 0 {
        return Err(TypistError::InvalidMeasurement("empty reference passage".into()));
    }
    let words = typed as f64 / CHARS_PER_WORD;
    let minutes = elapsed.as_secs_f64() / 60.0;
    let wpm = (words / minutes).round();
    if typed == 0 || wpm <= 0.0 {
        return Err(TypistError::InvalidMeasurement("no words typed".into()));
    }

    let correct = reference_len.saturating_sub(errors) as f64;
    let accuracy = ((correct / reference_len as f64) * 100.0).round().clamp(0.0, 100.0);

    let mut profile = Profile::default_custom();
    profile.retarget_wpm(wpm.clamp(MIN_WPM, MAX_WPM));
    let error_rate = (100.0 - accuracy) / 100.0;
    profile.typo_chance = error_rate.min(max_typo_chance.clamp(0.0, 1.0));
    profile.typos_enabled = profile.typo_chance > 0.0;

    Ok(CalibrationResult {
        wpm,
        accuracy,
        elapsed_secs: elapsed.as_secs_f64(),
        derived_profile: profile,
    })
}

/// Holds at most one outstanding measurement and saves its result.
pub struct CalibrationService {
    config: CalibrationConfig,
    profiles: Arc<ProfileStore>,
    active: Mutex<Option<CalibrationTester>>,
}

impl CalibrationService {
    pub fn new(config: CalibrationConfig, profiles: Arc<ProfileStore>) -> Self {
        Self {
            config,
            profiles,
            active: Mutex::new(None),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<CalibrationTester>>> {
        self.active
            .lock()
            .map_err(|e| TypistError::Internal(format!("Calibration mutex poisoned: {}", e)))
    }

    /// Begin a measurement and return the passage to type.
    pub fn start(&self) -> Result<String> {
        let mut active = self.lock()?;
        if let Some(tester) = active.as_ref() {
            return Err(TypistError::Busy(tester.id()));
        }
        let mut tester = CalibrationTester::new(&self.config.reference_passage);
        tester.start();
        let reference = tester.reference();
        info!(calibration_id = %tester.id(), chars = reference.chars().count(), "Calibration started");
        *active = Some(tester);
        Ok(reference)
    }

    /// Record everything typed so far.
    ///
    /// Input covering the whole passage completes the measurement: the
    /// Custom profile is saved and the result is returned with the progress.
    pub fn input(&self, partial: &str) -> Result<CalibrationProgress> {
        let mut active = self.lock()?;
        let tester = active.as_mut().ok_or(TypistError::InvalidState {
            command: "record calibration input",
            state: SessionState::Idle,
        })?;
        let mut progress = tester.on_input(partial)?;
        let finished = if progress.complete { active.take() } else { None };
        drop(active);
        if let Some(tester) = finished {
            progress.result = Some(self.finish(tester)?);
        }
        Ok(progress)
    }

    /// Finish the measurement and save the derived Custom profile.
    ///
    /// The measurement is discarded either way; a failed one must be re-run.
    pub fn complete(&self) -> Result<CalibrationResult> {
        let tester = self.lock()?.take().ok_or(TypistError::InvalidState {
            command: "complete calibration",
            state: SessionState::Idle,
        })?;
        self.finish(tester)
    }

    fn finish(&self, tester: CalibrationTester) -> Result<CalibrationResult> {
        let mut result = tester.complete(self.config.max_typo_chance)?;
        result.derived_profile = self.profiles.save_custom(result.derived_profile)?;
        info!(
            calibration_id = %tester.id(),
            wpm = result.wpm,
            accuracy = result.accuracy,
            "Calibration completed"
        );
        Ok(result)
    }

    /// Discard the outstanding measurement. Returns whether one existed.
    pub fn cancel(&self) -> Result<bool> {
        Ok(self.lock()?.take().is_some())
    }

    pub fn is_active(&self) -> bool {
        self.lock().map(|a| a.is_some()).unwrap_or(false)
    }
}

impl std::fmt::Debug for CalibrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationService")
            .field("active", &self.is_active())
            .finish()
    }
}
