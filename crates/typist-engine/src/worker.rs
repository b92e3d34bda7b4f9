//! The per-session worker task.
//!
//! Drives the cadence generator in a timed loop, performs keystrokes through
//! the injector, maintains the session counters and publishes events. The
//! only suspension point is `suspend`, which races the delay against the
//! session's control signal so pause and stop are observed promptly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};

use typist_core::error::TypistError;
use typist_core::events::SessionEvent;
use typist_core::types::{CorrectionTask, Profile, SessionCounters, SessionState};

use crate::cadence::{CadenceAction, CadenceGenerator, TickContext};
use crate::corrections::{plan_backtrack, CorrectionQueue};
use crate::engine::SessionShared;
use crate::session::{wpm_between, SessionOptions, WpmTracker};
use crate::text_inject::{Keystroke, KeystrokeInjector};

/// Why the worker stopped before completing.
#[derive(Debug)]
enum Interrupt {
    Cancelled,
    Failed(TypistError),
}

impl From<TypistError> for Interrupt {
    fn from(err: TypistError) -> Self {
        Interrupt::Failed(err)
    }
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

pub(crate) struct Worker {
    shared: Arc<SessionShared>,
    injector: Arc<dyn KeystrokeInjector>,
    cadence: CadenceGenerator,
    corrections: CorrectionQueue,
    wpm: WpmTracker,
    signal: watch::Receiver<u64>,
    options: SessionOptions,
    position: usize,
    filler_done: bool,
    filler_len: usize,
    typing_started: Instant,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<SessionShared>,
        injector: Arc<dyn KeystrokeInjector>,
        cadence: CadenceGenerator,
        options: SessionOptions,
        wpm_window: Duration,
    ) -> Self {
        let signal = shared.signal.subscribe();
        Self {
            shared,
            injector,
            cadence,
            corrections: CorrectionQueue::new(),
            wpm: WpmTracker::new(wpm_window),
            signal,
            options,
            position: 0,
            filler_done: false,
            filler_len: 0,
            typing_started: Instant::now(),
        }
    }

    pub(crate) async fn run(mut self) {
        let outcome = self.drive().await;
        self.finish(outcome);
    }

    async fn drive(&mut self) -> Result<(), Interrupt> {
        for count in (1..=self.options.countdown_secs).rev() {
            self.emit(SessionEvent::Countdown { count })?;
            self.suspend(Duration::from_secs(1)).await?;
        }

        self.enter(SessionState::Typing, SessionEvent::Started)?;
        self.typing_started = Instant::now();

        let total = self.shared.text.len();
        while self.position < total {
            let due = self.corrections.take_due(self.position);
            if !due.is_empty() {
                self.apply_corrections(due).await?;
            }
            self.tick().await?;
            self.report_progress()?;
        }

        self.begin_completing().await?;
        let outstanding = self.corrections.drain_all();
        if !outstanding.is_empty() {
            self.apply_corrections(outstanding).await?;
        }
        self.complete()
    }

    async fn tick(&mut self) -> Result<(), Interrupt> {
        let profile = self.profile()?;
        let shared = Arc::clone(&self.shared);
        let ctx = TickContext {
            text: &shared.text,
            position: self.position,
            delayed_correction: self.options.delayed_correction.is_some(),
            correction_slots_free: !self.corrections.is_full(),
            filler_pending: !self.filler_done && self.position == 0,
        };
        let step = self.cadence.next_step(&profile, &ctx);

        self.suspend(millis(step.delay_ms)).await?;
        for action in step.actions {
            self.perform(action, &profile).await?;
        }
        Ok(())
    }

    async fn perform(&mut self, action: CadenceAction, profile: &Profile) -> Result<(), Interrupt> {
        match action {
            CadenceAction::TypeChar => {
                self.inject(Keystroke::Char(self.current_char()))?;
                self.advance(1)?;
            }
            CadenceAction::TypeTypoThenFix { wrong, reaction_ms } => {
                let correct = self.current_char();
                self.inject(Keystroke::Char(wrong))?;
                self.record_typo()?;
                self.suspend(millis(reaction_ms)).await?;
                self.inject(Keystroke::Backspace)?;
                self.inject(Keystroke::Char(correct))?;
                self.advance(1)?;
            }
            CadenceAction::TypeTypoThenScheduleFix {
                wrong_fragment,
                correct_fragment,
                lookahead,
            } => {
                for (i, ch) in wrong_fragment.chars().enumerate() {
                    if i > 0 {
                        let delay = self.cadence.keystroke_delay(profile);
                        self.suspend(millis(delay)).await?;
                    }
                    self.inject(Keystroke::Char(ch))?;
                }
                self.record_typo()?;

                let len = correct_fragment.chars().count();
                let total = self.shared.text.len();
                let task = CorrectionTask {
                    wrong_fragment,
                    correct_fragment,
                    inserted_at_char_index: self.position,
                    scheduled_fix_at_char_index: (self.position + len + lookahead).min(total),
                };
                let queued = self.corrections.push(task.clone());
                self.advance(len)?;
                if !queued {
                    self.apply_corrections(vec![task]).await?;
                }
            }
            CadenceAction::NaturalPause { duration_ms } => {
                let pauses_taken = self.update_counters(|c| {
                    c.pauses_taken += 1;
                    c.pauses_taken
                })?;
                self.emit(SessionEvent::NaturalPause {
                    pauses_taken,
                    duration_ms,
                })?;
                self.suspend(millis(duration_ms)).await?;
            }
            CadenceAction::ZoneOut { duration_ms } => {
                self.update_counters(|c| c.zone_outs += 1)?;
                self.emit(SessionEvent::ZoneOut { duration_ms })?;
                self.suspend(millis(duration_ms)).await?;
            }
            CadenceAction::MicroHesitation { duration_ms } => {
                let count = self.update_counters(|c| {
                    c.micro_hesitations += 1;
                    c.micro_hesitations
                })?;
                self.emit(SessionEvent::MicroHesitation { count })?;
                self.suspend(millis(duration_ms)).await?;
            }
            CadenceAction::AiFillerBegin { phrase } => {
                self.filler_done = true;
                for ch in phrase.chars() {
                    let delay = self.cadence.keystroke_delay(profile);
                    self.suspend(millis(delay)).await?;
                    self.inject(Keystroke::Char(ch))?;
                    self.filler_len += 1;
                }
            }
            CadenceAction::AiFillerEnd { pause_ms } => {
                self.suspend(millis(pause_ms)).await?;
                while self.filler_len > 0 {
                    let delay = self.cadence.backspace_delay(profile);
                    self.suspend(millis(delay)).await?;
                    self.inject(Keystroke::Backspace)?;
                    self.filler_len -= 1;
                }
                let fillers_used = self.update_counters(|c| {
                    c.ai_fillers_used += 1;
                    c.ai_fillers_used
                })?;
                self.emit(SessionEvent::AiFiller { fillers_used })?;
            }
        }
        Ok(())
    }

    /// Backtrack over `tasks` and retype the text after the first one.
    async fn apply_corrections(&mut self, tasks: Vec<CorrectionTask>) -> Result<(), Interrupt> {
        let Some(plan) = plan_backtrack(&tasks, self.position) else {
            return Ok(());
        };
        let profile = self.profile()?;

        let hesitation = match self.options.correction_hesitation() {
            Some(delay) => delay,
            None => millis(self.cadence.typo_reaction_ms()),
        };
        self.suspend(hesitation).await?;

        for _ in 0..plan.backspaces {
            let delay = self.cadence.backspace_delay(&profile);
            self.suspend(millis(delay)).await?;
            self.inject(Keystroke::Backspace)?;
        }

        let shared = Arc::clone(&self.shared);
        for &ch in &shared.text[plan.retype_from..self.position] {
            let delay = self.cadence.keystroke_delay(&profile);
            self.suspend(millis(delay)).await?;
            self.inject(Keystroke::Char(ch))?;
        }

        let pending = self.corrections.len();
        let fixed = tasks.len() as u64;
        let corrections = self.update_counters(|c| {
            c.corrections_applied += fixed;
            c.pending_corrections = pending;
            c.corrections_applied
        })?;
        debug!(
            session_id = %self.shared.id,
            backspaces = plan.backspaces,
            retype_from = plan.retype_from,
            "Delayed correction applied"
        );
        self.emit(SessionEvent::CorrectionApplied { corrections })
    }

    async fn begin_completing(&mut self) -> Result<(), Interrupt> {
        loop {
            self.wait_while_paused().await?;
            let mut control = self.shared.control()?;
            if control.cancelled {
                return Err(Interrupt::Cancelled);
            }
            if control.state == SessionState::Paused {
                continue;
            }
            control.transition(SessionState::Completing)?;
            return Ok(());
        }
    }

    fn complete(&mut self) -> Result<(), Interrupt> {
        let active = self.active_time()?;
        let final_wpm = wpm_between(self.position, active);
        let (chars_typed, final_accuracy) = self.update_counters(|c| {
            c.current_wpm = final_wpm;
            c.pending_corrections = 0;
            (c.chars_typed, c.accuracy())
        })?;
        self.enter(
            SessionState::Completed,
            SessionEvent::Complete {
                final_wpm,
                final_accuracy,
                chars_typed,
            },
        )?;
        info!(
            session_id = %self.shared.id,
            chars_typed,
            final_wpm,
            final_accuracy,
            "Typing session completed"
        );
        Ok(())
    }

    /// Publish the single terminal event for an interrupted session.
    fn finish(&self, outcome: Result<(), Interrupt>) {
        let id = self.shared.id;
        let failure = match outcome {
            Ok(()) => return,
            Err(Interrupt::Cancelled) => None,
            Err(Interrupt::Failed(e)) => Some(e),
        };

        let mut control = match self.shared.control() {
            Ok(control) => control,
            Err(e) => {
                error!(session_id = %id, "Cannot finalise session: {}", e);
                return;
            }
        };
        if control.state.is_terminal() {
            return;
        }

        match failure {
            Some(e) if !control.cancelled => {
                let message = e.to_string();
                error!(session_id = %id, chars_typed = self.position, "Typing session failed: {}", message);
                control.error = Some(message.clone());
                if control.transition(SessionState::Error).is_ok() {
                    self.shared
                        .publish(&mut control, SessionEvent::Error { message });
                }
            }
            _ => {
                if control.transition(SessionState::Stopped).is_ok() {
                    self.shared.publish(&mut control, SessionEvent::Stopped);
                    info!(session_id = %id, chars_typed = self.position, "Typing session stopped");
                }
            }
        }
    }

    // =========================================================================
    // Suspension
    // =========================================================================

    /// Sleep for `delay` of unpaused time. Time already slept is kept across
    /// a pause, and the pause flag is checked again once the delay elapses.
    async fn suspend(&mut self, delay: Duration) -> Result<(), Interrupt> {
        if delay.is_zero() {
            // Zero-delay profiles must still let commands run between keystrokes.
            tokio::task::yield_now().await;
        }
        let mut remaining = delay;
        loop {
            self.wait_while_paused().await?;
            if remaining.is_zero() {
                return Ok(());
            }
            let slept_from = Instant::now();
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {
                    remaining = Duration::ZERO;
                }
                _ = self.signal.changed() => {
                    remaining = remaining.saturating_sub(slept_from.elapsed());
                }
            }
        }
    }

    async fn wait_while_paused(&mut self) -> Result<(), Interrupt> {
        loop {
            self.signal.borrow_and_update();
            {
                let control = self.shared.control()?;
                if control.cancelled {
                    return Err(Interrupt::Cancelled);
                }
                if control.state != SessionState::Paused {
                    return Ok(());
                }
            }
            if self.signal.changed().await.is_err() {
                return Err(Interrupt::Cancelled);
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn current_char(&self) -> char {
        self.shared.text[self.position]
    }

    fn inject(&self, keystroke: Keystroke) -> Result<(), Interrupt> {
        if self.shared.control()?.cancelled {
            return Err(Interrupt::Cancelled);
        }
        self.injector.send(keystroke)?;
        Ok(())
    }

    fn advance(&mut self, chars: usize) -> Result<(), Interrupt> {
        self.position += chars;
        let position = self.position;
        let pending = self.corrections.len();
        self.update_counters(|c| {
            c.chars_typed = position;
            c.pending_corrections = pending;
        })
    }

    fn record_typo(&self) -> Result<(), Interrupt> {
        let typos_made = self.update_counters(|c| {
            c.typos_made += 1;
            c.typos_made
        })?;
        self.emit(SessionEvent::Typo { typos_made })
    }

    fn report_progress(&mut self) -> Result<(), Interrupt> {
        let active = self.active_time()?;
        let wpm = self.wpm.record(active, self.position);
        let (chars_typed, total_chars, accuracy) = self.update_counters(|c| {
            c.current_wpm = wpm;
            (c.chars_typed, c.total_chars, c.accuracy())
        })?;
        self.emit(SessionEvent::Progress {
            chars_typed,
            total_chars,
            wpm,
            accuracy,
        })
    }

    /// Typing time since `Started`, excluding time spent paused.
    fn active_time(&self) -> Result<Duration, Interrupt> {
        let paused = self.shared.control()?.paused_duration();
        Ok(self.typing_started.elapsed().saturating_sub(paused))
    }

    fn profile(&self) -> Result<Profile, Interrupt> {
        Ok(self.shared.control()?.profile.clone())
    }

    fn update_counters<T>(&self, f: impl FnOnce(&mut SessionCounters) -> T) -> Result<T, Interrupt> {
        let mut counters = self.shared.counters()?;
        Ok(f(&mut counters))
    }

    /// Publish `event` unless the session has been cancelled.
    fn emit(&self, event: SessionEvent) -> Result<(), Interrupt> {
        let mut control = self.shared.control()?;
        if control.cancelled {
            return Err(Interrupt::Cancelled);
        }
        self.shared.publish(&mut control, event);
        Ok(())
    }

    /// Transition to `state` and publish `event` atomically.
    fn enter(&self, state: SessionState, event: SessionEvent) -> Result<(), Interrupt> {
        let mut control = self.shared.control()?;
        if control.cancelled {
            return Err(Interrupt::Cancelled);
        }
        control.transition(state)?;
        self.shared.publish(&mut control, event);
        Ok(())
    }
}
