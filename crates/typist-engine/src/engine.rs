//! Session engine managing the typing-session lifecycle.
//!
//! The `SessionEngine` owns at most one non-terminal session at a time. The
//! session's keystrokes are produced by a worker task spawned on the Tokio
//! runtime, so command callers are never blocked behind a character delay.
//! Commands (`pause`, `resume`, `update_speed`, `stop`) mutate the session's
//! control block and wake the worker through a `watch` signal.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};
use uuid::Uuid;

use typist_core::config::{CadenceConfig, EngineConfig, TypistConfig};
use typist_core::error::{Result, TypistError};
use typist_core::events::{EventEnvelope, ReadySnapshot, SessionEvent};
use typist_core::types::{
    Profile, SessionCounters, SessionSnapshot, SessionState, MAX_WPM, MIN_WPM,
};

use crate::cadence::CadenceGenerator;
use crate::publisher::{EventPublisher, Subscription};
use crate::session::SessionOptions;
use crate::state::ControlBlock;
use crate::text_inject::KeystrokeInjector;
use crate::worker::Worker;

/// State shared between a session's worker and the engine.
pub(crate) struct SessionShared {
    pub(crate) id: Uuid,
    pub(crate) text: Vec<char>,
    pub(crate) profile_name: String,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) signal: watch::Sender<u64>,
    control: Mutex<ControlBlock>,
    /// Written only by the worker.
    counters: Mutex<SessionCounters>,
    publisher: Arc<EventPublisher>,
}

impl SessionShared {
    pub(crate) fn control(&self) -> Result<MutexGuard<'_, ControlBlock>> {
        self.control
            .lock()
            .map_err(|e| TypistError::Internal(format!("Session control mutex poisoned: {}", e)))
    }

    pub(crate) fn counters(&self) -> Result<MutexGuard<'_, SessionCounters>> {
        self.counters
            .lock()
            .map_err(|e| TypistError::Internal(format!("Session counters mutex poisoned: {}", e)))
    }

    /// Wake the worker after a control change.
    pub(crate) fn notify(&self) {
        self.signal.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Publish under the control lock so events keep session order.
    pub(crate) fn publish(&self, control: &mut ControlBlock, event: SessionEvent) {
        control.seq += 1;
        trace!(session_id = %self.id, seq = control.seq, event = event.event_name(), "Session event");
        self.publisher.publish(EventEnvelope {
            session_id: self.id,
            seq: control.seq,
            timestamp: Utc::now(),
            event,
        });
    }

    /// Build a snapshot. Takes the counters lock, so callers hold `control` first.
    pub(crate) fn snapshot(&self, control: &ControlBlock) -> Result<SessionSnapshot> {
        let counters = self.counters()?.clone();
        Ok(SessionSnapshot {
            id: self.id,
            state: control.state,
            profile_name: self.profile_name.clone(),
            accuracy: counters.accuracy(),
            counters,
            started_at: self.started_at,
            finished_at: control.finished_at,
            error: control.error.clone(),
        })
    }
}

/// The state commands act on: a cancelled session is already stopping.
fn effective_state(control: &ControlBlock) -> SessionState {
    if control.cancelled && !control.state.is_terminal() {
        SessionState::Stopped
    } else {
        control.state
    }
}

struct ActiveSession {
    shared: Arc<SessionShared>,
    worker: Option<JoinHandle<()>>,
}

/// Runs one typing session at a time.
pub struct SessionEngine {
    engine_config: EngineConfig,
    cadence_config: CadenceConfig,
    injector: Arc<dyn KeystrokeInjector>,
    publisher: Arc<EventPublisher>,
    /// The current session, retained after it ends to answer status queries.
    current: Mutex<Option<ActiveSession>>,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("engine_config", &self.engine_config)
            .field("active_session", &self.active_session_id())
            .finish()
    }
}

impl SessionEngine {
    pub fn new(config: &TypistConfig, injector: Arc<dyn KeystrokeInjector>) -> Self {
        Self {
            engine_config: config.engine.clone(),
            cadence_config: config.cadence.clone(),
            injector,
            publisher: Arc::new(EventPublisher::new()),
            current: Mutex::new(None),
        }
    }

    pub fn publisher(&self) -> Arc<EventPublisher> {
        Arc::clone(&self.publisher)
    }

    fn lock_current(&self) -> Result<MutexGuard<'_, Option<ActiveSession>>> {
        self.current
            .lock()
            .map_err(|e| TypistError::Internal(format!("Engine mutex poisoned: {}", e)))
    }

    fn session(&self, id: Uuid) -> Result<Arc<SessionShared>> {
        self.lock_current()?
            .as_ref()
            .filter(|active| active.shared.id == id)
            .map(|active| Arc::clone(&active.shared))
            .ok_or_else(|| TypistError::NotFound(format!("session {}", id)))
    }

    /// Id of the current session if it has not reached a terminal state.
    pub fn active_session_id(&self) -> Option<Uuid> {
        let current = self.lock_current().ok()?;
        let active = current.as_ref()?;
        let control = active.shared.control().ok()?;
        (!control.state.is_terminal()).then_some(active.shared.id)
    }

    /// Start typing `text` with a resolved profile.
    ///
    /// Fails with `Busy` while another session is non-terminal, whatever the
    /// input, and otherwise with `Validation` for empty text or an invalid
    /// profile. Must be called from within a Tokio runtime.
    pub fn start(&self, text: &str, profile: Profile, options: SessionOptions) -> Result<Uuid> {
        let mut current = self.lock_current()?;
        if let Some(active) = current.as_ref() {
            if !active.shared.control()?.state.is_terminal() {
                warn!(session_id = %active.shared.id, "Start rejected: a session is already active");
                return Err(TypistError::Busy(active.shared.id));
            }
        }

        if text.is_empty() {
            return Err(TypistError::Validation("text must not be empty".into()));
        }
        profile.validate()?;
        let runtime = Handle::try_current().map_err(|_| {
            TypistError::Internal("starting a session requires a Tokio runtime".into())
        })?;

        let id = Uuid::new_v4();
        let text: Vec<char> = text.chars().collect();
        let total_chars = text.len();
        let profile_name = profile.name.clone();

        let mut control = ControlBlock::new(profile);
        control.transition(SessionState::Starting)?;
        let (signal, _) = watch::channel(0u64);

        let shared = Arc::new(SessionShared {
            id,
            text,
            profile_name: profile_name.clone(),
            started_at: Utc::now(),
            signal,
            control: Mutex::new(control),
            counters: Mutex::new(SessionCounters::new(total_chars)),
            publisher: Arc::clone(&self.publisher),
        });

        let cadence = CadenceGenerator::new(self.cadence_config.clone(), self.engine_config.rng_seed);
        let worker = Worker::new(
            Arc::clone(&shared),
            Arc::clone(&self.injector),
            cadence,
            options.clone(),
            Duration::from_secs(self.engine_config.wpm_window_secs),
        );
        let handle = runtime.spawn(worker.run());

        info!(
            session_id = %id,
            profile = %profile_name,
            total_chars,
            countdown_secs = options.countdown_secs,
            delayed_correction = options.delayed_correction.is_some(),
            "Typing session started"
        );

        *current = Some(ActiveSession {
            shared,
            worker: Some(handle),
        });
        Ok(id)
    }

    /// Suspend a typing session. The in-flight delay resumes where it left off.
    pub fn pause(&self, id: Uuid) -> Result<()> {
        let shared = self.session(id)?;
        {
            let mut control = shared.control()?;
            let state = effective_state(&control);
            if state != SessionState::Typing {
                return Err(TypistError::InvalidState {
                    command: "pause",
                    state,
                });
            }
            control.transition(SessionState::Paused)?;
            let chars_typed = shared.counters()?.chars_typed;
            shared.publish(&mut control, SessionEvent::Paused { chars_typed });
            info!(session_id = %id, chars_typed, "Session paused");
        }
        shared.notify();
        Ok(())
    }

    pub fn resume(&self, id: Uuid) -> Result<()> {
        let shared = self.session(id)?;
        {
            let mut control = shared.control()?;
            let state = effective_state(&control);
            if state != SessionState::Paused {
                return Err(TypistError::InvalidState {
                    command: "resume",
                    state,
                });
            }
            control.transition(SessionState::Typing)?;
            shared.publish(&mut control, SessionEvent::Resumed);
            info!(session_id = %id, "Session resumed");
        }
        shared.notify();
        Ok(())
    }

    /// Retarget the live profile to `wpm`, clamped to the supported range.
    ///
    /// Returns the speed actually applied. Later delays use the new bounds;
    /// counters are untouched.
    pub fn update_speed(&self, id: Uuid, wpm: f64) -> Result<f64> {
        let shared = self.session(id)?;
        if !wpm.is_finite() || wpm <= 0.0 {
            return Err(TypistError::OutOfRange(format!(
                "wpm must be a positive number, got {}",
                wpm
            )));
        }
        let applied = wpm.clamp(MIN_WPM, MAX_WPM);
        {
            let mut control = shared.control()?;
            let state = effective_state(&control);
            if !matches!(state, SessionState::Typing | SessionState::Paused) {
                return Err(TypistError::InvalidState {
                    command: "update speed",
                    state,
                });
            }
            control.profile.retarget_wpm(applied);
            shared.publish(&mut control, SessionEvent::SpeedChanged { wpm: applied });
            info!(
                session_id = %id,
                requested = wpm,
                applied,
                min_delay_ms = control.profile.min_delay_ms,
                max_delay_ms = control.profile.max_delay_ms,
                "Session speed updated"
            );
        }
        shared.notify();
        Ok(applied)
    }

    /// Cancel a session and wait for its worker to exit.
    ///
    /// When this returns, the session is terminal and its `Stopped` event has
    /// been published. Stopping a terminal session is a no-op.
    pub async fn stop(&self, id: Uuid) -> Result<()> {
        let (shared, worker) = {
            let mut current = self.lock_current()?;
            match current.as_mut() {
                Some(active) if active.shared.id == id => {
                    (Arc::clone(&active.shared), active.worker.take())
                }
                _ => return Err(TypistError::NotFound(format!("session {}", id))),
            }
        };

        let signalled = {
            let mut control = shared.control()?;
            if control.state.is_terminal() {
                false
            } else {
                control.cancelled = true;
                true
            }
        };
        if signalled {
            info!(session_id = %id, "Stop requested");
            shared.notify();
        }

        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                error!(session_id = %id, "Session worker ended abnormally: {}", e);
            }
        }

        // A worker that died without finalising still owes the terminal event.
        let mut control = shared.control()?;
        if control.cancelled && !control.state.is_terminal() {
            control.transition(SessionState::Stopped)?;
            shared.publish(&mut control, SessionEvent::Stopped);
        }
        Ok(())
    }

    /// Snapshot of session `id`, or of the current session when `id` is None.
    pub fn status(&self, id: Option<Uuid>) -> Result<SessionSnapshot> {
        let shared = match id {
            Some(id) => self.session(id)?,
            None => self
                .lock_current()?
                .as_ref()
                .map(|active| Arc::clone(&active.shared))
                .ok_or_else(|| TypistError::NotFound("no session has been started".into()))?,
        };
        let control = shared.control()?;
        shared.snapshot(&control)
    }

    /// Observe session events, optionally for one session only.
    ///
    /// The snapshot and the registration happen under the session's control
    /// lock, so no event falls between them.
    pub fn subscribe(&self, id: Option<Uuid>) -> Result<Subscription> {
        let current = self.lock_current()?;
        let shared = current.as_ref().map(|active| Arc::clone(&active.shared));

        match (id, shared) {
            (Some(id), Some(shared)) if shared.id == id => {
                let control = shared.control()?;
                let session = shared.snapshot(&control)?;
                let events = self.publisher.subscribe(Some(id));
                Ok(Subscription {
                    ready: ReadySnapshot {
                        session: Some(session),
                    },
                    events,
                })
            }
            (Some(id), _) => Err(TypistError::NotFound(format!("session {}", id))),
            (None, Some(shared)) => {
                let control = shared.control()?;
                let session = shared.snapshot(&control)?;
                let events = self.publisher.subscribe(None);
                Ok(Subscription {
                    ready: ReadySnapshot {
                        session: Some(session),
                    },
                    events,
                })
            }
            (None, None) => Ok(Subscription {
                ready: ReadySnapshot { session: None },
                events: self.publisher.subscribe(None),
            }),
        }
    }
}
