//! Application state shared across all route handlers.
//!
//! AppState holds the engine, the profile store, the calibration service and
//! the optional text provider. It is passed to handlers via axum's State
//! extractor.

use std::sync::Arc;
use std::time::Instant;

use typist_core::config::TypistConfig;
use typist_engine::{CalibrationService, SessionEngine, TextProvider};
use typist_storage::ProfileStore;

use crate::auth::generate_token;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<TypistConfig>,
    /// The single-session typing engine.
    pub engine: Arc<SessionEngine>,
    /// Built-in and Custom profiles.
    pub profiles: Arc<ProfileStore>,
    /// Typing-speed measurement.
    pub calibration: Arc<CalibrationService>,
    /// Source of generated text for prompt-based starts.
    pub provider: Option<Arc<dyn TextProvider>>,
    /// Bearer token required on protected routes.
    pub api_token: String,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with a freshly generated API token.
    pub fn new(config: TypistConfig, engine: SessionEngine, profiles: Arc<ProfileStore>) -> Self {
        let calibration = CalibrationService::new(config.calibration.clone(), Arc::clone(&profiles));
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            profiles,
            calibration: Arc::new(calibration),
            provider: None,
            api_token: generate_token(),
            start_time: Instant::now(),
        }
    }

    /// Attach a text provider for `prompt` requests.
    pub fn with_provider(mut self, provider: Arc<dyn TextProvider>) -> Self {
        self.provider = Some(provider);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("profiles", &self.profiles)
            .field("calibration", &self.calibration)
            .field("provider", &self.provider.is_some())
            .finish()
    }
}
