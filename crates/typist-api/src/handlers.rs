//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path/query/body parameters via axum extractors,
//! calls into the engine, profile store or calibration service, and returns
//! JSON. Engine errors convert into `ApiError` with `?`.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::info;
use uuid::Uuid;

use typist_core::error::TypistError;
use typist_core::types::{Profile, ProfileEntry, SessionOverrides, SessionSnapshot, SessionState};
use typist_engine::{fetch_text, CalibrationProgress, CalibrationResult, SessionRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// Profile used when a start request names none and nothing was used before.
const DEFAULT_PROFILE: &str = "Medium";

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StartSessionBody {
    /// Literal text to type. Mutually exclusive with `prompt`.
    pub text: Option<String>,
    /// Prompt for the text provider. Mutually exclusive with `text`.
    pub prompt: Option<String>,
    /// Profile name; defaults to the last one used.
    pub profile: Option<String>,
    #[serde(default)]
    pub overrides: SessionOverrides,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SpeedBody {
    pub wpm: f64,
}

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CalibrationInputBody {
    /// Everything typed so far, not just the latest keystroke.
    pub typed: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_session: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub profile: String,
    pub total_chars: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub session_id: Uuid,
    pub state: SessionState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpeedResponse {
    pub session_id: Uuid,
    /// The speed actually applied after clamping.
    pub wpm: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfilesResponse {
    pub profiles: Vec<ProfileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalibrationStartResponse {
    pub reference: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalibrationCancelResponse {
    pub cancelled: bool,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - liveness and the active session, if any.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_session: state.engine.active_session_id(),
    })
}

// =============================================================================
// Sessions
// =============================================================================

/// POST /sessions - start typing literal text or provider-generated text.
pub async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<StartSessionBody>,
) -> Result<(StatusCode, Json<StartSessionResponse>), ApiError> {
    if let Some(active) = state.engine.active_session_id() {
        return Err(TypistError::Busy(active).into());
    }

    let profile_name = body
        .profile
        .or_else(|| state.profiles.last_used().map(|s| s.profile_name))
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    let request = SessionRequest::new(profile_name).with_overrides(body.overrides);
    let (profile, options) = request.resolve(&state.profiles, &state.config.engine)?;

    let text = match (body.text, body.prompt) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "Provide either 'text' or 'prompt', not both".to_string(),
            ))
        }
        (Some(text), None) => text,
        (None, Some(prompt)) => {
            let provider = state.provider.as_ref().ok_or_else(|| {
                TypistError::Provider("no text provider is configured".to_string())
            })?;
            let timeout = Duration::from_secs(state.config.provider.timeout_secs);
            fetch_text(provider.as_ref(), &prompt, timeout).await?
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "One of 'text' or 'prompt' is required".to_string(),
            ))
        }
    };

    let profile_label = profile.name.clone();
    let total_chars = text.chars().count();
    let session_id = state.engine.start(&text, profile, options)?;
    state.profiles.remember_last_used(&request.to_last_used());
    info!(session_id = %session_id, profile = %profile_label, "Session started via API");

    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            session_id,
            profile: profile_label,
            total_chars,
        }),
    ))
}

/// GET /sessions/current - snapshot of the most recent session.
pub async fn current_session(
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.engine.status(None)?))
}

/// GET /sessions/{id} - snapshot of one session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.engine.status(Some(id))?))
}

fn command_response(state: &AppState, id: Uuid) -> Result<Json<CommandResponse>, ApiError> {
    let snapshot = state.engine.status(Some(id))?;
    Ok(Json(CommandResponse {
        session_id: id,
        state: snapshot.state,
    }))
}

/// POST /sessions/{id}/pause
pub async fn pause_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    state.engine.pause(id)?;
    command_response(&state, id)
}

/// POST /sessions/{id}/resume
pub async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    state.engine.resume(id)?;
    command_response(&state, id)
}

/// POST /sessions/{id}/stop - returns once the session is terminal.
pub async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    state.engine.stop(id).await?;
    command_response(&state, id)
}

/// PUT /sessions/{id}/speed
pub async fn update_speed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SpeedBody>,
) -> Result<Json<SpeedResponse>, ApiError> {
    let wpm = state.engine.update_speed(id, body.wpm)?;
    Ok(Json(SpeedResponse { session_id: id, wpm }))
}

/// GET /events - SSE stream of session events.
///
/// The first event is `ready` carrying the current snapshot; each later event
/// is named after the session event and carries its envelope.
pub async fn events(
    State(state): State<AppState>,
    Query(params): Query<EventsParams>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let subscription = state.engine.subscribe(params.session_id)?;

    let ready = serde_json::to_string(&subscription.ready).unwrap_or_default();
    let ready = tokio_stream::once(Ok::<_, Infallible>(
        Event::default().event("ready").data(ready),
    ));
    let live = UnboundedReceiverStream::new(subscription.events).map(|envelope| {
        let data = serde_json::to_string(&envelope).unwrap_or_default();
        Ok::<_, Infallible>(
            Event::default()
                .event(envelope.event.event_name())
                .id(envelope.seq.to_string())
                .data(data),
        )
    });

    let interval = Duration::from_secs(state.config.api.keep_alive_secs.max(1));
    Ok(Sse::new(ready.chain(live)).keep_alive(KeepAlive::new().interval(interval)))
}

// =============================================================================
// Profiles
// =============================================================================

/// GET /profiles - built-ins then Custom.
pub async fn list_profiles(
    State(state): State<AppState>,
) -> Result<Json<ProfilesResponse>, ApiError> {
    Ok(Json(ProfilesResponse {
        profiles: state.profiles.list()?,
    }))
}

/// GET /profiles/{name} - case-insensitive lookup.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.profiles.get(&name)?))
}

/// GET /profiles/custom
pub async fn custom_profile(State(state): State<AppState>) -> Result<Json<Profile>, ApiError> {
    Ok(Json(state.profiles.custom()?))
}

/// PUT /profiles/custom - replace the Custom profile.
pub async fn update_custom_profile(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> Result<Json<Profile>, ApiError> {
    let saved = state.profiles.save_custom(profile)?;
    info!(
        min_delay_ms = saved.min_delay_ms,
        max_delay_ms = saved.max_delay_ms,
        "Custom profile updated via API"
    );
    Ok(Json(saved))
}

// =============================================================================
// Calibration
// =============================================================================

/// POST /calibration/start - returns the passage to type.
pub async fn calibration_start(
    State(state): State<AppState>,
) -> Result<Json<CalibrationStartResponse>, ApiError> {
    let reference = state.calibration.start()?;
    Ok(Json(CalibrationStartResponse { reference }))
}

/// POST /calibration/input - report everything typed so far.
///
/// Input covering the whole passage completes the measurement and carries
/// the result.
pub async fn calibration_input(
    State(state): State<AppState>,
    Json(body): Json<CalibrationInputBody>,
) -> Result<Json<CalibrationProgress>, ApiError> {
    Ok(Json(state.calibration.input(&body.typed)?))
}

/// POST /calibration/complete - derive and save the Custom profile.
pub async fn calibration_complete(
    State(state): State<AppState>,
) -> Result<Json<CalibrationResult>, ApiError> {
    Ok(Json(state.calibration.complete()?))
}

/// DELETE /calibration - abandon the outstanding measurement.
pub async fn calibration_cancel(
    State(state): State<AppState>,
) -> Result<Json<CalibrationCancelResponse>, ApiError> {
    let cancelled = state.calibration.cancel()?;
    Ok(Json(CalibrationCancelResponse { cancelled }))
}
