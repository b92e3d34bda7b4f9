//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, bearer-token auth and all
//! endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use typist_core::config::TypistConfig;
use typist_core::error::{Result, TypistError};

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Localhost origins on the configured port and port+1 for a dev server.
    let port = state.config.api.port;
    let dev_port = port.saturating_add(1);
    let origins: Vec<HeaderValue> = [port, dev_port]
        .iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Routes that do NOT require authentication.
    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        // Sessions
        .route("/sessions", post(handlers::start_session))
        .route("/sessions/current", get(handlers::current_session))
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}/pause", post(handlers::pause_session))
        .route("/sessions/{id}/resume", post(handlers::resume_session))
        .route("/sessions/{id}/stop", post(handlers::stop_session))
        .route("/sessions/{id}/speed", put(handlers::update_speed))
        .route("/events", get(handlers::events))
        // Profiles
        .route("/profiles", get(handlers::list_profiles))
        .route(
            "/profiles/custom",
            get(handlers::custom_profile)
                .put(handlers::update_custom_profile)
                .layer(DefaultBodyLimit::max(64 * 1024)),
        )
        .route("/profiles/{name}", get(handlers::get_profile))
        // Calibration
        .route("/calibration", delete(handlers::calibration_cancel))
        .route("/calibration/start", post(handlers::calibration_start))
        .route("/calibration/input", post(handlers::calibration_input))
        .route("/calibration/complete", post(handlers::calibration_complete))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB global limit
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on 127.0.0.1 at the configured port.
pub async fn start_server(config: &TypistConfig, state: AppState) -> Result<()> {
    let addr = format!("127.0.0.1:{}", config.api.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TypistError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| TypistError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
