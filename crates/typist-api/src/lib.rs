//! Typist API crate - axum HTTP server, session command handlers, SSE events.
//!
//! Exposes the session engine, the profile store and calibration over a
//! localhost REST API. Every route except `/health` requires a bearer token.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
