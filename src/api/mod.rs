//! HTTP boundary of the proxy.
//!
//! The router is deliberately tiny: one login/roster endpoint plus a
//! liveness probe. Wrong methods on a route answer 405 via axum's method
//! routing. CORS is wide open; the whole point of the proxy is to serve
//! a browser client hosted on another origin.

pub mod error;
mod login;

pub use error::ApiError;
pub use login::{Action, LoginRequest, LoginResponse};

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/login", post(login::login))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
