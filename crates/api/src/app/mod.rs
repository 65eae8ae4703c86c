//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, session codec and sync backend wiring plus the operations
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses
//! - `extract.rs`: body extractor with JSON rejections

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(build_router(services))
}

/// Router over already-wired services.
pub fn build_router(services: Arc<AppServices>) -> Router {
    let session_state = middleware::SessionState {
        sessions: services.sessions().clone(),
    };

    routes::router().layer(
        ServiceBuilder::new()
            .layer(CookieManagerLayer::new())
            .layer(axum::middleware::from_fn_with_state(
                session_state,
                middleware::session_gate,
            ))
            .layer(Extension(services)),
    )
}
