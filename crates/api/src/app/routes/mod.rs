use axum::{routing::get, Router};

pub mod activities;
pub mod alerts;
pub mod applications;
pub mod auth;
pub mod dashboard;
pub mod licenses;
pub mod messages;
pub mod pages;
pub mod profile;
pub mod receipts;
pub mod sync;
pub mod system;
pub mod users;

/// Every route, API and page alike. The session gate runs in front of all of them.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/api/auth", auth::router())
        .nest("/api/profile", profile::router())
        .nest("/api/users", users::router())
        .nest("/api/licenses", licenses::router())
        .nest("/api/alerts", alerts::router())
        .nest("/api/messages", messages::router())
        .nest("/api/desktop-applications", applications::router())
        .nest("/api/activities", activities::router())
        .nest("/api/sync", sync::router())
        .merge(dashboard::router())
        .merge(receipts::router())
        .merge(pages::router())
}
