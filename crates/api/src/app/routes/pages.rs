//! Page descriptors for the dashboard front end.
//!
//! The gate has already redirected anonymous callers and incomplete profiles
//! by the time these run; the shell then bounces non-admins out of admin
//! sections.

use axum::{
    extract::Extension,
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use amo_auth::gate::{CHANGE_PASSWORD_PAGE, LOGIN_PAGE, PROFILE_UPDATE_PAGE};
use amo_auth::shell::{self, ShellDecision};

use crate::app::errors::ApiError;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route(LOGIN_PAGE, get(login_page))
        .route(CHANGE_PASSWORD_PAGE, get(change_password_page))
        .route(PROFILE_UPDATE_PAGE, get(profile_update_page))
        .route("/dashboard", get(dashboard_page))
        .route("/dashboard/*rest", get(dashboard_page))
}

pub async fn login_page() -> impl IntoResponse {
    Json(json!({
        "page": "login",
        "action": "/api/auth/signin",
    }))
}

pub async fn change_password_page(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    Json(json!({
        "page": "change-password",
        "action": "/api/profile/change-password",
        "required": ctx.principal().is_some_and(|p| p.must_change_password),
    }))
}

pub async fn profile_update_page(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    Json(json!({
        "page": "profile-update",
        "action": "/api/profile/update",
        "profile": ctx.principal(),
    }))
}

pub async fn dashboard_page(Extension(ctx): Extension<RequestContext>, uri: Uri) -> Result<Response, ApiError> {
    let principal = ctx.principal().ok_or(ApiError::Unauthenticated)?;
    let path = uri.path();

    match shell::resolve(principal.role, path) {
        ShellDecision::Redirect(target) => {
            tracing::debug!(path, role = %principal.role, "admin section denied; redirecting");
            Ok(Redirect::temporary(target).into_response())
        }
        ShellDecision::Render(shell) => Ok(Json(json!({
            "shell": shell.kind,
            "path": path,
            "navigation": shell.navigation,
        }))
        .into_response()),
    }
}
