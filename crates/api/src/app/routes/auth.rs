use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use amo_auth::Role;

use crate::app::dto::{self, required};
use crate::app::errors::ApiError;
use crate::app::extract::ValidatedJson;
use crate::app::services::{AppServices, NewAccount, SignedIn};
use crate::context::RequestContext;
use crate::middleware::SESSION_COOKIE;

pub fn router() -> Router {
    Router::new()
        .route("/signin", post(sign_in))
        .route("/register", post(register))
        .route("/signout", post(sign_out))
        .route("/session", get(session))
}

/// Store the session token in the HttpOnly cookie the gate reads.
pub(crate) fn set_session_cookie(cookies: &Cookies, services: &AppServices, token: &str) {
    let mut cookie = Cookie::new(SESSION_COOKIE, token.to_string());
    cookie.set_http_only(true);
    cookie.set_secure(services.cookie_secure());
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(services.sessions().ttl().num_seconds()));
    cookies.add(cookie);
}

/// User JSON plus the new token, cookie already set.
pub(crate) fn signed_in_response(cookies: &Cookies, services: &AppServices, signed: &SignedIn) -> Json<serde_json::Value> {
    set_session_cookie(cookies, services, &signed.token);
    Json(json!({
        "user": dto::user_to_json(&signed.user),
        "token": signed.token,
    }))
}

pub async fn sign_in(
    Extension(services): Extension<Arc<AppServices>>,
    cookies: Cookies,
    ValidatedJson(body): ValidatedJson<dto::SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (
        body.email.filter(|e| !e.trim().is_empty()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation("Email and password are required"));
    };

    let signed = services.sign_in(&email, &password).await?;
    Ok(signed_in_response(&cookies, &services, &signed))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<dto::RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = required(body.email, "Email is required")?;
    let password = required(body.password, "Password is required")?;

    let user = services
        .register(NewAccount {
            email,
            password,
            name: body.name,
            phone_number: body.phone_number,
            role: Role::User,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": dto::user_to_json(&user),
        })),
    ))
}

pub async fn sign_out(cookies: Cookies) -> impl IntoResponse {
    cookies.remove(Cookie::build((SESSION_COOKIE, "")).path("/").into());
    Json(json!({ "success": true }))
}

pub async fn session(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    Json(json!({ "session": ctx.session() }))
}
