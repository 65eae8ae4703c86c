use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use tower_cookies::Cookies;

use amo_auth::gate::{self, GateDecision, LOGIN_PAGE};
use amo_auth::SessionCodec;

use crate::context::RequestContext;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "amo_session";

#[derive(Clone)]
pub struct SessionState {
    pub sessions: Arc<SessionCodec>,
}

/// Resolve the caller's session, apply the request gate and attach a
/// [`RequestContext`] for the handlers.
pub async fn session_gate(
    State(state): State<SessionState>,
    cookies: Cookies,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let claims = session_token(&cookies, req.headers()).and_then(|token| {
        state
            .sessions
            .decode(&token, Utc::now())
            .map_err(|e| tracing::debug!(error = %e, "ignoring invalid session token"))
            .ok()
    });

    let path = req.uri().path();
    match gate::evaluate(path, claims.as_ref()) {
        GateDecision::Allow => {}
        GateDecision::Redirect(LOGIN_PAGE) if gate::is_api_path(path) => {
            return unauthenticated();
        }
        GateDecision::Redirect(target) => {
            tracing::debug!(path, redirect = target, "gate redirect");
            return Redirect::temporary(target).into_response();
        }
    }

    let ctx = match claims {
        Some(claims) => RequestContext::authenticated(claims),
        None => RequestContext::anonymous(),
    };
    req.extensions_mut().insert(ctx);

    next.run(req).await
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": "authentication required",
            "redirect": LOGIN_PAGE,
        })),
    )
        .into_response()
}

fn session_token(cookies: &Cookies, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer(headers) {
        return Some(token.to_string());
    }
    cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_is_parsed() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer  abc.def.ghi "),
        );
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic Zm9vOmJhcg=="),
        );
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer "),
        );
        assert_eq!(extract_bearer(&headers), None);
    }
}
