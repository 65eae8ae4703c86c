//! Request gate: decides, per path and session, whether a request proceeds.

use crate::SessionClaims;

pub const LOGIN_PAGE: &str = "/login";
pub const DASHBOARD_ROOT: &str = "/dashboard";
pub const CHANGE_PASSWORD_PAGE: &str = "/profile/change-password";
pub const PROFILE_UPDATE_PAGE: &str = "/profile/update";

const API_PREFIX: &str = "/api";
const PROTECTED_PREFIXES: &[&str] = &[DASHBOARD_ROOT, "/profile", API_PREFIX];
const PUBLIC_API_PREFIXES: &[&str] = &["/api/auth", "/api/receipt"];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(&'static str),
}

/// `true` when `path` equals `prefix` or continues it with a `/` segment.
pub fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

fn matches_any(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| has_segment_prefix(path, p))
}

pub fn is_api_path(path: &str) -> bool {
    has_segment_prefix(path, API_PREFIX)
}

pub fn requires_session(path: &str) -> bool {
    matches_any(path, PROTECTED_PREFIXES) && !matches_any(path, PUBLIC_API_PREFIXES)
}

/// Evaluate the gate. Rules are checked in order; the first match wins.
///
/// `session` must already be verified; an invalid token is passed as `None`.
pub fn evaluate(path: &str, session: Option<&SessionClaims>) -> GateDecision {
    let Some(claims) = session else {
        return if requires_session(path) {
            GateDecision::Redirect(LOGIN_PAGE)
        } else {
            GateDecision::Allow
        };
    };

    if has_segment_prefix(path, LOGIN_PAGE) {
        return GateDecision::Redirect(DASHBOARD_ROOT);
    }

    // API callers get the flags in their session payload instead of redirects.
    if is_api_path(path) {
        return GateDecision::Allow;
    }

    if claims.must_change_password && !has_segment_prefix(path, CHANGE_PASSWORD_PAGE) {
        return GateDecision::Redirect(CHANGE_PASSWORD_PAGE);
    }

    // A pending password change keeps the change-password page reachable.
    if !claims.must_change_password
        && !claims.has_phone_number()
        && !has_segment_prefix(path, PROFILE_UPDATE_PAGE)
    {
        return GateDecision::Redirect(PROFILE_UPDATE_PAGE);
    }

    GateDecision::Allow
}
