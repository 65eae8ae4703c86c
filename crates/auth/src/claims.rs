use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use amo_core::UserId;

use crate::{Role, User};

/// Session token claims (transport-agnostic).
///
/// Besides identity and role, the token carries the two profile flags the
/// request gate needs so it can decide without a store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub sub: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: Role,
    pub must_change_password: bool,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    /// Snapshot the gate-relevant state of `user` into a fresh claim set.
    pub fn for_user(user: &User, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            must_change_password: user.must_change_password,
            phone_number: user.phone_number.clone(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    pub fn has_phone_number(&self) -> bool {
        self.phone_number
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate session claims against `now`.
///
/// Signature verification happens in [`crate::SessionCodec`]; this only checks
/// the time window.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(issued_at: DateTime<Utc>, ttl: Duration) -> SessionClaims {
        SessionClaims {
            sub: UserId::new(),
            email: "a@b.co".into(),
            name: None,
            role: Role::User,
            must_change_password: false,
            phone_number: Some("0788000000".into()),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[test]
    fn window_checks() {
        let now = Utc::now();
        assert_eq!(validate_claims(&claims(now, Duration::minutes(5)), now), Ok(()));
        assert_eq!(
            validate_claims(&claims(now - Duration::minutes(10), Duration::minutes(5)), now),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(now + Duration::minutes(1), Duration::minutes(5)), now),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&claims(now, Duration::zero()), now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn blank_phone_counts_as_missing() {
        let mut c = claims(Utc::now(), Duration::minutes(5));
        assert!(c.has_phone_number());
        c.phone_number = Some("  ".into());
        assert!(!c.has_phone_number());
        c.phone_number = None;
        assert!(!c.has_phone_number());
    }

    #[test]
    fn wire_format_is_camel_case() {
        let c = claims(Utc::now(), Duration::minutes(5));
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("mustChangePassword").is_some());
        assert!(json.get("phoneNumber").is_some());
        assert_eq!(json["role"], "USER");
    }
}
