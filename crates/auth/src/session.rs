//! Signed session tokens (HS256 JWT).

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{SessionClaims, TokenValidationError, validate_claims};
use crate::User;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("malformed session token: {0}")]
    Malformed(String),

    #[error(transparent)]
    Invalid(#[from] TokenValidationError),

    #[error("failed to sign session token: {0}")]
    Encode(String),
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        // Expiry lives in our own claim names and is checked by validate_claims.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn claims_for(&self, user: &User, now: DateTime<Utc>) -> SessionClaims {
        SessionClaims::for_user(user, now, self.ttl)
    }

    pub fn encode(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| SessionError::Encode(e.to_string()))
    }

    /// Mint a token for `user` valid from `now` for the configured TTL.
    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, SessionError> {
        self.encode(&self.claims_for(user, now))
    }

    /// Verify signature and time window. Any failure means "no session".
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| SessionError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl core::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionCodec").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use crate::user::registered_for_tests;

    fn user() -> User {
        registered_for_tests("ops@amo.rw", Role::Admin, Some("0788000000"))
    }

    #[test]
    fn issued_token_decodes_to_same_claims() {
        let codec = SessionCodec::new(b"secret", Duration::minutes(30));
        let now = Utc::now();
        let u = user();
        let token = codec.issue(&u, now).unwrap();
        let claims = codec.decode(&token, now).unwrap();
        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let now = Utc::now();
        let token = SessionCodec::new(b"one", Duration::minutes(30)).issue(&user(), now).unwrap();
        let err = SessionCodec::new(b"two", Duration::minutes(30)).decode(&token, now).unwrap_err();
        assert!(matches!(err, SessionError::Malformed(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = SessionCodec::new(b"secret", Duration::minutes(1));
        let issued = Utc::now() - Duration::minutes(5);
        let token = codec.issue(&user(), issued).unwrap();
        assert_eq!(
            codec.decode(&token, Utc::now()),
            Err(SessionError::Invalid(TokenValidationError::Expired))
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = SessionCodec::new(b"secret", Duration::minutes(1));
        assert!(matches!(codec.decode("not.a.jwt", Utc::now()), Err(SessionError::Malformed(_))));
    }
}
