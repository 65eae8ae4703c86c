use amo_auth::{AuthzError, Capability, Principal, SessionClaims, authorize};

/// Identity of the caller for one request.
///
/// Inserted by the session gate for every request; `session` is `None` for
/// anonymous callers and for invalid or expired tokens.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    session: Option<SessionClaims>,
    principal: Option<Principal>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(claims: SessionClaims) -> Self {
        let principal = Principal::from(&claims);
        Self {
            session: Some(claims),
            principal: Some(principal),
        }
    }

    pub fn session(&self) -> Option<&SessionClaims> {
        self.session.as_ref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Check the caller before any request input is looked at.
    pub fn require(&self, capability: Capability) -> Result<&Principal, AuthzError> {
        authorize(self.principal(), capability)
    }
}
