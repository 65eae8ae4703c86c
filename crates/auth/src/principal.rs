use serde::Serialize;

use amo_core::UserId;

use crate::{Role, SessionClaims};

/// The authenticated caller as seen by handlers and the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub must_change_password: bool,
    pub phone_number: Option<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&SessionClaims> for Principal {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.clone(),
            name: claims.name.clone(),
            role: claims.role,
            must_change_password: claims.must_change_password,
            phone_number: claims.phone_number.clone(),
        }
    }
}
