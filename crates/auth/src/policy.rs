//! Centralized authorization policy.
//!
//! Every guarded operation is a [`Capability`]. API handlers and the
//! dashboard shell both ask this module, so the admin-only surface is defined
//! exactly once.

use serde::Serialize;
use thiserror::Error;

use crate::gate::has_segment_prefix;
use crate::{Principal, Role};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageUsers,
    ReviewApplications,
    ManageLicenses,
    ManageAlerts,
    RaiseAlert,
    ManageMessages,
    SendMessage,
    ViewActivityLog,
    RunSync,
    ViewPlatformStats,
    ViewOwnDashboard,
    SubmitApplication,
    ManageOwnProfile,
    RecordReceipts,
}

impl Capability {
    pub fn allowed_for(self, role: Role) -> bool {
        use Capability::*;
        match self {
            ManageUsers | ReviewApplications | ManageLicenses | ManageAlerts | ManageMessages
            | ViewActivityLog | RunSync | ViewPlatformStats => role.is_admin(),
            RecordReceipts => matches!(role, Role::Admin | Role::CompanyAdmin),
            RaiseAlert | SendMessage | ViewOwnDashboard | SubmitApplication | ManageOwnProfile => true,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: missing capability '{0:?}'")]
    Forbidden(Capability),
}

/// Authorize the (possibly anonymous) caller for `capability`.
///
/// - No IO
/// - No panics
pub fn authorize(principal: Option<&Principal>, capability: Capability) -> Result<&Principal, AuthzError> {
    let principal = principal.ok_or(AuthzError::Unauthenticated)?;
    if capability.allowed_for(principal.role) {
        Ok(principal)
    } else {
        Err(AuthzError::Forbidden(capability))
    }
}

/// Dashboard sections that need more than a plain session.
const GUARDED_SECTIONS: &[(&str, Capability)] = &[
    ("/dashboard/users", Capability::ManageUsers),
    ("/dashboard/applications", Capability::ReviewApplications),
    ("/dashboard/desktop-applications", Capability::ReviewApplications),
    ("/dashboard/licenses", Capability::ManageLicenses),
    ("/dashboard/alerts", Capability::ManageAlerts),
    ("/dashboard/logs", Capability::ViewActivityLog),
    ("/dashboard/sync", Capability::RunSync),
];

/// Capability required to open a dashboard page, if any.
pub fn section_capability(path: &str) -> Option<Capability> {
    GUARDED_SECTIONS
        .iter()
        .find(|(prefix, _)| has_segment_prefix(path, prefix))
        .map(|(_, cap)| *cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amo_core::UserId;

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: UserId::new(),
            email: "p@amo.rw".into(),
            name: None,
            role,
            must_change_password: false,
            phone_number: Some("0788".into()),
        }
    }

    #[test]
    fn anonymous_is_unauthenticated() {
        assert_eq!(
            authorize(None, Capability::ViewOwnDashboard),
            Err(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn admin_capabilities_reject_other_roles() {
        for role in [Role::User, Role::CompanyAdmin] {
            let p = principal(role);
            assert_eq!(
                authorize(Some(&p), Capability::ManageLicenses),
                Err(AuthzError::Forbidden(Capability::ManageLicenses))
            );
        }
        let admin = principal(Role::Admin);
        assert!(authorize(Some(&admin), Capability::ManageLicenses).is_ok());
    }

    #[test]
    fn receipts_need_company_admin_or_admin() {
        assert!(!Capability::RecordReceipts.allowed_for(Role::User));
        assert!(Capability::RecordReceipts.allowed_for(Role::CompanyAdmin));
        assert!(Capability::RecordReceipts.allowed_for(Role::Admin));
    }

    #[test]
    fn section_lookup_is_segment_aware() {
        assert_eq!(section_capability("/dashboard/users"), Some(Capability::ManageUsers));
        assert_eq!(section_capability("/dashboard/users/42"), Some(Capability::ManageUsers));
        // The user-facing "my application" page is not the admin review list.
        assert_eq!(section_capability("/dashboard/application"), None);
        assert_eq!(section_capability("/dashboard/messages"), None);
        assert_eq!(section_capability("/dashboard"), None);
    }
}
