//! Role-scoped dashboard shell.

use serde::Serialize;

use crate::gate::DASHBOARD_ROOT;
use crate::policy::section_capability;
use crate::Role;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub href: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    Admin,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shell {
    #[serde(rename = "shell")]
    pub kind: ShellKind,
    pub navigation: &'static [NavLink],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellDecision {
    Render(Shell),
    Redirect(&'static str),
}

const fn link(href: &'static str, label: &'static str) -> NavLink {
    NavLink { href, label }
}

const ADMIN_NAV: &[NavLink] = &[
    link("/dashboard", "Dashboard"),
    link("/dashboard/users", "Users"),
    link("/dashboard/applications", "Applications"),
    link("/dashboard/licenses", "Licenses"),
    link("/dashboard/alerts", "Alerts"),
    link("/dashboard/messages", "Messages"),
    link("/dashboard/logs", "Activity Logs"),
    link("/dashboard/sync", "Data Sync"),
    link("/dashboard/settings", "Settings"),
];

const USER_NAV: &[NavLink] = &[
    link("/dashboard", "Dashboard"),
    link("/dashboard/application", "My Application"),
    link("/dashboard/receipts", "Receipts"),
    link("/dashboard/vat", "VAT Reports"),
    link("/dashboard/scans", "Scans"),
    link("/dashboard/activities", "Activities"),
    link("/dashboard/messages", "Messages"),
    link("/dashboard/settings", "Settings"),
];

/// Pick the shell for `role` on `path`, bouncing non-admins out of admin sections.
pub fn resolve(role: Role, path: &str) -> ShellDecision {
    if let Some(cap) = section_capability(path) {
        if !cap.allowed_for(role) {
            return ShellDecision::Redirect(DASHBOARD_ROOT);
        }
    }

    let shell = if role.is_admin() {
        Shell { kind: ShellKind::Admin, navigation: ADMIN_NAV }
    } else {
        Shell { kind: ShellKind::User, navigation: USER_NAV }
    };
    ShellDecision::Render(shell)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gets_admin_shell_everywhere() {
        let ShellDecision::Render(shell) = resolve(Role::Admin, "/dashboard/licenses") else {
            panic!("admin should render");
        };
        assert_eq!(shell.kind, ShellKind::Admin);
        assert!(shell.navigation.iter().any(|l| l.href == "/dashboard/sync"));
    }

    #[test]
    fn non_admin_is_bounced_from_admin_sections() {
        for role in [Role::User, Role::CompanyAdmin] {
            assert_eq!(resolve(role, "/dashboard/users"), ShellDecision::Redirect(DASHBOARD_ROOT));
            assert_eq!(resolve(role, "/dashboard/logs/7"), ShellDecision::Redirect(DASHBOARD_ROOT));
        }
    }

    #[test]
    fn company_admin_gets_user_shell() {
        let ShellDecision::Render(shell) = resolve(Role::CompanyAdmin, "/dashboard/application") else {
            panic!("user page should render");
        };
        assert_eq!(shell.kind, ShellKind::User);
        assert!(shell.navigation.iter().all(|l| section_capability(l.href).is_none()));
    }
}
