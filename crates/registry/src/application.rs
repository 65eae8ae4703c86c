//! Desktop application aggregate and its review state machine.
//!
//! ```text
//! PENDING ──approve──▶ APPROVED ──suspend──▶ SUSPENDED
//!    │  └──suspend──▶ SUSPENDED ──approve──▶ APPROVED
//!    └────reject───▶ REJECTED (terminal)
//! ```

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use amo_core::{
    Aggregate, AggregateRoot, ApplicationId, CompanyId, DomainError, DomainEvent, UserId,
};

use crate::ActivityType;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Suspended => "SUSPENDED",
        }
    }

    /// The review transition table. Everything not listed is refused.
    pub fn can_transition_to(self, to: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, to),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Suspended)
                | (Approved, Suspended)
                | (Suspended, Approved)
        )
    }
}

impl core::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PENDING" => Ok(ApplicationStatus::Pending),
            "APPROVED" => Ok(ApplicationStatus::Approved),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            "SUSPENDED" => Ok(ApplicationStatus::Suspended),
            _ => Err(DomainError::validation("Invalid status")),
        }
    }
}

/// Reviewer verbs accepted by the action endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationAction {
    Approve,
    Reject,
    Suspend,
}

impl ApplicationAction {
    pub fn target(self) -> ApplicationStatus {
        match self {
            ApplicationAction::Approve => ApplicationStatus::Approved,
            ApplicationAction::Reject => ApplicationStatus::Rejected,
            ApplicationAction::Suspend => ApplicationStatus::Suspended,
        }
    }
}

impl FromStr for ApplicationAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "APPROVE" => Ok(ApplicationAction::Approve),
            "REJECT" => Ok(ApplicationAction::Reject),
            "SUSPEND" => Ok(ApplicationAction::Suspend),
            _ => Err(DomainError::validation("Invalid action")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopApplication {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub version: u64,
    #[serde(skip)]
    pub created: bool,
}

impl DesktopApplication {
    pub fn empty(id: ApplicationId) -> Self {
        Self {
            id,
            user_id: UserId::from_uuid(uuid::Uuid::nil()),
            company_id: CompanyId::from_uuid(uuid::Uuid::nil()),
            status: ApplicationStatus::Pending,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
            approved_at: None,
            version: 0,
            created: false,
        }
    }
}

impl AggregateRoot for DesktopApplication {
    type Id = ApplicationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitApplication {
    pub application_id: ApplicationId,
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub application_id: ApplicationId,
    pub target: ApplicationStatus,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApplicationCommand {
    Submit(SubmitApplication),
    ChangeStatus(ChangeStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmitted {
    pub application_id: ApplicationId,
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub application_id: ApplicationId,
    pub owner: UserId,
    pub company_id: CompanyId,
    pub actor: UserId,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub occurred_at: DateTime<Utc>,
}

impl StatusChanged {
    /// Approval grants the owner company-admin rights.
    pub fn promotes_owner(&self) -> bool {
        self.to == ApplicationStatus::Approved
    }

    pub fn activity_type(&self) -> ActivityType {
        match self.to {
            ApplicationStatus::Approved => ActivityType::DesktopAppApproved,
            ApplicationStatus::Rejected => ActivityType::DesktopAppRejected,
            ApplicationStatus::Suspended => ActivityType::DesktopAppSuspended,
            ApplicationStatus::Pending => ActivityType::DesktopAppRequested,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationEvent {
    Submitted(ApplicationSubmitted),
    StatusChanged(StatusChanged),
}

impl DomainEvent for ApplicationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ApplicationEvent::Submitted(_) => "registry.application.submitted",
            ApplicationEvent::StatusChanged(e) => match e.to {
                ApplicationStatus::Approved => "registry.application.approved",
                ApplicationStatus::Rejected => "registry.application.rejected",
                ApplicationStatus::Suspended => "registry.application.suspended",
                ApplicationStatus::Pending => "registry.application.reopened",
            },
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ApplicationEvent::Submitted(e) => e.occurred_at,
            ApplicationEvent::StatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for DesktopApplication {
    type Command = ApplicationCommand;
    type Event = ApplicationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ApplicationEvent::Submitted(e) => {
                self.id = e.application_id;
                self.user_id = e.user_id;
                self.company_id = e.company_id;
                self.status = ApplicationStatus::Pending;
                self.created_at = e.occurred_at;
                self.created = true;
            }
            ApplicationEvent::StatusChanged(e) => {
                self.status = e.to;
                if e.to == ApplicationStatus::Approved {
                    self.approved_at = Some(e.occurred_at);
                }
            }
        }
        self.updated_at = event.occurred_at();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ApplicationCommand::Submit(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("application already submitted"));
                }
                Ok(vec![ApplicationEvent::Submitted(ApplicationSubmitted {
                    application_id: cmd.application_id,
                    user_id: cmd.user_id,
                    company_id: cmd.company_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ApplicationCommand::ChangeStatus(cmd) => {
                if !self.created {
                    return Err(DomainError::not_found("desktop application"));
                }
                if !self.status.can_transition_to(cmd.target) {
                    return Err(DomainError::invalid_transition(
                        "desktop application",
                        self.status,
                        cmd.target,
                    ));
                }
                Ok(vec![ApplicationEvent::StatusChanged(StatusChanged {
                    application_id: self.id,
                    owner: self.user_id,
                    company_id: self.company_id,
                    actor: cmd.actor,
                    from: self.status,
                    to: cmd.target,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Suspended,
    ];

    fn submitted() -> DesktopApplication {
        let id = ApplicationId::new();
        let mut app = DesktopApplication::empty(id);
        app.execute(&ApplicationCommand::Submit(SubmitApplication {
            application_id: id,
            user_id: UserId::new(),
            company_id: CompanyId::new(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        app
    }

    fn change(app: &mut DesktopApplication, target: ApplicationStatus) -> Result<Vec<ApplicationEvent>, DomainError> {
        app.execute(&ApplicationCommand::ChangeStatus(ChangeStatus {
            application_id: app.id,
            target,
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }))
    }

    #[test]
    fn submit_starts_pending() {
        let app = submitted();
        assert_eq!(app.status, ApplicationStatus::Pending);
        assert_eq!(app.version, 1);
        assert!(app.approved_at.is_none());
    }

    #[test]
    fn approve_sets_timestamp_and_requests_promotion() {
        let mut app = submitted();
        let events = change(&mut app, ApplicationStatus::Approved).unwrap();
        let ApplicationEvent::StatusChanged(e) = &events[0] else {
            panic!("expected StatusChanged");
        };
        assert!(e.promotes_owner());
        assert_eq!(e.owner, app.user_id);
        assert_eq!(e.activity_type(), ActivityType::DesktopAppApproved);
        assert_eq!(app.status, ApplicationStatus::Approved);
        assert!(app.approved_at.is_some());
    }

    #[test]
    fn suspend_and_restore() {
        let mut app = submitted();
        change(&mut app, ApplicationStatus::Approved).unwrap();
        change(&mut app, ApplicationStatus::Suspended).unwrap();
        change(&mut app, ApplicationStatus::Approved).unwrap();
        assert_eq!(app.status, ApplicationStatus::Approved);
        assert_eq!(app.version, 4);
    }

    #[test]
    fn rejected_is_terminal() {
        let mut app = submitted();
        change(&mut app, ApplicationStatus::Rejected).unwrap();
        for target in ALL {
            let before = app.clone();
            let err = change(&mut app, target).unwrap_err();
            assert!(matches!(err, DomainError::InvalidTransition { .. }));
            assert_eq!(app, before);
        }
    }

    #[test]
    fn parse_action_and_status() {
        assert_eq!("APPROVE".parse::<ApplicationAction>().unwrap().target(), ApplicationStatus::Approved);
        assert_eq!("SUSPEND".parse::<ApplicationAction>().unwrap().target(), ApplicationStatus::Suspended);
        assert_eq!("DELETE".parse::<ApplicationAction>().unwrap_err().to_string(), "Invalid action");
        assert_eq!("approved".parse::<ApplicationStatus>().unwrap_err().to_string(), "Invalid status");
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        /// Walking any sequence of targets only ever lands on states the table allows,
        /// and refused steps leave the aggregate untouched.
        #[test]
        fn random_walks_respect_the_table(targets in prop::collection::vec(0usize..4, 1..12)) {
            let mut app = submitted();
            for idx in targets {
                let target = ALL[idx];
                let before = app.clone();
                match change(&mut app, target) {
                    Ok(_) => {
                        prop_assert!(before.status.can_transition_to(target));
                        prop_assert_eq!(app.version, before.version + 1);
                    }
                    Err(_) => {
                        prop_assert!(!before.status.can_transition_to(target));
                        prop_assert_eq!(&app, &before);
                    }
                }
                prop_assert!(app.status != ApplicationStatus::Pending || app.version == 1);
            }
        }
    }
}
