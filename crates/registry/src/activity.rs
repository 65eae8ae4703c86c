//! Append-only audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use amo_core::{ActivityId, ApplicationId, CompanyId, Entity, UserId};

use crate::application::StatusChanged;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    UserCreated,
    UserUpdated,
    DesktopAppRequested,
    DesktopAppApproved,
    DesktopAppRejected,
    DesktopAppSuspended,
    LicenseCreated,
    LicenseUpdated,
    AlertCreated,
    AlertUpdated,
    MessageCreated,
    MessageUpdated,
    ReceiptRecorded,
    ReceiptScanned,
    Sync,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::UserCreated => "USER_CREATED",
            ActivityType::UserUpdated => "USER_UPDATED",
            ActivityType::DesktopAppRequested => "DESKTOP_APP_REQUESTED",
            ActivityType::DesktopAppApproved => "DESKTOP_APP_APPROVED",
            ActivityType::DesktopAppRejected => "DESKTOP_APP_REJECTED",
            ActivityType::DesktopAppSuspended => "DESKTOP_APP_SUSPENDED",
            ActivityType::LicenseCreated => "LICENSE_CREATED",
            ActivityType::LicenseUpdated => "LICENSE_UPDATED",
            ActivityType::AlertCreated => "ALERT_CREATED",
            ActivityType::AlertUpdated => "ALERT_UPDATED",
            ActivityType::MessageCreated => "MESSAGE_CREATED",
            ActivityType::MessageUpdated => "MESSAGE_UPDATED",
            ActivityType::ReceiptRecorded => "RECEIPT_RECORDED",
            ActivityType::ReceiptScanned => "RECEIPT_SCANNED",
            ActivityType::Sync => "SYNC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(JsonValue::String(s.to_string())).ok()
    }
}

/// One audit entry. Never mutated or deleted after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub description: String,
    pub user_id: UserId,
    pub company_id: Option<CompanyId>,
    pub desktop_app_id: Option<ApplicationId>,
    pub old_value: Option<JsonValue>,
    pub new_value: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn new(
        activity_type: ActivityType,
        actor: UserId,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActivityId::new(),
            activity_type,
            description: description.into(),
            user_id: actor,
            company_id: None,
            desktop_app_id: None,
            old_value: None,
            new_value: None,
            created_at,
        }
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_application(mut self, application_id: ApplicationId) -> Self {
        self.desktop_app_id = Some(application_id);
        self
    }

    pub fn with_change(mut self, old_value: Option<JsonValue>, new_value: Option<JsonValue>) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    /// Audit entry for a reviewer's status change.
    pub fn for_status_change(e: &StatusChanged) -> Self {
        Self::new(
            e.activity_type(),
            e.actor,
            format!("Desktop application status changed from {} to {}", e.from, e.to),
            e.occurred_at,
        )
        .with_company(e.company_id)
        .with_application(e.application_id)
        .with_change(
            Some(serde_json::json!({ "status": e.from })),
            Some(serde_json::json!({ "status": e.to })),
        )
    }
}

impl Entity for Activity {
    type Id = ActivityId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApplicationStatus;

    #[test]
    fn type_names_round_trip() {
        for t in [ActivityType::DesktopAppApproved, ActivityType::Sync, ActivityType::UserUpdated] {
            assert_eq!(serde_json::to_value(t).unwrap(), t.as_str());
            assert_eq!(ActivityType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ActivityType::parse("NOPE"), None);
    }

    #[test]
    fn status_change_entry_captures_old_and_new() {
        let e = StatusChanged {
            application_id: ApplicationId::new(),
            owner: UserId::new(),
            company_id: CompanyId::new(),
            actor: UserId::new(),
            from: ApplicationStatus::Pending,
            to: ApplicationStatus::Rejected,
            occurred_at: Utc::now(),
        };
        let a = Activity::for_status_change(&e);
        assert_eq!(a.activity_type, ActivityType::DesktopAppRejected);
        assert_eq!(a.user_id, e.actor);
        assert_eq!(a.old_value, Some(serde_json::json!({ "status": "PENDING" })));
        assert_eq!(a.new_value, Some(serde_json::json!({ "status": "REJECTED" })));
        assert_eq!(a.desktop_app_id, Some(e.application_id));
    }
}
