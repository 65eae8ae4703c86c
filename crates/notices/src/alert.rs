use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use amo_core::{AlertId, DomainError, DomainResult, Entity, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    Info,
    Warning,
    Error,
    Success,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Info => "INFO",
            AlertType::Warning => "WARNING",
            AlertType::Error => "ERROR",
            AlertType::Success => "SUCCESS",
        }
    }

    fn default_title(&self) -> &'static str {
        match self {
            AlertType::Info => "Information",
            AlertType::Warning => "Warning",
            AlertType::Error => "Error",
            AlertType::Success => "Success",
        }
    }
}

impl FromStr for AlertType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(AlertType::Info),
            "WARNING" => Ok(AlertType::Warning),
            "ERROR" => Ok(AlertType::Error),
            "SUCCESS" => Ok(AlertType::Success),
            _ => Err(DomainError::validation("Invalid alert type")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Active,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "ACTIVE",
            AlertStatus::Resolved => "RESOLVED",
            AlertStatus::Dismissed => "DISMISSED",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ACTIVE" => Ok(AlertStatus::Active),
            "RESOLVED" => Ok(AlertStatus::Resolved),
            "DISMISSED" => Ok(AlertStatus::Dismissed),
            _ => Err(DomainError::validation("Invalid alert status")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub title: String,
    pub message: String,
    pub data: Option<JsonValue>,
    pub status: AlertStatus,
    pub response: Option<String>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn raise(
        raised_by: UserId,
        alert_type: AlertType,
        title: Option<&str>,
        message: &str,
        data: Option<JsonValue>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let message = message.trim();
        if message.is_empty() {
            return Err(DomainError::validation("message is required"));
        }
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(alert_type.default_title());

        Ok(Self {
            id: AlertId::new(),
            alert_type,
            title: title.to_string(),
            message: message.to_string(),
            data,
            status: AlertStatus::Active,
            response: None,
            user_id: raised_by,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        })
    }

    /// Operator response. Resolving stamps `resolved_at`; reopening clears it.
    pub fn respond(&mut self, status: AlertStatus, response: Option<String>, now: DateTime<Utc>) {
        match status {
            AlertStatus::Resolved if self.resolved_at.is_none() => self.resolved_at = Some(now),
            AlertStatus::Active => self.resolved_at = None,
            _ => {}
        }
        self.status = status;
        if let Some(response) = response.filter(|r| !r.trim().is_empty()) {
            self.response = Some(response);
        }
        self.updated_at = now;
    }
}

impl Entity for Alert {
    type Id = AlertId;

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

    #[test]
    fn raise_defaults_title_and_requires_message() {
        let now = Utc::now();
        let a = Alert::raise(UserId::new(), AlertType::Warning, None, "Disk almost full", None, now).unwrap();
        assert_eq!(a.title, "Warning");
        assert_eq!(a.status, AlertStatus::Active);
        assert!(Alert::raise(UserId::new(), AlertType::Info, None, "  ", None, now).is_err());
    }

    #[test]
    fn resolving_stamps_once_and_reopen_clears() {
        let now = Utc::now();
        let mut a = Alert::raise(UserId::new(), AlertType::Error, Some("Sync"), "failed", None, now).unwrap();
        a.respond(AlertStatus::Resolved, Some("restarted".into()), now);
        let stamped = a.resolved_at;
        assert!(stamped.is_some());
        a.respond(AlertStatus::Resolved, None, now + chrono::Duration::minutes(5));
        assert_eq!(a.resolved_at, stamped);
        assert_eq!(a.response.as_deref(), Some("restarted"));
        a.respond(AlertStatus::Active, None, now);
        assert!(a.resolved_at.is_none());
    }

    #[test]
    fn type_parsing_is_case_insensitive() {
        assert_eq!("warning".parse::<AlertType>().unwrap(), AlertType::Warning);
        assert!("PANIC".parse::<AlertType>().is_err());
    }
}
