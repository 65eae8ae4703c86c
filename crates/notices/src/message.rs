use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use amo_core::{DomainError, DomainResult, Entity, MessageId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Unread,
    Read,
    Archived,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Unread => "UNREAD",
            MessageStatus::Read => "READ",
            MessageStatus::Archived => "ARCHIVED",
        }
    }
}

impl FromStr for MessageStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "UNREAD" => Ok(MessageStatus::Unread),
            "READ" => Ok(MessageStatus::Read),
            "ARCHIVED" => Ok(MessageStatus::Archived),
            _ => Err(DomainError::validation("Invalid status")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub subject: String,
    pub content: String,
    pub status: MessageStatus,
    pub sender_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn compose(sender: UserId, subject: &str, content: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        let (subject, content) = (subject.trim(), content.trim());
        if subject.is_empty() || content.is_empty() {
            return Err(DomainError::validation("subject and content are required"));
        }
        Ok(Self {
            id: MessageId::new(),
            subject: subject.to_string(),
            content: content.to_string(),
            status: MessageStatus::Unread,
            sender_id: sender,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn mark(&mut self, status: MessageStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

impl Entity for Message {
    type Id = MessageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
