use core::str::FromStr;

use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};

use amo_core::{DomainError, DomainResult, Entity, LicenseId, UserId};

pub const KEY_LEN: usize = 13;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    Active,
    Expired,
    Revoked,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "ACTIVE",
            LicenseStatus::Expired => "EXPIRED",
            LicenseStatus::Revoked => "REVOKED",
        }
    }
}

impl core::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ACTIVE" => Ok(LicenseStatus::Active),
            "EXPIRED" => Ok(LicenseStatus::Expired),
            "REVOKED" => Ok(LicenseStatus::Revoked),
            _ => Err(DomainError::validation("Invalid license status")),
        }
    }
}

/// Random lower-case alphanumeric license key.
pub fn generate_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub id: LicenseId,
    pub key: String,
    pub user_id: UserId,
    pub status: LicenseStatus,
    pub expires_at: DateTime<Utc>,
    pub max_users: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl License {
    pub fn issue(
        user_id: UserId,
        expires_at: DateTime<Utc>,
        max_users: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if max_users == 0 {
            return Err(DomainError::validation("maxUsers must be at least 1"));
        }
        if expires_at <= now {
            return Err(DomainError::validation("expiresAt must be in the future"));
        }
        Ok(Self {
            id: LicenseId::new(),
            key: generate_key(),
            user_id,
            status: LicenseStatus::Active,
            expires_at,
            max_users,
            created_at: now,
            updated_at: now,
        })
    }

    /// Status as observed at `now`: an ACTIVE license past its expiry reads as EXPIRED.
    pub fn effective_status(&self, now: DateTime<Utc>) -> LicenseStatus {
        match self.status {
            LicenseStatus::Active if self.expires_at <= now => LicenseStatus::Expired,
            other => other,
        }
    }

    /// Apply an administrative edit. REVOKED is final.
    pub fn amend(
        &mut self,
        status: Option<LicenseStatus>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if status.is_none() && expires_at.is_none() {
            return Err(DomainError::validation("nothing to update"));
        }
        let next_status = status.unwrap_or(self.status);
        let next_expiry = expires_at.unwrap_or(self.expires_at);

        if self.status == LicenseStatus::Revoked && next_status != LicenseStatus::Revoked {
            return Err(DomainError::invalid_transition("license", self.status, next_status));
        }
        if next_status == LicenseStatus::Active && next_expiry <= now {
            return Err(DomainError::validation("an active license needs a future expiresAt"));
        }

        self.status = next_status;
        self.expires_at = next_expiry;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for License {
    type Id = LicenseId;

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
    use chrono::Duration;

    #[test]
    fn keys_are_lowercase_alphanumeric() {
        let key = generate_key();
        assert_eq!(key.len(), KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(key, generate_key());
    }

    #[test]
    fn issue_validates_inputs() {
        let now = Utc::now();
        let owner = UserId::new();
        assert!(License::issue(owner, now + Duration::days(30), 0, now).is_err());
        assert!(License::issue(owner, now - Duration::days(1), 5, now).is_err());
        let l = License::issue(owner, now + Duration::days(30), 5, now).unwrap();
        assert_eq!(l.status, LicenseStatus::Active);
    }

    #[test]
    fn active_license_expires_by_clock() {
        let now = Utc::now();
        let l = License::issue(UserId::new(), now + Duration::days(1), 1, now).unwrap();
        assert_eq!(l.effective_status(now), LicenseStatus::Active);
        assert_eq!(l.effective_status(now + Duration::days(2)), LicenseStatus::Expired);
    }

    #[test]
    fn revoked_is_final() {
        let now = Utc::now();
        let mut l = License::issue(UserId::new(), now + Duration::days(1), 1, now).unwrap();
        l.amend(Some(LicenseStatus::Revoked), None, now).unwrap();
        let err = l.amend(Some(LicenseStatus::Active), None, now).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(l.status, LicenseStatus::Revoked);
    }

    #[test]
    fn extending_expiry_keeps_status() {
        let now = Utc::now();
        let mut l = License::issue(UserId::new(), now + Duration::days(1), 1, now).unwrap();
        let later = now + Duration::days(365);
        l.amend(None, Some(later), now).unwrap();
        assert_eq!(l.expires_at, later);
        assert_eq!(l.status, LicenseStatus::Active);
    }
}
