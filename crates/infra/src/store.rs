//! Persistence ports.
//!
//! One trait per concern, all implemented by both the in-memory and the
//! Postgres store. Every write that must be audited takes its [`Activity`]
//! so the entity change and the audit entry commit together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use amo_auth::User;
use amo_core::{
    AlertId, ApplicationId, CompanyId, DomainError, ExpectedVersion, LicenseId, MessageId, UserId,
};
use amo_licensing::License;
use amo_notices::{Alert, Message};
use amo_receipts::{Receipt, Scan};
use amo_registry::{Activity, Company, DesktopApplication};

pub const DUPLICATE_TIN_MESSAGE: &str = "Company with this TIN number already exists";
pub const DUPLICATE_EMAIL_MESSAGE: &str = "User with this email already exists";
pub const DUPLICATE_RECEIPT_MESSAGE: &str = "Receipt with this code already exists";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness rule rejected the write (TIN, e-mail, receipt code).
    #[error("{0}")]
    Duplicate(String),

    /// Optimistic concurrency check failed.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{0}")]
    Internal(String),
}

impl StoreError {
    pub(crate) fn version_conflict(entity: &str, expected: ExpectedVersion) -> Self {
        StoreError::Conflict(format!(
            "{entity} was modified concurrently (expected {expected:?})"
        ))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Read shapes
// ─────────────────────────────────────────────────────────────────────────────

/// Contact summary of an account, embedded in admin listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: UserId,
    pub name: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
}

impl From<&User> for OwnerSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationListing {
    pub application: DesktopApplication,
    pub company: Company,
    pub owner: Option<OwnerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseListing {
    pub license: License,
    pub owner: Option<OwnerSummary>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptTotals {
    pub total_receipts: u64,
    pub total_vat: i64,
}

/// A reviewer decision, persisted as one unit.
#[derive(Debug, Clone, Copy)]
pub struct StatusTransition<'a> {
    /// The application after the change.
    pub application: &'a DesktopApplication,
    /// Version the application had when it was loaded.
    pub expected: ExpectedVersion,
    /// Owner after promotion, with the version it was loaded at.
    pub promoted_owner: Option<(&'a User, ExpectedVersion)>,
    pub activity: &'a Activity,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ports
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account. Duplicate e-mail is [`StoreError::Duplicate`].
    async fn insert_user(&self, user: &User, activity: Option<&Activity>) -> StoreResult<()>;

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Lookup by normalized e-mail.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// All accounts, newest first.
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn count_users(&self) -> StoreResult<u64>;

    /// Persist the full state of `user` if the stored version still matches.
    async fn save_user(
        &self,
        user: &User,
        expected: ExpectedVersion,
        activity: Option<&Activity>,
    ) -> StoreResult<()>;
}

#[async_trait::async_trait]
pub trait RegistryStore: Send + Sync {
    /// Create company + PENDING application + audit entry atomically.
    ///
    /// TIN uniqueness is enforced inside the same critical section.
    async fn submit_application(
        &self,
        company: &Company,
        application: &DesktopApplication,
        activity: &Activity,
    ) -> StoreResult<()>;

    async fn find_application(&self, id: ApplicationId) -> StoreResult<Option<DesktopApplication>>;

    async fn find_company(&self, id: CompanyId) -> StoreResult<Option<Company>>;

    /// All applications with company and owner, newest first.
    async fn list_applications(&self) -> StoreResult<Vec<ApplicationListing>>;

    /// The caller's most recent application.
    async fn latest_application_for(&self, user_id: UserId) -> StoreResult<Option<ApplicationListing>>;

    /// Status write, optional owner promotion and audit entry as one unit.
    async fn apply_status_change(&self, change: StatusTransition<'_>) -> StoreResult<()>;

    async fn count_companies(&self) -> StoreResult<u64>;

    async fn count_applications(&self) -> StoreResult<u64>;
}

#[async_trait::async_trait]
pub trait LicenseStore: Send + Sync {
    async fn insert_license(&self, license: &License, activity: &Activity) -> StoreResult<()>;

    async fn find_license(&self, id: LicenseId) -> StoreResult<Option<License>>;

    /// All licenses with owner, newest first.
    async fn list_licenses(&self) -> StoreResult<Vec<LicenseListing>>;

    async fn save_license(&self, license: &License, activity: &Activity) -> StoreResult<()>;

    async fn count_licenses(&self) -> StoreResult<u64>;

    /// ACTIVE and not yet past `expires_at`.
    async fn count_active_licenses(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait::async_trait]
pub trait NoticeStore: Send + Sync {
    async fn insert_alert(&self, alert: &Alert, activity: &Activity) -> StoreResult<()>;

    async fn find_alert(&self, id: AlertId) -> StoreResult<Option<Alert>>;

    async fn list_alerts(&self) -> StoreResult<Vec<Alert>>;

    async fn save_alert(&self, alert: &Alert, activity: &Activity) -> StoreResult<()>;

    async fn count_active_alerts(&self) -> StoreResult<u64>;

    async fn insert_message(&self, message: &Message, activity: &Activity) -> StoreResult<()>;

    async fn find_message(&self, id: MessageId) -> StoreResult<Option<Message>>;

    async fn list_messages(&self) -> StoreResult<Vec<Message>>;

    async fn save_message(&self, message: &Message, activity: &Activity) -> StoreResult<()>;

    async fn count_unread_messages(&self) -> StoreResult<u64>;
}

#[async_trait::async_trait]
pub trait ActivityStore: Send + Sync {
    async fn append_activity(&self, activity: &Activity) -> StoreResult<()>;

    /// Newest first, at most `limit`.
    async fn recent_activities(&self, limit: usize) -> StoreResult<Vec<Activity>>;

    /// Newest first entries recorded by `user_id`.
    async fn recent_activities_for(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<Activity>>;
}

#[async_trait::async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Duplicate code is [`StoreError::Duplicate`].
    async fn insert_receipt(&self, receipt: &Receipt, activity: &Activity) -> StoreResult<()>;

    async fn find_receipt_by_code(&self, code: &str) -> StoreResult<Option<Receipt>>;

    async fn record_scan(&self, scan: &Scan) -> StoreResult<()>;

    async fn receipt_totals_for(&self, user_id: UserId) -> StoreResult<ReceiptTotals>;

    async fn count_scans_for(&self, user_id: UserId) -> StoreResult<u64>;

    async fn count_receipts(&self) -> StoreResult<u64>;
}

/// Everything the API needs from persistence.
pub trait PlatformStore:
    UserStore + RegistryStore + LicenseStore + NoticeStore + ActivityStore + ReceiptStore
{
}

impl<T> PlatformStore for T where
    T: UserStore + RegistryStore + LicenseStore + NoticeStore + ActivityStore + ReceiptStore + ?Sized
{
}
