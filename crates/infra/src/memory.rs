//! In-memory platform store for tests and local development.
//!
//! All state sits behind one `RwLock`, so every multi-record write (company +
//! application + activity, status + promotion + activity) is a single critical
//! section.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use amo_auth::User;
use amo_core::{
    AlertId, ApplicationId, CompanyId, ExpectedVersion, LicenseId, MessageId, ReceiptId, UserId,
    newest_first,
};
use amo_licensing::{License, LicenseStatus};
use amo_notices::{Alert, AlertStatus, Message, MessageStatus};
use amo_receipts::{Receipt, Scan};
use amo_registry::{Activity, Company, DesktopApplication};

use crate::store::{
    ActivityStore, ApplicationListing, DUPLICATE_EMAIL_MESSAGE, DUPLICATE_RECEIPT_MESSAGE,
    DUPLICATE_TIN_MESSAGE, LicenseListing, LicenseStore, NoticeStore, OwnerSummary, ReceiptStore,
    ReceiptTotals, RegistryStore, StatusTransition, StoreError, StoreResult, UserStore,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    companies: HashMap<CompanyId, Company>,
    applications: HashMap<ApplicationId, DesktopApplication>,
    licenses: HashMap<LicenseId, License>,
    alerts: HashMap<AlertId, Alert>,
    messages: HashMap<MessageId, Message>,
    receipts: HashMap<ReceiptId, Receipt>,
    scans: Vec<Scan>,
    activities: Vec<Activity>,
}

impl State {
    fn owner(&self, id: UserId) -> Option<OwnerSummary> {
        self.users.get(&id).map(OwnerSummary::from)
    }

    fn listing(&self, app: &DesktopApplication) -> Option<ApplicationListing> {
        let company = self.companies.get(&app.company_id)?.clone();
        Some(ApplicationListing {
            application: app.clone(),
            company,
            owner: self.owner(app.user_id),
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Internal("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Internal("in-memory store lock poisoned".into()))
    }
}

/// Newest first for rows that are not entities themselves.
fn newest_first_by<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, K)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn count(n: usize) -> u64 {
    n as u64
}

#[async_trait::async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: &User, activity: Option<&Activity>) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(DUPLICATE_EMAIL_MESSAGE.into()));
        }
        state.users.insert(user.id, user.clone());
        if let Some(activity) = activity {
            state.activities.push(activity.clone());
        }
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        newest_first_by(&mut users, |u| (u.created_at, u.id));
        Ok(users)
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(count(self.read()?.users.len()))
    }

    async fn save_user(
        &self,
        user: &User,
        expected: ExpectedVersion,
        activity: Option<&Activity>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        let stored = state.users.get(&user.id).ok_or(StoreError::NotFound("user"))?;
        if !expected.matches(stored.version) {
            return Err(StoreError::version_conflict("user", expected));
        }
        if state.users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(StoreError::Duplicate(DUPLICATE_EMAIL_MESSAGE.into()));
        }
        state.users.insert(user.id, user.clone());
        if let Some(activity) = activity {
            state.activities.push(activity.clone());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RegistryStore for InMemoryStore {
    async fn submit_application(
        &self,
        company: &Company,
        application: &DesktopApplication,
        activity: &Activity,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.companies.values().any(|c| c.tin_number == company.tin_number) {
            return Err(StoreError::Duplicate(DUPLICATE_TIN_MESSAGE.into()));
        }
        state.companies.insert(company.id, company.clone());
        state.applications.insert(application.id, application.clone());
        state.activities.push(activity.clone());
        Ok(())
    }

    async fn find_application(&self, id: ApplicationId) -> StoreResult<Option<DesktopApplication>> {
        Ok(self.read()?.applications.get(&id).cloned())
    }

    async fn find_company(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        Ok(self.read()?.companies.get(&id).cloned())
    }

    async fn list_applications(&self) -> StoreResult<Vec<ApplicationListing>> {
        let state = self.read()?;
        let mut listings: Vec<ApplicationListing> =
            state.applications.values().filter_map(|a| state.listing(a)).collect();
        newest_first_by(&mut listings, |l| (l.application.created_at, l.application.id));
        Ok(listings)
    }

    async fn latest_application_for(&self, user_id: UserId) -> StoreResult<Option<ApplicationListing>> {
        let state = self.read()?;
        let latest = state
            .applications
            .values()
            .filter(|a| a.user_id == user_id)
            .max_by_key(|a| (a.created_at, a.id));
        Ok(latest.and_then(|a| state.listing(a)))
    }

    async fn apply_status_change(&self, change: StatusTransition<'_>) -> StoreResult<()> {
        let mut state = self.write()?;

        let stored = state
            .applications
            .get(&change.application.id)
            .ok_or(StoreError::NotFound("desktop application"))?;
        if !change.expected.matches(stored.version) {
            return Err(StoreError::version_conflict("desktop application", change.expected));
        }
        if let Some((owner, expected)) = change.promoted_owner {
            let stored = state.users.get(&owner.id).ok_or(StoreError::NotFound("user"))?;
            if !expected.matches(stored.version) {
                return Err(StoreError::version_conflict("user", expected));
            }
        }

        // All checks passed; nothing below can fail.
        state
            .applications
            .insert(change.application.id, change.application.clone());
        if let Some((owner, _)) = change.promoted_owner {
            state.users.insert(owner.id, owner.clone());
        }
        state.activities.push(change.activity.clone());
        Ok(())
    }

    async fn count_companies(&self) -> StoreResult<u64> {
        Ok(count(self.read()?.companies.len()))
    }

    async fn count_applications(&self) -> StoreResult<u64> {
        Ok(count(self.read()?.applications.len()))
    }
}

#[async_trait::async_trait]
impl LicenseStore for InMemoryStore {
    async fn insert_license(&self, license: &License, activity: &Activity) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.licenses.values().any(|l| l.key == license.key) {
            return Err(StoreError::Duplicate("license key collision".into()));
        }
        state.licenses.insert(license.id, license.clone());
        state.activities.push(activity.clone());
        Ok(())
    }

    async fn find_license(&self, id: LicenseId) -> StoreResult<Option<License>> {
        Ok(self.read()?.licenses.get(&id).cloned())
    }

    async fn list_licenses(&self) -> StoreResult<Vec<LicenseListing>> {
        let state = self.read()?;
        let mut listings: Vec<LicenseListing> = state
            .licenses
            .values()
            .map(|l| LicenseListing {
                license: l.clone(),
                owner: state.owner(l.user_id),
            })
            .collect();
        newest_first_by(&mut listings, |l| (l.license.created_at, l.license.id));
        Ok(listings)
    }

    async fn save_license(&self, license: &License, activity: &Activity) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.licenses.contains_key(&license.id) {
            return Err(StoreError::NotFound("license"));
        }
        state.licenses.insert(license.id, license.clone());
        state.activities.push(activity.clone());
        Ok(())
    }

    async fn count_licenses(&self) -> StoreResult<u64> {
        Ok(count(self.read()?.licenses.len()))
    }

    async fn count_active_licenses(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let state = self.read()?;
        Ok(count(
            state
                .licenses
                .values()
                .filter(|l| l.effective_status(now) == LicenseStatus::Active)
                .count(),
        ))
    }
}

#[async_trait::async_trait]
impl NoticeStore for InMemoryStore {
    async fn insert_alert(&self, alert: &Alert, activity: &Activity) -> StoreResult<()> {
        let mut state = self.write()?;
        state.alerts.insert(alert.id, alert.clone());
        state.activities.push(activity.clone());
        Ok(())
    }

    async fn find_alert(&self, id: AlertId) -> StoreResult<Option<Alert>> {
        Ok(self.read()?.alerts.get(&id).cloned())
    }

    async fn list_alerts(&self) -> StoreResult<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self.read()?.alerts.values().cloned().collect();
        newest_first(&mut alerts);
        Ok(alerts)
    }

    async fn save_alert(&self, alert: &Alert, activity: &Activity) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.alerts.contains_key(&alert.id) {
            return Err(StoreError::NotFound("alert"));
        }
        state.alerts.insert(alert.id, alert.clone());
        state.activities.push(activity.clone());
        Ok(())
    }

    async fn count_active_alerts(&self) -> StoreResult<u64> {
        let state = self.read()?;
        Ok(count(
            state.alerts.values().filter(|a| a.status == AlertStatus::Active).count(),
        ))
    }

    async fn insert_message(&self, message: &Message, activity: &Activity) -> StoreResult<()> {
        let mut state = self.write()?;
        state.messages.insert(message.id, message.clone());
        state.activities.push(activity.clone());
        Ok(())
    }

    async fn find_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        Ok(self.read()?.messages.get(&id).cloned())
    }

    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self.read()?.messages.values().cloned().collect();
        newest_first(&mut messages);
        Ok(messages)
    }

    async fn save_message(&self, message: &Message, activity: &Activity) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.messages.contains_key(&message.id) {
            return Err(StoreError::NotFound("message"));
        }
        state.messages.insert(message.id, message.clone());
        state.activities.push(activity.clone());
        Ok(())
    }

    async fn count_unread_messages(&self) -> StoreResult<u64> {
        let state = self.read()?;
        Ok(count(
            state.messages.values().filter(|m| m.status == MessageStatus::Unread).count(),
        ))
    }
}

#[async_trait::async_trait]
impl ActivityStore for InMemoryStore {
    async fn append_activity(&self, activity: &Activity) -> StoreResult<()> {
        self.write()?.activities.push(activity.clone());
        Ok(())
    }

    async fn recent_activities(&self, limit: usize) -> StoreResult<Vec<Activity>> {
        let mut entries = self.read()?.activities.clone();
        newest_first(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn recent_activities_for(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<Activity>> {
        let mut entries: Vec<Activity> = self
            .read()?
            .activities
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl ReceiptStore for InMemoryStore {
    async fn insert_receipt(&self, receipt: &Receipt, activity: &Activity) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.receipts.values().any(|r| r.code == receipt.code) {
            return Err(StoreError::Duplicate(DUPLICATE_RECEIPT_MESSAGE.into()));
        }
        state.receipts.insert(receipt.id, receipt.clone());
        state.activities.push(activity.clone());
        Ok(())
    }

    async fn find_receipt_by_code(&self, code: &str) -> StoreResult<Option<Receipt>> {
        Ok(self.read()?.receipts.values().find(|r| r.code == code).cloned())
    }

    async fn record_scan(&self, scan: &Scan) -> StoreResult<()> {
        self.write()?.scans.push(scan.clone());
        Ok(())
    }

    async fn receipt_totals_for(&self, user_id: UserId) -> StoreResult<ReceiptTotals> {
        let state = self.read()?;
        Ok(state
            .receipts
            .values()
            .filter(|r| r.user_id == user_id)
            .fold(ReceiptTotals::default(), |acc, r| ReceiptTotals {
                total_receipts: acc.total_receipts + 1,
                total_vat: acc.total_vat + r.vat_amount,
            }))
    }

    async fn count_scans_for(&self, user_id: UserId) -> StoreResult<u64> {
        let state = self.read()?;
        Ok(count(state.scans.iter().filter(|s| s.user_id == user_id).count()))
    }

    async fn count_receipts(&self) -> StoreResult<u64> {
        Ok(count(self.read()?.receipts.len()))
    }
}
