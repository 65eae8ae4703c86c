//! Application services: the operations behind every route.
//!
//! Each method authorizes the caller through the central policy, drives the
//! domain model and hands the result to the store in a single call.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;

use amo_auth::user::{AdminUpdate, ChangePassword, PromoteRole, RegisterUser, UpdateProfile};
use amo_auth::{
    authorize, hash_password, validate_new_password, verify_password, Capability, PasswordError,
    Principal, Role, SessionCodec, User, UserCommand, UserEvent,
};
use amo_core::{
    Aggregate, AlertId, ApplicationId, CompanyId, ExpectedVersion, LicenseId, MessageId, UserId,
};
use amo_infra::{
    ApplicationListing, InMemoryStore, LicenseListing, OwnerSummary, PlatformStore, PostgresStore,
    ReceiptTotals, RemoteSync, StatusTransition, StoreResult, SyncReport, UnintegratedRemote,
};
use amo_licensing::{License, LicenseStatus};
use amo_notices::{Alert, AlertStatus, AlertType, Message, MessageStatus};
use amo_receipts::{normalize_code, NewReceipt, Receipt, Scan};
use amo_registry::application::{ChangeStatus, SubmitApplication};
use amo_registry::{
    Activity, ActivityType, ApplicationCommand, ApplicationEvent, ApplicationStatus, Company,
    CompanyDetails, DesktopApplication,
};

use crate::app::errors::ApiError;
use crate::config::{AdminSeed, ApiConfig};

pub const DEFAULT_ACTIVITY_LIMIT: usize = 100;
pub const MAX_ACTIVITY_LIMIT: usize = 500;
const DASHBOARD_ACTIVITY_LIMIT: usize = 5;

/// A user together with a freshly signed session token.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub company: Company,
    pub application: DesktopApplication,
}

#[derive(Debug, Clone, Default)]
pub struct PlatformStats {
    pub total_users: u64,
    pub active_licenses: u64,
    pub pending_alerts: u64,
    pub unread_messages: u64,
    pub recent_activity: Vec<Activity>,
    /// Queries that failed and were reported as zero/empty.
    pub degraded: Vec<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct UserDashboard {
    pub totals: ReceiptTotals,
    pub total_scans: u64,
    pub application_status: Option<ApplicationStatus>,
    pub recent_activities: Vec<Activity>,
    pub degraded: Vec<&'static str>,
}

#[derive(Clone)]
pub struct AppServices {
    store: Arc<dyn PlatformStore>,
    sessions: Arc<SessionCodec>,
    remote: Arc<dyn RemoteSync>,
    cookie_secure: bool,
}

fn caller(principal: Option<&Principal>, capability: Capability) -> Result<&Principal, ApiError> {
    Ok(authorize(principal, capability)?)
}

/// Run CPU-heavy password work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("password task failed: {e}")))
}

fn degrade<T: Default>(result: StoreResult<T>, query: &'static str, degraded: &mut Vec<&'static str>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(query, error = %e, "dashboard query failed; reporting default");
            degraded.push(query);
            T::default()
        }
    }
}

impl AppServices {
    pub fn new(
        store: Arc<dyn PlatformStore>,
        sessions: Arc<SessionCodec>,
        remote: Arc<dyn RemoteSync>,
        cookie_secure: bool,
    ) -> Self {
        Self {
            store,
            sessions,
            remote,
            cookie_secure,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionCodec> {
        &self.sessions
    }

    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    fn issue(&self, user: User) -> Result<SignedIn, ApiError> {
        let token = self.sessions.issue(&user, Utc::now())?;
        Ok(SignedIn { user, token })
    }

    async fn load_user(&self, id: UserId) -> Result<User, ApiError> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    // -------------------------
    // Authentication & accounts
    // -------------------------

    #[tracing::instrument(skip(self, password), err)]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, ApiError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        let password = password.to_string();
        let stored = user.password_hash.clone();
        blocking(move || verify_password(&password, &stored)).await??;

        tracing::info!(user_id = %user.id, "signed in");
        self.issue(user)
    }

    /// Create an account. `actor` is the admin creating it, or `None` for self-registration.
    async fn create_account(&self, account: NewAccount, actor: Option<UserId>) -> Result<User, ApiError> {
        validate_new_password(&account.password)?;
        let password = account.password;
        let password_hash = blocking(move || hash_password(&password)).await??;

        let now = Utc::now();
        let mut user = User::empty(UserId::new());
        user.execute(&UserCommand::Register(RegisterUser {
            user_id: user.id,
            email: account.email,
            name: account.name,
            password_hash,
            role: account.role,
            // An admin chose the password, so the owner must replace it.
            must_change_password: actor.is_some(),
            phone_number: account.phone_number,
            occurred_at: now,
        }))?;

        let description = match actor {
            Some(_) => format!("User {} created", user.email),
            None => format!("User {} registered", user.email),
        };
        let activity = Activity::new(ActivityType::UserCreated, actor.unwrap_or(user.id), description, now)
            .with_change(None, Some(json!(user.profile())));

        self.store.insert_user(&user, Some(&activity)).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub async fn register(&self, account: NewAccount) -> Result<User, ApiError> {
        self.create_account(NewAccount { role: Role::User, ..account }, None).await
    }

    pub async fn create_user(&self, principal: Option<&Principal>, account: NewAccount) -> Result<User, ApiError> {
        let admin = caller(principal, Capability::ManageUsers)?;
        self.create_account(account, Some(admin.user_id)).await
    }

    pub async fn list_users(&self, principal: Option<&Principal>) -> Result<Vec<User>, ApiError> {
        caller(principal, Capability::ManageUsers)?;
        Ok(self.store.list_users().await?)
    }

    pub async fn update_user(
        &self,
        principal: Option<&Principal>,
        id: UserId,
        name: Option<String>,
        role: Option<Role>,
        must_change_password: Option<bool>,
    ) -> Result<User, ApiError> {
        let admin = caller(principal, Capability::ManageUsers)?;
        let mut user = self.load_user(id).await?;
        let expected = ExpectedVersion::Exact(user.version);
        let before = json!(user.profile());

        let now = Utc::now();
        user.execute(&UserCommand::AdminUpdate(AdminUpdate {
            user_id: user.id,
            name,
            role,
            must_change_password,
            occurred_at: now,
        }))?;

        let activity = Activity::new(
            ActivityType::UserUpdated,
            admin.user_id,
            format!("User {} updated", user.email),
            now,
        )
        .with_change(Some(before), Some(json!(user.profile())));

        self.store.save_user(&user, expected, Some(&activity)).await?;
        tracing::info!(user_id = %user.id, "user updated by admin");
        Ok(user)
    }

    #[tracing::instrument(skip(self, principal, current_password, new_password), err)]
    pub async fn change_password(
        &self,
        principal: Option<&Principal>,
        current_password: String,
        new_password: String,
    ) -> Result<SignedIn, ApiError> {
        let me = caller(principal, Capability::ManageOwnProfile)?;
        let mut user = self.load_user(me.user_id).await?;

        let stored = user.password_hash.clone();
        match blocking(move || verify_password(&current_password, &stored)).await? {
            Ok(()) => {}
            Err(PasswordError::Mismatch) => {
                return Err(ApiError::validation("Current password is incorrect"));
            }
            Err(e) => return Err(e.into()),
        }
        validate_new_password(&new_password)?;
        let new_password_hash = blocking(move || hash_password(&new_password)).await??;

        let expected = ExpectedVersion::Exact(user.version);
        let now = Utc::now();
        user.execute(&UserCommand::ChangePassword(ChangePassword {
            user_id: user.id,
            new_password_hash,
            occurred_at: now,
        }))?;

        let activity = Activity::new(ActivityType::UserUpdated, user.id, "Password changed", now);
        self.store.save_user(&user, expected, Some(&activity)).await?;

        tracing::info!(user_id = %user.id, "password changed");
        self.issue(user)
    }

    pub async fn update_profile(
        &self,
        principal: Option<&Principal>,
        name: String,
        phone_number: String,
        profile_picture: Option<String>,
    ) -> Result<SignedIn, ApiError> {
        let me = caller(principal, Capability::ManageOwnProfile)?;
        let mut user = self.load_user(me.user_id).await?;
        let expected = ExpectedVersion::Exact(user.version);

        let now = Utc::now();
        let events = user.execute(&UserCommand::UpdateProfile(UpdateProfile {
            user_id: user.id,
            name,
            phone_number,
            profile_picture,
            occurred_at: now,
        }))?;

        let mut activity = Activity::new(ActivityType::UserUpdated, user.id, "Profile updated", now);
        if let Some(UserEvent::ProfileUpdated(e)) = events.first() {
            activity = activity.with_change(Some(json!(e.previous)), Some(json!(e.current)));
        }
        self.store.save_user(&user, expected, Some(&activity)).await?;

        tracing::info!(user_id = %user.id, "profile updated");
        self.issue(user)
    }

    /// Make sure the configured administrator exists and holds the ADMIN role.
    pub async fn seed_admin(&self, seed: &AdminSeed) -> Result<(), ApiError> {
        match self.store.find_user_by_email(&seed.email).await? {
            Some(user) if user.role.is_admin() => {
                tracing::debug!(user_id = %user.id, "admin account already present");
            }
            Some(mut user) => {
                let expected = ExpectedVersion::Exact(user.version);
                user.execute(&UserCommand::AdminUpdate(AdminUpdate {
                    user_id: user.id,
                    name: None,
                    role: Some(Role::Admin),
                    must_change_password: None,
                    occurred_at: Utc::now(),
                }))?;
                self.store.save_user(&user, expected, None).await?;
                tracing::info!(user_id = %user.id, "existing account promoted to admin");
            }
            None => {
                let user = self
                    .create_account(
                        NewAccount {
                            email: seed.email.clone(),
                            password: seed.password.clone(),
                            name: Some("Administrator".to_string()),
                            phone_number: None,
                            role: Role::Admin,
                        },
                        None,
                    )
                    .await?;
                tracing::info!(user_id = %user.id, "admin account seeded");
            }
        }
        Ok(())
    }

    // -------------------------
    // Desktop applications
    // -------------------------

    #[tracing::instrument(skip(self, principal, details), fields(tin = %details.tin_number), err)]
    pub async fn submit_application(
        &self,
        principal: Option<&Principal>,
        details: &CompanyDetails,
    ) -> Result<Submission, ApiError> {
        let me = caller(principal, Capability::SubmitApplication)?;
        let now = Utc::now();

        let company = Company::register(CompanyId::new(), me.user_id, details, now)?;
        let mut application = DesktopApplication::empty(ApplicationId::new());
        application.execute(&ApplicationCommand::Submit(SubmitApplication {
            application_id: application.id,
            user_id: me.user_id,
            company_id: company.id,
            occurred_at: now,
        }))?;

        let activity = Activity::new(
            ActivityType::DesktopAppRequested,
            me.user_id,
            format!("Desktop application requested for {}", company.name),
            now,
        )
        .with_company(company.id)
        .with_application(application.id)
        .with_change(None, Some(json!({ "status": application.status })));

        self.store
            .submit_application(&company, &application, &activity)
            .await?;

        tracing::info!(application_id = %application.id, company_id = %company.id, "application submitted");
        Ok(Submission { company, application })
    }

    /// Reviewer decision shared by the action and the status-patch routes.
    #[tracing::instrument(skip(self, principal), err)]
    pub async fn change_application_status(
        &self,
        principal: Option<&Principal>,
        id: ApplicationId,
        target: ApplicationStatus,
    ) -> Result<ApplicationListing, ApiError> {
        let admin = caller(principal, Capability::ReviewApplications)?;

        let mut application = self
            .store
            .find_application(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Desktop application not found"))?;
        let expected = ExpectedVersion::Exact(application.version);

        let now = Utc::now();
        let events = application.execute(&ApplicationCommand::ChangeStatus(ChangeStatus {
            application_id: id,
            target,
            actor: admin.user_id,
            occurred_at: now,
        }))?;
        let Some(ApplicationEvent::StatusChanged(change)) = events.first() else {
            return Err(ApiError::internal("status change produced no event"));
        };
        let activity = Activity::for_status_change(change);

        let mut owner = self.store.find_user(change.owner).await?;
        let mut promoted = None;
        if change.promotes_owner() {
            if let Some(user) = owner.as_mut() {
                let owner_expected = ExpectedVersion::Exact(user.version);
                let role_events = user.execute(&UserCommand::PromoteRole(PromoteRole {
                    user_id: user.id,
                    role: Role::CompanyAdmin,
                    occurred_at: now,
                }))?;
                if !role_events.is_empty() {
                    promoted = Some(owner_expected);
                }
            }
        }

        self.store
            .apply_status_change(StatusTransition {
                application: &application,
                expected,
                promoted_owner: owner.as_ref().zip(promoted),
                activity: &activity,
            })
            .await?;

        tracing::info!(
            application_id = %id,
            from = %change.from,
            to = %change.to,
            owner_promoted = promoted.is_some(),
            "application status changed"
        );

        let company = self
            .store
            .find_company(application.company_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Company not found"))?;
        Ok(ApplicationListing {
            application,
            company,
            owner: owner.as_ref().map(OwnerSummary::from),
        })
    }

    pub async fn list_applications(&self, principal: Option<&Principal>) -> Result<Vec<ApplicationListing>, ApiError> {
        caller(principal, Capability::ReviewApplications)?;
        Ok(self.store.list_applications().await?)
    }

    pub async fn own_application(&self, principal: Option<&Principal>) -> Result<Option<ApplicationListing>, ApiError> {
        let me = caller(principal, Capability::ViewOwnDashboard)?;
        Ok(self.store.latest_application_for(me.user_id).await?)
    }

    // -------------------------
    // Licenses
    // -------------------------

    pub async fn list_licenses(&self, principal: Option<&Principal>) -> Result<Vec<LicenseListing>, ApiError> {
        caller(principal, Capability::ManageLicenses)?;
        Ok(self.store.list_licenses().await?)
    }

    pub async fn issue_license(
        &self,
        principal: Option<&Principal>,
        user_id: UserId,
        expires_at: DateTime<Utc>,
        max_users: u32,
    ) -> Result<LicenseListing, ApiError> {
        let admin = caller(principal, Capability::ManageLicenses)?;
        let owner = self.load_user(user_id).await?;

        let now = Utc::now();
        let license = License::issue(owner.id, expires_at, max_users, now)?;
        let activity = Activity::new(
            ActivityType::LicenseCreated,
            admin.user_id,
            format!("License {} issued to {}", license.key, owner.email),
            now,
        )
        .with_change(None, Some(json!(license)));

        self.store.insert_license(&license, &activity).await?;
        tracing::info!(license_id = %license.id, user_id = %owner.id, "license issued");
        Ok(LicenseListing {
            license,
            owner: Some(OwnerSummary::from(&owner)),
        })
    }

    pub async fn amend_license(
        &self,
        principal: Option<&Principal>,
        id: LicenseId,
        status: Option<LicenseStatus>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<License, ApiError> {
        let admin = caller(principal, Capability::ManageLicenses)?;
        let mut license = self
            .store
            .find_license(id)
            .await?
            .ok_or_else(|| ApiError::not_found("License not found"))?;
        let before = json!(license);

        let now = Utc::now();
        license.amend(status, expires_at, now)?;
        let activity = Activity::new(
            ActivityType::LicenseUpdated,
            admin.user_id,
            format!("License {} updated", license.key),
            now,
        )
        .with_change(Some(before), Some(json!(license)));

        self.store.save_license(&license, &activity).await?;
        tracing::info!(license_id = %license.id, status = %license.status, "license updated");
        Ok(license)
    }

    // -------------------------
    // Alerts & messages
    // -------------------------

    pub async fn list_alerts(&self, principal: Option<&Principal>) -> Result<Vec<Alert>, ApiError> {
        caller(principal, Capability::ManageAlerts)?;
        Ok(self.store.list_alerts().await?)
    }

    pub async fn raise_alert(
        &self,
        principal: Option<&Principal>,
        alert_type: AlertType,
        title: Option<&str>,
        message: &str,
        data: Option<serde_json::Value>,
    ) -> Result<Alert, ApiError> {
        let me = caller(principal, Capability::RaiseAlert)?;
        let now = Utc::now();
        let alert = Alert::raise(me.user_id, alert_type, title, message, data, now)?;
        let activity = Activity::new(
            ActivityType::AlertCreated,
            me.user_id,
            format!("Alert created: {}", alert.title),
            now,
        )
        .with_change(None, Some(json!({ "status": alert.status })));

        self.store.insert_alert(&alert, &activity).await?;
        tracing::info!(alert_id = %alert.id, alert_type = alert.alert_type.as_str(), "alert raised");
        Ok(alert)
    }

    pub async fn respond_alert(
        &self,
        principal: Option<&Principal>,
        id: AlertId,
        status: AlertStatus,
        response: Option<String>,
    ) -> Result<Alert, ApiError> {
        let admin = caller(principal, Capability::ManageAlerts)?;
        let mut alert = self
            .store
            .find_alert(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Alert not found"))?;
        let before = json!({ "status": alert.status, "response": alert.response });

        let now = Utc::now();
        alert.respond(status, response, now);
        let activity = Activity::new(
            ActivityType::AlertUpdated,
            admin.user_id,
            format!("Alert updated: {}", alert.title),
            now,
        )
        .with_change(
            Some(before),
            Some(json!({ "status": alert.status, "response": alert.response })),
        );

        self.store.save_alert(&alert, &activity).await?;
        tracing::info!(alert_id = %alert.id, status = alert.status.as_str(), "alert updated");
        Ok(alert)
    }

    pub async fn list_messages(&self, principal: Option<&Principal>) -> Result<Vec<Message>, ApiError> {
        caller(principal, Capability::ManageMessages)?;
        Ok(self.store.list_messages().await?)
    }

    pub async fn send_message(
        &self,
        principal: Option<&Principal>,
        subject: &str,
        content: &str,
    ) -> Result<Message, ApiError> {
        let me = caller(principal, Capability::SendMessage)?;
        let now = Utc::now();
        let message = Message::compose(me.user_id, subject, content, now)?;
        let activity = Activity::new(
            ActivityType::MessageCreated,
            me.user_id,
            format!("Message sent: {}", message.subject),
            now,
        );

        self.store.insert_message(&message, &activity).await?;
        tracing::info!(message_id = %message.id, "message sent");
        Ok(message)
    }

    pub async fn mark_message(
        &self,
        principal: Option<&Principal>,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<Message, ApiError> {
        let admin = caller(principal, Capability::ManageMessages)?;
        let mut message = self
            .store
            .find_message(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Message not found"))?;
        let before = json!({ "status": message.status });

        let now = Utc::now();
        message.mark(status, now);
        let activity = Activity::new(
            ActivityType::MessageUpdated,
            admin.user_id,
            format!("Message marked {}", message.status.as_str()),
            now,
        )
        .with_change(Some(before), Some(json!({ "status": message.status })));

        self.store.save_message(&message, &activity).await?;
        Ok(message)
    }

    // -------------------------
    // Receipts
    // -------------------------

    pub async fn record_receipt(&self, principal: Option<&Principal>, input: NewReceipt) -> Result<Receipt, ApiError> {
        let me = caller(principal, Capability::RecordReceipts)?;
        let now = Utc::now();
        let receipt = Receipt::record(me.user_id, input, now)?;
        let activity = Activity::new(
            ActivityType::ReceiptRecorded,
            me.user_id,
            format!("Receipt {} recorded", receipt.code),
            now,
        );

        self.store.insert_receipt(&receipt, &activity).await?;
        tracing::info!(receipt_id = %receipt.id, "receipt recorded");
        Ok(receipt)
    }

    /// Public lookup. A signed-in caller also gets a scan on record.
    pub async fn verify_receipt(
        &self,
        scanner: Option<&Principal>,
        raw_code: &str,
    ) -> Result<(Receipt, Option<OwnerSummary>), ApiError> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return Err(ApiError::validation("Missing receipt code"));
        }
        let receipt = self
            .store
            .find_receipt_by_code(&code)
            .await?
            .ok_or_else(|| ApiError::not_found("Receipt not found"))?;
        let owner = self
            .store
            .find_user(receipt.user_id)
            .await?
            .map(|u| OwnerSummary::from(&u));

        if let Some(me) = scanner {
            let now = Utc::now();
            self.store.record_scan(&Scan::of(&receipt, me.user_id, now)).await?;
            let activity = Activity::new(
                ActivityType::ReceiptScanned,
                me.user_id,
                format!("Receipt {} scanned", receipt.code),
                now,
            );
            self.store.append_activity(&activity).await?;
        }
        Ok((receipt, owner))
    }

    // -------------------------
    // Dashboards, activity log & sync
    // -------------------------

    pub async fn platform_stats(&self, principal: Option<&Principal>) -> Result<PlatformStats, ApiError> {
        caller(principal, Capability::ViewPlatformStats)?;
        let store = self.store.as_ref();

        let (users, licenses, alerts, messages, recent) = tokio::join!(
            store.count_users(),
            store.count_active_licenses(Utc::now()),
            store.count_active_alerts(),
            store.count_unread_messages(),
            store.recent_activities(DASHBOARD_ACTIVITY_LIMIT),
        );

        let mut degraded = Vec::new();
        Ok(PlatformStats {
            total_users: degrade(users, "totalUsers", &mut degraded),
            active_licenses: degrade(licenses, "activeLicenses", &mut degraded),
            pending_alerts: degrade(alerts, "pendingAlerts", &mut degraded),
            unread_messages: degrade(messages, "unreadMessages", &mut degraded),
            recent_activity: degrade(recent, "recentActivity", &mut degraded),
            degraded,
        })
    }

    pub async fn user_dashboard(&self, principal: Option<&Principal>) -> Result<UserDashboard, ApiError> {
        let me = caller(principal, Capability::ViewOwnDashboard)?;
        let store = self.store.as_ref();

        let (totals, scans, latest, recent) = tokio::join!(
            store.receipt_totals_for(me.user_id),
            store.count_scans_for(me.user_id),
            store.latest_application_for(me.user_id),
            store.recent_activities_for(me.user_id, DASHBOARD_ACTIVITY_LIMIT),
        );

        let mut degraded = Vec::new();
        Ok(UserDashboard {
            totals: degrade(totals, "totalReceipts", &mut degraded),
            total_scans: degrade(scans, "totalScans", &mut degraded),
            application_status: degrade(latest, "applicationStatus", &mut degraded)
                .map(|l| l.application.status),
            recent_activities: degrade(recent, "recentActivities", &mut degraded),
            degraded,
        })
    }

    pub async fn recent_activities(
        &self,
        principal: Option<&Principal>,
        limit: Option<usize>,
    ) -> Result<Vec<Activity>, ApiError> {
        caller(principal, Capability::ViewActivityLog)?;
        let limit = limit
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
            .clamp(1, MAX_ACTIVITY_LIMIT);
        Ok(self.store.recent_activities(limit).await?)
    }

    #[tracing::instrument(skip(self, principal), err)]
    pub async fn run_sync(&self, principal: Option<&Principal>) -> Result<SyncReport, ApiError> {
        let admin = caller(principal, Capability::RunSync)?;
        let report = self.remote.synchronize(self.store.as_ref()).await?;

        let activity = Activity::new(
            ActivityType::Sync,
            admin.user_id,
            format!(
                "Data synchronization completed. {} records synced successfully.",
                report.synced_records
            ),
            Utc::now(),
        )
        .with_change(None, Some(json!(report)));
        self.store.append_activity(&activity).await?;
        Ok(report)
    }
}

/// Wire the store, session codec and sync backend from configuration.
///
/// Postgres is used when `use_persistent_stores` is set; otherwise everything
/// lives in memory for the lifetime of the process.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn PlatformStore> = if config.use_persistent_stores {
        let database_url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;
        let pool = PgPool::connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        let store = PostgresStore::new(pool);
        store.migrate().await.context("failed to apply database schema")?;
        tracing::info!("using Postgres stores");
        Arc::new(store)
    } else {
        tracing::info!("using in-memory stores");
        Arc::new(InMemoryStore::new())
    };

    let sessions = Arc::new(SessionCodec::new(config.jwt_secret.as_bytes(), config.session_ttl));
    let remote = Arc::new(UnintegratedRemote::new(config.sync_delay));
    let services = AppServices::new(store, sessions, remote, config.cookie_secure);

    if let Some(seed) = &config.admin_seed {
        services
            .seed_admin(seed)
            .await
            .context("failed to seed admin account")?;
    }
    Ok(services)
}
