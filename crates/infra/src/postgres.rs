//! Postgres-backed platform store.
//!
//! Multi-record writes run in one transaction. Uniqueness (e-mail, TIN, receipt
//! code) is enforced by constraints and optimistic concurrency by a `version`
//! column compared inside the `UPDATE`'s `WHERE` clause.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` (message chosen by constraint name) |
//! | Database (other) | Any other | `Database` |
//! | PoolClosed, network, decode | N/A | `Database` |

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use tracing::instrument;
use uuid::Uuid;

use amo_auth::{Role, User};
use amo_core::{
    ActivityId, AlertId, ApplicationId, CompanyId, ExpectedVersion, LicenseId, MessageId, ReceiptId,
    UserId,
};
use amo_licensing::{License, LicenseStatus};
use amo_notices::{Alert, AlertStatus, AlertType, Message, MessageStatus};
use amo_receipts::{Receipt, Scan};
use amo_registry::{
    Activity, ActivityType, ApplicationStatus, Company, DesktopApplication, TinNumber,
};

use crate::store::{
    ActivityStore, ApplicationListing, DUPLICATE_EMAIL_MESSAGE, DUPLICATE_RECEIPT_MESSAGE,
    DUPLICATE_TIN_MESSAGE, LicenseListing, LicenseStore, NoticeStore, OwnerSummary, ReceiptStore,
    ReceiptTotals, RegistryStore, StatusTransition, StoreError, StoreResult, UserStore,
};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn count(&self, operation: &'static str, sql: &'static str) -> StoreResult<u64> {
        let row = sqlx::query(sql)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        let n: i64 = col(&row, "n")?;
        Ok(n.max(0) as u64)
    }

    async fn user_exists(&self, id: UserId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_exists", e))?;
        Ok(row.is_some())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let message = match db_err.constraint() {
                Some("companies_tin_number_key") => DUPLICATE_TIN_MESSAGE,
                Some("users_email_key") => DUPLICATE_EMAIL_MESSAGE,
                Some("receipts_code_key") => DUPLICATE_RECEIPT_MESSAGE,
                Some("licenses_key_key") => "license key collision",
                _ => "duplicate record",
            };
            return StoreError::Duplicate(message.to_string());
        }
    }
    StoreError::Database {
        operation,
        source: err,
    }
}

fn expected_param(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| map_sqlx_error("decode_row", e))
}

fn parsed<T: FromStr>(row: &PgRow, name: &str) -> StoreResult<T> {
    let raw: String = col(row, name)?;
    raw.parse()
        .map_err(|_| StoreError::Internal(format!("unexpected {name} value '{raw}' in database")))
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let version: i64 = col(row, "version")?;
    Ok(User {
        id: UserId::from_uuid(col(row, "id")?),
        email: col(row, "email")?,
        name: col(row, "name")?,
        password_hash: col(row, "password_hash")?,
        role: parsed::<Role>(row, "role")?,
        must_change_password: col(row, "must_change_password")?,
        phone_number: col(row, "phone_number")?,
        profile_picture: col(row, "profile_picture")?,
        last_password_change: col(row, "last_password_change")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
        version: version.max(0) as u64,
        created: true,
    })
}

fn company_from_row(row: &PgRow) -> StoreResult<Company> {
    let tin: String = col(row, "c_tin_number")?;
    Ok(Company {
        id: CompanyId::from_uuid(col(row, "c_id")?),
        user_id: UserId::from_uuid(col(row, "c_user_id")?),
        name: col(row, "c_name")?,
        tin_number: TinNumber::parse(&tin)
            .map_err(|_| StoreError::Internal(format!("unexpected TIN '{tin}' in database")))?,
        phone_number: col(row, "c_phone_number")?,
        email: col(row, "c_email")?,
        address: col(row, "c_address")?,
        sdc_id: col(row, "c_sdc_id")?,
        mrc_number: col(row, "c_mrc_number")?,
        size: col(row, "c_size")?,
        industry: col(row, "c_industry")?,
        created_at: col(row, "c_created_at")?,
    })
}

fn application_from_row(row: &PgRow) -> StoreResult<DesktopApplication> {
    let version: i64 = col(row, "version")?;
    Ok(DesktopApplication {
        id: ApplicationId::from_uuid(col(row, "id")?),
        user_id: UserId::from_uuid(col(row, "user_id")?),
        company_id: CompanyId::from_uuid(col(row, "company_id")?),
        status: parsed::<ApplicationStatus>(row, "status")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
        approved_at: col(row, "approved_at")?,
        version: version.max(0) as u64,
        created: true,
    })
}

fn owner_from_row(row: &PgRow) -> StoreResult<Option<OwnerSummary>> {
    let id: Option<Uuid> = col(row, "u_id")?;
    let Some(id) = id else {
        return Ok(None);
    };
    let email: Option<String> = col(row, "u_email")?;
    Ok(Some(OwnerSummary {
        id: UserId::from_uuid(id),
        name: col(row, "u_name")?,
        email: email.unwrap_or_default(),
        phone_number: col(row, "u_phone_number")?,
    }))
}

fn listing_from_row(row: &PgRow) -> StoreResult<ApplicationListing> {
    Ok(ApplicationListing {
        application: application_from_row(row)?,
        company: company_from_row(row)?,
        owner: owner_from_row(row)?,
    })
}

fn license_from_row(row: &PgRow) -> StoreResult<License> {
    let max_users: i32 = col(row, "max_users")?;
    Ok(License {
        id: LicenseId::from_uuid(col(row, "id")?),
        key: col(row, "key")?,
        user_id: UserId::from_uuid(col(row, "user_id")?),
        status: parsed::<LicenseStatus>(row, "status")?,
        expires_at: col(row, "expires_at")?,
        max_users: max_users.max(0) as u32,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn alert_from_row(row: &PgRow) -> StoreResult<Alert> {
    Ok(Alert {
        id: AlertId::from_uuid(col(row, "id")?),
        alert_type: parsed::<AlertType>(row, "type")?,
        title: col(row, "title")?,
        message: col(row, "message")?,
        data: col(row, "data")?,
        status: parsed::<AlertStatus>(row, "status")?,
        response: col(row, "response")?,
        user_id: UserId::from_uuid(col(row, "user_id")?),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
        resolved_at: col(row, "resolved_at")?,
    })
}

fn message_from_row(row: &PgRow) -> StoreResult<Message> {
    Ok(Message {
        id: MessageId::from_uuid(col(row, "id")?),
        subject: col(row, "subject")?,
        content: col(row, "content")?,
        status: parsed::<MessageStatus>(row, "status")?,
        sender_id: UserId::from_uuid(col(row, "sender_id")?),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn activity_from_row(row: &PgRow) -> StoreResult<Activity> {
    let raw_type: String = col(row, "type")?;
    let company_id: Option<Uuid> = col(row, "company_id")?;
    let desktop_app_id: Option<Uuid> = col(row, "desktop_app_id")?;
    Ok(Activity {
        id: ActivityId::from_uuid(col(row, "id")?),
        activity_type: ActivityType::parse(&raw_type).ok_or_else(|| {
            StoreError::Internal(format!("unexpected activity type '{raw_type}' in database"))
        })?,
        description: col(row, "description")?,
        user_id: UserId::from_uuid(col(row, "user_id")?),
        company_id: company_id.map(CompanyId::from_uuid),
        desktop_app_id: desktop_app_id.map(ApplicationId::from_uuid),
        old_value: col(row, "old_value")?,
        new_value: col(row, "new_value")?,
        created_at: col(row, "created_at")?,
    })
}

fn receipt_from_row(row: &PgRow) -> StoreResult<Receipt> {
    Ok(Receipt {
        id: ReceiptId::from_uuid(col(row, "id")?),
        code: col(row, "code")?,
        user_id: UserId::from_uuid(col(row, "user_id")?),
        amount: col(row, "amount")?,
        vat_amount: col(row, "vat_amount")?,
        items: col(row, "items")?,
        created_at: col(row, "created_at")?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared statements
// ─────────────────────────────────────────────────────────────────────────────

const USER_COLUMNS: &str = "id, email, name, password_hash, role, must_change_password, \
     phone_number, profile_picture, last_password_change, created_at, updated_at, version";

const LISTING_SELECT: &str = r#"
    SELECT
        a.id, a.user_id, a.company_id, a.status, a.created_at, a.updated_at,
        a.approved_at, a.version,
        c.id AS c_id, c.user_id AS c_user_id, c.name AS c_name,
        c.tin_number AS c_tin_number, c.phone_number AS c_phone_number,
        c.email AS c_email, c.address AS c_address, c.sdc_id AS c_sdc_id,
        c.mrc_number AS c_mrc_number, c.size AS c_size, c.industry AS c_industry,
        c.created_at AS c_created_at,
        u.id AS u_id, u.name AS u_name, u.email AS u_email,
        u.phone_number AS u_phone_number
    FROM desktop_applications a
    JOIN companies c ON c.id = a.company_id
    LEFT JOIN users u ON u.id = a.user_id
"#;

async fn insert_activity(conn: &mut PgConnection, activity: &Activity) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO activities (
            id, type, description, user_id, company_id, desktop_app_id,
            old_value, new_value, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(activity.id.as_uuid())
    .bind(activity.activity_type.as_str())
    .bind(&activity.description)
    .bind(activity.user_id.as_uuid())
    .bind(activity.company_id.map(Uuid::from))
    .bind(activity.desktop_app_id.map(Uuid::from))
    .bind(&activity.old_value)
    .bind(&activity.new_value)
    .bind(activity.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_activity", e))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Ports
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, user, activity), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User, activity: Option<&Activity>) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, name, password_hash, role, must_change_password,
                phone_number, profile_picture, last_password_change,
                created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.must_change_password)
        .bind(&user.phone_number)
        .bind(&user.profile_picture)
        .bind(user.last_password_change)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        if let Some(activity) = activity {
            insert_activity(&mut tx, activity).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), err)]
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        rows.iter().map(user_from_row).collect()
    }

    async fn count_users(&self) -> StoreResult<u64> {
        self.count("count_users", "SELECT COUNT(*) AS n FROM users").await
    }

    #[instrument(skip(self, user, activity), fields(user_id = %user.id, expected = ?expected), err)]
    async fn save_user(
        &self,
        user: &User,
        expected: ExpectedVersion,
        activity: Option<&Activity>,
    ) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                name = $3,
                password_hash = $4,
                role = $5,
                must_change_password = $6,
                phone_number = $7,
                profile_picture = $8,
                last_password_change = $9,
                updated_at = $10,
                version = $11
            WHERE id = $1 AND ($12::BIGINT IS NULL OR version = $12)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.must_change_password)
        .bind(&user.phone_number)
        .bind(&user.profile_picture)
        .bind(user.last_password_change)
        .bind(user.updated_at)
        .bind(user.version as i64)
        .bind(expected_param(expected))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("save_user", e))?
        .rows_affected();

        if updated == 0 {
            // Dropping `tx` rolls back.
            return Err(if self.user_exists(user.id).await? {
                StoreError::version_conflict("user", expected)
            } else {
                StoreError::NotFound("user")
            });
        }

        if let Some(activity) = activity {
            insert_activity(&mut tx, activity).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait::async_trait]
impl RegistryStore for PostgresStore {
    #[instrument(
        skip(self, company, application, activity),
        fields(company_id = %company.id, application_id = %application.id),
        err
    )]
    async fn submit_application(
        &self,
        company: &Company,
        application: &DesktopApplication,
        activity: &Activity,
    ) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO companies (
                id, user_id, name, tin_number, phone_number, email, address,
                sdc_id, mrc_number, size, industry, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(company.id.as_uuid())
        .bind(company.user_id.as_uuid())
        .bind(&company.name)
        .bind(company.tin_number.as_str())
        .bind(&company.phone_number)
        .bind(&company.email)
        .bind(&company.address)
        .bind(&company.sdc_id)
        .bind(&company.mrc_number)
        .bind(&company.size)
        .bind(&company.industry)
        .bind(company.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_company", e))?;

        sqlx::query(
            r#"
            INSERT INTO desktop_applications (
                id, user_id, company_id, status, created_at, updated_at, approved_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(application.id.as_uuid())
        .bind(application.user_id.as_uuid())
        .bind(application.company_id.as_uuid())
        .bind(application.status.as_str())
        .bind(application.created_at)
        .bind(application.updated_at)
        .bind(application.approved_at)
        .bind(application.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_application", e))?;

        insert_activity(&mut tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), err)]
    async fn find_application(&self, id: ApplicationId) -> StoreResult<Option<DesktopApplication>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, company_id, status, created_at, updated_at, approved_at, version
            FROM desktop_applications
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_application", e))?;
        row.as_ref().map(application_from_row).transpose()
    }

    async fn find_company(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        let row = sqlx::query(
            r#"
            SELECT
                id AS c_id, user_id AS c_user_id, name AS c_name,
                tin_number AS c_tin_number, phone_number AS c_phone_number,
                email AS c_email, address AS c_address, sdc_id AS c_sdc_id,
                mrc_number AS c_mrc_number, size AS c_size, industry AS c_industry,
                created_at AS c_created_at
            FROM companies
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_company", e))?;
        row.as_ref().map(company_from_row).transpose()
    }

    async fn list_applications(&self) -> StoreResult<Vec<ApplicationListing>> {
        let sql = format!("{LISTING_SELECT} ORDER BY a.created_at DESC, a.id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_applications", e))?;
        rows.iter().map(listing_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn latest_application_for(&self, user_id: UserId) -> StoreResult<Option<ApplicationListing>> {
        let sql = format!(
            "{LISTING_SELECT} WHERE a.user_id = $1 ORDER BY a.created_at DESC, a.id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("latest_application_for", e))?;
        row.as_ref().map(listing_from_row).transpose()
    }

    #[instrument(
        skip(self, change),
        fields(
            application_id = %change.application.id,
            status = %change.application.status,
            promotes_owner = change.promoted_owner.is_some()
        ),
        err
    )]
    async fn apply_status_change(&self, change: StatusTransition<'_>) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let app = change.application;
        let updated = sqlx::query(
            r#"
            UPDATE desktop_applications SET
                status = $2,
                updated_at = $3,
                approved_at = $4,
                version = $5
            WHERE id = $1 AND ($6::BIGINT IS NULL OR version = $6)
            "#,
        )
        .bind(app.id.as_uuid())
        .bind(app.status.as_str())
        .bind(app.updated_at)
        .bind(app.approved_at)
        .bind(app.version as i64)
        .bind(expected_param(change.expected))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_application", e))?
        .rows_affected();

        if updated == 0 {
            let exists = self.find_application(app.id).await?.is_some();
            return Err(if exists {
                StoreError::version_conflict("desktop application", change.expected)
            } else {
                StoreError::NotFound("desktop application")
            });
        }

        if let Some((owner, expected)) = change.promoted_owner {
            let promoted = sqlx::query(
                r#"
                UPDATE users SET role = $2, updated_at = $3, version = $4
                WHERE id = $1 AND ($5::BIGINT IS NULL OR version = $5)
                "#,
            )
            .bind(owner.id.as_uuid())
            .bind(owner.role.as_str())
            .bind(owner.updated_at)
            .bind(owner.version as i64)
            .bind(expected_param(expected))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("promote_owner", e))?
            .rows_affected();

            if promoted == 0 {
                return Err(if self.user_exists(owner.id).await? {
                    StoreError::version_conflict("user", expected)
                } else {
                    StoreError::NotFound("user")
                });
            }
        }

        insert_activity(&mut tx, change.activity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn count_companies(&self) -> StoreResult<u64> {
        self.count("count_companies", "SELECT COUNT(*) AS n FROM companies").await
    }

    async fn count_applications(&self) -> StoreResult<u64> {
        self.count("count_applications", "SELECT COUNT(*) AS n FROM desktop_applications")
            .await
    }
}

#[async_trait::async_trait]
impl LicenseStore for PostgresStore {
    #[instrument(skip(self, license, activity), fields(license_id = %license.id), err)]
    async fn insert_license(&self, license: &License, activity: &Activity) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO licenses (
                id, key, user_id, status, expires_at, max_users, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(license.id.as_uuid())
        .bind(&license.key)
        .bind(license.user_id.as_uuid())
        .bind(license.status.as_str())
        .bind(license.expires_at)
        .bind(license.max_users as i32)
        .bind(license.created_at)
        .bind(license.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_license", e))?;

        insert_activity(&mut tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn find_license(&self, id: LicenseId) -> StoreResult<Option<License>> {
        let row = sqlx::query(
            r#"
            SELECT id, key, user_id, status, expires_at, max_users, created_at, updated_at
            FROM licenses
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_license", e))?;
        row.as_ref().map(license_from_row).transpose()
    }

    async fn list_licenses(&self) -> StoreResult<Vec<LicenseListing>> {
        let rows = sqlx::query(
            r#"
            SELECT
                l.id, l.key, l.user_id, l.status, l.expires_at, l.max_users,
                l.created_at, l.updated_at,
                u.id AS u_id, u.name AS u_name, u.email AS u_email,
                u.phone_number AS u_phone_number
            FROM licenses l
            LEFT JOIN users u ON u.id = l.user_id
            ORDER BY l.created_at DESC, l.id DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_licenses", e))?;

        rows.iter()
            .map(|row| {
                Ok(LicenseListing {
                    license: license_from_row(row)?,
                    owner: owner_from_row(row)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, license, activity), fields(license_id = %license.id), err)]
    async fn save_license(&self, license: &License, activity: &Activity) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let updated = sqlx::query(
            "UPDATE licenses SET status = $2, expires_at = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(license.id.as_uuid())
        .bind(license.status.as_str())
        .bind(license.expires_at)
        .bind(license.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("save_license", e))?
        .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound("license"));
        }

        insert_activity(&mut tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn count_licenses(&self) -> StoreResult<u64> {
        self.count("count_licenses", "SELECT COUNT(*) AS n FROM licenses").await
    }

    async fn count_active_licenses(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM licenses WHERE status = 'ACTIVE' AND expires_at > $1",
        )
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_active_licenses", e))?;
        let n: i64 = col(&row, "n")?;
        Ok(n.max(0) as u64)
    }
}

#[async_trait::async_trait]
impl NoticeStore for PostgresStore {
    #[instrument(skip(self, alert, activity), fields(alert_id = %alert.id), err)]
    async fn insert_alert(&self, alert: &Alert, activity: &Activity) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, type, title, message, data, status, response, user_id,
                created_at, updated_at, resolved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(alert.id.as_uuid())
        .bind(alert.alert_type.as_str())
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(&alert.data)
        .bind(alert.status.as_str())
        .bind(&alert.response)
        .bind(alert.user_id.as_uuid())
        .bind(alert.created_at)
        .bind(alert.updated_at)
        .bind(alert.resolved_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_alert", e))?;

        insert_activity(&mut tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn find_alert(&self, id: AlertId) -> StoreResult<Option<Alert>> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_alert", e))?;
        row.as_ref().map(alert_from_row).transpose()
    }

    async fn list_alerts(&self) -> StoreResult<Vec<Alert>> {
        let rows = sqlx::query("SELECT * FROM alerts ORDER BY created_at DESC, id DESC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_alerts", e))?;
        rows.iter().map(alert_from_row).collect()
    }

    #[instrument(skip(self, alert, activity), fields(alert_id = %alert.id), err)]
    async fn save_alert(&self, alert: &Alert, activity: &Activity) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE alerts SET status = $2, response = $3, updated_at = $4, resolved_at = $5
            WHERE id = $1
            "#,
        )
        .bind(alert.id.as_uuid())
        .bind(alert.status.as_str())
        .bind(&alert.response)
        .bind(alert.updated_at)
        .bind(alert.resolved_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("save_alert", e))?
        .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound("alert"));
        }

        insert_activity(&mut tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn count_active_alerts(&self) -> StoreResult<u64> {
        self.count(
            "count_active_alerts",
            "SELECT COUNT(*) AS n FROM alerts WHERE status = 'ACTIVE'",
        )
        .await
    }

    #[instrument(skip(self, message, activity), fields(message_id = %message.id), err)]
    async fn insert_message(&self, message: &Message, activity: &Activity) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, subject, content, status, sender_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(&message.subject)
        .bind(&message.content)
        .bind(message.status.as_str())
        .bind(message.sender_id.as_uuid())
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_message", e))?;

        insert_activity(&mut tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn find_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_message", e))?;
        row.as_ref().map(message_from_row).transpose()
    }

    async fn list_messages(&self) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query("SELECT * FROM messages ORDER BY created_at DESC, id DESC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_messages", e))?;
        rows.iter().map(message_from_row).collect()
    }

    #[instrument(skip(self, message, activity), fields(message_id = %message.id), err)]
    async fn save_message(&self, message: &Message, activity: &Activity) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let updated = sqlx::query("UPDATE messages SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(message.id.as_uuid())
            .bind(message.status.as_str())
            .bind(message.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("save_message", e))?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound("message"));
        }

        insert_activity(&mut tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn count_unread_messages(&self) -> StoreResult<u64> {
        self.count(
            "count_unread_messages",
            "SELECT COUNT(*) AS n FROM messages WHERE status = 'UNREAD'",
        )
        .await
    }
}

#[async_trait::async_trait]
impl ActivityStore for PostgresStore {
    async fn append_activity(&self, activity: &Activity) -> StoreResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire_connection", e))?;
        insert_activity(&mut conn, activity).await
    }

    async fn recent_activities(&self, limit: usize) -> StoreResult<Vec<Activity>> {
        let rows = sqlx::query(
            "SELECT * FROM activities ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_activities", e))?;
        rows.iter().map(activity_from_row).collect()
    }

    async fn recent_activities_for(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<Activity>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM activities
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_activities_for", e))?;
        rows.iter().map(activity_from_row).collect()
    }
}

#[async_trait::async_trait]
impl ReceiptStore for PostgresStore {
    #[instrument(skip(self, receipt, activity), fields(code = %receipt.code), err)]
    async fn insert_receipt(&self, receipt: &Receipt, activity: &Activity) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO receipts (id, code, user_id, amount, vat_amount, items, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(receipt.id.as_uuid())
        .bind(&receipt.code)
        .bind(receipt.user_id.as_uuid())
        .bind(receipt.amount)
        .bind(receipt.vat_amount)
        .bind(&receipt.items)
        .bind(receipt.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_receipt", e))?;

        insert_activity(&mut tx, activity).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn find_receipt_by_code(&self, code: &str) -> StoreResult<Option<Receipt>> {
        let row = sqlx::query("SELECT * FROM receipts WHERE code = $1")
            .bind(code)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_receipt_by_code", e))?;
        row.as_ref().map(receipt_from_row).transpose()
    }

    async fn record_scan(&self, scan: &Scan) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO scans (id, user_id, receipt_id, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(scan.id.as_uuid())
        .bind(scan.user_id.as_uuid())
        .bind(scan.receipt_id.as_uuid())
        .bind(scan.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_scan", e))?;
        Ok(())
    }

    async fn receipt_totals_for(&self, user_id: UserId) -> StoreResult<ReceiptTotals> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n, COALESCE(SUM(vat_amount), 0)::BIGINT AS vat
            FROM receipts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("receipt_totals_for", e))?;
        let n: i64 = col(&row, "n")?;
        Ok(ReceiptTotals {
            total_receipts: n.max(0) as u64,
            total_vat: col(&row, "vat")?,
        })
    }

    async fn count_scans_for(&self, user_id: UserId) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM scans WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_scans_for", e))?;
        let n: i64 = col(&row, "n")?;
        Ok(n.max(0) as u64)
    }

    async fn count_receipts(&self) -> StoreResult<u64> {
        self.count("count_receipts", "SELECT COUNT(*) AS n FROM receipts").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_version_binds_null() {
        assert_eq!(expected_param(ExpectedVersion::Any), None);
        assert_eq!(expected_param(ExpectedVersion::Exact(4)), Some(4));
    }

    #[test]
    fn schema_declares_uniqueness_constraints_used_for_error_mapping() {
        for constraint in [
            "companies_tin_number_key",
            "users_email_key",
            "receipts_code_key",
            "licenses_key_key",
        ] {
            assert!(SCHEMA.contains(constraint), "missing {constraint}");
        }
    }
}
