use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use amo_auth::User;
use amo_core::DomainError;
use amo_infra::{ApplicationListing, LicenseListing, OwnerSummary};
use amo_registry::{Activity, CompanyDetails};
use amo_receipts::Receipt;

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignInRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUserRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub must_change_password: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
}

/// Body of the get-started flow: the company nested under `company`.
#[derive(Debug, Deserialize)]
pub struct NestedApplicationRequest {
    #[serde(default)]
    pub company: CompanyDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplicationActionRequest {
    pub action: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplicationStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateLicenseRequest {
    pub user_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_users: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateLicenseRequest {
    pub id: Option<String>,
    pub status: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateAlertRequest {
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub data: Option<JsonValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateAlertRequest {
    pub id: Option<String>,
    pub status: Option<String>,
    pub response: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateMessageRequest {
    pub subject: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateMessageRequest {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActivitiesQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyReceiptRequest {
    pub code: Option<String>,
}

// -------------------------
// Request parsing helpers
// -------------------------

/// A present, non-blank field or a 400 naming it.
pub fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::validation(message))
}

pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(ApiError::from)
}

/// Parse an optional enum-like field, turning parse failures into 400s.
pub fn parse_optional<T>(raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.map(|r| r.parse::<T>().map_err(ApiError::from)).transpose()
}

// -------------------------
// Response mapping helpers
// -------------------------

pub fn user_to_json(user: &User) -> JsonValue {
    json!(user.profile())
}

pub fn owner_to_json(owner: Option<&OwnerSummary>) -> JsonValue {
    owner.map_or(JsonValue::Null, |o| json!(o))
}

pub fn application_to_json(listing: &ApplicationListing) -> JsonValue {
    let mut value = json!(listing.application);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("company".into(), json!(listing.company));
        obj.insert("user".into(), owner_to_json(listing.owner.as_ref()));
    }
    value
}

/// The caller's own application rendered as a flat company view.
pub fn own_application_to_json(listing: &ApplicationListing) -> JsonValue {
    json!({
        "id": listing.application.id,
        "name": listing.company.name,
        "tinNumber": listing.company.tin_number,
        "phoneNumber": listing.company.phone_number,
        "email": listing.company.email,
        "address": listing.company.address,
        "applicationStatus": listing.application.status,
        "createdAt": listing.application.created_at,
    })
}

pub fn license_to_json(listing: &LicenseListing, now: DateTime<Utc>) -> JsonValue {
    let mut value = json!(listing.license);
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "effectiveStatus".into(),
            json!(listing.license.effective_status(now)),
        );
        obj.insert("user".into(), owner_to_json(listing.owner.as_ref()));
    }
    value
}

/// Short form used by the dashboards; `time_key` names the timestamp field.
pub fn activity_summary(activity: &Activity, time_key: &str) -> JsonValue {
    let mut value = json!({
        "id": activity.id,
        "type": activity.activity_type,
        "description": activity.description,
    });
    if let Some(obj) = value.as_object_mut() {
        obj.insert(time_key.to_string(), json!(activity.created_at));
    }
    value
}

pub fn receipt_to_json(receipt: &Receipt, owner: Option<&OwnerSummary>) -> JsonValue {
    let mut value = json!(receipt);
    if let Some(obj) = value.as_object_mut() {
        obj.insert("user".into(), owner_to_json(owner));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use amo_core::UserId;
    use amo_licensing::{License, LicenseStatus};
    use chrono::Duration;

    #[test]
    fn blank_required_fields_are_rejected() {
        assert!(required(Some("  ".into()), "Missing email").is_err());
        assert!(required(None, "Missing email").is_err());
        assert_eq!(required(Some("a@b.rw".into()), "x").unwrap(), "a@b.rw");
    }

    #[test]
    fn bad_ids_are_validation_errors() {
        let err = parse_id::<UserId>("not-a-uuid").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn expired_active_license_reports_effective_status() {
        let now = Utc::now();
        let mut license = License::issue(UserId::new(), now + Duration::days(1), 3, now).unwrap();
        license.expires_at = now - Duration::hours(1);
        let listing = LicenseListing { license, owner: None };

        let value = license_to_json(&listing, now);
        assert_eq!(value["status"], json!(LicenseStatus::Active));
        assert_eq!(value["effectiveStatus"], "EXPIRED");
        assert!(value["user"].is_null());
    }
}
