use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use amo_auth::Capability;
use amo_core::{LicenseId, UserId};
use amo_infra::LicenseListing;
use amo_licensing::LicenseStatus;

use crate::app::dto::{self, parse_id, parse_optional, required};
use crate::app::errors::ApiError;
use crate::app::extract::ValidatedJson;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_licenses).post(create_license).patch(update_license))
}

pub async fn list_licenses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let items = services
        .list_licenses(ctx.principal())
        .await?
        .iter()
        .map(|l| dto::license_to_json(l, now))
        .collect::<Vec<_>>();
    Ok(Json(json!(items)))
}

pub async fn create_license(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<dto::CreateLicenseRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ManageLicenses)?;
    let ValidatedJson(body) = payload?;
    let (Some(user_id), Some(expires_at), Some(max_users)) = (body.user_id, body.expires_at, body.max_users)
    else {
        return Err(ApiError::validation("userId, expiresAt and maxUsers are required"));
    };
    let user_id: UserId = parse_id(&user_id)?;

    let listing = services
        .issue_license(ctx.principal(), user_id, expires_at, max_users)
        .await?;
    Ok((StatusCode::CREATED, Json(dto::license_to_json(&listing, Utc::now()))))
}

pub async fn update_license(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<dto::UpdateLicenseRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ManageLicenses)?;
    let ValidatedJson(body) = payload?;
    let id: LicenseId = parse_id(&required(body.id, "License id is required")?)?;
    let status = parse_optional::<LicenseStatus>(body.status.as_deref())?;

    let license = services
        .amend_license(ctx.principal(), id, status, body.expires_at)
        .await?;
    let listing = LicenseListing { license, owner: None };
    Ok(Json(dto::license_to_json(&listing, Utc::now())))
}
