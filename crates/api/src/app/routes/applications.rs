use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value as JsonValue};

use amo_auth::Capability;
use amo_core::ApplicationId;
use amo_registry::{ApplicationAction, ApplicationStatus, CompanyDetails};

use crate::app::dto::{self, parse_id};
use crate::app::errors::ApiError;
use crate::app::extract::ValidatedJson;
use crate::app::services::{AppServices, Submission};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_applications).post(submit_nested))
        .route("/request", get(own_application).post(submit_flat))
        .route("/:id", patch(patch_status))
        .route("/:id/action", post(apply_action))
}

fn submission_response(submission: &Submission) -> (StatusCode, Json<JsonValue>) {
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "Company application submitted successfully",
            "company": submission.company,
            "desktopApplication": submission.application,
        })),
    )
}

pub async fn list_applications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let items = services
        .list_applications(ctx.principal())
        .await?
        .iter()
        .map(dto::application_to_json)
        .collect::<Vec<_>>();
    Ok(Json(json!(items)))
}

/// Get-started flow: `{"company": {...}}`.
pub async fn submit_nested(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<dto::NestedApplicationRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::SubmitApplication)?;
    let ValidatedJson(body) = payload?;
    let submission = services.submit_application(ctx.principal(), &body.company).await?;
    Ok(submission_response(&submission))
}

pub async fn submit_flat(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<CompanyDetails>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::SubmitApplication)?;
    let ValidatedJson(body) = payload?;
    let submission = services.submit_application(ctx.principal(), &body).await?;
    Ok(submission_response(&submission))
}

pub async fn own_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let latest = services.own_application(ctx.principal()).await?;
    Ok(Json(
        latest
            .as_ref()
            .map_or(JsonValue::Null, dto::own_application_to_json),
    ))
}

pub async fn apply_action(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    payload: Result<ValidatedJson<dto::ApplicationActionRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ReviewApplications)?;
    let ValidatedJson(body) = payload?;
    let id: ApplicationId = parse_id(&id)?;
    let action: ApplicationAction = body.action.as_deref().unwrap_or_default().parse()?;
    change_status(&services, &ctx, id, action.target()).await
}

pub async fn patch_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    payload: Result<ValidatedJson<dto::ApplicationStatusRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ReviewApplications)?;
    let ValidatedJson(body) = payload?;
    let id: ApplicationId = parse_id(&id)?;
    let status: ApplicationStatus = body
        .status
        .as_deref()
        .ok_or_else(|| ApiError::validation("Status is required"))?
        .parse()?;
    change_status(&services, &ctx, id, status).await
}

async fn change_status(
    services: &AppServices,
    ctx: &RequestContext,
    id: ApplicationId,
    target: ApplicationStatus,
) -> Result<Json<JsonValue>, ApiError> {
    let listing = services
        .change_application_status(ctx.principal(), id, target)
        .await?;
    Ok(Json(json!({
        "success": true,
        "application": dto::application_to_json(&listing),
    })))
}
