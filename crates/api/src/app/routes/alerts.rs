use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use amo_auth::Capability;
use amo_core::AlertId;
use amo_notices::{AlertStatus, AlertType};

use crate::app::dto::{self, parse_id, required};
use crate::app::errors::ApiError;
use crate::app::extract::ValidatedJson;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_alerts).post(create_alert).patch(update_alert))
}

pub async fn list_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let alerts = services.list_alerts(ctx.principal()).await?;
    Ok(Json(json!(alerts)))
}

pub async fn create_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<dto::CreateAlertRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::RaiseAlert)?;
    let ValidatedJson(body) = payload?;
    let alert_type: AlertType = required(body.alert_type, "Alert type is required")?.parse()?;
    let message = required(body.message, "Alert message is required")?;

    let alert = services
        .raise_alert(ctx.principal(), alert_type, body.title.as_deref(), &message, body.data)
        .await?;
    Ok((StatusCode::CREATED, Json(json!(alert))))
}

pub async fn update_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<dto::UpdateAlertRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ManageAlerts)?;
    let ValidatedJson(body) = payload?;
    let id: AlertId = parse_id(&required(body.id, "Alert id is required")?)?;
    let status: AlertStatus = required(body.status, "Alert status is required")?.parse()?;

    let alert = services
        .respond_alert(ctx.principal(), id, status, body.response)
        .await?;
    Ok(Json(json!(alert)))
}
