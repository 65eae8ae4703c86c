use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;

use amo_auth::Capability;
use amo_core::MessageId;
use amo_notices::MessageStatus;

use crate::app::dto::{self, parse_id, required};
use crate::app::errors::ApiError;
use crate::app::extract::ValidatedJson;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_messages).post(create_message))
        .route("/:id", patch(update_message))
}

pub async fn list_messages(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = services.list_messages(ctx.principal()).await?;
    Ok(Json(json!(messages)))
}

pub async fn create_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<dto::CreateMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::SendMessage)?;
    let ValidatedJson(body) = payload?;
    let (Some(subject), Some(content)) = (body.subject, body.content) else {
        return Err(ApiError::validation("Subject and content are required"));
    };

    let message = services.send_message(ctx.principal(), &subject, &content).await?;
    Ok((StatusCode::CREATED, Json(json!(message))))
}

pub async fn update_message(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    payload: Result<ValidatedJson<dto::UpdateMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ManageMessages)?;
    let ValidatedJson(body) = payload?;
    let id: MessageId = parse_id(&id)?;
    let status: MessageStatus = required(body.status, "Message status is required")?.parse()?;

    let message = services.mark_message(ctx.principal(), id, status).await?;
    Ok(Json(json!(message)))
}
