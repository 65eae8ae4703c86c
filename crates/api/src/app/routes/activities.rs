use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_activities))
}

pub async fn list_activities(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<dto::ActivitiesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let activities = services.recent_activities(ctx.principal(), query.limit).await?;
    Ok(Json(json!(activities)))
}
