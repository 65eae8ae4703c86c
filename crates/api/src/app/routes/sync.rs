use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/", post(run_sync))
}

/// Waits out the simulated delay inside the request.
pub async fn run_sync(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let report = services.run_sync(ctx.principal()).await?;
    Ok(Json(json!({
        "stats": {
            "totalRecords": report.total_records,
            "syncedRecords": report.synced_records,
            "failedRecords": report.failed_records,
        },
        "integrated": report.integrated,
    })))
}
