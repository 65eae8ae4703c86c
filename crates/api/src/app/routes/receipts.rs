use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use amo_auth::Capability;
use amo_receipts::NewReceipt;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::extract::ValidatedJson;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/api/receipts", post(record_receipt))
        .route("/api/receipt/verify", post(verify_receipt))
}

pub async fn record_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<NewReceipt>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::RecordReceipts)?;
    let ValidatedJson(body) = payload?;
    let receipt = services.record_receipt(ctx.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(dto::receipt_to_json(&receipt, None))))
}

/// Public; the gate lets anonymous callers through.
pub async fn verify_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    ValidatedJson(body): ValidatedJson<dto::VerifyReceiptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let code = body.code.unwrap_or_default();
    let (receipt, owner) = services.verify_receipt(ctx.principal(), &code).await?;
    Ok(Json(dto::receipt_to_json(&receipt, owner.as_ref())))
}
