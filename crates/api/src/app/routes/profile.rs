use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::post, Router};
use tower_cookies::Cookies;

use amo_auth::Capability;

use crate::app::dto::{self, required};
use crate::app::errors::ApiError;
use crate::app::extract::ValidatedJson;
use crate::app::routes::auth::signed_in_response;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/change-password", post(change_password))
        .route("/update", post(update_profile))
}

/// Both handlers re-issue the session so the gate sees the updated flags.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    cookies: Cookies,
    payload: Result<ValidatedJson<dto::ChangePasswordRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ManageOwnProfile)?;
    let ValidatedJson(body) = payload?;
    let current = required(body.current_password, "Current password is required")?;
    let new = required(body.new_password, "New password is required")?;

    let signed = services.change_password(ctx.principal(), current, new).await?;
    Ok(signed_in_response(&cookies, &services, &signed))
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    cookies: Cookies,
    payload: Result<ValidatedJson<dto::UpdateProfileRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ManageOwnProfile)?;
    let ValidatedJson(body) = payload?;
    let (Some(name), Some(phone_number)) = (body.name, body.phone_number) else {
        return Err(ApiError::validation("Name and phone number are required"));
    };

    let signed = services
        .update_profile(ctx.principal(), name, phone_number, body.profile_picture)
        .await?;
    Ok(signed_in_response(&cookies, &services, &signed))
}
