use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use amo_auth::{Capability, Role};
use amo_core::UserId;

use crate::app::dto::{self, parse_id, parse_optional, required};
use crate::app::errors::ApiError;
use crate::app::extract::ValidatedJson;
use crate::app::services::{AppServices, NewAccount};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_users).post(create_user).patch(update_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let users = services.list_users(ctx.principal()).await?;
    let items = users.iter().map(dto::user_to_json).collect::<Vec<_>>();
    Ok(Json(json!(items)))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<dto::CreateUserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ManageUsers)?;
    let ValidatedJson(body) = payload?;
    let email = required(body.email, "Email is required")?;
    let password = required(body.password, "Password is required")?;
    let role = parse_optional::<Role>(body.role.as_deref())?.unwrap_or_default();

    let user = services
        .create_user(
            ctx.principal(),
            NewAccount {
                email,
                password,
                name: body.name,
                phone_number: None,
                role,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(dto::user_to_json(&user))))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<ValidatedJson<dto::UpdateUserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require(Capability::ManageUsers)?;
    let ValidatedJson(body) = payload?;
    let id: UserId = parse_id(&required(body.id, "User id is required")?)?;
    let role = parse_optional::<Role>(body.role.as_deref())?;

    let user = services
        .update_user(ctx.principal(), id, body.name, role, body.must_change_password)
        .await?;
    Ok(Json(dto::user_to_json(&user)))
}
