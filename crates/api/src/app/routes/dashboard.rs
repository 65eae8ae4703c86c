use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/api/dashboard/stats", get(platform_stats))
        .route("/api/user/dashboard", get(user_dashboard))
}

pub async fn platform_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = services.platform_stats(ctx.principal()).await?;
    let recent = stats
        .recent_activity
        .iter()
        .map(|a| dto::activity_summary(a, "timestamp"))
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "totalUsers": stats.total_users,
        "activeLicenses": stats.active_licenses,
        "pendingAlerts": stats.pending_alerts,
        "unreadMessages": stats.unread_messages,
        "recentActivity": recent,
        "degraded": stats.degraded,
    })))
}

pub async fn user_dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = services.user_dashboard(ctx.principal()).await?;
    let recent = dashboard
        .recent_activities
        .iter()
        .map(|a| dto::activity_summary(a, "date"))
        .collect::<Vec<_>>();

    Ok(Json(json!({
        "totalReceipts": dashboard.totals.total_receipts,
        "totalVAT": dashboard.totals.total_vat,
        "totalScans": dashboard.total_scans,
        "applicationStatus": dashboard.application_status,
        "recentActivities": recent,
        "degraded": dashboard.degraded,
    })))
}
