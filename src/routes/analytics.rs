use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::utils::config::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub timeframe: Option<String>,
}

// Session-log rollup for the admin dashboard
pub async fn analytics_handler(
    State(app_state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    tracing::info!("Analytics request, timeframe: {:?}", params.timeframe);

    match app_state.analytics.get_report(params.timeframe.as_deref()).await {
        Ok(report) => {
            tracing::info!("✅ Report built: {} sessions, {} sampled", report.user_count, report.conversations.len());
            Ok(Json(json!(report)))
        }
        Err(e) => {
            let status = match e {
                AppError::InvalidTimeframe(_) => StatusCode::BAD_REQUEST,
                AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::error!("❌ Failed to build analytics report: {}", e);
            Err((status, Json(json!({ "error": e.to_string() }))))
        }
    }
}

// Health check for analytics service
pub async fn analytics_health_handler(State(app_state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Analytics service is running",
        "sentiment_source": app_state.analytics.sentiment_source().as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

// Create the router for analytics routes
pub fn create_analytics_router() -> Router<AppState> {
    Router::new()
        .route("/analytics", get(analytics_handler))
        .route("/analytics/health", get(analytics_health_handler))
}
