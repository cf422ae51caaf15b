//! Assessment trigger

use crate::models::{ApiError, AssessmentResponse};
use crate::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use zt_core::ScanRequest;

/// Assessment routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/run", post(run_assessment))
}

/// Run every control against the requested subscription
pub async fn run_assessment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    tracing::info!("Assessment requested for subscription {}", request.subscription_id);

    let outcome = state.service.run(request).await.map_err(|e| {
        tracing::warn!("Assessment failed: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(AssessmentResponse {
        message: "ZT Assessment Completed".into(),
        subscription_name: outcome.subscription_name,
        report_path: outcome.report_path,
        scan_duration_secs: outcome.duration.as_secs_f64(),
        summary: outcome.summary,
        results: outcome.results,
    }))
}
