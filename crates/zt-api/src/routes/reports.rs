//! Stored report downloads

use crate::models::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use zt_report::is_valid_file_name;

/// Report routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:file", get(get_report))
}

/// Serve a stored report by file name
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<Html<String>, ApiError> {
    if !is_valid_file_name(&file) {
        return Err(ApiError::BadRequest(format!("invalid report name: {}", file)));
    }

    match state.store.load(&file).await {
        Ok(Some(html)) => Ok(Html(html)),
        Ok(None) => Err(ApiError::NotFound(format!("report not found: {}", file))),
        Err(e) => Err(ApiError::Internal {
            error: "Could not read report".into(),
            details: e.to_string(),
        }),
    }
}
