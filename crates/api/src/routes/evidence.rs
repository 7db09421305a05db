//! Serves stored delivery photos.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use event_store::EventStore;

use super::AppState;
use crate::error::ApiError;

fn content_type(file_name: &str) -> &'static str {
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// GET /evidence/{filename}
pub async fn get<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = app
        .evidence
        .load(&file_name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("evidence {file_name} not found")))?;
    Ok(([(header::CONTENT_TYPE, content_type(&file_name))], bytes))
}
