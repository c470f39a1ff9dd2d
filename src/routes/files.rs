use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files", post(upload_file))
        .route("/multiple_files", post(upload_files))
        .route("/files/{name}", get(download_file))
        .route("/files/streaming/{name}", get(stream_file))
}

// --- Handlers ---

/// Save the first file part of a multipart body under the uploads dir.
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let name = sanitize_filename(&name)?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        tokio::fs::write(state.config.uploads_path().join(&name), &data).await?;
        tracing::info!(filename = %name, bytes = data.len(), "stored upload");
        return Ok(Json(json!({ "ok": true, "filename": name })));
    }
    Err(AppError::BadRequest("No file field in request".into()))
}

/// Save every file part; returns the stored names.
async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let mut stored = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let name = sanitize_filename(&name)?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        tokio::fs::write(state.config.uploads_path().join(&name), &data).await?;
        stored.push(name);
    }
    if stored.is_empty() {
        return Err(AppError::BadRequest("No file fields in request".into()));
    }
    Ok(Json(json!({ "ok": true, "filenames": stored })))
}

async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let name = sanitize_filename(&name)?;
    let path = state.config.uploads_path().join(&name);

    let data = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound
        } else {
            AppError::Io(e)
        }
    })?;

    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], data).into_response())
}

/// Chunked variant of download for large files.
async fn stream_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let name = sanitize_filename(&name)?;
    let path = state.config.uploads_path().join(&name);

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound
        } else {
            AppError::Io(e)
        }
    })?;

    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [(header::CONTENT_TYPE, mime.to_string())],
        body,
    )
        .into_response())
}

/// Uploads live flat in one directory; anything that could escape it is
/// rejected outright.
fn sanitize_filename(name: &str) -> Result<String, AppError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(AppError::BadRequest("Invalid file name".into()));
    }
    Ok(name.to_string())
}
