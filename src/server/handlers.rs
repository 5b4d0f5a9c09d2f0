//! Request handlers. Each one is a thin translation between HTTP and
//! [`DocumentService`].

use super::error::ApiError;
use crate::service::{DocumentService, StatusReport, UploadReceipt, DOCX_MIME};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// Body of the 202 returned by the trigger endpoints.
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub file_id: String,
    pub message: &'static str,
}

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Document Compliance Service is running" }))
}

/// `POST /upload` with a multipart `file` field.
pub async fn upload(
    State(service): State<DocumentService>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("the 'file' field has no file name".into()))?;
        let bytes = field.bytes().await?;
        debug!("Received upload '{}' ({} bytes)", filename, bytes.len());
        file = Some((filename, bytes.to_vec()));
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".into()))?;
    let receipt = service.upload(&filename, bytes).await?;
    Ok(Json(receipt))
}

/// `POST /check_compliance/:file_id`
pub async fn check_compliance(
    State(service): State<DocumentService>,
    Path(file_id): Path<String>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    let handle = service.start_compliance(&file_id).await?;
    Ok(accepted(file_id, handle.accepted_message()))
}

/// `POST /correct_document/:file_id`
pub async fn correct_document(
    State(service): State<DocumentService>,
    Path(file_id): Path<String>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    let handle = service.start_correction(&file_id).await?;
    Ok(accepted(file_id, handle.accepted_message()))
}

fn accepted(file_id: String, message: &'static str) -> (StatusCode, Json<Accepted>) {
    (StatusCode::ACCEPTED, Json(Accepted { file_id, message }))
}

/// `GET /status/:file_id`
pub async fn status(
    State(service): State<DocumentService>,
    Path(file_id): Path<String>,
) -> Result<Json<StatusReport>, ApiError> {
    Ok(Json(service.status(&file_id).await?))
}

/// `GET /download/:file_id`
pub async fn download(
    State(service): State<DocumentService>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let download = service.download(&file_id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe(&download.filename)
    );
    Ok((
        [
            (header::CONTENT_TYPE, DOCX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}

/// Keep a file name representable inside a quoted header parameter.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
