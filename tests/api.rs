//! HTTP surface tests, driven through the router with `tower::ServiceExt`.

#![cfg(feature = "server")]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use edgequake_docfix::document::docx;
use edgequake_docfix::server::{router, DEFAULT_MAX_UPLOAD_BYTES};
use edgequake_docfix::{
    ComplianceIssue, ComplianceReport, DocumentService, IssueCategory, LanguageService,
    MemoryJobStore, OfficeAdapter, ServiceConfig, ServiceError,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "docfix-test-boundary";

/// Flags every chunk with one grammar issue and corrects by trimming "very ".
struct PickyEditor {
    delay: Duration,
}

#[async_trait]
impl LanguageService for PickyEditor {
    async fn analyze(&self, text: &str) -> Result<ComplianceReport, ServiceError> {
        tokio::time::sleep(self.delay).await;
        Ok(ComplianceReport {
            chunk_index: 0,
            compliant: false,
            summary: "Wordy".into(),
            issues: vec![ComplianceIssue {
                category: IssueCategory::Style,
                issue: "Intensifier adds nothing".into(),
                excerpt: Some(text.chars().take(10).collect()),
                suggestion: "Drop 'very'".into(),
            }],
        })
    }

    async fn correct(&self, text: &str) -> Result<String, ServiceError> {
        tokio::time::sleep(self.delay).await;
        Ok(text.replace("very ", ""))
    }
}

fn app(dir: &TempDir, delay: Duration) -> Router {
    let config = ServiceConfig::builder()
        .output_dir(dir.path())
        .build()
        .unwrap();
    let service = DocumentService::with_parts(
        config,
        Arc::new(MemoryJobStore::new()),
        Arc::new(PickyEditor { delay }),
        Arc::new(OfficeAdapter),
    );
    router(service, DEFAULT_MAX_UPLOAD_BYTES)
}

fn multipart_upload(filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn wait_for_status(app: &Router, file_id: &str, wanted: &str) -> Value {
    for _ in 0..200 {
        let (_, body) = send_json(app, get(&format!("/status/{file_id}"))).await;
        if body["status"] == wanted {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {file_id} never reached {wanted}");
}

fn sample_docx() -> Vec<u8> {
    docx::write_paragraphs(&[
        "This is a very long sentence.".to_string(),
        "Please review it very carefully.".to_string(),
    ])
    .unwrap()
}

#[tokio::test]
async fn root_reports_health() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send_json(&app(&dir, Duration::ZERO), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Document Compliance Service is running");
}

#[tokio::test]
async fn full_flow_upload_check_correct_download() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Duration::ZERO);

    let (status, body) = send_json(&app, multipart_upload("review.docx", &sample_docx())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "File review.docx uploaded successfully");
    assert_eq!(body["format"], "docx");
    let file_id = body["file_id"].as_str().unwrap().to_string();

    let (status, body) = send_json(&app, get(&format!("/status/{file_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "uploaded");

    let (status, body) = send_json(&app, post(&format!("/check_compliance/{file_id}"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(
        body["message"],
        "Compliance checking started. Check status for progress."
    );

    let report = wait_for_status(&app, &file_id, "compliance_complete").await;
    let reports = report["compliance_reports"].as_array().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["compliant"], false);
    assert_eq!(reports[0]["issues"][0]["category"], "style");

    let (status, _) = send_json(&app, post(&format!("/correct_document/{file_id}"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_status(&app, &file_id, "correction_complete").await;

    let response = app
        .clone()
        .oneshot(get(&format!("/download/{file_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"corrected_review.docx\""
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        docx::read_paragraphs(&bytes).unwrap(),
        vec!["This is a long sentence.", "Please review it carefully."]
    );
}

#[tokio::test]
async fn unknown_job_is_404() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Duration::ZERO);

    for request in [
        get("/status/missing"),
        post("/check_compliance/missing"),
        post("/correct_document/missing"),
        get("/download/missing"),
    ] {
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn unsupported_upload_is_415() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send_json(
        &app(&dir, Duration::ZERO),
        multipart_upload("notes.txt", b"just text"),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn empty_document_is_422() {
    let dir = TempDir::new().unwrap();
    let empty = docx::write_paragraphs(&[]).unwrap();
    let (status, body) =
        send_json(&app(&dir, Duration::ZERO), multipart_upload("blank.docx", &empty)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "EMPTY_DOCUMENT");
}

#[tokio::test]
async fn upload_without_file_field_is_400() {
    let dir = TempDir::new().unwrap();
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send_json(&app(&dir, Duration::ZERO), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn trigger_while_processing_is_409() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, Duration::from_millis(300));

    let (_, body) = send_json(&app, multipart_upload("review.docx", &sample_docx())).await;
    let file_id = body["file_id"].as_str().unwrap().to_string();

    let (status, _) = send_json(&app, post(&format!("/correct_document/{file_id}"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send_json(&app, post(&format!("/correct_document/{file_id}"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, body) = send_json(&app, get(&format!("/download/{file_id}"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_READY");

    wait_for_status(&app, &file_id, "correction_complete").await;
}
