//! Extraction endpoints
//!
//! - POST /extract - Download a PDF by URL and extract its payment payload
//! - POST /extract-upload - Same, with the PDF uploaded as multipart form data

use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::extract::{ExtractOptions, ExtractResult, Prefer};
use crate::state::AppState;

/// Downloads larger than this are refused outright.
const MAX_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .expect("failed to build HTTP client")
});

pub fn router() -> Router<AppState> {
    // Raise axum's 2 MB default so uploads up to the documented cap reach
    // the handler's own size check.
    Router::new()
        .route("/extract", post(extract_from_url))
        .route("/extract-upload", post(extract_from_upload))
        .layer(DefaultBodyLimit::max(MAX_DOWNLOAD_BYTES as usize))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub pdf_url: String,
    #[serde(flatten)]
    pub options: ExtractOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    #[serde(flatten)]
    pub result: ExtractResult,
    /// Wall-clock milliseconds from admission to result.
    pub processing_time: u64,
}

/// POST /extract
///
/// Fetch the PDF at `pdfUrl` and run extraction on it.
async fn extract_from_url(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>> {
    if request.pdf_url.trim().is_empty() {
        return Err(AppError::BadRequest("pdfUrl is required".to_string()));
    }
    if !request.pdf_url.starts_with("http://") && !request.pdf_url.starts_with("https://") {
        return Err(AppError::BadRequest(
            "pdfUrl must be an http(s) URL".to_string(),
        ));
    }

    let buffer = download_pdf(&request.pdf_url).await?;
    run_extraction(&state, buffer, request.options).await
}

/// POST /extract-upload
///
/// Accepts a multipart form with a `file` part holding the PDF and optional
/// text parts `prefer`, `page` and `tryAllPages`.
async fn extract_from_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>> {
    let mut buffer: Option<Vec<u8>> = None;
    let mut options = ExtractOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                if data.len() as u64 > MAX_DOWNLOAD_BYTES {
                    return Err(AppError::BadRequest(format!(
                        "File exceeds the {} byte limit",
                        MAX_DOWNLOAD_BYTES
                    )));
                }
                buffer = Some(data.to_vec());
            }
            "prefer" => {
                let value = field_text(field).await?;
                options.prefer = match value.as_str() {
                    "auto" => Prefer::Auto,
                    "qr" => Prefer::Qr,
                    "linha" => Prefer::Linha,
                    other => {
                        return Err(AppError::BadRequest(format!(
                            "Unknown prefer value: {}",
                            other
                        )))
                    }
                };
            }
            "page" => {
                let value = field_text(field).await?;
                options.start_page = value
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("Invalid page: {}", value)))?;
            }
            "tryAllPages" => {
                let value = field_text(field).await?;
                options.try_all_pages = value
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("Invalid tryAllPages: {}", value)))?;
            }
            _ => {}
        }
    }

    let buffer =
        buffer.ok_or_else(|| AppError::BadRequest("Missing file part".to_string()))?;
    run_extraction(&state, buffer, options).await
}

async fn run_extraction(
    state: &AppState,
    buffer: Vec<u8>,
    options: ExtractOptions,
) -> Result<Json<ExtractResponse>> {
    if buffer.is_empty() {
        return Err(AppError::BadRequest("Empty PDF body".to_string()));
    }

    let started = Instant::now();
    let result = state.extract(buffer, options).await?;
    let processing_time = started.elapsed().as_millis() as u64;

    tracing::info!(
        processing_time_ms = processing_time,
        outcome = match &result {
            ExtractResult::DigitLine { .. } => "linha_digitavel",
            ExtractResult::Qr { .. } => "qr",
            ExtractResult::None { .. } => "none",
        },
        "extraction finished"
    );

    Ok(Json(ExtractResponse {
        result,
        processing_time,
    }))
}

async fn download_pdf(url: &str) -> Result<Vec<u8>> {
    let mut response = HTTP_CLIENT
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Download(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AppError::Download(format!(
            "HTTP {} from upstream",
            response.status()
        )));
    }

    if let Some(length) = response.content_length() {
        if length > MAX_DOWNLOAD_BYTES {
            return Err(AppError::BadRequest(format!(
                "PDF exceeds the {} byte limit",
                MAX_DOWNLOAD_BYTES
            )));
        }
    }

    // Enforce the cap during transfer. Chunked responses carry no length
    // header, so buffering first would let the upstream dictate memory use.
    let mut buffer: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| AppError::Download(e.to_string()))?
    {
        if buffer.len() as u64 + chunk.len() as u64 > MAX_DOWNLOAD_BYTES {
            return Err(AppError::BadRequest(format!(
                "PDF exceeds the {} byte limit",
                MAX_DOWNLOAD_BYTES
            )));
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer)
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form field: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum_test::TestServer;

    fn test_server() -> TestServer {
        let mut config = Config::default();
        config.pool.size = 1;
        let state = AppState::new(config);
        TestServer::new(crate::routes::router(state)).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_healthy() {
        let server = test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_extract_rejects_empty_url() {
        let server = test_server();
        let response = server
            .post("/extract")
            .json(&serde_json::json!({ "pdfUrl": "" }))
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_extract_rejects_non_http_url() {
        let server = test_server();
        let response = server
            .post("/extract")
            .json(&serde_json::json!({ "pdfUrl": "ftp://example.com/boleto.pdf" }))
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_upload_without_file_is_rejected() {
        let server = test_server();
        let response = server
            .post("/extract-upload")
            .multipart(axum_test::multipart::MultipartForm::new().add_text("prefer", "qr"))
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Missing file part");
    }

    #[tokio::test]
    async fn test_upload_over_two_megabytes_reaches_the_handler() {
        // A valid-sized boleto PDF can easily exceed axum's 2 MB default
        // body limit; the raised limit must let it through to extraction.
        let server = test_server();
        let form = axum_test::multipart::MultipartForm::new().add_part(
            "file",
            axum_test::multipart::Part::bytes(vec![0u8; 3 * 1024 * 1024])
                .file_name("boleto.pdf")
                .mime_type("application/pdf"),
        );
        let response = server.post("/extract-upload").multipart(form).await;
        // Not a PDF, so extraction rejects it, which proves the body made
        // it past the transport limit instead of dying with a 413.
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid_document");
    }

    #[tokio::test]
    async fn test_oversized_chunked_download_is_rejected_mid_transfer() {
        // Serve an endless-looking chunked body with no Content-Length; the
        // download must abort once the running total passes the cap.
        let app = axum::Router::new().route(
            "/huge.pdf",
            axum::routing::get(|| async {
                let chunks = (0..60).map(|_| Ok::<Vec<u8>, std::io::Error>(vec![0u8; 1024 * 1024]));
                axum::body::Body::from_stream(futures::stream::iter(chunks))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let err = download_pdf(&format!("http://{}/huge.pdf", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_upload_garbage_pdf_is_invalid_document() {
        let server = test_server();
        let form = axum_test::multipart::MultipartForm::new().add_part(
            "file",
            axum_test::multipart::Part::bytes(b"definitely not a pdf".to_vec())
                .file_name("boleto.pdf")
                .mime_type("application/pdf"),
        );
        let response = server.post("/extract-upload").multipart(form).await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid_document");
    }
}
