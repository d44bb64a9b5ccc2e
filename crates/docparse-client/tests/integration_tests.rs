//! Integration tests for docparse-client
//!
//! These tests spin up a scripted parsing service with axum and drive the
//! client through the full upload / poll / fetch cycle.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex};

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use docparse_client::config::PROVENANCE_FIELD;
use docparse_client::testing::{TestServer, TEST_API_KEY};
use docparse_client::{
    Content, ContentSource, ErrorKind, JobId, ParseError, ParseOptions, ParseOptionsBuilder,
    ResultType, MISSING_ERROR_CODE, MISSING_ERROR_MESSAGE,
};

// =============================================================================
// Mock Service
// =============================================================================

#[derive(Debug, Clone, Default)]
struct RecordedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct RecordedUpload {
    content_type: String,
    authorization: Option<String>,
    fields: HashMap<String, String>,
    file: Option<RecordedFile>,
}

struct MockState {
    job_id: String,
    /// Status bodies served in order; the last one repeats
    statuses: VecDeque<Value>,
    result_status: StatusCode,
    result_body: String,
    upload_status: StatusCode,
    status_queries: usize,
    uploads: Vec<RecordedUpload>,
    result_requests: Vec<(String, String)>,
}

/// Scripted parsing service
#[derive(Clone)]
struct MockService {
    state: Arc<Mutex<MockState>>,
}

impl MockService {
    fn new(statuses: Vec<Value>, result_body: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                job_id: "job-1".to_string(),
                statuses: statuses.into(),
                result_status: StatusCode::OK,
                result_body: result_body.into(),
                upload_status: StatusCode::OK,
                status_queries: 0,
                uploads: Vec::new(),
                result_requests: Vec::new(),
            })),
        }
    }

    fn succeeding(result_body: impl Into<String>) -> Self {
        Self::new(vec![json!({"status": "SUCCESS"})], result_body)
    }

    fn with_upload_status(self, status: StatusCode) -> Self {
        self.state.lock().unwrap().upload_status = status;
        self
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/upload", post(upload))
            .route("/job/{id}", get(job_status))
            .route("/job/{id}/result/{result_type}", get(job_result))
            .with_state(self.clone())
    }

    fn status_queries(&self) -> usize {
        self.state.lock().unwrap().status_queries
    }

    fn uploads(&self) -> Vec<RecordedUpload> {
        self.state.lock().unwrap().uploads.clone()
    }

    fn result_requests(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().result_requests.clone()
    }
}

async fn upload(
    State(mock): State<MockService>,
    req: Request,
) -> Result<Json<Value>, StatusCode> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let mut recorded = RecordedUpload {
        content_type: content_type.clone(),
        authorization,
        ..Default::default()
    };

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &mock)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| StatusCode::BAD_REQUEST)?
                    .to_vec();
                recorded.file = Some(RecordedFile {
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                recorded.fields.insert(name, text);
            }
        }
    } else {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(req, &mock)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        recorded.fields = fields;
    }

    let mut state = mock.state.lock().unwrap();
    state.uploads.push(recorded);

    if !state.upload_status.is_success() {
        return Err(state.upload_status);
    }
    Ok(Json(json!({"id": state.job_id, "status": "PENDING"})))
}

async fn job_status(State(mock): State<MockService>, Path(_id): Path<String>) -> Json<Value> {
    let mut state = mock.state.lock().unwrap();
    state.status_queries += 1;

    let body = if state.statuses.len() > 1 {
        state.statuses.pop_front()
    } else {
        state.statuses.front().cloned()
    };
    Json(body.unwrap_or_else(|| json!({"status": "PENDING"})))
}

async fn job_result(
    State(mock): State<MockService>,
    Path((id, result_type)): Path<(String, String)>,
) -> (StatusCode, String) {
    let mut state = mock.state.lock().unwrap();
    state.result_requests.push((id, result_type));
    (state.result_status, state.result_body.clone())
}

// =============================================================================
// Test Helpers
// =============================================================================

/// Options with a short poll interval and a generous budget
fn fast_options() -> ParseOptionsBuilder {
    ParseOptions::builder()
        .check_interval_ms(10)
        .max_timeout_ms(5_000)
}

fn strict_options() -> ParseOptions {
    fast_options().ignore_errors(false).build().unwrap()
}

async fn start(mock: &MockService, options: ParseOptions) -> TestServer {
    TestServer::start_with_options(mock.router(), options)
        .await
        .expect("Failed to start test server")
}

fn pdf_fixture(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"%PDF-1.7\nfixture").unwrap();
    (dir, path)
}

// =============================================================================
// End-to-end parsing
// =============================================================================

#[tokio::test]
async fn test_parse_file_polls_until_success() {
    let mock = MockService::new(
        vec![
            json!({"status": "PENDING"}),
            json!({"status": "PENDING"}),
            json!({"status": "SUCCESS"}),
        ],
        r#"{"text":"hello","content":"world"}"#,
    );
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    let content = assert_ok!(server.client.parse_file(&path).await);

    assert_eq!(content, Some(Content::Text("hello".into())));
    assert_eq!(mock.status_queries(), 3);
    assert_eq!(
        mock.result_requests(),
        vec![("job-1".to_string(), "text".to_string())]
    );

    let uploads = mock.uploads();
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert!(upload.content_type.starts_with("multipart/form-data"));
    assert_eq!(
        upload.authorization.as_deref(),
        Some(format!("Bearer {}", TEST_API_KEY).as_str())
    );

    let file = upload.file.as_ref().expect("file part");
    assert_eq!(file.file_name.as_deref(), Some("doc.pdf"));
    assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(file.data, b"%PDF-1.7\nfixture".to_vec());

    assert_eq!(upload.fields.get("language").map(String::as_str), Some("en"));
    assert_eq!(
        upload.fields.get(PROVENANCE_FIELD).map(String::as_str),
        Some("true")
    );
    assert!(!upload.fields.contains_key("input_url"));
    assert!(!upload.fields.contains_key("check_interval_ms"));
}

#[tokio::test]
async fn test_completed_status_is_success() {
    let mock = MockService::new(vec![json!({"status": "COMPLETED"})], r#"{"text":"done"}"#);
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    let content = server.client.parse_file(&path).await.unwrap();
    assert_eq!(content, Some(Content::Text("done".into())));
}

#[tokio::test]
async fn test_markdown_result_type() {
    let mock = MockService::succeeding(r##"{"markdown":"# Title"}"##);
    let options = fast_options()
        .result_type(ResultType::Markdown)
        .ignore_errors(false)
        .build()
        .unwrap();
    let server = start(&mock, options).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    let content = server.client.parse_file(&path).await.unwrap();
    assert_eq!(content, Some(Content::Text("# Title".into())));
    assert_eq!(mock.result_requests()[0].1, "markdown");
}

#[tokio::test]
async fn test_result_falls_back_to_content_field() {
    let mock = MockService::succeeding(r#"{"content":"world"}"#);
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    let content = server.client.parse_file(&path).await.unwrap();
    assert_eq!(content, Some(Content::Text("world".into())));
}

#[tokio::test]
async fn test_empty_result_is_none_not_error() {
    let mock = MockService::succeeding("{}");
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    let content = assert_ok!(server.client.parse_file(&path).await);
    assert_eq!(content, None);
}

#[tokio::test]
async fn test_raw_result_body() {
    let mock = MockService::succeeding("plain text result");
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    let content = server.client.parse_file(&path).await.unwrap();
    assert_eq!(content, Some(Content::Text("plain text result".into())));
}

// =============================================================================
// Poll outcomes
// =============================================================================

#[tokio::test]
async fn test_zero_timeout_fails_on_first_poll() {
    let mock = MockService::succeeding(r#"{"text":"never read"}"#);
    let options = fast_options()
        .max_timeout_ms(0)
        .ignore_errors(false)
        .build()
        .unwrap();
    let server = start(&mock, options).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    match server.client.parse_file(&path).await {
        Err(ParseError::JobTimeout { job_id, timeout }) => {
            assert_eq!(job_id, "job-1");
            assert_eq!(timeout, std::time::Duration::ZERO);
        }
        other => panic!("expected JobTimeout, got {other:?}"),
    }
    assert_eq!(mock.status_queries(), 1);
    assert!(mock.result_requests().is_empty());
}

#[tokio::test]
async fn test_job_error_carries_code_and_message() {
    let mock = MockService::new(
        vec![
            json!({"status": "PENDING"}),
            json!({"status": "ERROR", "error_code": "X", "error_message": "Y"}),
        ],
        "",
    );
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    match server.client.parse_file(&path).await {
        Err(ParseError::JobFailed { code, message }) => {
            assert_eq!(code, "X");
            assert_eq!(message, "Y");
        }
        other => panic!("expected JobFailed, got {other:?}"),
    }
    assert_eq!(mock.status_queries(), 2);
}

#[tokio::test]
async fn test_job_error_without_details_uses_placeholders() {
    let mock = MockService::new(vec![json!({"status": "ERROR"})], "");
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    match server.client.parse_file(&path).await {
        Err(ParseError::JobFailed { code, message }) => {
            assert_eq!(code, MISSING_ERROR_CODE);
            assert_eq!(message, MISSING_ERROR_MESSAGE);
        }
        other => panic!("expected JobFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unexpected_status() {
    let mock = MockService::new(vec![json!({"status": "CANCELLED"})], "");
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    match server.client.parse_file(&path).await {
        Err(ParseError::UnexpectedStatus(status)) => assert_eq!(status, "CANCELLED"),
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_step_by_step_api() {
    let mock = MockService::new(
        vec![json!({"status": "PENDING"}), json!({"status": "SUCCESS"})],
        r#"{"json":[{"page":1}]}"#,
    );
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    let job = server
        .client
        .submit(&ContentSource::path(&path))
        .await
        .unwrap();
    assert_eq!(job, JobId::new("job-1"));

    let status = server.client.wait_for_completion(&job).await.unwrap();
    assert_eq!(status.status, "SUCCESS");

    let content = server
        .client
        .fetch_result_as(&job, ResultType::Json)
        .await
        .unwrap();
    assert_eq!(content, Some(Content::Structured(json!([{"page": 1}]))));
}

// =============================================================================
// Submission paths
// =============================================================================

#[tokio::test]
async fn test_bytes_upload_is_staged_and_cleaned_up() {
    let mock = MockService::succeeding(r#"{"text":"from bytes"}"#);
    let server = start(&mock, strict_options()).await;

    let content = server
        .client
        .parse_bytes(b"%PDF-1.4 in memory".to_vec(), Some("PDF"))
        .await
        .unwrap();
    assert_eq!(content, Some(Content::Text("from bytes".into())));

    let uploads = mock.uploads();
    let file = uploads[0].file.as_ref().expect("file part");
    let file_name = file.file_name.clone().expect("file name");
    assert!(file_name.starts_with("upload"), "{file_name}");
    assert!(file_name.ends_with(".pdf"), "{file_name}");
    assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(file.data, b"%PDF-1.4 in memory".to_vec());

    // staging file is gone
    assert!(!std::env::temp_dir().join(&file_name).exists());
}

#[tokio::test]
async fn test_staging_file_removed_when_upload_fails() {
    let mock = MockService::succeeding("{}")
        .with_upload_status(StatusCode::INTERNAL_SERVER_ERROR);
    let server = start(&mock, strict_options()).await;

    let result = server
        .client
        .parse_bytes(b"%PDF-1.4 rejected".to_vec(), Some("pdf"))
        .await;
    assert!(matches!(
        result,
        Err(ParseError::Server { status: 500, .. })
    ));

    let uploads = mock.uploads();
    let file_name = uploads[0]
        .file
        .as_ref()
        .and_then(|f| f.file_name.clone())
        .expect("staged file name");
    assert!(file_name.starts_with("upload"), "{file_name}");
    assert!(!std::env::temp_dir().join(&file_name).exists());
}

#[tokio::test]
async fn test_bytes_with_mime_hint() {
    let mock = MockService::succeeding(r#"{"text":"doc"}"#);
    let server = start(&mock, strict_options()).await;

    let docx = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
    let content = server
        .client
        .parse_bytes(b"PK\x03\x04".to_vec(), Some(docx))
        .await
        .unwrap();
    assert_eq!(content, Some(Content::Text("doc".into())));

    let uploads = mock.uploads();
    let file = uploads[0].file.as_ref().expect("file part");
    assert!(file.file_name.as_deref().unwrap_or_default().ends_with(".docx"));
    assert_eq!(file.content_type.as_deref(), Some(docx));
}

#[tokio::test]
async fn test_string_with_declared_type_is_uploaded_as_content() {
    let mock = MockService::succeeding(r#"{"text":"ok"}"#);
    let server = start(&mock, strict_options()).await;

    server
        .client
        .parse_input("plain text body", Some(".txt"))
        .await
        .unwrap();

    let uploads = mock.uploads();
    let file = uploads[0].file.as_ref().expect("file part");
    assert_eq!(file.data, b"plain text body".to_vec());
    assert_eq!(file.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_url_upload_sends_input_url_without_file() {
    let mock = MockService::succeeding(r#"{"text":"remote"}"#);
    let options = fast_options()
        .ignore_errors(false)
        .set("experimental_flag", "on")
        .build()
        .unwrap();
    let server = start(&mock, options).await;

    let content = server
        .client
        .parse_input("https://example.com/paper.pdf", None)
        .await
        .unwrap();
    assert_eq!(content, Some(Content::Text("remote".into())));

    let uploads = mock.uploads();
    let upload = &uploads[0];
    assert!(upload
        .content_type
        .starts_with("application/x-www-form-urlencoded"));
    assert!(upload.file.is_none());
    assert_eq!(
        upload.fields.get("input_url").map(String::as_str),
        Some("https://example.com/paper.pdf")
    );
    assert_eq!(
        upload.fields.get("experimental_flag").map(String::as_str),
        Some("on")
    );
    assert_eq!(
        upload.fields.get(PROVENANCE_FIELD).map(String::as_str),
        Some("true")
    );
}

// =============================================================================
// Local validation and the error policy
// =============================================================================

#[tokio::test]
async fn test_missing_file_type_is_logged_and_suppressed() {
    let mock = MockService::succeeding("{}");
    let server = start(&mock, fast_options().build().unwrap()).await;

    let content = server
        .client
        .parse(ContentSource::bytes(b"raw".to_vec(), None))
        .await;
    assert_eq!(assert_ok!(content), None);
    assert!(mock.uploads().is_empty());
}

#[tokio::test]
async fn test_missing_file_type_propagates_when_strict() {
    let mock = MockService::succeeding("{}");
    let server = start(&mock, strict_options()).await;

    let result = server
        .client
        .parse(ContentSource::bytes(b"raw".to_vec(), None))
        .await;
    assert!(matches!(assert_err!(result), ParseError::MissingFileType));
}

#[tokio::test]
async fn test_unsupported_file_type() {
    let mock = MockService::succeeding("{}");
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("program.exe");

    match server.client.parse_file(&path).await {
        Err(ParseError::UnsupportedFileType { extension }) => assert_eq!(extension, ".exe"),
        other => panic!("expected UnsupportedFileType, got {other:?}"),
    }

    let result = server.client.parse_bytes(b"MZ".to_vec(), Some("exe")).await;
    assert!(matches!(
        result,
        Err(ParseError::UnsupportedFileType { .. })
    ));
    assert!(mock.uploads().is_empty());
}

#[tokio::test]
async fn test_ambiguous_input() {
    let mock = MockService::succeeding("{}");

    let strict = start(&mock, strict_options()).await;
    let result = strict.client.parse_input("not a path or url", None).await;
    match result {
        Err(err @ ParseError::AmbiguousInput(_)) => assert_eq!(err.kind(), ErrorKind::Input),
        other => panic!("expected AmbiguousInput, got {other:?}"),
    }

    let lenient = start(&mock, fast_options().build().unwrap()).await;
    let result = lenient.client.parse_input("not a path or url", None).await;
    assert_eq!(result.unwrap(), None);
}

#[tokio::test]
async fn test_server_error_is_transport_failure() {
    let mock = MockService::succeeding("{}").with_upload_status(StatusCode::UNAUTHORIZED);
    let server = start(&mock, strict_options()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    match server.client.parse_file(&path).await {
        Err(err @ ParseError::Server { status: 401, .. }) => assert!(err.is_transport()),
        other => panic!("expected Server error, got {other:?}"),
    }
    assert_eq!(mock.status_queries(), 0);
}

#[tokio::test]
async fn test_server_error_suppressed_by_default() {
    let mock = MockService::succeeding("{}")
        .with_upload_status(StatusCode::INTERNAL_SERVER_ERROR);
    let server = start(&mock, fast_options().build().unwrap()).await;
    let (_dir, path) = pdf_fixture("doc.pdf");

    assert_eq!(server.client.parse_file(&path).await.unwrap(), None);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_parses_share_one_client() {
    let mock = MockService::succeeding(r#"{"text":"same"}"#);
    let server = start(&mock, strict_options()).await;
    let (_dir_a, a) = pdf_fixture("a.pdf");
    let (_dir_b, b) = pdf_fixture("b.pdf");

    let client_a = server.client.clone();
    let client_b = server.client.clone();
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { client_a.parse_file(&a).await }),
        tokio::spawn(async move { client_b.parse_file(&b).await }),
    );

    assert_eq!(ra.unwrap().unwrap(), Some(Content::Text("same".into())));
    assert_eq!(rb.unwrap().unwrap(), Some(Content::Text("same".into())));
    assert_eq!(mock.uploads().len(), 2);
}

// =============================================================================
// Environment resolution
// =============================================================================

#[test]
#[serial_test::serial]
fn test_resolve_reads_process_environment() {
    std::env::set_var("LLAMA_CLOUD_API_KEY", "llx-from-env");
    std::env::set_var("LLAMA_CLOUD_BASE_URL", "http://localhost:9999/api");

    let config =
        docparse_client::ClientConfig::resolve(None, None, &Default::default()).unwrap();
    assert_eq!(config.api_key.expose(), "llx-from-env");
    assert_eq!(config.base_url, "http://localhost:9999/api");

    std::env::remove_var("LLAMA_CLOUD_API_KEY");
    std::env::remove_var("LLAMA_CLOUD_BASE_URL");

    let result = docparse_client::ClientConfig::resolve(None, None, &Default::default());
    assert!(matches!(result, Err(ParseError::Configuration(_))));
}
