//! End-to-end pipeline tests: upload through the router, background
//! analysis with mock AI services, and the polling contract against a
//! local object store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use veridoc_analysis::{
    ExtractError, ExtractionOutput, ExtractionRequest, FieldExtractor, ModelError, RiskAnalyzer,
    VerdictModel, VerdictRequest,
};
use veridoc_core::config::{
    AnalysisConfig, AwsConfig, ChunkingConfig, Config, ExtractionConfig, ServerConfig,
    StorageConfig,
};
use veridoc_core::document::ExtractedField;
use veridoc_core::report::RiskPolicy;
use veridoc_server::jobs::JobRegistry;
use veridoc_server::router::build_router;
use veridoc_server::state::AppState;
use veridoc_storage::AnalysisStore;

// ── Mock AI services ────────────────────────────────────────────────

/// Verdict model scripted by content markers: "TAMPERED" chunks come back
/// high risk, "GLITCH" chunks produce an unparseable response, everything
/// else is low risk.
struct MarkerModel;

#[async_trait]
impl VerdictModel for MarkerModel {
    async fn judge(&self, request: &VerdictRequest) -> Result<String, ModelError> {
        if request.content.contains("GLITCH") {
            return Ok("I am unable to produce a verdict for this chunk.".to_string());
        }
        if request.content.contains("TAMPERED") {
            return Ok(
                r#"{"risk": "high", "confidence": 8, "reasoning": "Inconsistent content."}"#
                    .to_string(),
            );
        }
        Ok(r#"{"risk": "low", "confidence": 2, "reasoning": "Looks clean."}"#.to_string())
    }
}

/// Extractor returning a fixed field set and a small signature crop.
struct FixedExtractor;

#[async_trait]
impl FieldExtractor for FixedExtractor {
    async fn extract(
        &self,
        _request: ExtractionRequest<'_>,
    ) -> Result<ExtractionOutput, ExtractError> {
        let mut output = ExtractionOutput::default();
        output.fields.insert(
            "applicant".to_string(),
            ExtractedField {
                value: "Ada Lovelace".to_string(),
                confidence: 0.96,
            },
        );
        Ok(output)
    }
}

// ── Harness ─────────────────────────────────────────────────────────

fn test_config(data_dir: PathBuf) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origin: "*".to_string(),
            allowed_extensions: vec!["pdf".to_string(), "txt".to_string(), "md".to_string()],
            max_upload_bytes: 1024 * 1024,
        },
        storage: StorageConfig {
            data_dir,
            public_base_url: Some("http://store.local".to_string()),
        },
        aws: AwsConfig {
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            s3_bucket: None,
            s3_prefix: None,
            endpoint_url: None,
        },
        chunking: ChunkingConfig {
            max_chunk_tokens: 50,
            min_chunk_tokens: 1,
        },
        extraction: ExtractionConfig {
            endpoint: None,
            api_key: None,
            model: "prebuilt-document".to_string(),
            timeout_secs: 2,
            max_attempts: 2,
            required_fields: vec!["applicant".to_string()],
        },
        analysis: AnalysisConfig {
            provider: "openai".to_string(),
            openai_api_key: Some("sk-test".to_string()),
            openai_model: "gpt-4o".to_string(),
            openai_base_url: None,
            anthropic_api_key: None,
            anthropic_model: "claude-sonnet-4-5-20250929".to_string(),
            temperature: 0.1,
            max_tokens: 200,
            prompt_path: None,
            timeout_secs: 2,
            max_attempts: 2,
            max_concurrent_chunks: 2,
        },
        policy: RiskPolicy::default(),
    }
}

fn test_app() -> (Router, Arc<AppState>, PathBuf) {
    let data_dir =
        std::env::temp_dir().join(format!("veridoc-e2e-{}", uuid_like()));
    let config = test_config(data_dir.clone());
    let store = Arc::new(AnalysisStore::from_config(&config).unwrap());
    let analyzer = Arc::new(RiskAnalyzer::new(
        Box::new(MarkerModel),
        "You judge document chunks for tampering.".to_string(),
        &config.analysis,
    ));
    let state = Arc::new(AppState {
        config,
        store,
        extractor: Some(Arc::new(FixedExtractor)),
        analyzer,
        jobs: JobRegistry::new(),
    });
    (build_router(state.clone()), state, data_dir)
}

/// Unique-enough suffix without pulling rand into dev-deps.
fn uuid_like() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{nanos}-{:?}", std::thread::current().id())
        .replace(['(', ')', ' '], "")
}

fn multipart_request(filename: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "veridoc-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the status endpoint with an explicit attempt budget until ready.
async fn poll_until_ready(app: &Router, job_id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/status/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let value = response_json(response).await;
        if value["ready"] == true {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never became ready");
}

async fn upload(app: &Router, filename: &str, bytes: &[u8]) -> String {
    let response = app
        .clone()
        .oneshot(multipart_request(filename, bytes))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let value = response_json(response).await;
    value["job_id"].as_str().unwrap().to_string()
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn tampered_chunk_is_flagged_end_to_end() {
    let (app, _state, dir) = test_app();

    let doc = "This paragraph has TAMPERED content in it.\n\n\
               A perfectly ordinary second paragraph.\n\n\
               A perfectly ordinary third paragraph.";
    let job_id = upload(&app, "application.txt", doc.as_bytes()).await;

    let status = poll_until_ready(&app, &job_id).await;
    let report = &status["report"];

    assert_eq!(report["status"], "success");
    assert_eq!(report["tampered_chunks"], serde_json::json!([0]));
    assert_eq!(report["response"]["explanation"].as_array().unwrap().len(), 3);
    assert_eq!(report["form_id"], job_id);
    let overlay = report["overlay_image_url"].as_str().unwrap();
    assert!(overlay.starts_with("http://store.local/overlays/"));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn undecodable_upload_reaches_ready_with_error_report() {
    let (app, _state, dir) = test_app();

    let job_id = upload(&app, "scan.pdf", b"this is not a real pdf payload").await;

    let status = poll_until_ready(&app, &job_id).await;
    let report = &status["report"];

    assert_eq!(report["status"], "error");
    assert_eq!(report["tampered_chunks"], serde_json::json!([]));
    let issues = report["issues"].as_array().unwrap();
    assert!(!issues.is_empty());
    assert_eq!(issues[0]["field"], "document");

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn polling_before_completion_returns_not_ready() {
    let (app, _state, dir) = test_app();

    // Unknown job id: identical answer to a mid-flight job.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/status/never-uploaded")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let value = response_json(response).await;
    assert_eq!(value["ready"], false);
    assert!(value.get("report").is_none());

    // After a real upload completes, the same poll flips to ready+report.
    let job_id = upload(&app, "note.txt", b"Just one ordinary paragraph.").await;
    let status = poll_until_ready(&app, &job_id).await;
    assert_eq!(status["ready"], true);
    assert_eq!(status["report"]["status"], "success");

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn unparseable_verdict_fails_only_that_chunk() {
    let (app, _state, dir) = test_app();

    let doc = "An ordinary first paragraph right here.\n\n\
               This paragraph will GLITCH the model output.\n\n\
               An ordinary third paragraph to close.";
    let job_id = upload(&app, "mixed.txt", doc.as_bytes()).await;

    let status = poll_until_ready(&app, &job_id).await;
    let report = &status["report"];

    assert_eq!(report["status"], "success");
    let explanation = report["response"]["explanation"].as_array().unwrap();
    assert_eq!(explanation.len(), 2);
    let judged: Vec<i64> = explanation.iter().map(|v| v["chunk"].as_i64().unwrap()).collect();
    assert_eq!(judged, vec![0, 2]);
    let issues = report["issues"].as_array().unwrap();
    assert!(issues.iter().any(|i| i["field"] == "chunk 1"));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn repeated_polls_return_identical_reports() {
    let (app, _state, dir) = test_app();

    let job_id = upload(&app, "steady.txt", b"One ordinary paragraph.").await;
    let first = poll_until_ready(&app, &job_id).await;
    let second = poll_until_ready(&app, &job_id).await;
    assert_eq!(
        first["report"]["request_id"],
        second["report"]["request_id"]
    );
    assert_eq!(first["report"]["timestamp"], second["report"]["timestamp"]);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn duplicate_upload_reuses_the_job() {
    let (app, state, dir) = test_app();

    let bytes = b"Same bytes both times.";
    let first_id = upload(&app, "dup.txt", bytes).await;
    poll_until_ready(&app, &first_id).await;

    let second_id = upload(&app, "dup.txt", bytes).await;
    assert_eq!(first_id, second_id);
    // No second job was registered for the same id.
    assert_eq!(state.jobs.snapshot().len(), 1);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn changed_bytes_create_a_fresh_job() {
    let (app, _state, dir) = test_app();

    let first_id = upload(&app, "form.txt", b"Original content here.").await;
    poll_until_ready(&app, &first_id).await;

    let second_id = upload(&app, "form.txt", b"Doctored content here.").await;
    assert_ne!(first_id, second_id);
    poll_until_ready(&app, &second_id).await;

    // The first report survives the re-upload (audit trail).
    let still_there = poll_until_ready(&app, &first_id).await;
    assert_eq!(still_there["ready"], true);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn disallowed_extension_is_rejected() {
    let (app, _state, dir) = test_app();

    let response = app
        .clone()
        .oneshot(multipart_request("macro.docx", b"whatever"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn extracted_fields_flow_into_the_report_context() {
    let (app, _state, dir) = test_app();

    // FixedExtractor supplies the required "applicant" field, so a clean
    // document yields a report with no issues.
    let job_id = upload(&app, "clean.txt", b"A single ordinary paragraph.").await;
    let status = poll_until_ready(&app, &job_id).await;
    let report = &status["report"];
    assert_eq!(report["status"], "success");
    assert!(report["issues"].as_array().unwrap().is_empty());

    std::fs::remove_dir_all(&dir).ok();
}
