//! Upload stage against a mock vector-store API.

use docharvest::{run_upload, HarvestError, UnitError, UploadConfig};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, dir: &TempDir) -> UploadConfig {
    UploadConfig::builder()
        .ledger_path(dir.path().join("downloaded_files.csv"))
        .output_dir(dir.path().join("nedlastede_filer"))
        .api_key("sk-test")
        .vector_store_id("vs_123")
        .api_base(format!("{}/v1", server.uri()))
        .request_timeout_secs(5)
        .build()
        .unwrap()
}

fn write_ledger(dir: &TempDir, rows: &[(&str, &str)]) {
    let mut text = String::from("Filename,URL\n");
    for (file, url) in rows {
        text.push_str(&format!("{file},{url}\n"));
    }
    std::fs::write(dir.path().join("downloaded_files.csv"), text).unwrap();
}

fn write_output(dir: &TempDir, name: &str, content: &str) {
    let out = dir.path().join("nedlastede_filer");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join(name), content).unwrap();
}

#[tokio::test]
async fn uploads_and_attaches_with_source_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/files"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file-abc", "object": "file"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/vector_stores/vs_123/files"))
        .and(header("OpenAI-Beta", "assistants=v2"))
        .and(body_partial_json(json!({
            "file_id": "file-abc",
            "attributes": {"source_url": "https://example.org/doc"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file-abc", "status": "in_progress"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    write_ledger(
        &dir,
        &[
            ("nedlastede_filer/005_Annual_Report.html", "https://example.org/doc"),
            ("nedlastede_filer/006_Gone.pdf", "https://example.org/gone.pdf"),
        ],
    );
    write_output(&dir, "005_Annual_Report.html", "<div><h1>Annual</h1></div>");

    let report = run_upload(&config(&server, &dir)).await.unwrap();

    assert_eq!(report.total_entries, 2);
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.uploaded[0].file_id, "file-abc");
    assert_eq!(report.uploaded[0].source_url, "https://example.org/doc");
    assert_eq!(report.missing.len(), 1);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn api_errors_are_collected_per_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    write_ledger(
        &dir,
        &[
            ("nedlastede_filer/001_A.html", "https://a.example"),
            ("nedlastede_filer/002_B.txt", "https://b.example/b.xlsx"),
        ],
    );
    write_output(&dir, "001_A.html", "<p>a</p>");
    write_output(&dir, "002_B.txt", "Sheet: B\n");

    let report = run_upload(&config(&server, &dir)).await.unwrap();

    assert!(report.uploaded.is_empty());
    assert_eq!(report.errors.len(), 2);
    match &report.errors[0] {
        UnitError::UploadFailed { detail, .. } => assert!(detail.contains("401"), "got {detail}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn missing_ledger_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let err = run_upload(&config(&server, &dir)).await.unwrap_err();
    assert!(matches!(err, HarvestError::LedgerNotFound { .. }));
}
