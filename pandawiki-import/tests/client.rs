use std::sync::{Arc, Mutex};

use bytes::Bytes;
use pandawiki_import::PandaWikiClient;
use pandawiki_import_core::contract::{
    ExportRequest, NewNode, NodeType, ParseRequest, ProgressFn, TaskStatus, UploadFile, WikiApi,
};
use pandawiki_import_core::ImportSource;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn envelope(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "message": "",
        "data": data,
    }))
}

fn client(server: &MockServer) -> PandaWikiClient {
    PandaWikiClient::new(format!("{}/", server.uri()), "test-token").expect("client builds")
}

#[tokio::test]
async fn upload_streams_file_and_reports_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/file/upload"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(envelope(json!({ "key": "uploads/guide.md" })))
        .expect(1)
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let progress: ProgressFn = Arc::new(move |sent, total| {
        recorder.lock().unwrap().push((sent, total));
    });
    let data = Bytes::from(vec![b'x'; 150 * 1024]);

    let uploaded = client(&server)
        .upload(
            UploadFile {
                filename: "guide.md".to_string(),
                data,
            },
            progress,
        )
        .await
        .expect("upload succeeds");

    assert_eq!(uploaded.key, "uploads/guide.md");
    assert_eq!(uploaded.filename, "guide.md", "falls back to the local name");

    let seen = seen.lock().unwrap();
    let total = 150 * 1024;
    assert_eq!(seen.first(), Some(&(0, total)));
    assert_eq!(seen.last(), Some(&(total, total)));
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0), "progress never goes back: {seen:?}");
}

#[tokio::test]
async fn parse_sends_crawler_source_and_decodes_tree() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/crawler/parse"))
        .and(body_json(json!({
            "crawler_source": "url",
            "key": "https://example.com",
            "kb_id": "kb-1"
        })))
        .respond_with(envelope(json!({
            "id": "crawl-7",
            "docs": {
                "value": { "id": "", "title": "root" },
                "children": [{ "value": { "id": "p1", "title": "Page", "file": true, "file_type": "html" } }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let parsed = client(&server)
        .parse(ParseRequest {
            source: ImportSource::Url,
            key: "https://example.com".to_string(),
            kb_id: "kb-1".to_string(),
            filename: None,
        })
        .await
        .expect("parse succeeds");

    assert_eq!(parsed.id, "crawl-7");
    let root = parsed.docs.expect("docs present");
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].value.id, "p1");
    assert!(root.children[0].value.file);
}

#[tokio::test]
async fn export_and_poll_use_crawler_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/crawler/export"))
        .and(body_json(json!({ "id": "crawl-7", "doc_id": "p1", "kb_id": "kb-1" })))
        .respond_with(envelope(json!({ "task_id": "task-9" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/crawler/result"))
        .and(body_json(json!({ "task_ids": ["task-9"] })))
        .respond_with(envelope(json!({
            "list": [{ "task_id": "task-9", "status": "in_progress" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let export = client
        .export(ExportRequest {
            platform_id: "crawl-7".to_string(),
            doc_id: "p1".to_string(),
            kb_id: "kb-1".to_string(),
            space_id: None,
            file_type: None,
        })
        .await
        .expect("export succeeds");
    assert_eq!(export.task_id, "task-9");

    let results = client
        .poll_results(vec!["task-9".to_string()])
        .await
        .expect("poll succeeds");
    assert_eq!(results.list[0].status, TaskStatus::Pending, "unknown states are pending");
}

#[tokio::test]
async fn create_node_sends_numeric_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/node"))
        .and(body_partial_json(json!({ "kb_id": "kb-1", "name": "Guides", "type": 1 })))
        .respond_with(envelope(json!({ "id": "node-3" })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server)
        .create_node(NewNode {
            name: "Guides".to_string(),
            content: String::new(),
            parent_id: None,
            node_type: NodeType::Folder,
            kb_id: "kb-1".to_string(),
        })
        .await
        .expect("node created");
    assert_eq!(created.id, "node-3");
}

#[tokio::test]
async fn unsuccessful_envelope_becomes_error_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/crawler/export"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "document not found",
            "data": null
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .export(ExportRequest {
            platform_id: "crawl-7".to_string(),
            doc_id: "missing".to_string(),
            kb_id: "kb-1".to_string(),
            space_id: None,
            file_type: None,
        })
        .await
        .expect_err("rejected request");
    assert!(err.to_string().contains("document not found"), "got: {err}");
}

#[tokio::test]
async fn http_error_status_becomes_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/crawler/result"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "unauthorized"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .poll_results(vec!["task-1".to_string()])
        .await
        .expect_err("401 fails");
    let msg = err.to_string();
    assert!(msg.contains("401") && msg.contains("unauthorized"), "got: {msg}");
}
