//! End-to-end gateway tests against an in-process mock of the B2 API.
//!
//! The mock serves the authorize/list/upload/info/delete endpoints from an
//! in-memory key map, plus a couple of "remote" files for ingest to fetch.

use axum::{
    Json, Router,
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use b2_gateway::config::AppConfig;
use b2_gateway::errors::GatewayError;
use b2_gateway::services::gateway_service::GatewayService;
use bytes::Bytes;
use serde_json::{Value, json};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tempfile::TempDir;

const REMOTE_PDF: &[u8] = b"%PDF-1.4 mock quarterly report";

#[derive(Clone)]
struct StoredFile {
    file_id: String,
    content: Vec<u8>,
    info: BTreeMap<String, String>,
}

#[derive(Clone)]
struct MockState {
    base: String,
    files: Arc<Mutex<BTreeMap<String, StoredFile>>>,
    next_id: Arc<AtomicU64>,
    /// Keys whose delete requests the mock rejects with a server error.
    stuck_deletes: Arc<Mutex<BTreeSet<String>>>,
}

impl MockState {
    fn insert(&self, key: &str, content: Vec<u8>) -> String {
        self.insert_with_info(key, content, BTreeMap::new())
    }

    fn insert_with_info(
        &self,
        key: &str,
        content: Vec<u8>,
        info: BTreeMap<String, String>,
    ) -> String {
        let file_id = format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.files.lock().unwrap().insert(
            key.to_string(),
            StoredFile {
                file_id: file_id.clone(),
                content,
                info,
            },
        );
        file_id
    }

    fn refuse_delete_of(&self, key: &str) {
        self.stuck_deletes.lock().unwrap().insert(key.to_string());
    }

    fn keys(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    fn content(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).map(|f| f.content.clone())
    }
}

async fn authorize(State(st): State<MockState>) -> Json<Value> {
    Json(json!({
        "authorizationToken": "mock-session-token",
        "apiInfo": { "storageApi": { "apiUrl": st.base, "downloadUrl": st.base } }
    }))
}

async fn list_file_names(State(st): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    let prefix = body["prefix"].as_str().unwrap_or("").to_string();
    let delimiter = body["delimiter"].as_str().map(str::to_string);

    let files = st.files.lock().unwrap();
    let mut out = Vec::new();
    let mut prefixes = Vec::new();
    for (key, stored) in files.iter() {
        let Some(rest) = key.strip_prefix(&prefix) else {
            continue;
        };
        if let Some(delim) = &delimiter {
            if let Some(pos) = rest.find(delim.as_str()) {
                let common = format!("{}{}{}", prefix, &rest[..pos], delim);
                if !prefixes.contains(&common) {
                    prefixes.push(common);
                }
                continue;
            }
        }
        out.push(json!({
            "fileId": stored.file_id,
            "fileName": key,
            "contentLength": stored.content.len(),
            "uploadTimestamp": 1_700_000_000_000u64,
            "fileInfo": stored.info,
        }));
    }
    Json(json!({ "files": out, "commonPrefixes": prefixes }))
}

async fn get_upload_url(State(st): State<MockState>) -> Json<Value> {
    Json(json!({
        "uploadUrl": format!("{}/mock-upload", st.base),
        "authorizationToken": "mock-upload-token",
    }))
}

async fn upload(State(st): State<MockState>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let key = headers
        .get("X-Bz-File-Name")
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            urlencoding::decode(raw)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        })
        .expect("upload without file name header");
    let info: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            name.as_str()
                .strip_prefix("x-bz-info-")
                .zip(value.to_str().ok())
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect();
    let len = body.len();
    let file_id = st.insert_with_info(&key, body.to_vec(), info);
    Json(json!({
        "fileId": file_id,
        "fileName": key,
        "contentLength": len,
        "uploadTimestamp": 1_700_000_000_000u64,
    }))
}

async fn get_file_info(
    State(st): State<MockState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let wanted = body["fileId"].as_str().unwrap_or_default();
    let files = st.files.lock().unwrap();
    for (key, stored) in files.iter() {
        if stored.file_id == wanted {
            return (
                StatusCode::OK,
                Json(json!({
                    "fileId": stored.file_id,
                    "fileName": key,
                    "contentLength": stored.content.len(),
                    "uploadTimestamp": 1_700_000_000_000u64,
                })),
            );
        }
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": 404, "code": "not_found", "message": "no such file" })),
    )
}

async fn delete_file_version(
    State(st): State<MockState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let name = body["fileName"].as_str().unwrap_or_default();
    if st.stuck_deletes.lock().unwrap().contains(name) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": 503, "code": "service_unavailable", "message": name })),
        );
    }
    let mut files = st.files.lock().unwrap();
    match files.remove(name) {
        Some(_) => (StatusCode::OK, Json(json!({ "fileName": name }))),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": 400, "code": "file_not_present", "message": name })),
        ),
    }
}

async fn remote_file(AxumPath(name): AxumPath<String>) -> (StatusCode, Vec<u8>) {
    if name == "report.pdf" {
        (StatusCode::OK, REMOTE_PDF.to_vec())
    } else {
        (StatusCode::NOT_FOUND, b"gone".to_vec())
    }
}

async fn spawn_mock() -> MockState {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let state = MockState {
        base,
        files: Arc::new(Mutex::new(BTreeMap::new())),
        next_id: Arc::new(AtomicU64::new(1)),
        stuck_deletes: Arc::new(Mutex::new(BTreeSet::new())),
    };
    let app = Router::new()
        .route("/b2api/v3/b2_authorize_account", get(authorize))
        .route("/b2api/v3/b2_list_file_names", post(list_file_names))
        .route("/b2api/v3/b2_get_upload_url", post(get_upload_url))
        .route("/b2api/v3/b2_get_file_info", post(get_file_info))
        .route("/b2api/v3/b2_delete_file_version", post(delete_file_version))
        .route("/mock-upload", post(upload))
        .route("/remote/{name}", get(remote_file))
        .with_state(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    state
}

/// A server that accepts TCP connections and never writes a byte, for
/// exercising the fetch read timeout.
async fn spawn_silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((socket, _)) => held.push(socket),
                Err(_) => break,
            }
        }
    });
    base
}

fn test_config(base: &str, scratch: &Path) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        key_id: "unit-key-id".into(),
        application_key: "unit-secret".into(),
        bucket_id: "unit-bucket-id".into(),
        bucket_name: "unit-bucket".into(),
        public_base_url: "https://files.example.com/file".into(),
        auth_base_url: base.to_string(),
        scratch_dir: scratch.to_string_lossy().into_owned(),
    }
}

fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| entries.count() == 0)
        .unwrap_or(true)
}

#[tokio::test]
async fn create_folder_appears_in_parent_listing() {
    let mock = spawn_mock().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    let key = gateway.create_folder("a/b").await.unwrap();
    assert_eq!(key, "a/b");
    assert_eq!(mock.keys(), vec!["a/b/.keep"]);

    let parent = gateway.list("a").await.unwrap();
    assert_eq!(parent.folders, vec!["b"]);
    assert!(parent.files.is_empty());
}

#[tokio::test]
async fn marker_only_directory_lists_as_empty() {
    let mock = spawn_mock().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    gateway.create_folder("docs").await.unwrap();

    let listing = gateway.list("docs").await.unwrap();
    assert!(listing.folders.is_empty());
    assert!(listing.files.is_empty());
}

#[tokio::test]
async fn listing_is_idempotent_and_order_stable() {
    let mock = spawn_mock().await;
    mock.insert("b.txt", b"b".to_vec());
    mock.insert("a.txt", b"a".to_vec());
    mock.insert("photos/cat.jpg", b"c".to_vec());
    mock.insert("archive/2024/x.zip", b"x".to_vec());

    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    let first = gateway.list("").await.unwrap();
    let second = gateway.list("").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.folders, vec!["archive", "photos"]);
    let names: Vec<&str> = first.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn ingest_persists_under_canonical_key() {
    let mock = spawn_mock().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    let url = format!("{}/remote/report.pdf", mock.base);
    let receipt = gateway
        .ingest(&url, "Invoices", Some("Q1 Report.pdf"), Some("Q1 Report"))
        .await
        .unwrap();

    assert_eq!(receipt.key, "invoices/q1-report.pdf");
    assert_eq!(
        receipt.public_url,
        "https://files.example.com/file/unit-bucket/invoices/q1-report.pdf"
    );
    assert_eq!(receipt.size_bytes, REMOTE_PDF.len() as i64);
    assert_eq!(receipt.display_name.as_deref(), Some("Q1 Report"));
    assert_eq!(
        mock.content("invoices/q1-report.pdf"),
        Some(REMOTE_PDF.to_vec())
    );
    assert!(scratch_is_empty(scratch.path()));

    // The display name rides along as file metadata and resurfaces in listings.
    let listing = gateway.list("invoices").await.unwrap();
    assert_eq!(listing.files.len(), 1);
    assert_eq!(listing.files[0].display_name.as_deref(), Some("Q1 Report"));
}

#[tokio::test]
async fn ingest_derives_leaf_from_url() {
    let mock = spawn_mock().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    let url = format!("{}/remote/report.pdf", mock.base);
    let receipt = gateway.ingest(&url, "", None, None).await.unwrap();

    assert_eq!(receipt.key, "report.pdf");
    assert_eq!(mock.content("report.pdf"), Some(REMOTE_PDF.to_vec()));
}

#[tokio::test]
async fn ingest_of_missing_remote_fails_with_status_and_cleans_scratch() {
    let mock = spawn_mock().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    let url = format!("{}/remote/nope.bin", mock.base);
    let err = gateway.ingest(&url, "stuff", None, None).await.unwrap_err();

    match err {
        GatewayError::Fetch { status, .. } => assert_eq!(status, 404),
        other => panic!("expected Fetch error, got {:?}", other),
    }
    assert!(mock.keys().is_empty());
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn delete_folder_removes_members_and_marker() {
    let mock = spawn_mock().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    gateway.create_folder("a/b").await.unwrap();
    mock.insert("a/b/one.txt", b"1".to_vec());
    mock.insert("a/b/deep/two.txt", b"2".to_vec());
    mock.insert("a/other.txt", b"3".to_vec());

    gateway.delete_folder("a/b").await.unwrap();

    let parent = gateway.list("a").await.unwrap();
    assert!(parent.folders.is_empty());
    assert_eq!(parent.files.len(), 1);
    assert_eq!(parent.files[0].name, "other.txt");
}

#[tokio::test]
async fn ingest_fails_when_remote_never_responds() {
    let mock = spawn_mock().await;
    let silent = spawn_silent_server().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    let url = format!("{}/remote/slow.bin", silent);
    let result = tokio::time::timeout(
        Duration::from_secs(30),
        gateway.ingest(&url, "stuff", None, None),
    )
    .await
    .expect("ingest hung past the read-timeout bound");

    match result.unwrap_err() {
        GatewayError::Fetch { status, .. } => assert_eq!(status, 0),
        other => panic!("expected Fetch error, got {:?}", other),
    }
    assert!(mock.keys().is_empty());
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn delete_folder_reports_exactly_the_failed_keys() {
    let mock = spawn_mock().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    mock.insert("a/b/one.txt", b"1".to_vec());
    mock.insert("a/b/stuck.txt", b"2".to_vec());
    mock.insert("a/b/deep/also-stuck.txt", b"3".to_vec());
    mock.refuse_delete_of("a/b/stuck.txt");
    mock.refuse_delete_of("a/b/deep/also-stuck.txt");

    let err = gateway.delete_folder("a/b").await.unwrap_err();
    match err {
        GatewayError::PartialDelete { mut failed } => {
            failed.sort();
            assert_eq!(failed, vec!["a/b/deep/also-stuck.txt", "a/b/stuck.txt"]);
        }
        other => panic!("expected PartialDelete error, got {:?}", other),
    }
    // The deletable member is gone; the refused ones remain.
    assert_eq!(
        mock.keys(),
        vec!["a/b/deep/also-stuck.txt", "a/b/stuck.txt"]
    );
}

#[tokio::test]
async fn delete_missing_folder_is_a_noop() {
    let mock = spawn_mock().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    gateway.delete_folder("never/existed").await.unwrap();
}

#[tokio::test]
async fn delete_file_verifies_existence_first() {
    let mock = spawn_mock().await;
    let scratch = TempDir::new().unwrap();
    let gateway = GatewayService::new(&test_config(&mock.base, scratch.path())).unwrap();

    let file_id = mock.insert("docs/note.txt", b"note".to_vec());

    gateway.delete_file(&file_id, "docs/note.txt").await.unwrap();
    assert!(mock.keys().is_empty());

    let err = gateway
        .delete_file(&file_id, "docs/note.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
}
