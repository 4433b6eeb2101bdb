//! End-to-end tests: one in-process server speaking both the request/reply
//! API and the channel.
//!
//! These tests verify complete flows:
//! - Login, channel open and the initial listing
//! - Mutations followed by a fresh snapshot
//! - The bridge driving a session

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use client::{
    Bridge, ClientConfig, EntryKind, MemoryBackend, NavigationUpdate,
    RecordingLauncher, Session,
};
use protocol::messages::{DirectoryLayout, ListDirectoryResponse, ListingResult};
use protocol::{Envelope, FileEntry, FileMetadata, FileType, Message, TransferRequest};
use serde_json::{json, Value};

const TOKEN: &str = "e2e-token";

/// Remote tree: directories and files by full path.
#[derive(Default)]
struct Tree {
    directories: BTreeSet<String>,
    files: BTreeSet<String>,
}

type Shared = Arc<Mutex<Tree>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("SPTF_AUTH={}", TOKEN))
        .unwrap_or(false)
}

fn server_error(code: i64) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "errorCode": code })),
    )
        .into_response()
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

fn children(tree: &Tree, dir: &str) -> Vec<FileEntry> {
    let entry = |path: &String, file_type| FileEntry {
        file_name: path.rsplit('/').next().unwrap_or_default().to_string(),
        path: path.clone(),
        metadata: FileMetadata {
            file_type,
            size: 0,
            modified_timestamp: 0,
            accessed_timestamp: 0,
            created_timestamp: 0,
        },
    };
    let dirs = tree
        .directories
        .iter()
        .filter(|p| parent_of(p) == dir)
        .map(|p| entry(p, FileType::Directory));
    let files = tree
        .files
        .iter()
        .filter(|p| parent_of(p) == dir)
        .map(|p| entry(p, FileType::NormalFile));
    dirs.chain(files).collect()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        Json(json!({ "uuid": TOKEN })).into_response()
    } else {
        server_error(2)
    }
}

async fn make_directory(
    State(tree): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return server_error(5);
    }
    let path = body["directoryPath"].as_str().unwrap_or_default().to_string();
    tree.lock().unwrap().directories.insert(path);
    StatusCode::OK.into_response()
}

async fn upload(
    State(tree): State<Shared>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if !authorized(&headers) {
        return server_error(5);
    }
    let Ok(request) = rmp_serde::from_slice::<TransferRequest>(&body) else {
        return server_error(7);
    };
    let mut tree = tree.lock().unwrap();
    for file in request.uploaded_file {
        let dir = request.dir_path.trim_end_matches('/');
        tree.files.insert(format!("{}/{}", dir, file.file_name));
    }
    StatusCode::OK.into_response()
}

async fn channel(
    State(tree): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    if query.get("auth_token").map(String::as_str) != Some(TOKEN) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    upgrade.on_upgrade(move |socket| serve_channel(socket, tree))
}

async fn serve_channel(mut socket: WebSocket, tree: Shared) {
    while let Some(Ok(frame)) = socket.recv().await {
        let WsMessage::Binary(bytes) = frame else {
            continue;
        };
        let Ok(envelope) = Envelope::from_msgpack(&bytes) else {
            return;
        };
        let Message::ListDirectory(request) = envelope.payload else {
            continue;
        };

        let files = children(&tree.lock().unwrap(), &request.path);
        let reply = Envelope::new(
            envelope.sequence,
            Message::ListDirectoryResponse(ListDirectoryResponse {
                directory_path: request.path,
                result: ListingResult::DirectoryLayout(DirectoryLayout { files }),
            }),
        );
        let bytes = reply.to_msgpack().unwrap();
        if socket.send(WsMessage::Binary(bytes)).await.is_err() {
            return;
        }
    }
}

async fn spawn_server() -> (SocketAddr, Shared) {
    let tree: Shared = Arc::new(Mutex::new(Tree::default()));
    tree.lock().unwrap().directories.insert("/photos".to_string());

    let app = Router::new()
        .route("/login", post(login))
        .route("/make_directory", post(make_directory))
        .route("/upload", post(upload))
        .route("/ws", get(channel))
        .with_state(tree.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, tree)
}

fn session_for(addr: SocketAddr) -> Session<MemoryBackend> {
    let mut config = ClientConfig::with_server_url(format!("http://{}", addr));
    config.connection.connect_poll_interval_ms = 20;
    Session::new(
        config,
        MemoryBackend::new(),
        Arc::new(RecordingLauncher::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_login_browse_mutate_refresh() {
    let (addr, _) = spawn_server().await;
    let mut session = session_for(addr);
    session.login("alice", "secret").await.unwrap();

    let mut browser = session.open_browser().await.unwrap();
    let NavigationUpdate::Synced(root) = browser.settle().await.unwrap() else {
        panic!("expected the start directory");
    };
    assert_eq!(root.path, "/");
    assert_eq!(root.entries.len(), 1);
    assert_eq!(root.entries[0].name, "photos");
    assert_eq!(root.entries[0].kind, EntryKind::Directory);

    session
        .transfers()
        .unwrap()
        .make_directory("/music")
        .await
        .unwrap();
    browser.refresh().unwrap();
    let NavigationUpdate::Synced(root) = browser.settle().await.unwrap() else {
        panic!("expected a fresh snapshot");
    };
    let names: Vec<_> = root.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["music", "photos"]);

    browser.navigate("/photos").unwrap();
    browser.settle().await.unwrap();
    session
        .transfers()
        .unwrap()
        .upload(
            "/photos",
            vec![protocol::UploadedFile {
                file_name: "cat.jpg".to_string(),
                content: vec![0xff, 0xd8],
            }],
        )
        .await
        .unwrap();
    browser.refresh().unwrap();
    let NavigationUpdate::Synced(photos) = browser.settle().await.unwrap() else {
        panic!("expected the photos listing");
    };
    assert_eq!(photos.entries[0].path, "/photos/cat.jpg");
    assert_eq!(photos.entries[0].kind, EntryKind::File);

    browser.close().await;
}

#[tokio::test]
async fn test_bridge_drives_session() {
    let (addr, tree) = spawn_server().await;
    let mut bridge = Bridge::new(session_for(addr));

    let reply = bridge
        .handle_json(r#"{"type":"login","data":{"username":"alice","password":"wrong"}}"#)
        .await;
    let error = reply.error.unwrap();
    assert_eq!(error.code, "INVALID_CREDENTIALS");
    assert_eq!(error.message, "incorrect password");

    let reply = bridge
        .handle_json(r#"{"type":"login","data":{"username":"alice","password":"secret"}}"#)
        .await;
    assert_eq!(reply.result.unwrap()["authToken"], TOKEN);

    let reply = bridge.handle_json(r#"{"type":"getCookie"}"#).await;
    assert_eq!(reply.result.unwrap()["value"], TOKEN);

    let reply = bridge
        .handle_json(r#"{"type":"makeDirectory","data":{"directoryPath":"/docs"}}"#)
        .await;
    assert!(reply.is_ok());

    let reply = bridge
        .handle_json(
            r#"{"type":"uploadFiles","data":{"currentDir":"/docs","files":[{"fileName":"a.txt","content":"aGk="}]}}"#,
        )
        .await;
    assert!(reply.is_ok());

    let tree = tree.lock().unwrap();
    assert!(tree.directories.contains("/docs"));
    assert!(tree.files.contains("/docs/a.txt"));
}
