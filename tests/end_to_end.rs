//! End-to-end tests for remote-downloader-rpc.
//!
//! These tests run a real [`Server`] on a loopback port and talk to it with
//! a [`Session`] over WebSocket.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use remote_downloader_rpc::protocol::{FolderEntry, LoginRequest};
use remote_downloader_rpc::{
    ClientConfig, Error, ErrorKind, FileRecord, FileStatus, FilesHistoryReport, Page, ParsedEvent,
    ReconnectPolicy, Request, RequestContext, RequestHandler, Server, ServerConfig, ServerError,
    Session, SessionHandlers, SessionState,
};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;

// ============================================================================
// Test Handler
// ============================================================================

/// Keeps download records in memory instead of fetching anything.
#[derive(Default)]
struct FakeDownloads {
    files: Mutex<Vec<FileRecord>>,
}

impl FakeDownloads {
    fn update(&self, file_id: &str, status: FileStatus) -> Result<FileRecord, ServerError> {
        let mut files = self.files.lock();
        let record = files
            .iter_mut()
            .find(|record| record.id == file_id)
            .ok_or_else(|| ServerError::not_found("File is not found."))?;
        record.status = status;
        Ok(record.clone())
    }
}

#[async_trait]
impl RequestHandler for FakeDownloads {
    async fn authenticate(&self, login: &LoginRequest) -> Result<(), ServerError> {
        if login.username.eq_ignore_ascii_case("admin") && login.password == "secret" {
            Ok(())
        } else {
            Err(ServerError::incorrect_credentials())
        }
    }

    async fn handle(&self, _ctx: &RequestContext, request: Request) -> Result<Value, ServerError> {
        match request {
            Request::DownloadUrl(req) => {
                let mut files = self.files.lock();
                let record = FileRecord {
                    id: format!("f{}", files.len() + 1),
                    name: req.file_name,
                    status: FileStatus::Downloading,
                    total_bytes: 0,
                    downloaded_bytes: 0,
                    speed_bytes_per_ms: 0,
                };
                files.push(record.clone());
                to_value(&record)
            }
            Request::GetFilesHistory(req) => {
                let files = self.files.lock();
                let page = Page {
                    content: files
                        .iter()
                        .skip(req.offset as usize)
                        .take(req.size as usize)
                        .cloned()
                        .collect(),
                    total_elements: files.len() as u64,
                };
                to_value(&page)
            }
            Request::DeleteFile(req) => {
                let mut files = self.files.lock();
                let before = files.len();
                files.retain(|record| record.id != req.file_id);
                if files.len() == before {
                    return Err(ServerError::not_found("File is not found."));
                }
                Ok(Value::Null)
            }
            Request::StopDownloading(req) => to_value(&self.update(&req.file_id, FileStatus::Paused)?),
            Request::ResumeDownloading(req) => {
                to_value(&self.update(&req.file_id, FileStatus::Downloading)?)
            }
            Request::ListFolders(_) => Ok(json!({
                "canDownload": true,
                "files": [{ "folder": true, "fileName": "movies" }],
            })),
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ServerError> {
    serde_json::to_value(value).map_err(|e| ServerError::unknown(e.to_string()))
}

// ============================================================================
// Helpers
// ============================================================================

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> Result<Server> {
    let config = ServerConfig::builder()
        .ip_port(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
        .build()?;
    Ok(Server::bind(config, Arc::new(FakeDownloads::default())).await?)
}

fn client_config(server: &Server, password: &str) -> Result<ClientConfig> {
    Ok(ClientConfig::builder()
        .address(server.ws_url())
        .credentials("admin", password)
        .subscribe_to_reports(true)
        .reconnect(ReconnectPolicy::Fixed(Duration::from_millis(50)))
        .build()?)
}

async fn open_session(server: &Server) -> Result<Session> {
    let session = Session::connect(client_config(server, "secret")?, SessionHandlers::new());
    timeout(WAIT, session.wait_until_open()).await??;
    Ok(session)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_download_lifecycle() -> Result<()> {
    let server = start_server().await?;
    let session = open_session(&server).await?;

    let record = session
        .download_url("https://example.com/a.iso", "a.iso", None)
        .await?;
    assert_eq!(record.id, "f1");
    assert_eq!(record.status, FileStatus::Downloading);

    let paused = session.stop_downloading("f1").await?;
    assert_eq!(paused.status, FileStatus::Paused);

    let resumed = session.resume_downloading("f1").await?;
    assert_eq!(resumed.status, FileStatus::Downloading);

    let page = session.get_files_history(0, 10).await?;
    assert_eq!(page.total_elements, 1);
    assert_eq!(page.content[0].name, "a.iso");

    tokio_test::assert_ok!(session.delete_file("f1").await);
    assert!(session.get_files_history(0, 10).await?.content.is_empty());

    session.close();
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_list_folders() -> Result<()> {
    let server = start_server().await?;
    let session = open_session(&server).await?;

    let listing = session.list_folders(None).await?;
    assert!(listing.can_download);
    assert_eq!(
        listing.files,
        vec![FolderEntry {
            folder: true,
            file_name: "movies".into()
        }]
    );

    session.close();
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_server_errors_reach_caller() -> Result<()> {
    let server = start_server().await?;
    let session = open_session(&server).await?;

    let err = session.delete_file("missing").await.unwrap_err();
    assert_eq!(err.server_kind(), Some(ErrorKind::NotFound));

    let err = session
        .download_url("ftp://example.com/a.iso", "a.iso", None)
        .await
        .unwrap_err();
    assert_eq!(err.server_kind(), Some(ErrorKind::Validation));

    let err = session.get_files_history(0, 0).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Server {
            kind: ErrorKind::Validation,
            ..
        }
    ));

    session.close();
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_reports_reach_event_handler() -> Result<()> {
    let server = start_server().await?;
    let session = open_session(&server).await?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    session.set_event_handler(move |event| {
        let _ = event_tx.send(event.parse());
    });

    let report = FilesHistoryReport {
        files: vec![FileRecord {
            id: "f1".into(),
            name: "a.iso".into(),
            status: FileStatus::Downloading,
            total_bytes: 100,
            downloaded_bytes: 50,
            speed_bytes_per_ms: 2,
        }],
    };
    assert_eq!(server.publish_report("Admin", &report)?, 1);

    let event = timeout(WAIT, event_rx.recv()).await?;
    assert_eq!(event, Some(ParsedEvent::FilesHistoryReport(report)));

    session.close();
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_rejected_login_fails_fast() -> Result<()> {
    let server = start_server().await?;
    let config = ClientConfig::builder()
        .address(server.ws_url())
        .credentials("admin", "wrong")
        .fail_fast_login(true)
        .build()?;

    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    let handlers = SessionHandlers::new().on_error(move |e| {
        let _ = error_tx.send(e.server_kind());
    });
    let session = Session::connect(config, handlers);

    let result = timeout(WAIT, session.wait_until_open()).await?;
    assert!(matches!(
        result,
        Err(Error::NotConnected {
            state: SessionState::Closed
        })
    ));
    assert_eq!(
        error_rx.recv().await,
        Some(Some(ErrorKind::IncorrectCredentials))
    );

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_session_survives_server_restart() -> Result<()> {
    let server = start_server().await?;
    let addr = server.local_addr();

    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    let handlers = SessionHandlers::new().on_close(move || {
        let _ = close_tx.send(());
    });
    let session = Session::connect(client_config(&server, "secret")?, handlers);
    timeout(WAIT, session.wait_until_open()).await??;

    server.shutdown().await;
    timeout(WAIT, close_rx.recv()).await?;
    timeout(WAIT, async {
        while session.is_open() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    let config = ServerConfig::builder().bind(addr).build()?;
    let restarted = Server::bind(config, Arc::new(FakeDownloads::default())).await?;

    timeout(WAIT, session.wait_until_open()).await??;
    let page = session.get_files_history(0, 10).await?;
    assert_eq!(page.total_elements, 0);

    session.close();
    restarted.shutdown().await;
    Ok(())
}
