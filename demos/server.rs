//! Demo download server.
//!
//! Demonstrates:
//! - Implementing `RequestHandler` over an in-memory download registry
//! - Binding a `Server` and accepting sessions
//! - Pushing `FILES_HISTORY_REPORT` events while downloads "progress"
//!
//! Nothing is actually fetched: each download grows by a fixed amount per
//! tick until it reaches its simulated size.
//!
//! Usage:
//!   cargo run --example server
//!   cargo run --example server -- --address 0.0.0.0:9000
//!   cargo run --example server -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Args, PASSWORD, USERNAME};
use parking_lot::Mutex;
use remote_downloader_rpc::protocol::{FolderEntry, ListFoldersResponse, LoginRequest};
use remote_downloader_rpc::{
    Error, FileRecord, FileStatus, FilesHistoryReport, Page, Request, RequestContext,
    RequestHandler, Result, Server, ServerConfig, ServerError,
};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

const TICK: Duration = Duration::from_secs(1);
const SIMULATED_SIZE: u64 = 10 * 1024 * 1024;
const BYTES_PER_TICK: u64 = 1024 * 1024;

// ============================================================================
// Registry
// ============================================================================

/// Download records per user.
#[derive(Default)]
struct Registry {
    users: Mutex<FxHashMap<String, Vec<FileRecord>>>,
    next_id: Mutex<u64>,
}

impl Registry {
    fn with_file<T>(
        &self,
        username: &str,
        file_id: &str,
        f: impl FnOnce(&mut Vec<FileRecord>, usize) -> T,
    ) -> std::result::Result<T, ServerError> {
        let mut users = self.users.lock();
        let files = users.entry(username.to_string()).or_default();
        let index = files
            .iter()
            .position(|record| record.id == file_id)
            .ok_or_else(|| ServerError::not_found("File is not found."))?;
        Ok(f(files, index))
    }

    /// Advances every running download and returns the reports to push.
    fn tick(&self) -> Vec<(String, FilesHistoryReport)> {
        let mut users = self.users.lock();
        users
            .iter_mut()
            .filter_map(|(username, files)| {
                let changed: Vec<FileRecord> = files
                    .iter_mut()
                    .filter(|record| record.status == FileStatus::Downloading)
                    .map(|record| {
                        record.downloaded_bytes =
                            (record.downloaded_bytes + BYTES_PER_TICK).min(record.total_bytes);
                        record.speed_bytes_per_ms = BYTES_PER_TICK / TICK.as_millis() as u64;
                        if record.downloaded_bytes == record.total_bytes {
                            record.status = FileStatus::Downloaded;
                            record.speed_bytes_per_ms = 0;
                        }
                        record.clone()
                    })
                    .collect();

                (!changed.is_empty())
                    .then(|| (username.clone(), FilesHistoryReport { files: changed }))
            })
            .collect()
    }
}

// ============================================================================
// Handler
// ============================================================================

#[async_trait]
impl RequestHandler for Registry {
    async fn authenticate(&self, login: &LoginRequest) -> std::result::Result<(), ServerError> {
        if login.username.eq_ignore_ascii_case(USERNAME) && login.password == PASSWORD {
            Ok(())
        } else {
            Err(ServerError::incorrect_credentials())
        }
    }

    async fn handle(
        &self,
        ctx: &RequestContext,
        request: Request,
    ) -> std::result::Result<Value, ServerError> {
        let user = ctx.username.as_str();
        match request {
            Request::DownloadUrl(req) => {
                let id = {
                    let mut next_id = self.next_id.lock();
                    *next_id += 1;
                    format!("file-{next_id}")
                };
                let record = FileRecord {
                    id,
                    name: req.file_name,
                    status: FileStatus::Downloading,
                    total_bytes: SIMULATED_SIZE,
                    downloaded_bytes: 0,
                    speed_bytes_per_ms: 0,
                };
                println!("[{user}] download {} -> {}", req.url, record.name);
                self.users
                    .lock()
                    .entry(user.to_string())
                    .or_default()
                    .push(record.clone());
                to_value(&record)
            }

            Request::GetFilesHistory(req) => {
                let users = self.users.lock();
                let files = users.get(user).map(Vec::as_slice).unwrap_or_default();
                to_value(&Page {
                    content: files
                        .iter()
                        .rev()
                        .skip(req.offset as usize)
                        .take(req.size as usize)
                        .cloned()
                        .collect::<Vec<_>>(),
                    total_elements: files.len() as u64,
                })
            }

            Request::DeleteFile(req) => {
                self.with_file(user, &req.file_id, |files, index| files.remove(index))?;
                Ok(Value::Null)
            }

            Request::StopDownloading(req) => {
                let record = self.with_file(user, &req.file_id, |files, index| {
                    let record = &mut files[index];
                    if record.status == FileStatus::Downloading {
                        record.status = FileStatus::Paused;
                        record.speed_bytes_per_ms = 0;
                    }
                    record.clone()
                })?;
                to_value(&record)
            }

            Request::ResumeDownloading(req) => {
                let record = self.with_file(user, &req.file_id, |files, index| {
                    let record = &mut files[index];
                    match record.status {
                        FileStatus::Paused | FileStatus::Error => {
                            record.status = FileStatus::Downloading;
                            Ok(record.clone())
                        }
                        FileStatus::Downloading => Ok(record.clone()),
                        FileStatus::Downloaded => Err(ServerError::failed_to_download(
                            "File is already downloaded.",
                        )),
                    }
                })??;
                to_value(&record)
            }

            Request::ListFolders(req) => to_value(&ListFoldersResponse {
                can_download: true,
                files: match req.path {
                    None => vec![
                        FolderEntry {
                            folder: true,
                            file_name: "movies".into(),
                        },
                        FolderEntry {
                            folder: true,
                            file_name: "music".into(),
                        },
                    ],
                    Some(_) => Vec::new(),
                },
            }),
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> std::result::Result<Value, ServerError> {
    serde_json::to_value(value).map_err(|e| ServerError::unknown(e.to_string()))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Demo Download Server ===\n");

    let addr: SocketAddr = args
        .address
        .parse()
        .map_err(|e| Error::config(format!("Invalid address '{}': {e}", args.address)))?;
    let config = ServerConfig::builder().bind(addr).build()?;

    let registry = Arc::new(Registry::default());
    let server = Arc::new(Server::bind(config, registry.clone()).await?);
    println!("[Server] Listening on {}", server.ws_url());
    println!("         Login with {USERNAME} / {PASSWORD}\n");

    let ticker = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            loop {
                interval.tick().await;
                for (username, report) in registry.tick() {
                    match server.publish_report(&username, &report) {
                        Ok(delivered) => tracing::debug!(%username, delivered, "Progress pushed"),
                        Err(e) => tracing::warn!(%username, error = %e, "Progress push failed"),
                    }
                }
            }
        })
    };

    common::wait_for_exit(args.no_wait).await;

    ticker.abort();
    server.shutdown().await;
    println!("\n=== Done ===");
    Ok(())
}
