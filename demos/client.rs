//! Demo client session.
//!
//! Demonstrates:
//! - Building a `ClientConfig` and connecting a `Session`
//! - Lifecycle callbacks and the event handler
//! - Every typed command helper
//!
//! Start the demo server first.
//!
//! Usage:
//!   cargo run --example client
//!   cargo run --example client -- --address 127.0.0.1:9000
//!   cargo run --example client -- --no-wait
//!   cargo run --example client -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::{Args, PASSWORD, USERNAME};
use remote_downloader_rpc::{ClientConfig, ParsedEvent, Result, Session, SessionHandlers};

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
    println!("=== Demo Client ===\n");

    // ========================================================================
    // Connect
    // ========================================================================

    let config = ClientConfig::builder()
        .address(&args.address)
        .credentials(USERNAME, PASSWORD)
        .subscribe_to_reports(true)
        .fail_fast_login(true)
        .build()?;
    println!("[Connect] {}", config.url());

    let handlers = SessionHandlers::new()
        .on_open(|| println!("[Session] open"))
        .on_close(|| println!("[Session] closed"))
        .on_error(|e| println!("[Session] error: {e}"));

    let session = Session::connect(config, handlers);
    session.wait_until_open().await?;
    println!("          ✓ Logged in\n");

    session.set_event_handler(|event| match event.parse() {
        ParsedEvent::FilesHistoryReport(report) => {
            for file in report.files {
                println!(
                    "[Report] {} {:?} {}/{} bytes",
                    file.name, file.status, file.downloaded_bytes, file.total_bytes
                );
            }
        }
        ParsedEvent::Unknown { command, .. } => println!("[Report] unknown event {command}"),
    });

    // ========================================================================
    // Commands
    // ========================================================================

    let listing = session.list_folders(None).await?;
    println!("[Folders] can download: {}", listing.can_download);
    for entry in &listing.files {
        println!("          {}{}", entry.file_name, if entry.folder { "/" } else { "" });
    }

    let record = session
        .download_url(
            "https://example.com/ubuntu.iso",
            "ubuntu.iso",
            Some("movies".into()),
        )
        .await?;
    println!("\n[Download] started {} as {}", record.name, record.id);

    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    let paused = session.stop_downloading(&record.id).await?;
    println!("[Download] {} is {:?}", paused.id, paused.status);

    let resumed = session.resume_downloading(&record.id).await?;
    println!("[Download] {} is {:?}", resumed.id, resumed.status);

    let page = session.get_files_history(0, 10).await?;
    println!("\n[History] {} file(s)", page.total_elements);
    for file in &page.content {
        println!("          {} {:?}", file.name, file.status);
    }

    common::wait_for_exit(args.no_wait).await;

    session.delete_file(&record.id).await?;
    println!("\n[Download] {} deleted", record.id);

    session.close();
    session.wait_closed().await;
    println!("\n=== Done ===");
    Ok(())
}
