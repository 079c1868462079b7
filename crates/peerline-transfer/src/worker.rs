//! Transfer workers.
//!
//! A worker executes exactly one upload or download over an established
//! file session and reports through lifecycle events instead of return
//! values: `Start` before any bytes move, then `Finished` or `Failed`,
//! then a terminal `End` that always fires so observers can release
//! whatever they froze for the duration of the job. Failures are events,
//! never panics.

use crate::session::{FileSession, SessionError};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::sync::mpsc;

/// Errors a transfer job can fail with
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Local filesystem failure
    #[error("file error: {0}")]
    FileIo(String),

    /// The job's filename has no usable base name
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    /// The peer session failed
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Which way bytes move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Send a local file to the peer
    Upload,
    /// Fetch a remote file from the peer
    Download,
}

/// One file transfer to execute.
///
/// Created by the caller, executed exactly once by a worker.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// File to move: a local path for uploads, a remote name for
    /// downloads
    pub filename: PathBuf,
    /// Which way bytes move
    pub direction: Direction,
    /// Where a download lands; ignored for uploads
    pub dest_dir: Option<PathBuf>,
}

/// Lifecycle events a worker emits
#[derive(Debug)]
pub enum TransferEvent {
    /// Fired once before any bytes move
    Start {
        /// Peer address
        host: IpAddr,
        /// Peer port
        port: u16,
        /// File being moved
        filename: String,
    },

    /// Fired once after a successful transfer
    Finished {
        /// Peer address
        host: IpAddr,
        /// Peer port
        port: u16,
        /// File that was moved
        filename: String,
    },

    /// Fired once when the transfer fails
    Failed {
        /// Peer address
        host: IpAddr,
        /// Peer port
        port: u16,
        /// File that was being moved
        filename: String,
        /// Why the transfer failed
        cause: TransferError,
    },

    /// Always fired, exactly once, after `Finished` or `Failed`.
    /// Observers release per-connection resources on this event.
    End,
}

/// Sender half of a worker's event stream
pub type EventSender = mpsc::UnboundedSender<TransferEvent>;

fn basename(path: &Path) -> Result<&str, TransferError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransferError::InvalidFilename(path.display().to_string()))
}

/// Execute one job on an exclusively-borrowed session.
///
/// The terminal event sequence is `Finished` or `Failed`, then `End`,
/// regardless of outcome.
pub async fn run_job<S: FileSession>(session: &mut S, job: &TransferJob, events: &EventSender) {
    match job.direction {
        Direction::Upload => upload(session, &job.filename, events).await,
        Direction::Download => {
            let dest = job.dest_dir.clone().unwrap_or_else(|| PathBuf::from("."));
            download(session, &job.filename, &dest, events).await;
        }
    }
}

/// Upload a local file to the peer
pub async fn upload<S: FileSession>(session: &mut S, path: &Path, events: &EventSender) {
    let host = session.host();
    let port = session.port();
    let filename = path.display().to_string();

    let outcome = upload_inner(session, path, &filename, events).await;
    finish(host, port, filename, outcome, events);
}

async fn upload_inner<S: FileSession>(
    session: &mut S,
    path: &Path,
    filename: &str,
    events: &EventSender,
) -> Result<(), TransferError> {
    let name = basename(path)?;
    let mut file = File::open(path)
        .await
        .map_err(|e| TransferError::FileIo(e.to_string()))?;

    let _ = events.send(TransferEvent::Start {
        host: session.host(),
        port: session.port(),
        filename: filename.to_string(),
    });

    tracing::info!(file = filename, "uploading");
    session.store(name, &mut file).await?;
    Ok(())
}

/// Download a remote file from the peer into `dest_dir`
pub async fn download<S: FileSession>(
    session: &mut S,
    filename: &Path,
    dest_dir: &Path,
    events: &EventSender,
) {
    let host = session.host();
    let port = session.port();
    let display = filename.display().to_string();

    let outcome = download_inner(session, filename, dest_dir, &display, events).await;
    finish(host, port, display, outcome, events);
}

async fn download_inner<S: FileSession>(
    session: &mut S,
    filename: &Path,
    dest_dir: &Path,
    display: &str,
    events: &EventSender,
) -> Result<(), TransferError> {
    // Only the base name is trusted; a remote name never picks the
    // directory the file lands in.
    let name = basename(filename)?;
    let dest = dest_dir.join(name);

    let _ = events.send(TransferEvent::Start {
        host: session.host(),
        port: session.port(),
        filename: display.to_string(),
    });

    let mut file = File::create(&dest)
        .await
        .map_err(|e| TransferError::FileIo(e.to_string()))?;

    let log_name = display;
    tracing::info!(file = %log_name, dest = %dest.display(), "downloading");
    session.retrieve(name, &mut file).await?;
    file.sync_all()
        .await
        .map_err(|e| TransferError::FileIo(e.to_string()))?;
    Ok(())
}

fn finish(
    host: IpAddr,
    port: u16,
    filename: String,
    outcome: Result<(), TransferError>,
    events: &EventSender,
) {
    match outcome {
        Ok(()) => {
            tracing::info!(file = %filename, "transfer finished");
            let _ = events.send(TransferEvent::Finished {
                host,
                port,
                filename,
            });
        }
        Err(cause) => {
            tracing::warn!(file = %filename, error = %cause, "transfer failed");
            let _ = events.send(TransferEvent::Failed {
                host,
                port,
                filename,
                cause,
            });
        }
    }
    let _ = events.send(TransferEvent::End);
}
