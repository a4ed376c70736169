//! IPC listener for the daemon side

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::messages::{DaemonMessage, DaemonResponse};
use super::{MAX_MESSAGE_SIZE, get_socket_path};
use crate::scan::{ScanError, ScanHandle, Trigger};

/// Create and bind the daemon socket, replacing a stale one
pub fn create_listener() -> Result<(UnixListener, PathBuf)> {
    let socket_path = get_socket_path();
    create_listener_at(&socket_path)
}

/// Create a listener at a specific path
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener: creating IPC socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener: socket bound successfully");

    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Read one message line from a connection
pub async fn read_message(stream: &mut UnixStream) -> Result<DaemonMessage> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    let bytes_read = reader
        .read_line(&mut line)
        .await
        .context("Failed to read IPC message")?;

    if bytes_read > MAX_MESSAGE_SIZE {
        return Err(eyre::eyre!("Message too large: {} bytes", bytes_read));
    }

    if line.is_empty() {
        return Err(eyre::eyre!("Empty message received"));
    }

    let msg: DaemonMessage = serde_json::from_str(line.trim()).context("Failed to parse IPC message")?;
    debug!(?msg, "read_message: parsed message");

    Ok(msg)
}

/// Send a response on the stream
pub async fn send_response(stream: &mut UnixStream, response: &DaemonResponse) -> Result<()> {
    let response_json = serde_json::to_string(response).context("Failed to serialize response")?;
    stream
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write response")?;
    stream.write_all(b"\n").await.context("Failed to write newline")?;
    stream.flush().await.context("Failed to flush response")?;
    debug!(?response, "send_response: sent response");
    Ok(())
}

/// Serves daemon control requests against the orchestrator
pub struct IpcServer {
    listener: UnixListener,
    handle: ScanHandle,
    version: String,
    /// Signalled when a client asks the daemon to stop
    stop_tx: mpsc::Sender<()>,
}

impl IpcServer {
    pub fn new(listener: UnixListener, handle: ScanHandle, version: impl Into<String>, stop_tx: mpsc::Sender<()>) -> Self {
        Self {
            listener,
            handle,
            version: version.into(),
            stop_tx,
        }
    }

    /// Accept connections until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!("IpcServer::run: called");
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handle = self.handle.clone();
                        let version = self.version.clone();
                        let stop_tx = self.stop_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, &handle, &version, &stop_tx).await {
                                warn!(error = %e, "IPC connection failed");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "IPC accept failed"),
                },
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }
        info!("IPC listener stopped");
    }
}

async fn serve_connection(
    mut stream: UnixStream,
    handle: &ScanHandle,
    version: &str,
    stop_tx: &mpsc::Sender<()>,
) -> Result<()> {
    let response = match read_message(&mut stream).await {
        Ok(msg) => respond(msg, handle, version, stop_tx).await,
        Err(e) => DaemonResponse::Error { message: e.to_string() },
    };
    send_response(&mut stream, &response).await
}

/// Carry out one request against the orchestrator
pub async fn respond(msg: DaemonMessage, handle: &ScanHandle, version: &str, stop_tx: &mpsc::Sender<()>) -> DaemonResponse {
    debug!(?msg, "respond: called");
    let error = |e: ScanError| DaemonResponse::Error { message: e.to_string() };
    match msg {
        DaemonMessage::Ping => DaemonResponse::Pong {
            version: version.to_string(),
        },
        DaemonMessage::Trigger { project } => {
            let started = match project.as_deref() {
                Some(name) => handle.start_project(name).await,
                None => handle.start(Trigger::Manual).await,
            };
            match started {
                Ok(pass_id) => DaemonResponse::Started { pass_id },
                Err(e) => error(e),
            }
        }
        DaemonMessage::Cancel => match handle.cancel().await {
            Ok(running) => DaemonResponse::Cancelled { running },
            Err(e) => error(e),
        },
        DaemonMessage::Status => match handle.status().await {
            Ok(status) => DaemonResponse::Status { status },
            Err(e) => error(e),
        },
        DaemonMessage::Shutdown => {
            info!("shutdown requested over IPC");
            let _ = stop_tx.send(()).await;
            DaemonResponse::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{Config, StaticProjects};
    use crate::events::EventBus;
    use crate::ipc::DaemonClient;
    use crate::notify::mock::RecordingSink;
    use crate::repo::mock::MockInspector;
    use crate::scan::ScanPhase;
    use tempfile::TempDir;

    fn handle() -> ScanHandle {
        let (handle, _task) = ScanHandle::spawn(
            Arc::new(StaticProjects::new(Config::default())),
            Arc::new(MockInspector::new()),
            Arc::new(RecordingSink::new()),
            Arc::new(EventBus::new(64)),
        );
        handle
    }

    #[tokio::test]
    async fn test_create_listener_creates_parent_dir() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("subdir").join("daemon.sock");

        let (_, path) = create_listener_at(&socket_path).unwrap();
        assert_eq!(path, socket_path);
        assert!(socket_path.exists());
    }

    #[tokio::test]
    async fn test_create_listener_removes_stale_socket() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("daemon.sock");
        std::fs::write(&socket_path, "stale").unwrap();

        assert!(create_listener_at(&socket_path).is_ok());
    }

    #[test]
    fn test_cleanup_socket_handles_missing_file() {
        let temp = TempDir::new().unwrap();
        cleanup_socket(&temp.path().join("nonexistent.sock"));
    }

    #[tokio::test]
    async fn test_respond_unknown_project() {
        let (stop_tx, _stop_rx) = mpsc::channel(1);
        let resp = respond(
            DaemonMessage::Trigger {
                project: Some("Nope".to_string()),
            },
            &handle(),
            "v1",
            &stop_tx,
        )
        .await;
        assert_eq!(
            resp,
            DaemonResponse::Error {
                message: "unknown project 'Nope'".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_respond_shutdown_signals_stop() {
        let (stop_tx, mut stop_rx) = mpsc::channel(1);
        let resp = respond(DaemonMessage::Shutdown, &handle(), "v1", &stop_tx).await;
        assert_eq!(resp, DaemonResponse::Ok);
        assert!(stop_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_end_to_end_over_socket() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("test.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();
        let (stop_tx, _stop_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server = IpcServer::new(listener, handle(), "test-version", stop_tx);
        let task = tokio::spawn(server.run(shutdown_rx));

        let client = DaemonClient::with_socket_path(socket_path);
        assert_eq!(client.ping().await.unwrap(), "test-version");

        let pass_id = client.trigger(None).await.unwrap();
        assert!(!pass_id.is_empty());

        let status = client.status().await.unwrap();
        assert!(matches!(status.phase, ScanPhase::Idle | ScanPhase::Running));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
