//! IPC client for talking to a running daemon

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::messages::{DaemonMessage, DaemonResponse};
use super::{MAX_MESSAGE_SIZE, get_socket_path};
use crate::scan::ScanStatus;

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self {
            socket_path: get_socket_path(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Check if daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("DaemonClient: pinging daemon");
        match self.send_message(DaemonMessage::Ping).await? {
            DaemonResponse::Pong { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Start a pass; returns its id
    pub async fn trigger(&self, project: Option<&str>) -> Result<String> {
        debug!(?project, "DaemonClient: triggering pass");
        let msg = DaemonMessage::Trigger {
            project: project.map(str::to_string),
        };
        match self.send_message(msg).await? {
            DaemonResponse::Started { pass_id } => Ok(pass_id),
            other => Err(unexpected(other)),
        }
    }

    /// Cancel the running pass; false when nothing was running
    pub async fn cancel(&self) -> Result<bool> {
        debug!("DaemonClient: cancelling pass");
        match self.send_message(DaemonMessage::Cancel).await? {
            DaemonResponse::Cancelled { running } => Ok(running),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<ScanStatus> {
        debug!("DaemonClient: requesting status");
        match self.send_message(DaemonMessage::Status).await? {
            DaemonResponse::Status { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon to shutdown gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("DaemonClient: requesting daemon shutdown");
        match self.send_message(DaemonMessage::Shutdown).await? {
            DaemonResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Send a message to the daemon and wait for response
    async fn send_message(&self, msg: DaemonMessage) -> Result<DaemonResponse> {
        debug!(?self.socket_path, ?msg, "DaemonClient: sending message");

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket; is `gr daemon` running?")?;

        self.send_on_stream(stream, msg).await
    }

    async fn send_on_stream(&self, mut stream: UnixStream, msg: DaemonMessage) -> Result<DaemonResponse> {
        let msg_json = serde_json::to_string(&msg).context("Failed to serialize message")?;

        if msg_json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", msg_json.len()));
        }

        tokio::time::timeout(self.timeout, async {
            stream
                .write_all(msg_json.as_bytes())
                .await
                .context("Failed to write message")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        let mut reader = BufReader::new(&mut stream);
        let mut response_line = String::new();

        tokio::time::timeout(self.timeout, async {
            let bytes_read = reader
                .read_line(&mut response_line)
                .await
                .context("Failed to read response")?;

            if bytes_read > MAX_MESSAGE_SIZE {
                return Err(eyre::eyre!("Response too large: {} bytes", bytes_read));
            }

            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Read timeout")??;

        let response: DaemonResponse =
            serde_json::from_str(response_line.trim()).context("Failed to parse daemon response")?;

        debug!(?response, "DaemonClient: received response");
        Ok(response)
    }
}

fn unexpected(response: DaemonResponse) -> eyre::Error {
    match response {
        DaemonResponse::Error { message } => eyre::eyre!("Daemon error: {}", message),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_client_default() {
        let client = DaemonClient::default();
        assert!(client.socket_path.ends_with("daemon.sock"));
    }

    #[test]
    fn test_client_with_timeout() {
        let client = DaemonClient::new().with_timeout(Duration::from_secs(10));
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_socket_errors() {
        let temp = TempDir::new().unwrap();
        let client = DaemonClient::with_socket_path(temp.path().join("nonexistent.sock"));
        assert!(!client.socket_exists());
        assert!(client.ping().await.is_err());
    }

    #[test]
    fn test_unexpected_error_message() {
        let err = unexpected(DaemonResponse::Error {
            message: "a scan pass is already running (p1)".to_string(),
        });
        assert_eq!(err.to_string(), "Daemon error: a scan pass is already running (p1)");
    }
}
