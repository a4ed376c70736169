//! Daemon control over a Unix domain socket
//!
//! `gr trigger`, `gr status` and friends connect to the running daemon's
//! socket, send one newline-terminated JSON [`DaemonMessage`] and read one
//! [`DaemonResponse`] back.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::DaemonClient;
pub use listener::{IpcServer, cleanup_socket, create_listener, create_listener_at};
pub use messages::{DaemonMessage, DaemonResponse};

/// Largest accepted message or response line, in bytes
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Socket path for daemon IPC
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("gitreporter")
        .join("daemon.sock")
}
