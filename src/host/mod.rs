//! Host collaborator interface
//!
//! Everything the bridge needs from the editor on the other end of the
//! channel: runtime locations, bulk buffer access, output and evaluation.
//! Buffer indices are 0-based and half-open; ranges handed to
//! [`Host::resolve_range`] use the editor's 1-based inclusive convention.

mod buffer;
mod memory;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use buffer::Buffer;
pub use memory::MemoryHost;

/// Errors from calls into the host
#[derive(Debug, Error)]
pub enum HostError {
    #[error("line range {start}..{end} out of bounds (buffer has {len} lines)")]
    OutOfRange { start: usize, end: usize, len: usize },

    #[error("host disconnected")]
    Disconnected,

    #[error("host error: {0}")]
    Remote(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identifier of a host buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferId(pub i64);

/// A line range resolved against the host's active buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentRange {
    pub buffer: BufferId,
    /// First line, 1-based
    pub start: i64,
    /// Last line, 1-based and inclusive
    pub stop: i64,
}

/// The editor side of the bridge
pub trait Host: Send + Sync {
    /// Runtime locations in the order the host searches them
    fn list_runtime_paths(&self) -> Result<Vec<PathBuf>, HostError>;

    /// Read lines `[start, end)` of the active buffer
    fn get_lines(&self, start: usize, end: usize) -> Result<Vec<String>, HostError>;

    /// Replace lines `[start, end)` of the active buffer with `lines`
    fn set_lines(&self, start: usize, end: usize, lines: Vec<String>) -> Result<(), HostError>;

    fn line_count(&self) -> Result<usize, HostError>;

    fn resolve_range(&self, start: i64, stop: i64) -> Result<CurrentRange, HostError>;

    fn out_write(&self, text: &str) -> Result<(), HostError>;

    fn err_write(&self, text: &str) -> Result<(), HostError>;

    /// Evaluate an expression in the host's own language
    fn eval(&self, expr: &str) -> Result<serde_json::Value, HostError>;

    fn command(&self, cmd: &str) -> Result<(), HostError>;
}
