//! Bridge errors and the payload reported back to the host

use std::path::PathBuf;

use rhai::EvalAltResult;
use serde::Serialize;
use thiserror::Error;

use crate::host::HostError;
use crate::scripting::{Frame, LINE_BODY_OFFSET, LINE_FUNCTION, Trace};

/// Why a bridge request failed
#[derive(Debug, Error)]
pub enum BridgeError {
    /// User code raised; the trace holds only the user's frames
    #[error("{trace}")]
    Script { trace: Trace },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: apply_range body should return a string or (), found {found} instead")]
    InvalidReturn { line: usize, found: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error(transparent)]
    Host(#[from] HostError),
}

impl BridgeError {
    /// Wrap a Rhai error raised while running `operation`, trimming bridge frames
    pub fn script(operation: &str, source: Option<&str>, err: &EvalAltResult) -> Self {
        Self::Script {
            trace: Trace::capture(operation, source, err).without_bridge_frames(),
        }
    }

    /// Wrap a Rhai error raised by a per-line body running as `closure`
    ///
    /// Frames inside the body are reported as [`LINE_FUNCTION`] with line
    /// numbers relative to the body.
    pub fn line_body(
        operation: &str,
        source: Option<&str>,
        err: &EvalAltResult,
        closure: Option<&str>,
    ) -> Self {
        Self::Script {
            trace: Trace::capture(operation, source, err)
                .within_line_body(closure, LINE_FUNCTION, LINE_BODY_OFFSET)
                .without_bridge_frames(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Script { .. } => ErrorKind::Script,
            Self::Io { .. } => ErrorKind::Io,
            Self::InvalidReturn { .. } => ErrorKind::Type,
            Self::InvalidArguments(_) | Self::UnknownMethod(_) => ErrorKind::Arguments,
            Self::Host(_) => ErrorKind::Host,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (message, frames) = match self {
            Self::Script { trace } => (trace.message.clone(), trace.frames.clone()),
            other => (other.to_string(), Vec::new()),
        };
        ErrorResponse {
            kind: self.kind(),
            message,
            frames,
            text: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Script,
    Io,
    Type,
    Arguments,
    Host,
}

/// Error payload sent back to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    pub frames: Vec<Frame>,
    /// Message and frames rendered for display
    pub text: String,
}
