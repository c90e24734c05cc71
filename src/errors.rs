//! Error mapping guide:
//! - Every failure class maps to exit code 1; success is 0.
//! - Validation: bad alias or bad flag combination, rejected before any side effect.
//! - Precondition: repository state does not allow the operation; nothing was changed.
//! - Execution: a git step failed; compensations already ran.
//! - Unrecoverable: compensation itself failed; artifacts name what the user must restore by hand.
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParallelError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Precondition(String),
    #[error("{0}")]
    Execution(String),
    #[error("{message}")]
    Unrecoverable {
        message: String,
        artifacts: Vec<String>,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid fork metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

pub type ParallelResult<T> = Result<T, ParallelError>;

impl ParallelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ParallelError::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        ParallelError::Precondition(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        ParallelError::Execution(msg.into())
    }

    pub fn unrecoverable(msg: impl Into<String>, artifacts: Vec<String>) -> Self {
        ParallelError::Unrecoverable {
            message: msg.into(),
            artifacts,
        }
    }

    /// Short class label used in debug logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ParallelError::Validation(_) => "validation",
            ParallelError::Precondition(_) => "precondition",
            ParallelError::Execution(_) => "execution",
            ParallelError::Unrecoverable { .. } => "unrecoverable",
            ParallelError::Io(_) => "io",
            ParallelError::Metadata(_) => "metadata",
        }
    }
}

/// Process exit code for a failed command.
pub fn exit_code_for_parallel_error(_e: &ParallelError) -> u8 {
    1
}

/// Render a user-facing string, including any recovery artifacts one per line.
pub fn display_for_parallel_error(e: &ParallelError) -> String {
    match e {
        ParallelError::Unrecoverable { message, artifacts } => {
            let mut out = message.clone();
            for a in artifacts {
                out.push('\n');
                out.push_str(a);
            }
            out
        }
        ParallelError::Io(ioe) if ioe.kind() == io::ErrorKind::NotFound => {
            format!("{ioe} (is git installed and on PATH?)")
        }
        other => other.to_string(),
    }
}
