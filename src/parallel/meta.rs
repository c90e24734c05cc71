use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::METADATA_FILE;
use crate::util::fs::write_replace;
use crate::ParallelResult;

/// Contents of `.git-parallel.json`. Missing string fields read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkMetadata {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub safe_branch: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub safe_project: String,
    #[serde(default)]
    pub origin_path: PathBuf,
    #[serde(default)]
    pub base_commit: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ForkMetadata {
    /// Base commit when present and non-blank.
    pub fn base_commit(&self) -> Option<&str> {
        self.base_commit
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Move the base forward after a join that keeps the fork.
    pub fn advance_base(&mut self, new_base: &str) {
        self.base_commit = Some(new_base.to_string());
        self.updated_at = Some(timestamp_now());
    }
}

/// Whether a directory is a fork, with its metadata when it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForkClassification {
    ValidFork(ForkMetadata),
    NotAFork,
}

impl ForkClassification {
    pub fn is_fork(&self) -> bool {
        matches!(self, ForkClassification::ValidFork(_))
    }

    pub fn into_metadata(self) -> Option<ForkMetadata> {
        match self {
            ForkClassification::ValidFork(m) => Some(m),
            ForkClassification::NotAFork => None,
        }
    }
}

pub fn metadata_path(fork_path: &Path) -> PathBuf {
    fork_path.join(METADATA_FILE)
}

/// Missing, unreadable or malformed metadata all classify as NotAFork.
pub fn read_metadata(fork_path: &Path) -> ForkClassification {
    let path = metadata_path(fork_path);
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no fork metadata");
            return ForkClassification::NotAFork;
        }
    };
    match serde_json::from_str::<ForkMetadata>(&text) {
        Ok(m) => ForkClassification::ValidFork(m),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "malformed fork metadata");
            ForkClassification::NotAFork
        }
    }
}

/// Pretty JSON with a trailing newline, replacing any previous file.
pub fn write_metadata(fork_path: &Path, meta: &ForkMetadata) -> ParallelResult<()> {
    let mut body = serde_json::to_string_pretty(meta)?;
    body.push('\n');
    write_replace(&metadata_path(fork_path), body.as_bytes())?;
    Ok(())
}

/// RFC 3339 UTC timestamp with millisecond precision.
pub fn timestamp_now() -> String {
    humantime::format_rfc3339_millis(SystemTime::now()).to_string()
}
