use std::path::{Path, PathBuf};

use tracing::debug;

use super::meta::{read_metadata, ForkClassification};
use super::{git_query, git_query_opt, DETACHED_HEAD};
use crate::util::exec::Executor;
use crate::util::fs::same_path;
use crate::{ParallelError, ParallelResult, Settings};

/// Where the caller stands and where its forks live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelContext {
    /// Top-level of the worktree the caller is in (origin or a fork).
    pub repo_root: PathBuf,
    /// Top-level of the original worktree.
    pub origin_path: PathBuf,
    pub project_name: String,
    pub branch_name: String,
    pub safe_project_name: String,
    pub safe_branch_name: String,
    /// `<worktree root>/<safe project>/<safe branch>`
    pub parallel_root: PathBuf,
    /// Set when the caller is inside a fork.
    pub alias: Option<String>,
    pub is_fork: bool,
}

impl ParallelContext {
    pub fn fork_path(&self, alias: &str) -> PathBuf {
        self.parallel_root.join(alias)
    }

    pub fn is_detached(&self) -> bool {
        self.branch_name == DETACHED_HEAD
    }

    /// True when `path` is the worktree the caller is standing in.
    pub fn is_current(&self, path: &Path) -> bool {
        same_path(&self.repo_root, path)
    }

    /// Alias of the current fork, or "origin".
    pub fn current_label(&self) -> &str {
        self.alias.as_deref().unwrap_or(super::ORIGIN_TARGET)
    }
}

/// Valid aliases are non-blank and contain none of `/ \ space < > : " | ? *` nor control characters.
pub fn is_valid_alias(alias: &str) -> bool {
    !alias.trim().is_empty()
        && !alias.chars().any(|c| {
            matches!(c, '/' | '\\' | ' ' | '<' | '>' | ':' | '"' | '|' | '?' | '*')
                || c.is_ascii_control()
        })
}

pub fn validate_alias(alias: &str) -> ParallelResult<&str> {
    if is_valid_alias(alias) {
        Ok(alias)
    } else {
        Err(ParallelError::validation(format!(
            "Alias '{alias}' contains invalid characters or spaces."
        )))
    }
}

/// Replace characters that cannot appear in a single path component with `_`.
pub fn sanitize_component(s: &str) -> String {
    let out: String = s
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    match out.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => out,
    }
}

fn base_name(p: &Path) -> String {
    p.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Determine origin, branch, fork root and whether `cwd` is inside a fork.
pub fn resolve_context(
    exec: &dyn Executor,
    settings: &Settings,
    cwd: &Path,
) -> ParallelResult<ParallelContext> {
    let toplevel = git_query(
        exec,
        Some(cwd),
        &["rev-parse", "--show-toplevel"],
        "Not inside a git repository",
    )
    .map_err(|e| ParallelError::precondition(e.to_string()))?;
    let repo_root = PathBuf::from(toplevel);
    let branch = git_query_opt(exec, Some(cwd), &["rev-parse", "--abbrev-ref", "HEAD"])
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| DETACHED_HEAD.to_string());

    let worktree_root = settings.worktree_root();
    let is_fork = repo_root.starts_with(&worktree_root);

    let mut project_name = base_name(&repo_root);
    let mut branch_name = branch;
    let mut origin_path = repo_root.clone();
    let mut alias = None;
    let mut safe_project = None;
    let mut safe_branch = None;

    if is_fork {
        match read_metadata(&repo_root) {
            ForkClassification::ValidFork(meta) => {
                if !meta.project.is_empty() {
                    project_name = meta.project;
                }
                if !meta.branch.is_empty() {
                    branch_name = meta.branch;
                }
                if !meta.origin_path.as_os_str().is_empty() {
                    origin_path = meta.origin_path;
                }
                alias = Some(if meta.alias.is_empty() {
                    base_name(&repo_root)
                } else {
                    meta.alias
                });
                safe_project = Some(meta.safe_project).filter(|s| !s.is_empty());
                safe_branch = Some(meta.safe_branch).filter(|s| !s.is_empty());
            }
            ForkClassification::NotAFork => {
                alias = Some(base_name(&repo_root));
            }
        }
    }

    let safe_project_name = safe_project.unwrap_or_else(|| sanitize_component(&project_name));
    let safe_branch_name = safe_branch.unwrap_or_else(|| sanitize_component(&branch_name));
    let parallel_root = worktree_root.join(&safe_project_name).join(&safe_branch_name);

    debug!(
        repo_root = %repo_root.display(),
        branch = %branch_name,
        is_fork,
        parallel_root = %parallel_root.display(),
        "resolved parallel context"
    );

    Ok(ParallelContext {
        repo_root,
        origin_path,
        project_name,
        branch_name,
        safe_project_name,
        safe_branch_name,
        parallel_root,
        alias,
        is_fork,
    })
}
