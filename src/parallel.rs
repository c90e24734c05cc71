//! Parallel worktrees ("forks") of the current branch.
//!
//! A fork is a detached linked worktree under
//! `<temp>/worktrees/<safe project>/<safe branch>/<alias>` carrying a
//! `.git-parallel.json` metadata file. Work done in a fork is brought back to the
//! origin worktree by cherry-picking the commits made since the fork's base.
use std::path::Path;

use tracing::debug;

use crate::util::exec::Executor;
use crate::{ParallelError, ParallelResult};

mod context;
mod dispatch;
mod join;
mod lifecycle;
mod list;
mod meta;
mod open;
mod shell_init;
mod transfer;

pub use context::{
    is_valid_alias, resolve_context, sanitize_component, validate_alias, ParallelContext,
};
pub use dispatch::{dispatch, ParallelCommand};
pub use join::{join, resolve_join_target, JoinMachine, JoinOptions, JoinOutcome, JoinState, JoinTarget};
pub use lifecycle::{fork, remove, remove_worktree, ForkOptions, ForkOutcome};
pub use list::{
    classify_divergence, collect_fork_statuses, commit_comparison, list, render_row, Divergence,
    ForkStatus, ListOptions,
};
pub use meta::{
    metadata_path, read_metadata, timestamp_now, write_metadata, ForkClassification,
    ForkMetadata,
};
pub use open::{copy_to_clipboard, open, OpenAction};
pub use shell_init::{shell_init_script, ShellKind};
pub use transfer::{
    apply_and_drop, has_pending_changes, leftover_stash_notice, mirror_changes, move_changes, restore, StashRef,
    TransferMode,
};

/// Metadata file name at the root of every fork.
pub const METADATA_FILE: &str = ".git-parallel.json";

/// Branch name reported by `rev-parse --abbrev-ref HEAD` on a detached HEAD.
pub const DETACHED_HEAD: &str = "HEAD";

/// Reserved target name for the original worktree in `open`/`switch`.
pub const ORIGIN_TARGET: &str = "origin";

/// Run a capturing git query and return trimmed stdout. Non-zero exit becomes an
/// Execution error prefixed with `what`.
pub(crate) fn git_query(
    exec: &dyn Executor,
    cwd: Option<&Path>,
    args: &[&str],
    what: &str,
) -> ParallelResult<String> {
    let out = exec.run(cwd, args)?;
    if out.success {
        Ok(out.trimmed().to_string())
    } else {
        debug!(args = ?args, stderr = %out.stderr.trim(), "git query failed");
        Err(ParallelError::execution(format!(
            "{what}: {}",
            out.best_error_line()
        )))
    }
}

/// Like `git_query` but folds every failure into None.
pub(crate) fn git_query_opt(exec: &dyn Executor, cwd: Option<&Path>, args: &[&str]) -> Option<String> {
    match exec.run(cwd, args) {
        Ok(out) if out.success => Some(out.trimmed().to_string()),
        _ => None,
    }
}

/// Run a mutating git step; true on success, false on failure or spawn error.
pub(crate) fn git_step(exec: &dyn Executor, cwd: Option<&Path>, args: &[&str]) -> bool {
    match exec.run(cwd, args) {
        Ok(out) => {
            if !out.success {
                debug!(args = ?args, stderr = %out.stderr.trim(), "git step failed");
            }
            out.success
        }
        Err(e) => {
            debug!(args = ?args, error = %e, "git step could not start");
            false
        }
    }
}

/// Same as `git_step` with inherited stdio.
pub(crate) fn git_step_inherit(exec: &dyn Executor, cwd: Option<&Path>, args: &[&str]) -> bool {
    match exec.run_inherit(cwd, args) {
        Ok(ok) => ok,
        Err(e) => {
            debug!(args = ?args, error = %e, "git step could not start");
            false
        }
    }
}
