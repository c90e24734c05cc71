//! Moving uncommitted changes between worktrees through the shared stash.
//!
//! The stash list lives in the common git dir, so an entry pushed in one
//! worktree can be applied in another and dropped from either.
use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

use super::{git_query, git_step};
use crate::util::exec::Executor;
use crate::{color_enabled_stderr, log_warn_stderr, ParallelError, ParallelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Take the changes out of the source worktree.
    Move,
    /// Copy the changes, leaving the source worktree untouched.
    Mirror,
}

impl TransferMode {
    pub fn past_tense(self) -> &'static str {
        match self {
            TransferMode::Move => "moved",
            TransferMode::Mirror => "mirrored",
        }
    }
}

/// A stash entry located by its message label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashRef {
    /// Positional selector such as `stash@{0}`, valid until the stash list changes.
    pub reference: String,
    pub label: String,
}

impl fmt::Display for StashRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}

impl StashRef {
    /// Re-resolve the selector; other stash operations may have shifted indices.
    pub fn relocate(&self, exec: &dyn Executor, dir: &Path) -> StashRef {
        find_stash(exec, dir, &self.label).unwrap_or_else(|| self.clone())
    }
}

/// Tracked or untracked (non-ignored) changes present in `dir`.
pub fn has_pending_changes(exec: &dyn Executor, dir: &Path) -> ParallelResult<bool> {
    let status = git_query(
        exec,
        Some(dir),
        &["status", "--porcelain=v1", "--untracked-files=normal"],
        "Unable to read worktree status",
    )?;
    Ok(!status.is_empty())
}

/// Newest stash entry whose message ends with `label`.
fn find_stash(exec: &dyn Executor, dir: &Path, label: &str) -> Option<StashRef> {
    let out = exec.run(Some(dir), &["stash", "list"]).ok()?;
    if !out.success {
        return None;
    }
    out.stdout.lines().find_map(|line| {
        let (reference, rest) = line.split_once(": ")?;
        let matches = rest == label || rest.ends_with(&format!(": {label}"));
        matches.then(|| StashRef {
            reference: reference.to_string(),
            label: label.to_string(),
        })
    })
}

fn locate(exec: &dyn Executor, dir: &Path, label: &str) -> StashRef {
    find_stash(exec, dir, label).unwrap_or_else(|| {
        warn!(label, "stash entry not found by label; assuming stash@{{0}}");
        StashRef {
            reference: "stash@{0}".to_string(),
            label: label.to_string(),
        }
    })
}

/// Stash all changes in `source` (untracked included), leaving it clean.
pub fn move_changes(exec: &dyn Executor, source: &Path, label: &str) -> ParallelResult<StashRef> {
    git_query(
        exec,
        Some(source),
        &["stash", "push", "--include-untracked", "-m", label],
        "Failed to stash changes",
    )?;
    let stash = locate(exec, source, label);
    debug!(stash = %stash, "stashed changes (move)");
    Ok(stash)
}

/// Record a stash of `source` without touching its working tree.
///
/// Snapshots tracked changes (staged and unstaged). Returns None when there is
/// nothing tracked to snapshot.
pub fn mirror_changes(
    exec: &dyn Executor,
    source: &Path,
    label: &str,
) -> ParallelResult<Option<StashRef>> {
    let commit = git_query(
        exec,
        Some(source),
        &["stash", "create", label],
        "Failed to snapshot changes",
    )?;
    if commit.is_empty() {
        return Ok(None);
    }
    git_query(
        exec,
        Some(source),
        &["stash", "store", "-m", label, &commit],
        "Failed to record stash",
    )?;
    let stash = locate(exec, source, label);
    debug!(stash = %stash, commit = %commit, "stashed changes (mirror)");
    Ok(Some(stash))
}

/// Apply `stash` (index included) in `target`, then drop it.
///
/// An apply failure is an error and the stash is kept. When the drop fails after
/// a successful apply the user is told, and the stash left behind is returned.
pub fn apply_and_drop(
    exec: &dyn Executor,
    target: &Path,
    owner: &Path,
    stash: &StashRef,
) -> ParallelResult<Option<StashRef>> {
    let stash = stash.relocate(exec, owner);
    if !git_step(exec, Some(target), &["stash", "apply", "--index", &stash.reference]) {
        return Err(ParallelError::execution(format!(
            "Failed to apply stash '{stash}' in {}",
            target.display()
        )));
    }
    if discard(exec, owner, &stash) {
        Ok(None)
    } else {
        Ok(Some(stash))
    }
}

/// Pop `stash` back into `dir`.
pub fn restore(exec: &dyn Executor, dir: &Path, stash: &StashRef) -> ParallelResult<()> {
    let stash = stash.relocate(exec, dir);
    if git_step(exec, Some(dir), &["stash", "pop", "--index", &stash.reference]) {
        Ok(())
    } else {
        Err(ParallelError::execution(format!(
            "Failed to restore stash '{stash}' in {}",
            dir.display()
        )))
    }
}

/// Message for a stash that outlived the operation that created it.
pub fn leftover_stash_notice(stash: &StashRef, dir: &Path) -> String {
    format!(
        "Stash '{stash}' ({}) could not be dropped and is still in the stash list. Remove it with `git -C {} stash drop {stash}`.",
        stash.label,
        dir.display()
    )
}

/// Remove `stash` without applying it. A failure is reported on stderr.
pub(crate) fn discard(exec: &dyn Executor, dir: &Path, stash: &StashRef) -> bool {
    let stash = stash.relocate(exec, dir);
    if git_step(exec, Some(dir), &["stash", "drop", &stash.reference]) {
        return true;
    }
    warn!(stash = %stash, "stash could not be dropped");
    log_warn_stderr(color_enabled_stderr(), &leftover_stash_notice(&stash, dir));
    false
}
