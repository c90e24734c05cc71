//! Creating and removing forks.
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::meta::{timestamp_now, write_metadata, ForkMetadata};
use super::transfer::{
    apply_and_drop, discard, has_pending_changes, mirror_changes, move_changes, restore,
    StashRef, TransferMode,
};
use super::{git_query, git_step, git_step_inherit, validate_alias, ParallelContext, METADATA_FILE};
use crate::ui::prompt::Prompt;
use crate::util::exec::Executor;
use crate::util::fs::{ensure_line_in_file, is_accessible_dir, remove_dir_force};
use crate::{
    color_enabled_stderr, log_error_stderr, log_info_stderr, log_success_stderr,
    log_warn_stderr, ParallelError, ParallelResult,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForkOptions {
    /// Carry the origin's uncommitted changes into the new fork.
    pub transfer: Option<TransferMode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkOutcome {
    pub path: PathBuf,
    pub metadata: ForkMetadata,
    /// Set when pending changes were carried over.
    pub transferred: Option<TransferMode>,
}

fn stash_label(alias: &str) -> String {
    format!("git-parallel:{alias}")
}

/// Add the metadata file name to the repository's shared exclude file.
fn ensure_metadata_excluded(exec: &dyn Executor, ctx: &ParallelContext) -> ParallelResult<()> {
    let rel = git_query(
        exec,
        Some(&ctx.repo_root),
        &["rev-parse", "--git-path", "info/exclude"],
        "Unable to locate the exclude file",
    )?;
    let p = PathBuf::from(&rel);
    let exclude = if p.is_absolute() {
        p
    } else {
        ctx.repo_root.join(p)
    };
    if ensure_line_in_file(&exclude, METADATA_FILE)? {
        debug!(path = %exclude.display(), "added metadata file to exclude");
    }
    Ok(())
}

/// Create a fork named `alias` of the current branch from the origin worktree.
pub fn fork(
    exec: &dyn Executor,
    ctx: &ParallelContext,
    alias: Option<&str>,
    opts: ForkOptions,
) -> ParallelResult<ForkOutcome> {
    if ctx.is_fork {
        return Err(ParallelError::precondition(
            "Run `git parallel fork` from the original worktree, not from a fork.",
        ));
    }
    if ctx.is_detached() {
        return Err(ParallelError::precondition(
            "Detached HEAD detected. Switch to a branch before forking.",
        ));
    }
    let alias = alias
        .ok_or_else(|| ParallelError::validation("Missing worktree alias to fork."))
        .and_then(validate_alias)?;
    let target = ctx.fork_path(alias);
    if target.exists() {
        return Err(ParallelError::precondition(format!(
            "Worktree alias '{alias}' already exists for this branch."
        )));
    }

    let use_err = color_enabled_stderr();
    let origin = ctx.repo_root.as_path();

    ensure_metadata_excluded(exec, ctx)?;
    std::fs::create_dir_all(&ctx.parallel_root)?;
    let base_commit = git_query(
        exec,
        Some(origin),
        &["rev-parse", "HEAD"],
        "Unable to resolve HEAD (does the branch have a commit yet?)",
    )?;

    let mut stash: Option<StashRef> = None;
    let mut transferred = None;
    if let Some(mode) = opts.transfer {
        if has_pending_changes(exec, origin)? {
            let label = stash_label(alias);
            let taken = match mode {
                TransferMode::Move => move_changes(exec, origin, &label).map(Some),
                TransferMode::Mirror => mirror_changes(exec, origin, &label),
            };
            stash = taken.map_err(|e| {
                debug!(error = %e, "stash before fork failed");
                ParallelError::execution("Failed to stash changes before forking.")
            })?;
            if stash.is_none() {
                log_warn_stderr(
                    use_err,
                    "Only untracked files are pending; nothing to mirror (untracked files stay in origin).",
                );
            } else {
                transferred = Some(mode);
            }
        }
    }

    let target_s = target.to_string_lossy().into_owned();
    if !git_step_inherit(
        exec,
        Some(origin),
        &["worktree", "add", "--detach", &target_s, "HEAD"],
    ) {
        compensate_failed_add(exec, origin, &target, stash.as_ref(), transferred, use_err)?;
        return Err(ParallelError::execution(
            "Failed to create the parallel worktree.",
        ));
    }

    if let Some(s) = &stash {
        if let Err(e) = apply_and_drop(exec, &target, origin, s) {
            debug!(error = %e, "apply into new fork failed");
            return Err(ParallelError::unrecoverable(
                "Failed to move local changes into the new worktree.",
                vec![
                    format!(
                        "Your changes remain stashed as '{}'. Apply it manually with `git stash apply --index {}`.",
                        s.reference, s.reference
                    ),
                    format!("Worktree path: {}", target.display()),
                ],
            ));
        }
    }

    let metadata = ForkMetadata {
        alias: alias.to_string(),
        branch: ctx.branch_name.clone(),
        safe_branch: ctx.safe_branch_name.clone(),
        project: ctx.project_name.clone(),
        safe_project: ctx.safe_project_name.clone(),
        origin_path: ctx.origin_path.clone(),
        base_commit: Some(base_commit),
        created_at: timestamp_now(),
        updated_at: None,
    };
    if let Err(e) = write_metadata(&target, &metadata) {
        return Err(ParallelError::unrecoverable(
            format!("Failed to write fork metadata: {e}"),
            vec![
                format!("Worktree path: {}", target.display()),
                format!(
                    "Without metadata the fork is not listed and its alias stays taken. Remove it with `git worktree remove --force {}`.",
                    target.display()
                ),
            ],
        ));
    }

    info!(alias, path = %target.display(), "fork created");
    log_success_stderr(
        use_err,
        &format!("Parallel worktree created: {}", target.display()),
    );
    if let Some(mode) = transferred {
        log_info_stderr(
            use_err,
            &format!("Pending changes {} to fork '{alias}'.", mode.past_tense()),
        );
    }

    Ok(ForkOutcome {
        path: target,
        metadata,
        transferred,
    })
}

/// Undo a failed `worktree add`: put the origin's changes back and clear any partial directory.
fn compensate_failed_add(
    exec: &dyn Executor,
    origin: &Path,
    target: &Path,
    stash: Option<&StashRef>,
    mode: Option<TransferMode>,
    use_err: bool,
) -> ParallelResult<()> {
    if target.exists() {
        if let Err(e) = remove_dir_force(target) {
            warn!(path = %target.display(), error = %e, "could not clear partial worktree");
        }
        git_step(exec, Some(origin), &["worktree", "prune"]);
    }
    let Some(stash) = stash else {
        return Ok(());
    };
    match mode {
        Some(TransferMode::Mirror) => {
            // origin still holds the changes; the snapshot is redundant
            discard(exec, origin, stash);
            Ok(())
        }
        _ => match restore(exec, origin, stash) {
            Ok(()) => {
                log_info_stderr(use_err, "Stashed changes restored to the origin worktree.");
                Ok(())
            }
            Err(_) => Err(ParallelError::unrecoverable(
                "Failed to create the parallel worktree.",
                vec![format!(
                    "Your changes remain stashed as '{}'. Restore them with `git stash pop --index {}`.",
                    stash.reference, stash.reference
                )],
            )),
        },
    }
}

/// Remove the fork named `alias` after checking it is safe to do so.
pub fn remove(
    exec: &dyn Executor,
    prompt: &dyn Prompt,
    ctx: &ParallelContext,
    alias: Option<&str>,
) -> ParallelResult<PathBuf> {
    let alias = alias
        .ok_or_else(|| ParallelError::validation("Missing worktree alias to remove."))
        .and_then(validate_alias)?;
    let target = ctx.fork_path(alias);
    if !is_accessible_dir(&target, true) {
        return Err(ParallelError::precondition(format!(
            "Worktree '{alias}' not found for branch '{}'.",
            ctx.branch_name
        )));
    }
    if ctx.is_current(&target) {
        return Err(ParallelError::precondition(
            "Cannot remove the worktree you are currently in. Switch to origin first.",
        ));
    }
    if has_pending_changes(exec, &target)? {
        return Err(ParallelError::precondition(format!(
            "Worktree '{alias}' has uncommitted changes. Join or clean it before removing."
        )));
    }
    remove_worktree(exec, prompt, &ctx.origin_path, alias, &target)?;
    Ok(target)
}

/// Detach and delete a fork directory, offering a forced delete when git refuses.
///
/// Does not re-check preconditions; `join` calls this directly after replaying.
pub fn remove_worktree(
    exec: &dyn Executor,
    prompt: &dyn Prompt,
    origin: &Path,
    alias: &str,
    target: &Path,
) -> ParallelResult<()> {
    let use_err = color_enabled_stderr();
    let target_s = target.to_string_lossy().into_owned();
    let cwd = origin.exists().then_some(origin);

    if git_step_inherit(exec, cwd, &["worktree", "remove", &target_s]) {
        if let Err(e) = remove_dir_force(target) {
            debug!(path = %target.display(), error = %e, "leftover directory not removed");
        }
        info!(alias, "fork removed");
        log_success_stderr(use_err, &format!("Removed worktree: {alias}"));
        return Ok(());
    }

    log_error_stderr(use_err, &format!("Failed to remove worktree '{alias}'."));
    let question = "Do you want to force remove the worktree directory? This will delete all files in it. (y/n): ";
    if !prompt.confirm(question) {
        return Err(ParallelError::execution(format!(
            "Aborted removing worktree '{alias}'."
        )));
    }
    remove_dir_force(target).map_err(|e| {
        ParallelError::execution(format!(
            "Failed to force remove worktree directory '{alias}': {e}"
        ))
    })?;
    git_step(exec, cwd, &["worktree", "prune"]);
    log_success_stderr(use_err, &format!("Force removed worktree directory: {alias}"));
    Ok(())
}
