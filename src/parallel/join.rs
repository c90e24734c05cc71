//! Joining a fork back into its origin.
//!
//! The join runs as an explicit state machine:
//!
//! ```text
//! Validating -> [StashingFork] -> Replaying -> [RestoringStash] -> Finalizing -> Committed
//!      \______________\_______________\_______________\______________________-> RolledBack
//! ```
//!
//! A failure while replaying undoes what the earlier states did: origin HEAD is
//! reset to its pre-join commit and a fork stash is popped back into the fork.
//! Once every commit is replayed the commits are kept: a failed stash apply only
//! resets origin's working tree and returns the stash to the fork, and removal
//! problems in `Finalizing` are reported without touching history.
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::lifecycle::remove_worktree;
use super::meta::{read_metadata, write_metadata, ForkClassification, ForkMetadata};
use super::transfer::{discard, has_pending_changes, move_changes, restore, StashRef};
use super::{git_query, git_step, git_step_inherit, validate_alias, ParallelContext};
use crate::ui::prompt::Prompt;
use crate::util::exec::Executor;
use crate::{
    color_enabled_stderr, log_error_stderr, log_info_stderr, log_success_stderr,
    log_warn_stderr, ParallelError, ParallelResult,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinOptions {
    /// Keep the fork and advance its base instead of removing it.
    pub keep: bool,
    /// Carry the fork's uncommitted changes into origin.
    pub all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Validating,
    StashingFork,
    Replaying,
    RestoringStash,
    Finalizing,
    Committed,
    RolledBack,
}

impl JoinState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JoinState::Committed | JoinState::RolledBack)
    }
}

/// Which fork a join acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTarget {
    pub alias: String,
    pub fork_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub alias: String,
    pub fork_path: PathBuf,
    /// Fork commits replayed onto origin, oldest first.
    pub applied: Vec<String>,
    pub kept: bool,
    /// Origin HEAD after the join.
    pub origin_head: String,
}

const JOIN_USAGE: &str = "Usage: git parallel join [<alias>] [--keep] [--all]";

/// Pick the fork to join: the named one, or the fork the caller stands in.
pub fn resolve_join_target(ctx: &ParallelContext, alias: Option<&str>) -> ParallelResult<JoinTarget> {
    match alias {
        Some(a) => {
            let a = validate_alias(a)?;
            if ctx.is_fork && ctx.alias.as_deref() == Some(a) {
                return Err(ParallelError::precondition(format!(
                    "Cannot join the fork you are currently in by name. Run `git parallel join` without an alias, or switch to origin first.\n{JOIN_USAGE}"
                )));
            }
            let fork_path = ctx.fork_path(a);
            if !fork_path.is_dir() {
                return Err(ParallelError::precondition(format!(
                    "Worktree '{a}' not found for branch '{}'.",
                    ctx.branch_name
                )));
            }
            Ok(JoinTarget {
                alias: a.to_string(),
                fork_path,
            })
        }
        None => {
            if !ctx.is_fork {
                return Err(ParallelError::precondition(format!(
                    "Either run join from inside a forked worktree, or specify which fork to join.\n{JOIN_USAGE}"
                )));
            }
            Ok(JoinTarget {
                alias: ctx.current_label().to_string(),
                fork_path: ctx.repo_root.clone(),
            })
        }
    }
}

/// Facts gathered while validating.
#[derive(Debug, Clone)]
struct Validated {
    meta: ForkMetadata,
    origin: PathBuf,
    base: String,
    origin_head_before: String,
}

pub struct JoinMachine<'a> {
    exec: &'a dyn Executor,
    prompt: &'a dyn Prompt,
    target: JoinTarget,
    opts: JoinOptions,
    state: JoinState,
    history: Vec<JoinState>,
    use_err: bool,
    validated: Option<Validated>,
    stash: Option<StashRef>,
    applied: Vec<String>,
    finalize_error: Option<ParallelError>,
}

impl<'a> JoinMachine<'a> {
    pub fn new(
        exec: &'a dyn Executor,
        prompt: &'a dyn Prompt,
        target: JoinTarget,
        opts: JoinOptions,
    ) -> Self {
        Self {
            exec,
            prompt,
            target,
            opts,
            state: JoinState::Validating,
            history: vec![JoinState::Validating],
            use_err: color_enabled_stderr(),
            validated: None,
            stash: None,
            applied: Vec::new(),
            finalize_error: None,
        }
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[JoinState] {
        &self.history
    }

    fn enter(&mut self, next: JoinState) {
        debug!(from = ?self.state, to = ?next, alias = %self.target.alias, "join transition");
        self.state = next;
        self.history.push(next);
    }

    /// Drive the machine to a terminal state.
    pub fn run(&mut self) -> ParallelResult<JoinOutcome> {
        while !self.state.is_terminal() {
            let step = match self.state {
                JoinState::Validating => self.validate(),
                JoinState::StashingFork => self.stash_fork(),
                JoinState::Replaying => self.replay(),
                JoinState::RestoringStash => self.restore_stash(),
                JoinState::Finalizing => self.finalize(),
                JoinState::Committed | JoinState::RolledBack => break,
            };
            match step {
                Ok(next) => self.enter(next),
                Err(e) => {
                    self.enter(JoinState::RolledBack);
                    warn!(alias = %self.target.alias, kind = e.kind(), "join failed");
                    return Err(e);
                }
            }
        }
        if let Some(e) = self.finalize_error.take() {
            return Err(e);
        }
        let origin_head = self
            .validated
            .as_ref()
            .map(|v| self.head_of(&v.origin))
            .unwrap_or_default();
        Ok(JoinOutcome {
            alias: self.target.alias.clone(),
            fork_path: self.target.fork_path.clone(),
            applied: self.applied.clone(),
            kept: self.opts.keep,
            origin_head,
        })
    }

    fn head_of(&self, dir: &Path) -> String {
        super::git_query_opt(self.exec, Some(dir), &["rev-parse", "HEAD"]).unwrap_or_default()
    }

    fn validated(&self) -> ParallelResult<&Validated> {
        self.validated
            .as_ref()
            .ok_or_else(|| ParallelError::execution("join state machine used before validation"))
    }

    fn validate(&mut self) -> ParallelResult<JoinState> {
        let alias = self.target.alias.clone();
        let fork_path = self.target.fork_path.clone();

        let meta = match read_metadata(&fork_path) {
            ForkClassification::ValidFork(m) => m,
            ForkClassification::NotAFork => {
                return Err(ParallelError::precondition(format!(
                    "Missing metadata for worktree '{alias}'. Unable to join automatically."
                )))
            }
        };
        let base = meta
            .base_commit()
            .map(str::to_string)
            .ok_or_else(|| {
                ParallelError::precondition(
                    "Fork metadata is missing base commit information. Unable to perform an automatic join.",
                )
            })?;
        let origin = meta.origin_path.clone();
        if origin.as_os_str().is_empty() || !origin.is_dir() {
            return Err(ParallelError::precondition(format!(
                "Original worktree path not found. Expected at '{}'.",
                origin.display()
            )));
        }

        let fork_dirty = has_pending_changes(self.exec, &fork_path)?;
        if fork_dirty && !self.opts.all {
            return Err(ParallelError::precondition(format!(
                "Fork '{alias}' has uncommitted changes. Re-run with --all to include them or clean the worktree first."
            )));
        }
        if has_pending_changes(self.exec, &origin)? {
            return Err(ParallelError::precondition(
                "Origin worktree has pending changes. Commit or stash them before joining.",
            ));
        }
        let origin_head_before = git_query(
            self.exec,
            Some(&origin),
            &["rev-parse", "HEAD"],
            "Unable to resolve origin HEAD",
        )?;

        self.validated = Some(Validated {
            meta,
            origin,
            base,
            origin_head_before,
        });
        Ok(if fork_dirty {
            JoinState::StashingFork
        } else {
            JoinState::Replaying
        })
    }

    fn stash_fork(&mut self) -> ParallelResult<JoinState> {
        let label = format!("git-parallel-join:{}", self.target.alias);
        let stash = move_changes(self.exec, &self.target.fork_path, &label).map_err(|e| {
            debug!(error = %e, "stash in fork failed");
            ParallelError::execution("Failed to stash uncommitted changes before joining.")
        })?;
        self.stash = Some(stash);
        Ok(JoinState::Replaying)
    }

    fn replay(&mut self) -> ParallelResult<JoinState> {
        let v = self.validated()?.clone();
        let fork_path = self.target.fork_path.clone();

        let range = format!("{}..HEAD", v.base);
        let commits = match git_query(
            self.exec,
            Some(&fork_path),
            &["rev-list", "--reverse", &range],
            "Unable to list fork commits",
        ) {
            Ok(out) => out
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>(),
            Err(e) => {
                self.rollback(&v)?;
                return Err(e);
            }
        };

        for commit in commits {
            if !git_step_inherit(self.exec, Some(&v.origin), &["cherry-pick", &commit]) {
                log_error_stderr(
                    self.use_err,
                    &format!("Cherry-pick failed while applying commit {commit}."),
                );
                self.rollback(&v)?;
                return Err(ParallelError::execution(format!(
                    "Cherry-pick failed while applying commit {commit}. Origin was left at {}.",
                    short(&v.origin_head_before)
                )));
            }
            self.applied.push(commit);
        }

        if self.applied.is_empty() {
            log_info_stderr(
                self.use_err,
                "No new commits to cherry-pick. Origin was already up to date.",
            );
        } else {
            log_success_stderr(
                self.use_err,
                &format!("Cherry-picked {} commit(s) into origin.", self.applied.len()),
            );
        }

        Ok(if self.stash.is_some() {
            JoinState::RestoringStash
        } else {
            JoinState::Finalizing
        })
    }

    fn restore_stash(&mut self) -> ParallelResult<JoinState> {
        let v = self.validated()?.clone();
        let Some(stash) = self.stash.clone() else {
            return Ok(JoinState::Finalizing);
        };
        let fork_path = self.target.fork_path.clone();
        let stash = stash.relocate(self.exec, &fork_path);

        if git_step(
            self.exec,
            Some(&v.origin),
            &["stash", "apply", "--index", &stash.reference],
        ) {
            discard(self.exec, &fork_path, &stash);
            self.stash = None;
            log_info_stderr(self.use_err, "Uncommitted fork changes applied to origin.");
            return Ok(JoinState::Finalizing);
        }

        log_error_stderr(
            self.use_err,
            "Failed to apply uncommitted changes to the origin worktree.",
        );
        self.return_stash_to_fork(&v)?;
        Err(ParallelError::execution(format!(
            "Failed to apply uncommitted changes to the origin worktree. The {} replayed commit(s) stay on origin; the changes are back in fork '{}'.",
            self.applied.len(),
            self.target.alias
        )))
    }

    /// Undo a partial stash apply on origin and pop the stash back into the fork.
    ///
    /// Replayed commits stay: only the working tree of origin is reset to its HEAD.
    fn return_stash_to_fork(&mut self, v: &Validated) -> ParallelResult<()> {
        let mut artifacts = Vec::new();
        // origin was clean at validation, so this only discards the failed apply
        if !git_step(self.exec, Some(&v.origin), &["reset", "--hard", "HEAD"]) {
            artifacts.push(format!(
                "Origin worktree may hold a partial apply. Run `git reset --hard HEAD` in {}.",
                v.origin.display()
            ));
        }
        if let Some(stash) = self.stash.take() {
            match restore(self.exec, &self.target.fork_path, &stash) {
                Ok(()) => log_warn_stderr(
                    self.use_err,
                    &format!("Stashed changes restored to fork '{}'.", self.target.alias),
                ),
                Err(_) => artifacts.push(format!(
                    "Please restore stash '{}' manually from fork '{}'. Automatic pop failed.",
                    stash.reference, self.target.alias
                )),
            }
        }
        if artifacts.is_empty() {
            Ok(())
        } else {
            Err(ParallelError::unrecoverable(
                format!(
                    "Commits from fork '{}' were replayed onto origin, but its uncommitted changes could not be restored.",
                    self.target.alias
                ),
                artifacts,
            ))
        }
    }

    fn finalize(&mut self) -> ParallelResult<JoinState> {
        let v = self.validated()?.clone();
        let alias = self.target.alias.clone();
        let fork_path = self.target.fork_path.clone();

        if self.opts.keep {
            let mut new_base = self.head_of(&v.origin);
            // the fork is clean here; moving it onto origin keeps base == fork HEAD
            if !git_step(
                self.exec,
                Some(&fork_path),
                &["checkout", "-q", "--detach", &new_base],
            ) {
                log_warn_stderr(
                    self.use_err,
                    &format!("Could not move fork '{alias}' onto the new origin HEAD; it keeps its own history."),
                );
                new_base = self.head_of(&fork_path);
            }
            let mut meta = v.meta.clone();
            meta.advance_base(&new_base);
            if let Err(e) = write_metadata(&fork_path, &meta) {
                warn!(error = %e, "could not advance fork base");
                log_warn_stderr(
                    self.use_err,
                    &format!("Could not update metadata for fork '{alias}'; the next join may replay commits again."),
                );
            }
            info!(alias = %alias, "fork joined and kept");
            log_success_stderr(
                self.use_err,
                &format!(
                    "Fork '{alias}' merged into origin. Worktree kept at: {}",
                    fork_path.display()
                ),
            );
            return Ok(JoinState::Committed);
        }

        match remove_worktree(self.exec, self.prompt, &v.origin, &alias, &fork_path) {
            Ok(()) => {
                info!(alias = %alias, "fork joined and removed");
                log_success_stderr(
                    self.use_err,
                    &format!("Fork '{alias}' merged and removed successfully."),
                );
            }
            Err(e) => {
                debug!(error = %e, "removal after join failed");
                self.finalize_error = Some(ParallelError::execution(format!(
                    "Warning: Failed to remove fork '{alias}' after joining. Please remove it manually later."
                )));
            }
        }
        Ok(JoinState::Committed)
    }

    /// Undo replayed commits and give the fork its stash back.
    ///
    /// Ok means the user's state is as it was before the join. Err is an
    /// Unrecoverable error naming what is left to restore by hand.
    fn rollback(&mut self, v: &Validated) -> ParallelResult<()> {
        let mut artifacts = Vec::new();

        git_step(self.exec, Some(&v.origin), &["cherry-pick", "--abort"]);
        // origin was clean at validation, so a hard reset only discards join output
        let head_now = self.head_of(&v.origin);
        if head_now != v.origin_head_before
            && !git_step(
                self.exec,
                Some(&v.origin),
                &["reset", "--hard", &v.origin_head_before],
            )
        {
            artifacts.push(format!(
                "Origin HEAD could not be reset. Run `git reset --hard {}` in {}.",
                v.origin_head_before,
                v.origin.display()
            ));
        }
        if !self.applied.is_empty() {
            debug!(count = self.applied.len(), "discarded partially replayed commits");
        }
        self.applied.clear();

        if let Some(stash) = self.stash.take() {
            match restore(self.exec, &self.target.fork_path, &stash) {
                Ok(()) => log_warn_stderr(
                    self.use_err,
                    &format!(
                        "Stashed changes restored to fork '{}'.",
                        self.target.alias
                    ),
                ),
                Err(_) => artifacts.push(format!(
                    "Please restore stash '{}' manually from fork '{}'. Automatic pop failed.",
                    stash.reference, self.target.alias
                )),
            }
        }

        if artifacts.is_empty() {
            Ok(())
        } else {
            Err(ParallelError::unrecoverable(
                format!("Join of fork '{}' could not be fully rolled back.", self.target.alias),
                artifacts,
            ))
        }
    }
}

fn short(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

/// Replay a fork's commits onto origin; see the module docs for the states.
pub fn join(
    exec: &dyn Executor,
    prompt: &dyn Prompt,
    ctx: &ParallelContext,
    alias: Option<&str>,
    opts: JoinOptions,
) -> ParallelResult<JoinOutcome> {
    let target = resolve_join_target(ctx, alias)?;
    JoinMachine::new(exec, prompt, target, opts).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeExecutor, ScriptedPrompt};
    use crate::{read_metadata, timestamp_now};
    use std::fs;

    struct Fixture {
        _tmp: tempfile::TempDir,
        origin: PathBuf,
        fork: PathBuf,
        target: JoinTarget,
    }

    fn fixture(base: Option<&str>) -> Fixture {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let origin = tmp.path().join("app");
        let fork = tmp.path().join("worktrees/app/main/exp");
        fs::create_dir_all(&origin).unwrap();
        fs::create_dir_all(&fork).unwrap();
        let meta = ForkMetadata {
            alias: "exp".into(),
            branch: "main".into(),
            safe_branch: "main".into(),
            project: "app".into(),
            safe_project: "app".into(),
            origin_path: origin.clone(),
            base_commit: base.map(str::to_string),
            created_at: timestamp_now(),
            updated_at: None,
        };
        write_metadata(&fork, &meta).unwrap();
        let target = JoinTarget {
            alias: "exp".into(),
            fork_path: fork.clone(),
        };
        Fixture {
            _tmp: tmp,
            origin,
            fork,
            target,
        }
    }

    fn heads(exec: &FakeExecutor, fx: &Fixture) {
        exec.on_in(&fx.origin, &["rev-parse", "HEAD"], "o0");
        exec.on_in(&fx.fork, &["rev-parse", "HEAD"], "f2");
    }

    #[test]
    fn clean_join_replays_in_order_and_removes() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        heads(&exec, &fx);
        exec.on_in(&fx.fork, &["rev-list"], "c1\nc2\n");
        let prompt = ScriptedPrompt::default();

        let mut m = JoinMachine::new(&exec, &prompt, fx.target.clone(), JoinOptions::default());
        let out = m.run().unwrap();
        assert_eq!(out.applied, vec!["c1", "c2"]);
        assert!(!out.kept);
        assert_eq!(
            m.history(),
            &[
                JoinState::Validating,
                JoinState::Replaying,
                JoinState::Finalizing,
                JoinState::Committed
            ]
        );
        assert!(exec.called_in(&fx.fork, &["rev-list", "--reverse", "base0..HEAD"]));
        let p1 = exec.position(&["cherry-pick", "c1"]).unwrap();
        let p2 = exec.position(&["cherry-pick", "c2"]).unwrap();
        assert!(p1 < p2);
        assert!(exec.called_in(&fx.origin, &["worktree", "remove"]));
        assert!(!fx.fork.exists());
    }

    #[test]
    fn failed_cherry_pick_resets_origin_to_pre_join_head() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        exec.on_in_once(&fx.origin, &["rev-parse", "HEAD"], "o0");
        exec.on_in_once(&fx.origin, &["rev-parse", "HEAD"], "c1prime");
        exec.on_in(&fx.fork, &["rev-list"], "c1\nc2\n");
        exec.fail_in(&fx.origin, &["cherry-pick", "c2"], "CONFLICT");
        let prompt = ScriptedPrompt::default();

        let mut m = JoinMachine::new(&exec, &prompt, fx.target.clone(), JoinOptions::default());
        let err = m.run().unwrap_err();
        assert!(matches!(err, ParallelError::Execution(_)));
        assert!(err.to_string().contains("c2"));
        assert_eq!(m.state(), JoinState::RolledBack);
        assert!(exec.called_in(&fx.origin, &["cherry-pick", "--abort"]));
        assert!(exec.called_in(&fx.origin, &["reset", "--hard", "o0"]));
        assert!(!exec.called(&["worktree", "remove"]));
        assert!(fx.fork.exists());
    }

    #[test]
    fn dirty_fork_without_all_is_rejected_before_replay() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        exec.on_in(&fx.fork, &["status"], " M a.txt\n");
        let prompt = ScriptedPrompt::default();
        let err = JoinMachine::new(&exec, &prompt, fx.target.clone(), JoinOptions::default())
            .run()
            .unwrap_err();
        assert!(matches!(err, ParallelError::Precondition(_)));
        assert!(err.to_string().contains("--all"));
        assert!(!exec.called(&["cherry-pick"]));
        assert!(!exec.called(&["stash"]));
    }

    #[test]
    fn dirty_origin_is_rejected() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        exec.on_in(&fx.origin, &["status"], "?? scratch\n");
        let prompt = ScriptedPrompt::default();
        let err = JoinMachine::new(&exec, &prompt, fx.target.clone(), JoinOptions::default())
            .run()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Origin worktree has pending changes. Commit or stash them before joining."
        );
        assert!(!exec.called(&["rev-list"]));
    }

    #[test]
    fn missing_base_commit_is_a_precondition() {
        let fx = fixture(None);
        let exec = FakeExecutor::new();
        let prompt = ScriptedPrompt::default();
        let err = JoinMachine::new(&exec, &prompt, fx.target.clone(), JoinOptions::default())
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("missing base commit"));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn all_moves_fork_changes_into_origin() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        heads(&exec, &fx);
        exec.on_in_once(&fx.fork, &["status"], " M wip.txt\n");
        exec.on_in(&fx.fork, &["rev-list"], "c1\n");
        exec.on(&["stash", "list"], "stash@{0}: On HEAD: git-parallel-join:exp\n");
        let prompt = ScriptedPrompt::default();
        let opts = JoinOptions {
            keep: false,
            all: true,
        };

        let mut m = JoinMachine::new(&exec, &prompt, fx.target.clone(), opts);
        m.run().unwrap();
        assert_eq!(
            m.history(),
            &[
                JoinState::Validating,
                JoinState::StashingFork,
                JoinState::Replaying,
                JoinState::RestoringStash,
                JoinState::Finalizing,
                JoinState::Committed
            ]
        );
        assert!(exec.called_in(&fx.fork, &["stash", "push", "--include-untracked", "-m", "git-parallel-join:exp"]));
        let pick = exec.position(&["cherry-pick", "c1"]).unwrap();
        let apply = exec.position(&["stash", "apply"]).unwrap();
        assert!(pick < apply);
        assert!(exec.called_in(&fx.origin, &["stash", "apply", "--index", "stash@{0}"]));
        assert!(exec.called_in(&fx.fork, &["stash", "drop", "stash@{0}"]));
    }

    #[test]
    fn cherry_pick_failure_pops_fork_stash() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        heads(&exec, &fx);
        exec.on_in_once(&fx.fork, &["status"], " M wip.txt\n");
        exec.on_in(&fx.fork, &["rev-list"], "c1\n");
        exec.on(&["stash", "list"], "stash@{0}: On HEAD: git-parallel-join:exp\n");
        exec.fail(&["cherry-pick", "c1"], "CONFLICT");
        let prompt = ScriptedPrompt::default();
        let opts = JoinOptions {
            keep: false,
            all: true,
        };
        let err = JoinMachine::new(&exec, &prompt, fx.target.clone(), opts)
            .run()
            .unwrap_err();
        assert!(matches!(err, ParallelError::Execution(_)));
        assert!(exec.called_in(&fx.fork, &["stash", "pop", "--index", "stash@{0}"]));
        assert!(!exec.called(&["reset"]));
    }

    #[test]
    fn failed_stash_apply_keeps_replayed_commits_and_returns_stash() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        exec.on_in_once(&fx.origin, &["rev-parse", "HEAD"], "o0");
        exec.on_in(&fx.origin, &["rev-parse", "HEAD"], "c1prime");
        exec.on_in_once(&fx.fork, &["status"], " M wip.txt\n");
        exec.on_in(&fx.fork, &["rev-list"], "c1\n");
        exec.on(&["stash", "list"], "stash@{0}: On HEAD: git-parallel-join:exp\n");
        exec.fail(&["stash", "apply"], "error: conflict");
        let prompt = ScriptedPrompt::default();
        let opts = JoinOptions {
            keep: false,
            all: true,
        };
        let mut m = JoinMachine::new(&exec, &prompt, fx.target.clone(), opts);
        let err = m.run().unwrap_err();
        assert!(matches!(err, ParallelError::Execution(_)), "{err:?}");
        assert!(err.to_string().contains("stay on origin"));
        assert!(exec.called_in(&fx.origin, &["reset", "--hard", "HEAD"]));
        assert!(!exec.called(&["reset", "--hard", "o0"]));
        assert!(exec.called_in(&fx.fork, &["stash", "pop", "--index", "stash@{0}"]));
        assert!(!exec.called(&["worktree", "remove"]));
    }

    #[test]
    fn failed_stash_restore_in_both_places_is_unrecoverable() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        exec.on_in_once(&fx.origin, &["rev-parse", "HEAD"], "o0");
        exec.on_in(&fx.origin, &["rev-parse", "HEAD"], "c1prime");
        exec.on_in_once(&fx.fork, &["status"], " M wip.txt\n");
        exec.on_in(&fx.fork, &["rev-list"], "c1\n");
        exec.on(&["stash", "list"], "stash@{0}: On HEAD: git-parallel-join:exp\n");
        exec.fail(&["stash", "apply"], "error: conflict");
        exec.fail(&["stash", "pop"], "error: conflict");
        let prompt = ScriptedPrompt::default();
        let opts = JoinOptions {
            keep: false,
            all: true,
        };
        let mut m = JoinMachine::new(&exec, &prompt, fx.target.clone(), opts);
        let err = m.run().unwrap_err();
        match err {
            ParallelError::Unrecoverable { artifacts, .. } => {
                assert!(artifacts
                    .iter()
                    .any(|a| a.contains("stash@{0}") && a.contains("'exp'")));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(exec.called_in(&fx.origin, &["reset", "--hard", "HEAD"]));
        assert!(!exec.called(&["reset", "--hard", "o0"]));
        assert_eq!(m.state(), JoinState::RolledBack);
    }

    #[test]
    fn keep_advances_base_and_leaves_fork() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        exec.on_in_once(&fx.origin, &["rev-parse", "HEAD"], "o0");
        exec.on_in(&fx.origin, &["rev-parse", "HEAD"], "o1");
        exec.on_in(&fx.fork, &["rev-list"], "c1\n");
        let prompt = ScriptedPrompt::default();
        let opts = JoinOptions {
            keep: true,
            all: false,
        };
        let out = JoinMachine::new(&exec, &prompt, fx.target.clone(), opts)
            .run()
            .unwrap();
        assert!(out.kept);
        assert_eq!(out.origin_head, "o1");
        assert!(!exec.called(&["worktree", "remove"]));
        assert!(exec.called_in(&fx.fork, &["checkout", "-q", "--detach", "o1"]));
        let meta = read_metadata(&fx.fork).into_metadata().expect("fork");
        assert_eq!(meta.base_commit(), Some("o1"));
        assert!(meta.updated_at.is_some());
    }

    #[test]
    fn removal_failure_after_replay_still_commits() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        heads(&exec, &fx);
        exec.on_in(&fx.fork, &["rev-list"], "c1\n");
        exec.fail(&["worktree", "remove"], "fatal: locked");
        let prompt = ScriptedPrompt::answering(&["n"]);
        let mut m = JoinMachine::new(&exec, &prompt, fx.target.clone(), JoinOptions::default());
        let err = m.run().unwrap_err();
        assert!(err.to_string().starts_with("Warning: Failed to remove fork 'exp'"));
        assert_eq!(m.state(), JoinState::Committed);
        assert!(!exec.called(&["reset"]));
    }

    #[test]
    fn empty_range_reports_up_to_date() {
        let fx = fixture(Some("base0"));
        let exec = FakeExecutor::new();
        heads(&exec, &fx);
        let prompt = ScriptedPrompt::default();
        let opts = JoinOptions {
            keep: true,
            all: false,
        };
        let out = JoinMachine::new(&exec, &prompt, fx.target.clone(), opts)
            .run()
            .unwrap();
        assert!(out.applied.is_empty());
        assert!(!exec.called(&["cherry-pick"]));
    }

    #[test]
    fn target_resolution_rules() {
        let tmp = tempfile::tempdir().expect("tmpdir");
        let root = tmp.path().join("worktrees/app/main");
        fs::create_dir_all(root.join("exp")).unwrap();
        let mut ctx = ParallelContext {
            repo_root: tmp.path().join("app"),
            origin_path: tmp.path().join("app"),
            project_name: "app".into(),
            branch_name: "main".into(),
            safe_project_name: "app".into(),
            safe_branch_name: "main".into(),
            parallel_root: root.clone(),
            alias: None,
            is_fork: false,
        };
        let err = resolve_join_target(&ctx, None).unwrap_err();
        assert!(err.to_string().contains("Either run join from inside a forked worktree"));
        assert!(matches!(
            resolve_join_target(&ctx, Some("a b")),
            Err(ParallelError::Validation(_))
        ));
        assert!(resolve_join_target(&ctx, Some("ghost")).is_err());
        let t = resolve_join_target(&ctx, Some("exp")).unwrap();
        assert_eq!(t.fork_path, root.join("exp"));

        ctx.is_fork = true;
        ctx.alias = Some("exp".into());
        ctx.repo_root = root.join("exp");
        let err = resolve_join_target(&ctx, Some("exp")).unwrap_err();
        assert!(err.to_string().contains("currently in"));
        let t = resolve_join_target(&ctx, None).unwrap();
        assert_eq!(t.alias, "exp");
        assert_eq!(t.fork_path, root.join("exp"));
    }
}
