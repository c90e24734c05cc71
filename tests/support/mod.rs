/*!
Test support helpers shared across integration tests.

- have_git(): check git availability on PATH
- init_repo_with_default_user(dir): initialize a git repo with an identity and one commit
- Sandbox: a repo plus an isolated fork root, with helpers to drive git and the binary

These helpers do not print skip messages themselves so tests can keep their
"skipping: ..." outputs next to the check.
*/
#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use git_parallel::{Prompt, Settings};

/// Return true if `git` is available on PATH.
pub fn have_git() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn git_quiet(dir: &Path, args: &[&str]) -> io::Result<bool> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
}

/// `git init` with a local identity, signing disabled, and an initial commit of `init.txt`.
pub fn init_repo_with_default_user(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    git_quiet(dir, &["init"])?;
    git_quiet(dir, &["config", "user.name", "Parallel Test"])?;
    git_quiet(dir, &["config", "user.email", "parallel@example.com"])?;
    git_quiet(dir, &["config", "commit.gpgsign", "false"])?;
    fs::write(dir.join("init.txt"), "x\n")?;
    git_quiet(dir, &["add", "-A"])?;
    if !git_quiet(dir, &["commit", "-m", "init"])? {
        return Err(io::Error::other("initial commit failed"));
    }
    Ok(())
}

/// Run git in `dir`, panic on failure, return trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// Write `name` and commit it with `msg`; returns the new HEAD.
pub fn commit_file(dir: &Path, name: &str, content: &str, msg: &str) -> String {
    fs::write(dir.join(name), content).expect("write file");
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", msg]);
    git(dir, &["rev-parse", "HEAD"])
}

pub fn head(dir: &Path) -> String {
    git(dir, &["rev-parse", "HEAD"])
}

pub fn subject(dir: &Path, rev: &str) -> String {
    git(dir, &["log", "-1", "--format=%s", rev])
}

pub fn porcelain(dir: &Path) -> String {
    git(dir, &["status", "--porcelain=v1", "--untracked-files=normal"])
}

/// Repository in `<tmp>/repo` with forks rooted under `<tmp>/scratch`.
pub struct Sandbox {
    _td: tempfile::TempDir,
    pub repo: PathBuf,
    pub scratch: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let td = tempfile::tempdir().expect("tmpdir");
        let base = fs::canonicalize(td.path()).expect("canonical tmpdir");
        let repo = base.join("repo");
        let scratch = base.join("scratch");
        fs::create_dir_all(&scratch).expect("scratch dir");
        init_repo_with_default_user(&repo).expect("init repo");
        Self {
            _td: td,
            repo,
            scratch,
        }
    }

    pub fn settings(&self) -> Settings {
        Settings::with_temp_dir(&self.scratch)
    }

    pub fn branch(&self) -> String {
        git(&self.repo, &["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Where the fork `alias` of the current branch lives.
    pub fn fork_path(&self, alias: &str) -> PathBuf {
        let branch = git_parallel::sanitize_component(&self.branch());
        self.settings()
            .worktree_root()
            .join("repo")
            .join(branch)
            .join(alias)
    }

    /// The binary with environment isolated to this sandbox.
    pub fn bin(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_git-parallel"));
        cmd.current_dir(dir)
            .env("GIT_PARALLEL_TEMP_DIR", &self.scratch)
            .env("GIT_PARALLEL_CONFIG", self.scratch.join("no-config.yml"))
            .env("NO_COLOR", "1")
            .env_remove("GIT_PARALLEL_RESULT")
            .env_remove("GIT_PARALLEL_ASSUME_YES")
            .env_remove("GIT_PARALLEL_LOG")
            .stdin(Stdio::null());
        cmd
    }

    pub fn run(&self, dir: &Path, args: &[&str]) -> Output {
        self.bin(dir).args(args).output().expect("run git-parallel")
    }
}

/// Prompt with a fixed answer.
pub struct FixedAnswer(pub bool);

impl Prompt for FixedAnswer {
    fn ask(&self, _question: &str) -> String {
        if self.0 { "y" } else { "n" }.to_string()
    }
}

pub fn stdout_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

pub fn stderr_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}
