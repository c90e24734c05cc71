//! Version-control execution seam.
//!
//! Every git query or mutation in the crate goes through [`Executor`], so the
//! lifecycle and join logic can be driven by a scripted executor in tests.
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::shell_join;

/// Captured result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Most useful single line for an error message: the last "fatal:"/"error:" line
    /// on stderr, else the last non-empty stderr line, else the exit code.
    pub fn best_error_line(&self) -> String {
        let lines: Vec<&str> = self
            .stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if let Some(l) = lines
            .iter()
            .rev()
            .find(|l| l.starts_with("fatal:") || l.starts_with("error:"))
        {
            return (*l).to_string();
        }
        if let Some(l) = lines.last() {
            return (*l).to_string();
        }
        match self.code {
            Some(c) => format!("exit status {c}"),
            None => "terminated by signal".to_string(),
        }
    }
}

pub trait Executor: Sync {
    /// Run git in `cwd` (process cwd when None), capturing stdout and stderr.
    fn run(&self, cwd: Option<&Path>, args: &[&str]) -> io::Result<GitOutput>;

    /// Run git with inherited stdio so progress and conflict output reach the user.
    /// Returns whether git exited successfully.
    fn run_inherit(&self, cwd: Option<&Path>, args: &[&str]) -> io::Result<bool>;
}

/// Executor backed by the real git binary.
#[derive(Debug, Clone)]
pub struct GitExecutor {
    program: PathBuf,
}

impl Default for GitExecutor {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, cwd: Option<&Path>, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(dir) = cwd {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(args);
        if tracing::enabled!(tracing::Level::DEBUG) {
            let mut preview = vec![self.program.display().to_string()];
            if let Some(dir) = cwd {
                preview.push("-C".to_string());
                preview.push(dir.display().to_string());
            }
            preview.extend(args.iter().map(|a| a.to_string()));
            debug!(target: "git_parallel::exec", cmd = %shell_join(&preview), "git");
        }
        cmd
    }
}

impl Executor for GitExecutor {
    fn run(&self, cwd: Option<&Path>, args: &[&str]) -> io::Result<GitOutput> {
        let out = self
            .command(cwd, args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;
        Ok(GitOutput {
            success: out.status.success(),
            code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }

    fn run_inherit(&self, cwd: Option<&Path>, args: &[&str]) -> io::Result<bool> {
        let status = self
            .command(cwd, args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(status.success())
    }
}
