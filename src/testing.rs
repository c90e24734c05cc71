//! Scripted executor and prompt for unit tests.
//!
//! Rules match on an argument prefix and optionally a working directory.
//! One-shot rules are consumed first in insertion order; persistent rules are
//! then tried newest first. Unmatched invocations succeed with empty output.
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::ui::prompt::Prompt;
use crate::util::exec::{Executor, GitOutput};

type Effect = Arc<dyn Fn(&[String]) + Send + Sync>;

struct Rule {
    cwd: Option<PathBuf>,
    prefix: Vec<String>,
    output: GitOutput,
    once: bool,
    effect: Option<Effect>,
}

impl Rule {
    fn matches(&self, cwd: Option<&Path>, args: &[String]) -> bool {
        if let Some(dir) = &self.cwd {
            if cwd != Some(dir.as_path()) {
                return false;
            }
        }
        args.len() >= self.prefix.len() && args.iter().zip(&self.prefix).all(|(a, p)| a == p)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub cwd: Option<PathBuf>,
    pub args: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, cwd: Option<&Path>, prefix: &[&str], output: GitOutput, once: bool) {
        self.rules.lock().unwrap().push(Rule {
            cwd: cwd.map(Path::to_path_buf),
            prefix: owned(prefix),
            output,
            once,
            effect: None,
        });
    }

    pub fn on(&self, prefix: &[&str], stdout: &str) {
        self.push(None, prefix, GitOutput::ok(stdout), false);
    }

    pub fn on_once(&self, prefix: &[&str], stdout: &str) {
        self.push(None, prefix, GitOutput::ok(stdout), true);
    }

    pub fn on_in(&self, cwd: &Path, prefix: &[&str], stdout: &str) {
        self.push(Some(cwd), prefix, GitOutput::ok(stdout), false);
    }

    pub fn on_in_once(&self, cwd: &Path, prefix: &[&str], stdout: &str) {
        self.push(Some(cwd), prefix, GitOutput::ok(stdout), true);
    }

    pub fn fail(&self, prefix: &[&str], stderr: &str) {
        self.push(None, prefix, GitOutput::failed(1, stderr), false);
    }

    pub fn fail_in(&self, cwd: &Path, prefix: &[&str], stderr: &str) {
        self.push(Some(cwd), prefix, GitOutput::failed(1, stderr), false);
    }

    /// Succeed and run `effect` with the full argument list (e.g. create a worktree dir).
    pub fn effect<F>(&self, prefix: &[&str], effect: F)
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.rules.lock().unwrap().push(Rule {
            cwd: None,
            prefix: owned(prefix),
            output: GitOutput::ok(""),
            once: false,
            effect: Some(Arc::new(effect)),
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn position_where(&self, cwd: Option<&Path>, prefix: &[&str]) -> Option<usize> {
        let prefix = owned(prefix);
        self.calls.lock().unwrap().iter().position(|c| {
            cwd.map_or(true, |d| c.cwd.as_deref() == Some(d))
                && c.args.len() >= prefix.len()
                && c.args.iter().zip(&prefix).all(|(a, p)| a == p)
        })
    }

    pub fn position(&self, prefix: &[&str]) -> Option<usize> {
        self.position_where(None, prefix)
    }

    pub fn called(&self, prefix: &[&str]) -> bool {
        self.position(prefix).is_some()
    }

    pub fn called_in(&self, cwd: &Path, prefix: &[&str]) -> bool {
        self.position_where(Some(cwd), prefix).is_some()
    }

    fn respond(&self, cwd: Option<&Path>, args: &[&str]) -> GitOutput {
        let args = owned(args);
        self.calls.lock().unwrap().push(Call {
            cwd: cwd.map(Path::to_path_buf),
            args: args.clone(),
        });
        let (output, effect) = {
            let mut rules = self.rules.lock().unwrap();
            let idx = rules
                .iter()
                .position(|r| r.once && r.matches(cwd, &args))
                .or_else(|| rules.iter().rposition(|r| !r.once && r.matches(cwd, &args)));
            match idx {
                Some(i) if rules[i].once => {
                    let r = rules.remove(i);
                    (r.output, r.effect)
                }
                Some(i) => (rules[i].output.clone(), rules[i].effect.clone()),
                None => (GitOutput::ok(""), None),
            }
        };
        if let Some(f) = effect {
            f(&args);
        }
        output
    }
}

impl Executor for FakeExecutor {
    fn run(&self, cwd: Option<&Path>, args: &[&str]) -> io::Result<GitOutput> {
        Ok(self.respond(cwd, args))
    }

    fn run_inherit(&self, cwd: Option<&Path>, args: &[&str]) -> io::Result<bool> {
        Ok(self.respond(cwd, args).success)
    }
}

/// Prompt that replays canned answers and records the questions.
#[derive(Default)]
pub(crate) struct ScriptedPrompt {
    answers: Mutex<Vec<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().rev().map(|s| s.to_string()).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&self, question: &str) -> String {
        self.asked.lock().unwrap().push(question.to_string());
        self.answers.lock().unwrap().pop().unwrap_or_default()
    }
}
