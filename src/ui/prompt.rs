use std::io::{self, BufRead, Write};

use crate::{color_enabled_stderr, paint, YELLOW};

/// Yes/no questions asked by destructive fallbacks (forced worktree deletion).
pub trait Prompt: Sync {
    /// Ask `question` and return the raw answer line (trimmed). Empty means no answer.
    fn ask(&self, question: &str) -> String;

    fn confirm(&self, question: &str) -> bool {
        is_affirmative(&self.ask(question))
    }
}

/// "y"/"yes" in any case.
pub fn is_affirmative(answer: &str) -> bool {
    let ans = answer.trim().to_ascii_lowercase();
    ans == "y" || ans == "yes"
}

/// Prompt on stderr, answer from stdin.
///
/// Non-interactive stdin never confirms unless GIT_PARALLEL_ASSUME_YES=1.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt {
    assume_yes: bool,
}

impl StdinPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    pub fn from_env() -> Self {
        let assume_yes = std::env::var("GIT_PARALLEL_ASSUME_YES").ok().as_deref() == Some("1");
        Self::new(assume_yes)
    }
}

impl Prompt for StdinPrompt {
    fn ask(&self, question: &str) -> String {
        let use_err = color_enabled_stderr();
        if self.assume_yes {
            eprintln!("{}y", paint(use_err, YELLOW, question));
            return "y".to_string();
        }
        if !atty::is(atty::Stream::Stdin) {
            eprintln!(
                "git-parallel: refusing to confirm on non-interactive stdin. Set GIT_PARALLEL_ASSUME_YES=1 to answer yes."
            );
            return String::new();
        }
        eprint!("{}", paint(use_err, YELLOW, question));
        let _ = io::stderr().flush();
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        line.trim().to_string()
    }
}
