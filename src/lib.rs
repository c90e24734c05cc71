#![allow(clippy::module_name_repetitions)]
//! git-parallel: short-lived linked worktrees ("forks") of the current branch.
//!
//! Architecture
//! - Binary glue (src/main.rs, src/cli.rs) parses arguments and maps them onto
//!   [`ParallelCommand`]; everything else lives in this library.
//! - parallel::*: context resolution, fork metadata, stash transfer, fork/remove,
//!   the join state machine, the fork table, open/switch and shell integration.
//! - util::exec: the [`Executor`] seam every git call goes through.
//! - util::*: filesystem and text helpers; ui::prompt: confirmation prompts.
//! - color.rs / errors.rs / telemetry.rs / config.rs: ambient plumbing.
//!
//! Environment
//! - GIT_PARALLEL_TEMP_DIR, GIT_PARALLEL_EDITOR, GIT_PARALLEL_GIT, GIT_PARALLEL_CONFIG: settings overrides.
//! - GIT_PARALLEL_RESULT: set by the shell wrapper; `switch` writes its destination there.
//! - GIT_PARALLEL_COLOR / NO_COLOR: color control. GIT_PARALLEL_LOG: tracing filter.
//! - GIT_PARALLEL_ASSUME_YES=1: answer yes to forced-removal prompts.

mod color;
mod config;
mod errors;
mod parallel;
mod telemetry;
pub mod ui;
pub mod util;

#[cfg(test)]
mod testing;

pub use color::*;
pub use config::*;
pub use errors::*;
pub use parallel::*;
pub use telemetry::*;
pub use ui::prompt::{is_affirmative, Prompt, StdinPrompt};
pub use util::exec::{Executor, GitExecutor, GitOutput};
