//! Command routing: one entry point per user-facing command.
use std::path::Path;

use tracing::debug;

use super::context::{resolve_context, validate_alias};
use super::join::{join, JoinOptions};
use super::lifecycle::{fork, remove, ForkOptions};
use super::list::{list, ListOptions};
use super::open::{open, OpenAction, SWITCH_NEEDS_SHELL_INIT};
use super::transfer::TransferMode;
use crate::ui::prompt::Prompt;
use crate::util::exec::Executor;
use crate::{ParallelError, ParallelResult, Settings};

/// A parsed command, independent of the CLI parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParallelCommand {
    Fork {
        alias: Option<String>,
        transfer: Option<TransferMode>,
    },
    Remove {
        alias: Option<String>,
    },
    Open {
        target: Option<String>,
        copy: bool,
    },
    Switch {
        target: Option<String>,
    },
    Join {
        alias: Option<String>,
        keep: bool,
        all: bool,
    },
    List {
        short: bool,
        json: bool,
    },
}

impl ParallelCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ParallelCommand::Fork { .. } => "fork",
            ParallelCommand::Remove { .. } => "remove",
            ParallelCommand::Open { .. } => "open",
            ParallelCommand::Switch { .. } => "switch",
            ParallelCommand::Join { .. } => "join",
            ParallelCommand::List { .. } => "list",
        }
    }

    /// Checks that need no repository: alias syntax and shell integration.
    fn prevalidate(&self, settings: &Settings) -> ParallelResult<()> {
        match self {
            ParallelCommand::Remove { alias: Some(a) } | ParallelCommand::Join { alias: Some(a), .. } => {
                validate_alias(a)?;
            }
            ParallelCommand::Switch { .. } if settings.result_file.is_none() => {
                return Err(ParallelError::precondition(SWITCH_NEEDS_SHELL_INIT));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Resolve the context for `cwd` and run `cmd`.
pub fn dispatch(
    exec: &dyn Executor,
    prompt: &dyn Prompt,
    settings: &Settings,
    cwd: &Path,
    cmd: ParallelCommand,
) -> ParallelResult<()> {
    cmd.prevalidate(settings)?;
    let ctx = resolve_context(exec, settings, cwd)?;
    debug!(command = cmd.name(), current = ctx.current_label(), "dispatch");

    match cmd {
        ParallelCommand::Fork { alias, transfer } => {
            fork(exec, &ctx, alias.as_deref(), ForkOptions { transfer }).map(|_| ())
        }
        ParallelCommand::Remove { alias } => {
            remove(exec, prompt, &ctx, alias.as_deref()).map(|_| ())
        }
        ParallelCommand::Open { target, copy } => {
            let action = if copy {
                OpenAction::Copy
            } else {
                OpenAction::Editor
            };
            open(settings, &ctx, target.as_deref(), action).map(|_| ())
        }
        ParallelCommand::Switch { target } => {
            open(settings, &ctx, target.as_deref(), OpenAction::ChangeDir).map(|_| ())
        }
        ParallelCommand::Join { alias, keep, all } => {
            join(exec, prompt, &ctx, alias.as_deref(), JoinOptions { keep, all }).map(|_| ())
        }
        ParallelCommand::List { short, json } => {
            list(exec, &ctx, ListOptions { short, json }).map(|_| ())
        }
    }
}
