use std::ffi::OsString;

use clap::{Parser, Subcommand};

use git_parallel::{ColorMode, ParallelCommand, ShellKind, TransferMode};

#[derive(Parser, Debug)]
#[command(
    name = "git-parallel",
    version,
    about = "Fork the current branch into parallel worktrees and join them back",
    after_long_help = "Examples:\n  git parallel fork experiment --move\n  git parallel list --short\n  git parallel switch experiment\n  git parallel join experiment --keep\n  git parallel remove experiment"
)]
pub(crate) struct Cli {
    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum, global = true)]
    pub(crate) color: Option<ColorMode>,

    #[command(subcommand)]
    pub(crate) command: ParallelCmd,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum ParallelCmd {
    /// Create a new fork of the current branch from the origin worktree
    Fork {
        /// Fork name (no spaces, slashes or shell metacharacters)
        alias: Option<String>,
        /// Move pending changes from origin into the fork (-mv)
        #[arg(long = "move", conflicts_with = "mirror")]
        move_changes: bool,
        /// Copy pending changes into the fork, keeping them in origin (-mr)
        #[arg(long = "mirror")]
        mirror: bool,
    },
    /// Remove a clean fork
    #[command(visible_alias = "rm")]
    Remove {
        alias: Option<String>,
    },
    /// Open a fork (or origin) in your editor
    Open {
        /// Fork alias or "origin"
        target: Option<String>,
        /// Copy the path to the clipboard instead of launching the editor
        #[arg(short = 'c', long = "copy")]
        copy: bool,
    },
    /// Change the calling shell's directory to a fork or origin (needs shell-init)
    Switch {
        /// Fork alias or "origin"
        target: Option<String>,
    },
    /// Cherry-pick a fork's commits onto origin, then remove the fork
    Join {
        /// Fork to join; defaults to the fork you are in
        alias: Option<String>,
        /// Keep the fork and advance its base instead of removing it
        #[arg(long = "keep")]
        keep: bool,
        /// Also carry the fork's uncommitted changes into origin
        #[arg(long = "all")]
        all: bool,
    },
    /// List forks of the current branch
    #[command(visible_alias = "ls")]
    List {
        /// Clamp paths and render them as hyperlinks
        #[arg(short = 's', long = "short")]
        short: bool,
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the shell function that makes `switch` change directory
    ShellInit {
        #[arg(value_enum)]
        shell: ShellKind,
        /// Name of the generated shell function
        #[arg(long = "name", default_value = "git-parallel")]
        name: String,
    },
}

impl ParallelCmd {
    /// Library command for everything except shell-init, which needs no repository.
    pub(crate) fn into_command(self) -> Option<ParallelCommand> {
        Some(match self {
            ParallelCmd::Fork {
                alias,
                move_changes,
                mirror,
            } => ParallelCommand::Fork {
                alias,
                transfer: if move_changes {
                    Some(TransferMode::Move)
                } else if mirror {
                    Some(TransferMode::Mirror)
                } else {
                    None
                },
            },
            ParallelCmd::Remove { alias } => ParallelCommand::Remove { alias },
            ParallelCmd::Open { target, copy } => ParallelCommand::Open { target, copy },
            ParallelCmd::Switch { target } => ParallelCommand::Switch { target },
            ParallelCmd::Join { alias, keep, all } => ParallelCommand::Join { alias, keep, all },
            ParallelCmd::List { short, json } => ParallelCommand::List { short, json },
            ParallelCmd::ShellInit { .. } => return None,
        })
    }
}

/// Rewrite the two-letter short forms `-mv`/`-mr` and case variants of long flags.
///
/// clap would read `-mv` as the cluster `-m -v`.
pub(crate) fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|a| match a.to_str() {
            Some("-mv") => OsString::from("--move"),
            Some("-mr") => OsString::from("--mirror"),
            Some(s) if s.starts_with("--") => {
                let (flag, value) = match s.split_once('=') {
                    Some((f, v)) => (f, Some(v)),
                    None => (s, None),
                };
                match value {
                    Some(v) => OsString::from(format!("{}={v}", flag.to_ascii_lowercase())),
                    None => OsString::from(flag.to_ascii_lowercase()),
                }
            }
            _ => a,
        })
        .collect()
}
