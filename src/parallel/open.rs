//! Opening a fork (or origin) in an editor, copying its path, or handing it to the shell.
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::{validate_alias, ParallelContext, ORIGIN_TARGET};
use crate::util::fs::write_replace;
use crate::{color_enabled_stderr, log_info_stderr, ParallelError, ParallelResult, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAction {
    /// Launch the configured editor on the directory.
    Editor,
    /// Put the directory path on the system clipboard.
    Copy,
    /// Write the directory path to the shell integration's result file.
    ChangeDir,
}

pub(crate) const SWITCH_NEEDS_SHELL_INIT: &str = "`git parallel switch` needs the shell integration. Add `eval \"$(git-parallel shell-init bash)\"` (or zsh/fish/powershell) to your shell profile.";

/// Resolve `target` ("origin" or a fork alias) to an existing directory.
fn resolve_target(ctx: &ParallelContext, target: Option<&str>) -> ParallelResult<PathBuf> {
    let target = target.map(str::trim).filter(|t| !t.is_empty()).ok_or_else(|| {
        ParallelError::validation("Missing target worktree alias or 'origin'.")
    })?;
    if target.eq_ignore_ascii_case(ORIGIN_TARGET) {
        if !ctx.origin_path.is_dir() {
            return Err(ParallelError::precondition(format!(
                "Original worktree path not found. Expected at '{}'.",
                ctx.origin_path.display()
            )));
        }
        return Ok(ctx.origin_path.clone());
    }
    let alias = validate_alias(target)?;
    let path = ctx.fork_path(alias);
    if !path.is_dir() {
        return Err(ParallelError::precondition(format!(
            "Worktree '{alias}' not found for branch '{}'.",
            ctx.branch_name
        )));
    }
    Ok(path)
}

/// Clipboard helpers tried in order; the first one on PATH wins.
const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("clip", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Copy `text` to the clipboard. Ok(false) when no clipboard tool is installed.
pub fn copy_to_clipboard(text: &str) -> io::Result<bool> {
    let Some((tool, args)) = CLIPBOARD_TOOLS
        .iter()
        .find_map(|(name, args)| which::which(name).ok().map(|p| (p, *args)))
    else {
        return Ok(false);
    };
    debug!(tool = %tool.display(), "copying to clipboard");
    let mut child = Command::new(&tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }
    let status = child.wait()?;
    if status.success() {
        Ok(true)
    } else {
        Err(io::Error::other(format!(
            "{} exited with {status}",
            tool.display()
        )))
    }
}

fn launch_editor(editor: &str, dir: &Path) -> ParallelResult<()> {
    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| ParallelError::precondition("No editor configured."))?;
    let resolved = which::which(program).map_err(|_| {
        ParallelError::precondition(format!(
            "Editor '{program}' not found on PATH. Set GIT_PARALLEL_EDITOR or EDITOR."
        ))
    })?;
    let status = Command::new(resolved)
        .args(parts)
        .arg(dir)
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(ParallelError::execution(format!(
            "Editor '{program}' exited with {status}."
        )))
    }
}

/// Perform `action` on the directory named by `target`; returns that directory.
pub fn open(
    settings: &Settings,
    ctx: &ParallelContext,
    target: Option<&str>,
    action: OpenAction,
) -> ParallelResult<PathBuf> {
    let result_file = match action {
        OpenAction::ChangeDir => Some(
            settings
                .result_file
                .clone()
                .ok_or_else(|| ParallelError::precondition(SWITCH_NEEDS_SHELL_INIT))?,
        ),
        _ => None,
    };
    let dir = resolve_target(ctx, target)?;
    let use_err = color_enabled_stderr();

    match action {
        OpenAction::Editor => {
            launch_editor(&settings.editor, &dir)?;
            log_info_stderr(use_err, &format!("Opened {} in {}.", dir.display(), settings.editor));
        }
        OpenAction::Copy => {
            let path_s = dir.display().to_string();
            if !copy_to_clipboard(&path_s)? {
                return Err(ParallelError::execution(
                    "No clipboard utility found (tried pbcopy, clip, wl-copy, xclip, xsel).",
                ));
            }
            log_info_stderr(use_err, &format!("Copied to clipboard: {path_s}"));
        }
        OpenAction::ChangeDir => {
            if let Some(file) = result_file {
                write_replace(&file, dir.display().to_string().as_bytes())?;
                debug!(result_file = %file.display(), dir = %dir.display(), "switch target written");
            }
        }
    }
    Ok(dir)
}
