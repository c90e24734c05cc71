//! Fork table for the current branch (stdout surface).
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::meta::read_metadata;
use super::transfer::has_pending_changes;
use super::{git_query_opt, ParallelContext};
use crate::util::exec::Executor;
use crate::util::fs::child_dirs_sorted;
use crate::util::text::{center_visible, clamp_end, clamp_middle, hyperlink, pad_visible};
use crate::{color_enabled_stdout, paint, ParallelResult, BOLD, CYAN, DIM, GREEN, RED, YELLOW};

const ALIAS_WIDTH: usize = 18;
const SHORT_PATH_WIDTH: usize = 50;
const UNKNOWN_HEAD: &str = "unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Clamp long paths and render them as terminal hyperlinks.
    pub short: bool,
    /// One JSON array on stdout instead of the table.
    pub json: bool,
}

/// Commits a fork has that origin lacks (ahead) and vice versa (behind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Divergence {
    UpToDate,
    Ahead { ahead: u64 },
    Behind { behind: u64 },
    Diverged { ahead: u64, behind: u64 },
}

pub fn classify_divergence(ahead: u64, behind: u64) -> Divergence {
    match (ahead, behind) {
        (0, 0) => Divergence::UpToDate,
        (a, 0) => Divergence::Ahead { ahead: a },
        (0, b) => Divergence::Behind { behind: b },
        (a, b) => Divergence::Diverged {
            ahead: a,
            behind: b,
        },
    }
}

impl Divergence {
    pub fn label(&self) -> String {
        match *self {
            Divergence::UpToDate => "up-to-date".to_string(),
            Divergence::Ahead { ahead } => format!("↑{ahead}"),
            Divergence::Behind { behind } => format!("↓{behind}"),
            Divergence::Diverged { ahead, behind } => format!("↑{ahead} ↓{behind}"),
        }
    }

    fn color(&self) -> &'static str {
        match self {
            Divergence::UpToDate => DIM,
            Divergence::Ahead { .. } => GREEN,
            Divergence::Behind { .. } => YELLOW,
            Divergence::Diverged { .. } => RED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkStatus {
    pub alias: String,
    pub path: PathBuf,
    pub dirty: bool,
    pub short_head: String,
    pub divergence: Divergence,
    pub current: bool,
}

/// (ahead, behind) of `fork` relative to `origin`. Any failed query counts as 0.
pub fn commit_comparison(exec: &dyn Executor, fork: &Path, origin: &Path) -> (u64, u64) {
    let head = |dir: &Path| git_query_opt(exec, Some(dir), &["rev-parse", "HEAD"]);
    let (Some(fork_head), Some(origin_head)) = (head(fork), head(origin)) else {
        return (0, 0);
    };
    if fork_head == origin_head {
        return (0, 0);
    }
    let count = |range: String| -> u64 {
        git_query_opt(exec, Some(fork), &["rev-list", "--count", &range])
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };
    let ahead = count(format!("{origin_head}..{fork_head}"));
    let behind = count(format!("{fork_head}..{origin_head}"));
    (ahead, behind)
}

fn fork_status(exec: &dyn Executor, ctx: &ParallelContext, alias: String, path: PathBuf) -> ForkStatus {
    let dirty = has_pending_changes(exec, &path).unwrap_or_else(|e| {
        debug!(alias = %alias, error = %e, "status unreadable; reporting dirty");
        true
    });
    let short_head = git_query_opt(exec, Some(&path), &["rev-parse", "--short", "HEAD"])
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_HEAD.to_string());
    let (ahead, behind) = commit_comparison(exec, &path, &ctx.origin_path);
    let current = ctx.is_fork && ctx.alias.as_deref() == Some(alias.as_str());
    ForkStatus {
        alias,
        path,
        dirty,
        short_head,
        divergence: classify_divergence(ahead, behind),
        current,
    }
}

/// Status of every fork of the current branch, sorted by alias.
///
/// Directories without valid metadata are skipped; the alias comes from the
/// metadata, falling back to the directory name. Forks are queried concurrently.
pub fn collect_fork_statuses(exec: &dyn Executor, ctx: &ParallelContext) -> Vec<ForkStatus> {
    let candidates: Vec<(String, PathBuf)> = child_dirs_sorted(&ctx.parallel_root)
        .into_iter()
        .filter_map(|p| {
            let meta = read_metadata(&p).into_metadata()?;
            let alias = if meta.alias.trim().is_empty() {
                p.file_name()?.to_string_lossy().into_owned()
            } else {
                meta.alias
            };
            Some((alias, p))
        })
        .collect();

    let mut rows: Vec<ForkStatus> = std::thread::scope(|s| {
        let handles: Vec<_> = candidates
            .into_iter()
            .map(|(alias, path)| s.spawn(move || fork_status(exec, ctx, alias, path)))
            .collect();
        handles.into_iter().filter_map(|h| h.join().ok()).collect()
    });
    rows.sort_by(|a, b| a.alias.cmp(&b.alias));
    rows
}

/// One table row.
pub fn render_row(st: &ForkStatus, short: bool, use_color: bool) -> String {
    let marker = if st.current {
        paint(use_color, GREEN, "●")
    } else {
        paint(use_color, DIM, "○")
    };
    let alias = pad_visible(
        &paint(use_color && st.current, BOLD, &clamp_end(&st.alias, ALIAS_WIDTH)),
        ALIAS_WIDTH,
    );
    let status = if st.dirty {
        paint(use_color, RED, "dirty")
    } else {
        paint(use_color, GREEN, "clean")
    };
    let head = paint(use_color, YELLOW, &format!("{:<7}", st.short_head));
    let div = pad_visible(
        &paint(use_color, st.divergence.color(), &st.divergence.label()),
        11,
    );
    let path_s = st.path.display().to_string();
    let path = if short {
        hyperlink(
            &clamp_middle(&path_s, SHORT_PATH_WIDTH),
            &format!("file://{path_s}"),
        )
    } else {
        path_s
    };
    format!(
        "{marker} {alias} {} {head} {div} {}",
        center_visible(&status, 7),
        paint(use_color, DIM, &path)
    )
}

fn print_header(ctx: &ParallelContext, use_color: bool) {
    let label = |k: &str| paint(use_color, CYAN, k);
    println!("{} {}", label("Project:"), ctx.project_name);
    println!("{} {}", label("Branch: "), ctx.branch_name);
    println!("{} {}", label("Origin: "), ctx.origin_path.display());
    println!("{} {}", label("Current:"), ctx.current_label());
    println!();
}

/// Print the fork table (or JSON) and return the rows.
pub fn list(
    exec: &dyn Executor,
    ctx: &ParallelContext,
    opts: ListOptions,
) -> ParallelResult<Vec<ForkStatus>> {
    let rows = collect_fork_statuses(exec, ctx);
    if opts.json {
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(rows);
    }
    let use_color = color_enabled_stdout();
    print_header(ctx, use_color);
    if rows.is_empty() {
        println!("No forked worktrees found for this branch.");
        return Ok(rows);
    }
    for st in &rows {
        println!("{}", render_row(st, opts.short, use_color));
    }
    Ok(rows)
}
