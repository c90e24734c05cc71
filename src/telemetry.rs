use std::env;

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

/// Directive from GIT_PARALLEL_LOG (e.g. "debug", "git_parallel=trace"); None when unset or blank.
fn log_directive() -> Option<String> {
    env::var("GIT_PARALLEL_LOG")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Install a stderr fmt subscriber when GIT_PARALLEL_LOG is set.
///
/// Without it tracing events are dropped and the user only sees the
/// color-aware one-liners from `color.rs`. Returns true when a subscriber was installed.
pub fn telemetry_init() -> bool {
    if INIT.get().is_some() {
        return false;
    }
    let Some(directive) = log_directive() else {
        return false;
    };
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    let res = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .without_time()
        .try_init();
    if res.is_err() {
        eprintln!("git-parallel: log init skipped (global subscriber already set)");
        return false;
    }
    let _ = INIT.set(());
    true
}
