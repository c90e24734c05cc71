use std::env;
use std::process::ExitCode;

use clap::Parser;

use git_parallel::{
    color_enabled_stderr, display_for_parallel_error, exit_code_for_parallel_error,
    log_error_stderr, paint, set_color_mode, shell_init_script, telemetry_init, GitExecutor,
    Settings, StdinPrompt, RED,
};

mod cli;

use cli::{Cli, ParallelCmd};

fn main() -> ExitCode {
    let args = cli::normalize_args(env::args_os());
    let cli = match Cli::try_parse_from(args) {
        Ok(c) => c,
        Err(e) => {
            let _ = e.print();
            // usage errors exit 1; --help/--version exit 0
            return ExitCode::from(if e.use_stderr() { 1 } else { 0 });
        }
    };

    if let Some(mode) = cli.color {
        set_color_mode(mode);
    }
    telemetry_init();

    if let ParallelCmd::ShellInit { shell, name } = &cli.command {
        print!("{}", shell_init_script(*shell, name));
        return ExitCode::from(0);
    }

    let use_err = color_enabled_stderr();
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            log_error_stderr(use_err, &format!("git-parallel: {e:#}"));
            return ExitCode::from(1);
        }
    };
    let cwd = match env::current_dir() {
        Ok(d) => d,
        Err(e) => {
            log_error_stderr(use_err, &format!("git-parallel: cannot read current directory: {e}"));
            return ExitCode::from(1);
        }
    };
    let Some(command) = cli.command.into_command() else {
        return ExitCode::from(0);
    };

    let exec = GitExecutor::new(&settings.git_bin);
    let prompt = StdinPrompt::from_env();
    match git_parallel::dispatch(&exec, &prompt, &settings, &cwd, command) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            let msg = display_for_parallel_error(&e);
            for (i, line) in msg.lines().enumerate() {
                if i == 0 {
                    eprintln!("{}", paint(use_err, RED, &format!("git-parallel: {line}")));
                } else {
                    eprintln!("{}", paint(use_err, RED, line));
                }
            }
            ExitCode::from(exit_code_for_parallel_error(&e))
        }
    }
}
