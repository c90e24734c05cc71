//! Shell wrapper that turns `switch` output into a `cd` in the calling shell.
//!
//! The wrapper exports GIT_PARALLEL_RESULT pointing at a fresh temp file, runs the
//! real binary, and changes directory when the file is non-empty afterwards.
use clap::ValueEnum;

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum ShellKind {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

fn posix_script(name: &str) -> String {
    format!(
        r#"{name}() {{
    local __gp_result __gp_status
    __gp_result="$(mktemp "${{TMPDIR:-/tmp}}/git-parallel.XXXXXX")" || return 1
    GIT_PARALLEL_RESULT="$__gp_result" command git-parallel "$@"
    __gp_status=$?
    if [ $__gp_status -eq 0 ] && [ -s "$__gp_result" ]; then
        cd -- "$(cat "$__gp_result")" || __gp_status=1
    fi
    rm -f "$__gp_result"
    return $__gp_status
}}
"#
    )
}

fn fish_script(name: &str) -> String {
    format!(
        r#"function {name}
    set -l __gp_result (mktemp (set -q TMPDIR; and echo $TMPDIR; or echo /tmp)/git-parallel.XXXXXX); or return 1
    env GIT_PARALLEL_RESULT=$__gp_result git-parallel $argv
    set -l __gp_status $status
    if test $__gp_status -eq 0; and test -s $__gp_result
        cd (cat $__gp_result); or set __gp_status 1
    end
    rm -f $__gp_result
    return $__gp_status
end
"#
    )
}

fn powershell_script(name: &str) -> String {
    format!(
        r#"function {name} {{
    $gpResult = [System.IO.Path]::GetTempFileName()
    $env:GIT_PARALLEL_RESULT = $gpResult
    try {{
        & (Get-Command git-parallel -CommandType Application | Select-Object -First 1) @args
        $gpStatus = $LASTEXITCODE
    }} finally {{
        Remove-Item Env:\GIT_PARALLEL_RESULT -ErrorAction SilentlyContinue
    }}
    if ($gpStatus -eq 0 -and (Get-Item $gpResult).Length -gt 0) {{
        Set-Location -LiteralPath (Get-Content -Raw $gpResult).Trim()
    }}
    Remove-Item $gpResult -ErrorAction SilentlyContinue
    $global:LASTEXITCODE = $gpStatus
}}
"#
    )
}

/// Wrapper function named `name` for `shell`.
pub fn shell_init_script(shell: ShellKind, name: &str) -> String {
    match shell {
        ShellKind::Bash | ShellKind::Zsh => posix_script(name),
        ShellKind::Fish => fish_script(name),
        ShellKind::Powershell => powershell_script(name),
    }
}
