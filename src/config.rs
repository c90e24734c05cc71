//! Runtime settings: built-in defaults, then an optional YAML file, then environment.
//!
//! File lookup order: `$GIT_PARALLEL_CONFIG`, `~/.config/git-parallel/config.yml`,
//! `~/.git-parallel.yml`. Only the first existing file is read.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Keys accepted in the YAML config file.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
struct FileSettings {
    temp_dir: Option<PathBuf>,
    editor: Option<String>,
    git_bin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base directory; forks live under `<temp_dir>/worktrees`.
    pub temp_dir: PathBuf,
    pub editor: String,
    pub git_bin: String,
    /// Path the `switch` command writes its destination to (set by the shell integration).
    pub result_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            editor: "code".to_string(),
            git_bin: "git".to_string(),
            result_file: None,
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Settings {
    /// Load from the process environment and the user's home directory.
    pub fn load() -> Result<Self> {
        Self::load_with(|k| std::env::var(k).ok(), home::home_dir())
    }

    /// Load using an explicit environment lookup and home directory.
    pub fn load_with<F>(lookup: F, home: Option<PathBuf>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(path) = config_file_path(&lookup, home.as_deref()) {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let file: FileSettings = if text.trim().is_empty() {
                FileSettings::default()
            } else {
                serde_yaml::from_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            };
            settings.apply_file(file);
        }

        if let Some(dir) = non_empty(lookup("GIT_PARALLEL_TEMP_DIR")) {
            settings.temp_dir = PathBuf::from(dir);
        }
        if let Some(editor) = non_empty(lookup("GIT_PARALLEL_EDITOR"))
            .or_else(|| non_empty(lookup("VISUAL")))
            .or_else(|| non_empty(lookup("EDITOR")))
        {
            settings.editor = editor;
        }
        if let Some(git) = non_empty(lookup("GIT_PARALLEL_GIT")) {
            settings.git_bin = git;
        }
        settings.result_file = non_empty(lookup("GIT_PARALLEL_RESULT")).map(PathBuf::from);

        settings.temp_dir = fs::canonicalize(&settings.temp_dir).unwrap_or(settings.temp_dir);
        Ok(settings)
    }

    /// Defaults with a fixed temp directory; handy for embedding and tests.
    pub fn with_temp_dir(temp_dir: impl Into<PathBuf>) -> Self {
        let temp_dir = temp_dir.into();
        Self {
            temp_dir: fs::canonicalize(&temp_dir).unwrap_or(temp_dir),
            ..Settings::default()
        }
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(dir) = file.temp_dir {
            self.temp_dir = dir;
        }
        if let Some(editor) = non_empty(file.editor) {
            self.editor = editor;
        }
        if let Some(git) = non_empty(file.git_bin) {
            self.git_bin = git;
        }
    }

    /// Root of every fork: `<temp_dir>/worktrees`.
    pub fn worktree_root(&self) -> PathBuf {
        self.temp_dir.join("worktrees")
    }
}

fn config_file_path<F>(lookup: &F, home: Option<&Path>) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(p) = non_empty(lookup("GIT_PARALLEL_CONFIG")) {
        let p = PathBuf::from(p);
        return p.is_file().then_some(p);
    }
    let home = home?;
    [
        home.join(".config").join("git-parallel").join("config.yml"),
        home.join(".git-parallel.yml"),
    ]
    .into_iter()
    .find(|p| p.is_file())
}
