//! Persistent search-path edits.
//!
//! The store keeps the ordered search path future sessions should use and
//! renders scripts that put the active directory first on `PATH`. A
//! marker-guarded line in the shell profile sources them in new sessions.
//! The running shell cannot inherit changes from a child process, so
//! activation also prints (and optionally spawns) a session with the new path.

use crate::error::{PvmError, PvmResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait EnvironmentStore {
    /// The effective search path, highest priority first.
    fn search_path(&self) -> PvmResult<Vec<PathBuf>>;

    /// Puts `dir` first in the persisted search path and drops every other
    /// entry `is_stale` flags.
    fn promote(&self, dir: &Path, is_stale: &dyn Fn(&Path) -> bool) -> PvmResult<()>;

    /// A command that applies the persisted path to an already open shell.
    fn activation_hint(&self) -> Option<String> {
        None
    }

    /// The shell profile that sources the persisted path in new sessions.
    fn hooked_profile(&self) -> Option<PathBuf> {
        None
    }
}

const PROFILE_MARKER: &str = "# Added by pvm";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct EnvState {
    #[serde(default)]
    search_path: Vec<PathBuf>,
}

/// Keeps the search path in a JSON state file, writes `env.sh` and
/// `env.ps1` next to it and hooks them into a shell profile.
pub struct FileEnvStore {
    state_file: PathBuf,
    profile: Option<PathBuf>,
}

impl FileEnvStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self {
            state_file,
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: PathBuf) -> Self {
        self.profile = Some(profile);
        self
    }

    fn profile_script(profile: &Path) -> &'static str {
        let is_powershell = profile
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("ps1"))
            .unwrap_or(false);
        if is_powershell {
            "env.ps1"
        } else {
            "env.sh"
        }
    }

    /// Appends a line sourcing the matching script to the profile, once.
    fn hook_profile(&self, profile: &Path) -> PvmResult<()> {
        let script = self.script_path(Self::profile_script(profile));
        let script_str = script.display().to_string();

        let content = match fs::read_to_string(profile) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(PvmError::fs("read", profile, e)),
        };
        if content.contains(&script_str) {
            tracing::debug!("{} already sources {}", profile.display(), script_str);
            return Ok(());
        }

        let init = if Self::profile_script(profile) == "env.ps1" {
            format!("if (Test-Path {0}) {{ . {0} }}", ps_quote(&script_str))
        } else {
            format!("[ -f {0} ] && . {0}", sh_quote(&script_str))
        };
        let separator = if content.is_empty() || content.ends_with('\n') { "" } else { "\n" };
        let modified = format!("{}{}\n{}\n{}\n", content, separator, PROFILE_MARKER, init);

        if let Some(parent) = profile.parent() {
            fs::create_dir_all(parent).map_err(|e| PvmError::fs("create", parent, e))?;
        }
        fs::write(profile, modified).map_err(|e| PvmError::fs("write", profile, e))?;
        tracing::info!("Added pvm to {}", profile.display());
        Ok(())
    }

    fn script_path(&self, name: &str) -> PathBuf {
        self.state_file
            .parent()
            .map(|p| p.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }

    fn load(&self) -> Option<EnvState> {
        let content = fs::read_to_string(&self.state_file).ok()?;
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("Ignoring corrupt {}: {}", self.state_file.display(), e);
                None
            }
        }
    }

    fn save(&self, state: &EnvState) -> PvmResult<()> {
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).map_err(|e| PvmError::fs("create", parent, e))?;
        }
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| PvmError::Environment(e.to_string()))?;
        fs::write(&self.state_file, content)
            .map_err(|e| PvmError::fs("write", &self.state_file, e))?;

        if let Some(first) = state.search_path.first() {
            let sh = self.script_path("env.sh");
            fs::write(&sh, render_sh(first)).map_err(|e| PvmError::fs("write", &sh, e))?;
            let ps1 = self.script_path("env.ps1");
            fs::write(&ps1, render_ps1(first)).map_err(|e| PvmError::fs("write", &ps1, e))?;
        }
        Ok(())
    }
}

impl EnvironmentStore for FileEnvStore {
    fn search_path(&self) -> PvmResult<Vec<PathBuf>> {
        Ok(self
            .load()
            .map(|state| state.search_path)
            .unwrap_or_else(process_search_path))
    }

    fn promote(&self, dir: &Path, is_stale: &dyn Fn(&Path) -> bool) -> PvmResult<()> {
        let current = self.search_path()?;
        let mut search_path = vec![dir.to_path_buf()];
        for entry in current {
            if entry == dir {
                continue;
            }
            if is_stale(&entry) {
                tracing::info!("Removing {} from the search path", entry.display());
                continue;
            }
            search_path.push(entry);
        }

        self.save(&EnvState { search_path })?;
        tracing::info!("{} is now first on the persisted search path", dir.display());

        if let Some(profile) = &self.profile {
            self.hook_profile(profile)?;
        }
        Ok(())
    }

    fn activation_hint(&self) -> Option<String> {
        if cfg!(windows) {
            Some(format!(". {}", ps_quote(&self.script_path("env.ps1").display().to_string())))
        } else {
            Some(format!(". {}", sh_quote(&self.script_path("env.sh").display().to_string())))
        }
    }

    fn hooked_profile(&self) -> Option<PathBuf> {
        self.profile.clone()
    }
}

/// The profile of the user's usual shell: PowerShell on Windows, otherwise
/// picked from `$SHELL`.
pub fn default_profile() -> Option<PathBuf> {
    if cfg!(windows) {
        return dirs::document_dir()
            .map(|d| d.join("WindowsPowerShell").join("Microsoft.PowerShell_profile.ps1"));
    }
    let home = dirs::home_dir()?;
    let shell = std::env::var("SHELL").unwrap_or_default();
    let rc = match Path::new(&shell).file_name().and_then(|n| n.to_str()) {
        Some("zsh") => ".zshrc",
        Some("bash") => ".bashrc",
        _ => ".profile",
    };
    Some(home.join(rc))
}

pub fn process_search_path() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect())
        .unwrap_or_default()
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn render_sh(dir: &Path) -> String {
    let dir = dir.display().to_string();
    format!(
        "# Generated by pvm\ncase \":$PATH:\" in\n  *{0}*) ;;\n  *) export PATH={1}:\"$PATH\" ;;\nesac\n",
        sh_quote(&format!(":{}:", dir)),
        sh_quote(&dir)
    )
}

fn render_ps1(dir: &Path) -> String {
    let dir = ps_quote(&dir.display().to_string());
    format!(
        "# Generated by pvm\nif (-not (($env:Path -split ';') -contains {0})) {{ $env:Path = {0} + ';' + $env:Path }}\n",
        dir
    )
}

/// Opens an interactive shell whose search path starts with `dir`.
pub fn spawn_session(dir: &Path) -> std::io::Result<()> {
    let mut entries = vec![dir.to_path_buf()];
    entries.extend(process_search_path().into_iter().filter(|p| p != dir));
    let path = std::env::join_paths(entries)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "cmd", "/K", "php -v"]);
        cmd
    } else {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        Command::new(shell)
    };
    cmd.env("PATH", path);

    tracing::debug!("Spawning session: {:?}", cmd);
    if cfg!(windows) {
        cmd.spawn()?;
    } else {
        cmd.status()?;
    }
    Ok(())
}
