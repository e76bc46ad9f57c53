use crate::types::*;
use anyhow::{anyhow, Context, Result};
use dirs;
use std::fs;
use std::path::PathBuf;

pub const CONFIG_DIR_NAME: &str = ".pvm";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const REGISTRY_FILE_NAME: &str = "versions.json";
pub const ENV_STATE_FILE_NAME: &str = "environment.json";

pub const SETTING_KEYS: [&str; 12] = [
    "home_dir",
    "versions_dir",
    "activation_dir",
    "release_url",
    "archive_url",
    "index_url",
    "arch",
    "connect_timeout_secs",
    "timeout_secs",
    "spawn_shell",
    "shell_profile",
    "update_profile",
];

pub fn get_pvm_config_file_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("PVM_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);
    tracing::debug!("Config file path: {}", path.display());
    Ok(path)
}

/// Settings as stored on disk, without environment overrides.
pub fn load_config() -> Result<PvmConfig> {
    let config_path = get_pvm_config_file_path()?;

    if !config_path.exists() {
        return Ok(PvmConfig::default());
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Could not read config file at {}", config_path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Could not parse {} as JSON", config_path.display()))
}

pub fn save_config(config: &PvmConfig) -> Result<()> {
    let config_path = get_pvm_config_file_path()?;
    let config_dir = config_path
        .parent()
        .ok_or_else(|| anyhow!("Invalid config path"))?;

    fs::create_dir_all(config_dir)?;

    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)?;

    Ok(())
}

/// Stored settings with `PVM_*` environment variables applied on top.
pub fn effective_settings(config: &PvmConfig) -> PvmSettings {
    let mut settings = config.settings.clone();
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub fn apply_env_overrides(settings: &mut PvmSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(home) = var("PVM_HOME") {
        settings.home_dir = home;
    }
    if let Some(dir) = var("PVM_VERSIONS_DIR") {
        settings.versions_dir = Some(dir);
    }
    if let Some(dir) = var("PVM_ACTIVATION_DIR") {
        settings.activation_dir = Some(dir);
    }
    if let Some(url) = var("PVM_INDEX_URL") {
        settings.index_url = url;
    }
    if let Some(url) = var("PVM_RELEASE_URL") {
        settings.release_url = url;
    }
    if let Some(url) = var("PVM_ARCHIVE_URL") {
        settings.archive_url = url;
    }
    if let Some(arch) = var("PVM_ARCH") {
        settings.arch = crate::platform::normalize_arch(&arch);
    }
    if let Some(spawn) = var("PVM_SPAWN_SHELL") {
        settings.spawn_shell = parse_bool(&spawn);
    }
    if let Some(profile) = var("PVM_SHELL_PROFILE") {
        settings.shell_profile = Some(profile);
    }
    if let Some(update) = var("PVM_UPDATE_PROFILE") {
        settings.update_profile = parse_bool(&update);
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

pub fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                format!("_{}", c.to_lowercase())
            } else {
                c.to_string()
            }
        })
        .collect::<String>()
        .to_lowercase()
}

pub fn get_setting(settings: &PvmSettings, key: &str) -> Option<String> {
    let value = match normalize_key(key).as_str() {
        "home_dir" => settings.home_dir.clone(),
        "versions_dir" => settings.versions_dir.clone().unwrap_or_default(),
        "activation_dir" => settings.activation_dir.clone().unwrap_or_default(),
        "release_url" => settings.release_url.clone(),
        "archive_url" => settings.archive_url.clone(),
        "index_url" => settings.index_url.clone(),
        "arch" => settings.arch.clone(),
        "connect_timeout_secs" => settings.connect_timeout_secs.to_string(),
        "timeout_secs" => settings.timeout_secs.to_string(),
        "spawn_shell" => settings.spawn_shell.to_string(),
        "shell_profile" => settings.shell_profile.clone().unwrap_or_default(),
        "update_profile" => settings.update_profile.to_string(),
        _ => return None,
    };
    Some(value)
}

pub fn set_setting(settings: &mut PvmSettings, key: &str, value: &str) -> Result<()> {
    let key = normalize_key(key);
    let parse_secs = |v: &str| {
        v.parse::<u64>()
            .map_err(|_| anyhow!("Invalid value for '{}': expected a number of seconds", key))
    };
    match key.as_str() {
        "home_dir" => settings.home_dir = value.to_string(),
        "versions_dir" => settings.versions_dir = Some(value.to_string()),
        "activation_dir" => settings.activation_dir = Some(value.to_string()),
        "release_url" => settings.release_url = value.to_string(),
        "archive_url" => settings.archive_url = value.to_string(),
        "index_url" => settings.index_url = value.to_string(),
        "arch" => settings.arch = crate::platform::normalize_arch(value),
        "connect_timeout_secs" => settings.connect_timeout_secs = parse_secs(value)?,
        "timeout_secs" => settings.timeout_secs = parse_secs(value)?,
        "spawn_shell" => settings.spawn_shell = parse_bool(value),
        "shell_profile" => settings.shell_profile = Some(value.to_string()),
        "update_profile" => settings.update_profile = parse_bool(value),
        _ => return Err(unknown_key(&key)),
    }
    Ok(())
}

pub fn unset_setting(settings: &mut PvmSettings, key: &str) -> Result<()> {
    let key = normalize_key(key);
    let defaults = PvmSettings::default();
    match key.as_str() {
        "home_dir" => settings.home_dir = defaults.home_dir,
        "versions_dir" => settings.versions_dir = None,
        "activation_dir" => settings.activation_dir = None,
        "release_url" => settings.release_url = defaults.release_url,
        "archive_url" => settings.archive_url = defaults.archive_url,
        "index_url" => settings.index_url = defaults.index_url,
        "arch" => settings.arch = defaults.arch,
        "connect_timeout_secs" => settings.connect_timeout_secs = defaults.connect_timeout_secs,
        "timeout_secs" => settings.timeout_secs = defaults.timeout_secs,
        "spawn_shell" => settings.spawn_shell = defaults.spawn_shell,
        "shell_profile" => settings.shell_profile = None,
        "update_profile" => settings.update_profile = defaults.update_profile,
        _ => return Err(unknown_key(&key)),
    }
    Ok(())
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow!(
        "'{}' is not a valid configuration setting. Valid settings: {}",
        key,
        SETTING_KEYS.join(", ")
    )
}

/// Concrete locations derived once from settings and handed to every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub home: PathBuf,
    pub versions_dir: PathBuf,
    pub activation_dir: PathBuf,
}

impl Layout {
    pub fn from_settings(settings: &PvmSettings) -> Self {
        let home = PathBuf::from(&settings.home_dir);
        let versions_dir = settings
            .versions_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("phps"));
        let activation_dir = settings
            .activation_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("php_home"));
        Self {
            home,
            versions_dir,
            activation_dir,
        }
    }

    pub fn registry_file(&self) -> PathBuf {
        self.versions_dir.join(REGISTRY_FILE_NAME)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.home.join("downloads")
    }

    pub fn env_state_file(&self) -> PathBuf {
        self.home.join(ENV_STATE_FILE_NAME)
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.home, &self.versions_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }
        tracing::debug!(
            "Using versions dir {} and activation dir {}",
            self.versions_dir.display(),
            self.activation_dir.display()
        );
        Ok(())
    }
}
