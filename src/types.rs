use crate::platform::{normalize_arch, BuildVariant};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_RELEASE_URL: &str = "https://windows.php.net/downloads/releases/";
pub const DEFAULT_ARCHIVE_URL: &str = "https://windows.php.net/downloads/releases/archives/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PvmSettings {
    #[serde(default = "default_home_dir")]
    pub home_dir: String,
    /// Install root; `<home_dir>/phps` when unset.
    #[serde(default)]
    pub versions_dir: Option<String>,
    /// Stable directory the active version is copied into; `<home_dir>/php_home` when unset.
    #[serde(default)]
    pub activation_dir: Option<String>,
    #[serde(default = "default_release_url")]
    pub release_url: String,
    #[serde(default = "default_archive_url")]
    pub archive_url: String,
    /// Listing scanned by the resolver.
    #[serde(default = "default_archive_url")]
    pub index_url: String,
    #[serde(default = "default_arch")]
    pub arch: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub spawn_shell: bool,
    /// Profile that sources the generated env script; picked from the login shell when unset.
    #[serde(default)]
    pub shell_profile: Option<String>,
    #[serde(default = "default_update_profile")]
    pub update_profile: bool,
}

fn default_home_dir() -> String {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pvm")
        .to_string_lossy()
        .to_string()
}
fn default_release_url() -> String {
    DEFAULT_RELEASE_URL.to_string()
}
fn default_archive_url() -> String {
    DEFAULT_ARCHIVE_URL.to_string()
}
fn default_arch() -> String {
    normalize_arch(std::env::consts::ARCH)
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_timeout_secs() -> u64 {
    600
}
fn default_update_profile() -> bool {
    true
}

impl Default for PvmSettings {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            versions_dir: None,
            activation_dir: None,
            release_url: default_release_url(),
            archive_url: default_archive_url(),
            index_url: default_archive_url(),
            arch: default_arch(),
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: default_timeout_secs(),
            spawn_shell: false,
            shell_profile: None,
            update_profile: default_update_profile(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PvmConfig {
    #[serde(default)]
    pub settings: PvmSettings,
}

/// A concrete, downloadable build of one PHP release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArtifact {
    pub version: String,
    pub variant: BuildVariant,
}

impl ReleaseArtifact {
    pub fn file_name(&self) -> String {
        self.variant.file_name(&self.version)
    }
}

/// A version present under the install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVersion {
    pub spec: String,
    pub dir_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveVersion {
    /// Activated by pvm; names the version directory that was copied.
    Managed { dir_name: String },
    /// A PHP found on the search path that pvm did not activate.
    Unmanaged { path: PathBuf },
}

impl ActiveVersion {
    pub fn dir_name(&self) -> Option<&str> {
        match self {
            ActiveVersion::Managed { dir_name } => Some(dir_name),
            ActiveVersion::Unmanaged { .. } => None,
        }
    }
}

impl std::fmt::Display for ActiveVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActiveVersion::Managed { dir_name } => write!(f, "{}", dir_name),
            ActiveVersion::Unmanaged { path } => write!(f, "{} (not managed by pvm)", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedEntry {
    pub spec: String,
    pub dir_name: String,
    pub exists: bool,
}

/// Everything under the install root, split by whether the registry knows about it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstalledListing {
    pub mapped: Vec<MappedEntry>,
    pub unmapped: Vec<String>,
}
