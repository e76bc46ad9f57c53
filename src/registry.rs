//! The version spec → directory registry kept in `versions.json` at the install root.

use crate::config::Layout;
use crate::error::{PvmError, PvmResult};
use crate::platform::RUNTIME_NAME;
use crate::types::{InstalledListing, InstalledVersion, MappedEntry};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Registry {
    file: PathBuf,
    root: PathBuf,
}

impl Registry {
    pub fn new(layout: &Layout) -> Self {
        Self::at(layout.registry_file(), layout.versions_dir.clone())
    }

    pub fn at(file: PathBuf, root: PathBuf) -> Self {
        Self { file, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The whole mapping. A missing or unreadable file is an empty registry.
    pub fn list_all(&self) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(&self.file) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not read {}: {}", self.file.display(), e);
                }
                return BTreeMap::new();
            }
        };

        if content.trim().is_empty() {
            return BTreeMap::new();
        }

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                let err = PvmError::RegistryCorrupt {
                    path: self.file.clone(),
                    details: e.to_string(),
                };
                tracing::warn!("{}", err);
                BTreeMap::new()
            }
        }
    }

    pub fn upsert(&self, spec: &str, dir_name: &str) -> PvmResult<()> {
        let mut map = self.list_all();
        map.insert(spec.to_string(), dir_name.to_string());

        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent).map_err(|e| PvmError::fs("create", parent, e))?;
        }
        let content = serde_json::to_string_pretty(&map)
            .map_err(|e| PvmError::fs("serialize", &self.file, e.into()))?;
        fs::write(&self.file, content).map_err(|e| PvmError::fs("write", &self.file, e))?;

        tracing::info!("Recorded {} => {}", spec, dir_name);
        Ok(())
    }

    /// Finds the installation for `spec`: the registry entry when its
    /// directory still exists, otherwise the first installed directory
    /// whose name starts with the artifact prefix for `spec`.
    pub fn lookup(&self, spec: &str) -> Option<InstalledVersion> {
        if let Some(dir_name) = self.list_all().get(spec) {
            let path = self.root.join(dir_name);
            if path.is_dir() {
                return Some(InstalledVersion {
                    spec: spec.to_string(),
                    dir_name: dir_name.clone(),
                    path,
                });
            }
            tracing::warn!(
                "Registry maps {} to {}, which no longer exists",
                spec,
                path.display()
            );
        }

        let dir_name = self
            .installed_dirs()
            .into_iter()
            .find(|name| matches_spec(name, spec))?;
        tracing::debug!("Found {} for {} by directory name", dir_name, spec);
        Some(InstalledVersion {
            spec: spec.to_string(),
            path: self.root.join(&dir_name),
            dir_name,
        })
    }

    /// Names of every version directory under the install root, sorted.
    pub fn installed_dirs(&self) -> Vec<String> {
        let prefix = format!("{}-", RUNTIME_NAME);
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with(&prefix))
            .collect()
    }

    pub fn list_installed(&self) -> InstalledListing {
        let map = self.list_all();
        let mapped = map
            .iter()
            .map(|(spec, dir_name)| MappedEntry {
                spec: spec.clone(),
                dir_name: dir_name.clone(),
                exists: self.root.join(dir_name).is_dir(),
            })
            .collect();
        let unmapped = self
            .installed_dirs()
            .into_iter()
            .filter(|name| !map.values().any(|v| v == name))
            .collect();

        InstalledListing { mapped, unmapped }
    }
}

/// `php-8.2.4-Win32-vc15-x64` matches "8.2", "8.2.4" and "8", not "8.20".
fn matches_spec(dir_name: &str, spec: &str) -> bool {
    let prefix = format!("{}-{}", RUNTIME_NAME, spec);
    match dir_name.strip_prefix(&prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('-'),
        None => false,
    }
}
