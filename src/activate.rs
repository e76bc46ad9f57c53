//! Making one installed version the active one.
//!
//! The active version lives in a stable activation directory whose location
//! never changes, so the search path only needs updating once. Activating
//! replaces that directory's contents with a copy of the chosen version and
//! drops a marker naming it. The switch is not atomic: a crash mid-copy
//! leaves the activation directory partially populated until the next
//! successful `use`.

use crate::config::Layout;
use crate::env_store::{spawn_session, EnvironmentStore};
use crate::error::{PvmError, PvmResult};
use crate::fs_util::{copy_dir_all, reset_dir};
use crate::install::Installer;
use crate::platform::{executable_name, RUNTIME_NAME};
use crate::prompt::{Decider, Question};
use crate::registry::Registry;
use crate::resolve::clean_spec;
use crate::types::{ActiveVersion, InstalledVersion};
use std::fs;
use std::path::{Path, PathBuf};

pub const ACTIVE_MARKER: &str = ".pvm-active";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub activated: InstalledVersion,
    pub previous: Option<ActiveVersion>,
}

pub struct Activator {
    activation_dir: PathBuf,
    versions_dir: PathBuf,
    executable: String,
    store: Box<dyn EnvironmentStore>,
    spawn_shell: bool,
}

impl Activator {
    pub fn new(layout: &Layout, store: Box<dyn EnvironmentStore>, spawn_shell: bool) -> Self {
        Self {
            activation_dir: layout.activation_dir.clone(),
            versions_dir: layout.versions_dir.clone(),
            executable: executable_name().to_string(),
            store,
            spawn_shell,
        }
    }

    /// The version new sessions resolve to, if any.
    pub fn current(&self) -> Option<ActiveVersion> {
        if self.activation_dir.join(&self.executable).is_file() {
            return match fs::read_to_string(self.activation_dir.join(ACTIVE_MARKER)) {
                Ok(marker) if !marker.trim().is_empty() => Some(ActiveVersion::Managed {
                    dir_name: marker.trim().to_string(),
                }),
                _ => Some(ActiveVersion::Unmanaged {
                    path: self.activation_dir.clone(),
                }),
            };
        }

        let search_path = match self.store.search_path() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Could not read the search path: {}", e);
                return None;
            }
        };
        search_path
            .into_iter()
            .find(|entry| self.looks_like_runtime(entry))
            .map(|entry| match entry.strip_prefix(&self.versions_dir) {
                Ok(rest) if rest.components().count() == 1 => ActiveVersion::Managed {
                    dir_name: rest.to_string_lossy().to_string(),
                },
                _ => ActiveVersion::Unmanaged { path: entry },
            })
    }

    fn looks_like_runtime(&self, entry: &Path) -> bool {
        let named_like_runtime = entry
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase().contains(RUNTIME_NAME))
            .unwrap_or(false);
        named_like_runtime && entry.join(&self.executable).is_file()
    }

    pub fn has_executable(&self, installed: &InstalledVersion) -> bool {
        installed.path.join(&self.executable).is_file()
    }

    /// Copies `installed` into the activation directory and points the
    /// persisted search path at it. Returns whatever was active before.
    pub fn activate(&self, installed: &InstalledVersion) -> PvmResult<Option<ActiveVersion>> {
        if !self.has_executable(installed) {
            return Err(PvmError::ActivationIncomplete {
                spec: installed.spec.clone(),
                dir: installed.path.clone(),
                executable: self.executable.clone(),
            });
        }

        let previous = self.current();
        tracing::info!(
            "Activating {} (previously {})",
            installed.dir_name,
            previous
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        reset_dir(&self.activation_dir)?;
        copy_dir_all(&installed.path, &self.activation_dir)?;
        let marker = self.activation_dir.join(ACTIVE_MARKER);
        fs::write(&marker, &installed.dir_name).map_err(|e| PvmError::fs("write", &marker, e))?;

        let activation_dir = self.activation_dir.clone();
        let versions_dir = self.versions_dir.clone();
        let executable = self.executable.clone();
        let is_stale = move |entry: &Path| {
            entry != activation_dir
                && (entry.starts_with(&versions_dir)
                    || (entry
                        .file_name()
                        .map(|n| n.to_string_lossy().to_lowercase().contains(RUNTIME_NAME))
                        .unwrap_or(false)
                        && entry.join(&executable).is_file()))
        };
        self.store.promote(&self.activation_dir, &is_stale)?;

        self.notify_session();
        Ok(previous)
    }

    fn notify_session(&self) {
        if let Some(message) = session_message(
            self.store.activation_hint().as_deref(),
            self.store.hooked_profile().as_deref(),
        ) {
            eprintln!("{}", message);
        }
        if self.spawn_shell {
            if let Err(e) = spawn_session(&self.activation_dir) {
                tracing::warn!("Could not start a new shell: {}", e);
            }
        }
    }

    /// The `use` flow: find the installation for `spec`, offering to install
    /// or reinstall it, then activate it.
    pub async fn use_spec(
        &self,
        spec: &str,
        registry: &Registry,
        installer: &Installer,
        decider: &dyn Decider,
    ) -> PvmResult<ActivationReport> {
        let spec = clean_spec(spec);
        let installed = match registry.lookup(spec) {
            Some(installed) if self.has_executable(&installed) => installed,
            Some(installed) => {
                if !decider.confirm(&Question::ReinstallIncomplete {
                    spec,
                    dir: &installed.path,
                }) {
                    return Err(PvmError::ActivationIncomplete {
                        spec: spec.to_string(),
                        dir: installed.path,
                        executable: self.executable.clone(),
                    });
                }
                installer.reinstall(spec, decider).await?
            }
            None => {
                if !decider.confirm(&Question::InstallMissing { spec }) {
                    return Err(PvmError::NotInstalled {
                        spec: spec.to_string(),
                    });
                }
                installer.install(spec, decider).await?
            }
        };

        tracing::info!("Using {}", installed.path.display());
        let previous = self.activate(&installed)?;
        Ok(ActivationReport {
            activated: installed,
            previous,
        })
    }
}

/// What to tell the operator about shells that are already open.
fn session_message(hint: Option<&str>, profile: Option<&Path>) -> Option<String> {
    let hint = hint?;
    Some(match profile {
        Some(profile) => format!(
            "New shells load the change from {}. To update this one, run:\n  {}",
            profile.display(),
            hint
        ),
        None => format!(
            "Add this line to your shell profile so new shells pick up the change, \
             and run it now to update this one:\n  {}",
            hint
        ),
    })
}
