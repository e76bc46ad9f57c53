//! resolve → fetch → extract → normalize → copy → seed php.ini → record.

use crate::config::Layout;
use crate::error::{PvmError, PvmResult};
use crate::extract::ExtractorChain;
use crate::fetch::ArtifactFetcher;
use crate::fs_util::copy_dir_all;
use crate::http::HttpClient;
use crate::prompt::{Decider, Question};
use crate::registry::Registry;
use crate::resolve::{clean_spec, VersionResolver};
use crate::types::{InstalledVersion, PvmSettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const INI_TEMPLATE: &str = "php.ini-development";
const INI_FILE: &str = "php.ini";

pub struct Installer {
    resolver: VersionResolver,
    fetcher: ArtifactFetcher,
    extractors: ExtractorChain,
    registry: Registry,
    versions_dir: PathBuf,
    staging_root: PathBuf,
}

impl Installer {
    pub fn new(http: Arc<dyn HttpClient>, settings: &PvmSettings, layout: &Layout) -> Self {
        Self {
            resolver: VersionResolver::new(http.clone(), settings),
            fetcher: ArtifactFetcher::new(http, settings, layout.download_dir()),
            extractors: ExtractorChain::default(),
            registry: Registry::new(layout),
            versions_dir: layout.versions_dir.clone(),
            staging_root: layout.download_dir(),
        }
    }

    #[cfg(test)]
    pub fn with_extractors(mut self, extractors: ExtractorChain) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn install(&self, spec: &str, decider: &dyn Decider) -> PvmResult<InstalledVersion> {
        self.install_into(spec, decider, false).await
    }

    /// Like `install`, for a caller that already confirmed replacing an
    /// existing installation.
    pub async fn reinstall(&self, spec: &str, decider: &dyn Decider) -> PvmResult<InstalledVersion> {
        self.install_into(spec, decider, true).await
    }

    async fn install_into(
        &self,
        spec: &str,
        decider: &dyn Decider,
        overwrite_confirmed: bool,
    ) -> PvmResult<InstalledVersion> {
        let spec = clean_spec(spec);
        let artifact = self.resolver.resolve(spec).await?;
        eprintln!("Found PHP {} ({})", artifact.version, artifact.file_name());

        let fetched = self.fetcher.fetch(&artifact).await?;
        tracing::info!("Fetched {} from {}", fetched.dir_name, fetched.url);
        let version_dir = self.versions_dir.join(&fetched.dir_name);

        let replace_existing = version_dir.exists();
        if replace_existing
            && !overwrite_confirmed
            && !decider.confirm(&Question::Overwrite {
                spec,
                dir: &version_dir,
            })
        {
            return Err(PvmError::Cancelled);
        }

        fs::create_dir_all(&self.staging_root)
            .map_err(|e| PvmError::fs("create", &self.staging_root, e))?;
        let staging = TempDir::new_in(&self.staging_root)
            .map_err(|e| PvmError::fs("create staging directory in", &self.staging_root, e))?;

        let used = self.extractors.extract(&fetched.archive_path, staging.path())?;
        tracing::info!("Extracted {} with {}", fetched.archive_path.display(), used);
        let payload = payload_root(staging.path())?;

        // The old installation stays usable until a new payload is ready.
        if replace_existing {
            tracing::info!("Replacing {}", version_dir.display());
            fs::remove_dir_all(&version_dir)
                .map_err(|e| PvmError::fs("remove", &version_dir, e))?;
        }

        tracing::info!(
            "Copying {} to {}",
            payload.display(),
            version_dir.display()
        );
        copy_dir_all(&payload, &version_dir)?;

        seed_ini(&version_dir);

        self.registry.upsert(spec, &fetched.dir_name)?;
        eprintln!("PHP {} installed to {}", spec, version_dir.display());

        Ok(InstalledVersion {
            spec: spec.to_string(),
            dir_name: fetched.dir_name,
            path: version_dir,
        })
    }
}

/// Archives that wrap everything in one top-level folder are unwrapped.
fn payload_root(staging: &Path) -> PvmResult<PathBuf> {
    let entries: Vec<PathBuf> = fs::read_dir(staging)
        .map_err(|e| PvmError::fs("read", staging, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();

    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(staging.to_path_buf()),
    }
}

/// Copies the bundled development ini into place. Failures are only logged.
fn seed_ini(version_dir: &Path) {
    let template = version_dir.join(INI_TEMPLATE);
    if !template.is_file() {
        tracing::warn!("No {} in {}, skipping {}", INI_TEMPLATE, version_dir.display(), INI_FILE);
        return;
    }
    let target = version_dir.join(INI_FILE);
    match fs::copy(&template, &target) {
        Ok(_) => tracing::info!("Created {} from {}", target.display(), INI_TEMPLATE),
        Err(e) => tracing::warn!("Could not create {}: {}", target.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::test_support::zip_bytes;
    use crate::http::mock::MockHttp;
    use crate::prompt::Fixed;
    use tempfile::TempDir;

    const INDEX: &str = "https://example.test/releases/archives/";
    const RELEASES: &str = "https://example.test/releases/";
    const ARCHIVE: &str = "php-8.2.4-Win32-vc15-x64.zip";

    struct Fixture {
        _tmp: TempDir,
        layout: Layout,
        settings: PvmSettings,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let settings = PvmSettings {
            home_dir: tmp.path().join("pvm").to_string_lossy().to_string(),
            index_url: INDEX.to_string(),
            release_url: RELEASES.to_string(),
            archive_url: INDEX.to_string(),
            arch: "x64".to_string(),
            ..PvmSettings::default()
        };
        let layout = Layout::from_settings(&settings);
        Fixture {
            _tmp: tmp,
            layout,
            settings,
        }
    }

    fn http_serving(archive: Vec<u8>) -> Arc<MockHttp> {
        let index = format!("<a href=\"{ARCHIVE}\">{ARCHIVE}</a>");
        Arc::new(
            MockHttp::default()
                .with_page(INDEX, &index)
                .with_file(&format!("{RELEASES}{ARCHIVE}"), archive),
        )
    }

    fn wrapped_archive() -> Vec<u8> {
        zip_bytes(&[
            ("php-8.2.4/", ""),
            ("php-8.2.4/php.exe", "php binary"),
            ("php-8.2.4/php", "php binary"),
            ("php-8.2.4/php.ini-development", "display_errors = On"),
            ("php-8.2.4/ext/php_curl.dll", "curl"),
        ])
    }

    #[tokio::test]
    async fn test_install_unwraps_single_folder_and_seeds_ini() {
        let fx = fixture();
        let installer = Installer::new(http_serving(wrapped_archive()), &fx.settings, &fx.layout);

        let installed = installer.install("8.2", &Fixed(false)).await.unwrap();

        assert_eq!(installed.spec, "8.2");
        assert_eq!(installed.dir_name, "php-8.2.4-Win32-vc15-x64");
        assert_eq!(installed.path, fx.layout.versions_dir.join("php-8.2.4-Win32-vc15-x64"));
        assert!(installed.path.join("php.exe").is_file());
        assert!(installed.path.join("ext/php_curl.dll").is_file());
        assert_eq!(
            fs::read_to_string(installed.path.join("php.ini")).unwrap(),
            "display_errors = On"
        );
        assert_eq!(
            installer.registry().list_all().get("8.2").map(String::as_str),
            Some("php-8.2.4-Win32-vc15-x64")
        );
    }

    #[tokio::test]
    async fn test_install_flat_archive_without_ini_template() {
        let fx = fixture();
        let archive = zip_bytes(&[("php.exe", "bin"), ("php", "bin"), ("ext/", "")]);
        let installer = Installer::new(http_serving(archive), &fx.settings, &fx.layout);

        let installed = installer.install("8.2", &Fixed(false)).await.unwrap();
        assert!(installed.path.join("php.exe").is_file());
        assert!(installed.path.join("ext").is_dir());
        assert!(!installed.path.join("php.ini").exists());
    }

    #[tokio::test]
    async fn test_reinstall_with_overwrite_keeps_one_entry() {
        let fx = fixture();
        let installer = Installer::new(http_serving(wrapped_archive()), &fx.settings, &fx.layout);

        let first = installer.install("8.2", &Fixed(true)).await.unwrap();
        fs::write(first.path.join("leftover.txt"), "stale").unwrap();
        let second = installer.install("8.2", &Fixed(true)).await.unwrap();

        assert_eq!(first.dir_name, second.dir_name);
        assert!(!second.path.join("leftover.txt").exists());
        let map = installer.registry().list_all();
        assert_eq!(map.len(), 1);
        assert_eq!(map["8.2"], "php-8.2.4-Win32-vc15-x64");
    }

    #[tokio::test]
    async fn test_declining_overwrite_cancels() {
        let fx = fixture();
        let installer = Installer::new(http_serving(wrapped_archive()), &fx.settings, &fx.layout);
        let existing = fx.layout.versions_dir.join("php-8.2.4-Win32-vc15-x64");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("keep.txt"), "mine").unwrap();

        let err = installer.install("8.2", &Fixed(false)).await.unwrap_err();
        assert!(matches!(err, PvmError::Cancelled));
        assert!(existing.join("keep.txt").is_file());
        assert!(installer.registry().list_all().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reinstall_keeps_previous_install() {
        let fx = fixture();
        let good = Installer::new(http_serving(wrapped_archive()), &fx.settings, &fx.layout);
        let first = good.install("8.2", &Fixed(true)).await.unwrap();

        let broken = Installer::new(http_serving(b"corrupt".to_vec()), &fx.settings, &fx.layout)
            .with_extractors(ExtractorChain::new(vec![Box::new(crate::extract::NativeExtractor)]));
        let err = broken.install("8.2", &Fixed(true)).await.unwrap_err();

        assert!(matches!(err, PvmError::ExtractionExhausted { .. }));
        assert_eq!(
            fs::read_to_string(first.path.join("php.exe")).unwrap(),
            "php binary"
        );
        assert_eq!(broken.registry().lookup("8.2"), Some(first));
    }

    #[tokio::test]
    async fn test_reinstall_skips_overwrite_question() {
        let fx = fixture();
        let installer = Installer::new(http_serving(wrapped_archive()), &fx.settings, &fx.layout);
        let existing = fx.layout.versions_dir.join("php-8.2.4-Win32-vc15-x64");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("stale.txt"), "old").unwrap();

        let installed = installer.reinstall("8.2", &Fixed(false)).await.unwrap();

        assert!(installed.path.join("php.exe").is_file());
        assert!(!installed.path.join("stale.txt").exists());
    }

    #[tokio::test]
    async fn test_unresolvable_spec_downloads_nothing() {
        let fx = fixture();
        let http = http_serving(wrapped_archive());
        let installer = Installer::new(http.clone(), &fx.settings, &fx.layout);

        let err = installer.install("5.6", &Fixed(true)).await.unwrap_err();
        assert!(matches!(err, PvmError::ResolutionNotFound { .. }));
        assert_eq!(http.requested(), vec![INDEX.to_string()]);
        assert!(installer.registry().list_all().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_archive_leaves_no_registry_entry() {
        let fx = fixture();
        let installer = Installer::new(http_serving(b"not a zip".to_vec()), &fx.settings, &fx.layout)
            .with_extractors(ExtractorChain::new(vec![Box::new(crate::extract::NativeExtractor)]));

        let err = installer.install("8.2", &Fixed(true)).await.unwrap_err();
        assert!(matches!(err, PvmError::ExtractionExhausted { .. }));
        assert!(installer.registry().list_all().is_empty());
    }

    #[test]
    fn test_payload_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("inner")).unwrap();
        assert_eq!(payload_root(tmp.path()).unwrap(), tmp.path().join("inner"));

        fs::write(tmp.path().join("README"), "").unwrap();
        assert_eq!(payload_root(tmp.path()).unwrap(), tmp.path());
    }
}
