//! Version resolution against the windows.php.net release listings.

use crate::error::{PvmError, PvmResult};
use crate::http::HttpClient;
use crate::platform::{BuildVariant, RUNTIME_NAME};
use crate::types::{PvmSettings, ReleaseArtifact};
use regex::Regex;
use semver::Version;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct VersionResolver {
    http: Arc<dyn HttpClient>,
    index_url: String,
    arch: String,
}

impl VersionResolver {
    pub fn new(http: Arc<dyn HttpClient>, settings: &PvmSettings) -> Self {
        Self {
            http,
            index_url: settings.index_url.clone(),
            arch: settings.arch.clone(),
        }
    }

    /// Resolve `spec` ("8.2" or "8.2.3") to one concrete build.
    ///
    /// The index is downloaded on every call. Patterns are tried in variant
    /// priority order and the first one with any hit wins; within it the
    /// earliest hit in the document wins. Versions are never compared
    /// numerically, so "8.2" can resolve to an older patch release than the
    /// newest one listed.
    pub async fn resolve(&self, spec: &str) -> PvmResult<ReleaseArtifact> {
        let spec = clean_spec(spec);
        if spec.is_empty() {
            return Err(not_found(spec));
        }

        tracing::info!("Looking up PHP {} in {}", spec, self.index_url);
        let document = self
            .http
            .get_text(&self.index_url)
            .await
            .map_err(|e| PvmError::IndexUnavailable {
                url: self.index_url.clone(),
                details: e.to_string(),
            })?;

        let artifact = find_release(&document, spec, &self.arch)?.ok_or_else(|| not_found(spec))?;
        tracing::info!("Resolved {} to {}", spec, artifact.file_name());
        Ok(artifact)
    }
}

/// Strips whitespace and a leading `v` that users often type.
pub fn clean_spec(spec: &str) -> &str {
    let spec = spec.trim();
    spec.strip_prefix('v').unwrap_or(spec)
}

pub fn find_release(document: &str, spec: &str, arch: &str) -> PvmResult<Option<ReleaseArtifact>> {
    for variant in BuildVariant::all(arch) {
        let pattern = variant.pattern(spec)?;
        if let Some(caps) = pattern.captures(document) {
            tracing::debug!("Pattern {} matched {}", pattern.as_str(), &caps[0]);
            return Ok(Some(ReleaseArtifact {
                version: caps[1].to_string(),
                variant,
            }));
        }
        tracing::trace!("Pattern {} matched nothing", pattern.as_str());
    }
    Ok(None)
}

fn not_found(spec: &str) -> PvmError {
    let hints = format!(
        "Try the following:\n\
         1. Check the version number, e.g. \"8.2\" rather than \"8.22\"\n\
         2. Recent releases may need a fully-specified version, e.g. \"{}.0\" instead of \"{}\"\n\
         3. Run `pvm check` to see the versions published upstream\n\
         4. Run `pvm list` to see the versions already installed\n\
         5. Browse https://windows.php.net/download",
        spec, spec
    );
    PvmError::ResolutionNotFound {
        spec: spec.to_string(),
        hints,
    }
}

/// Every full version mentioned in a release listing, grouped by
/// `major.minor` series. Both maps are ordered oldest to newest.
pub fn available_versions(document: &str) -> PvmResult<BTreeMap<Version, Vec<Version>>> {
    let re = Regex::new(&format!(r"{}-(\d+\.\d+\.\d+)-", RUNTIME_NAME))?;

    let mut series: BTreeMap<Version, Vec<Version>> = BTreeMap::new();
    for caps in re.captures_iter(document) {
        let Ok(version) = Version::parse(&caps[1]) else {
            continue;
        };
        let key = Version::new(version.major, version.minor, 0);
        let entry = series.entry(key).or_default();
        if !entry.contains(&version) {
            entry.push(version);
        }
    }
    for versions in series.values_mut() {
        versions.sort();
    }
    Ok(series)
}

pub async fn fetch_available_versions(
    http: &dyn HttpClient,
    url: &str,
) -> PvmResult<BTreeMap<Version, Vec<Version>>> {
    let document = http
        .get_text(url)
        .await
        .map_err(|e| PvmError::IndexUnavailable {
            url: url.to_string(),
            details: e.to_string(),
        })?;
    available_versions(&document)
}
