use crate::error::{PvmError, PvmResult};
use crate::http::{HttpClient, HttpError};
use crate::platform::BuildVariant;
use crate::types::{PvmSettings, ReleaseArtifact};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

const ARCHIVE_EXTENSIONS: [&str; 4] = [".zip", ".tar.gz", ".tgz", ".tar.xz"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArchive {
    pub archive_path: PathBuf,
    /// Install directory name, taken from the archive that was actually downloaded.
    pub dir_name: String,
    pub url: String,
}

pub struct ArtifactFetcher {
    http: Arc<dyn HttpClient>,
    hosts: Vec<String>,
    download_dir: PathBuf,
}

impl ArtifactFetcher {
    pub fn new(http: Arc<dyn HttpClient>, settings: &PvmSettings, download_dir: PathBuf) -> Self {
        Self {
            http,
            hosts: vec![settings.release_url.clone(), settings.archive_url.clone()],
            download_dir,
        }
    }

    /// Every URL the artifact may live at, in the order they are tried:
    /// primary host before the archive host, the resolved variant before
    /// the other known variants.
    pub fn candidate_urls(&self, artifact: &ReleaseArtifact) -> Vec<String> {
        let mut variants = vec![artifact.variant.clone()];
        variants.extend(
            BuildVariant::all(&artifact.variant.arch)
                .into_iter()
                .filter(|v| *v != artifact.variant),
        );

        self.hosts
            .iter()
            .flat_map(|host| {
                let base = if host.ends_with('/') {
                    host.clone()
                } else {
                    format!("{}/", host)
                };
                variants
                    .iter()
                    .map(move |variant| format!("{}{}", base, variant.file_name(&artifact.version)))
            })
            .collect()
    }

    pub async fn fetch(&self, artifact: &ReleaseArtifact) -> PvmResult<FetchedArchive> {
        fs::create_dir_all(&self.download_dir)
            .map_err(|e| PvmError::fs("create", &self.download_dir, e))?;

        let candidates = self.candidate_urls(artifact);
        let mut tried = Vec::new();

        for url in candidates {
            let file_name = url_file_name(&url).to_string();
            let archive_path = self.download_dir.join(&file_name);
            tracing::info!("Trying {}", url);

            match self.http.download(&url, &archive_path).await {
                Ok(bytes) => {
                    tracing::info!("Downloaded {} ({} bytes)", url, bytes);
                    return Ok(FetchedArchive {
                        archive_path,
                        dir_name: archive_dir_name(&file_name),
                        url,
                    });
                }
                Err(HttpError::Io { path, source }) => {
                    return Err(PvmError::fs("write", path, source));
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}", url, e);
                    tried.push(format!("{} ({})", url, e));
                }
            }
        }

        Err(PvmError::DownloadExhausted {
            version: artifact.version.clone(),
            tried,
        })
    }
}

fn url_file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// `php-8.2.4-Win32-vc15-x64.zip` -> `php-8.2.4-Win32-vc15-x64`
pub fn archive_dir_name(file_name: &str) -> String {
    ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .unwrap_or(file_name)
        .to_string()
}
