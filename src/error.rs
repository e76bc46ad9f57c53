use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PvmError {
    #[error("No PHP release matches '{spec}'.\n{hints}")]
    ResolutionNotFound { spec: String, hints: String },

    #[error("Could not fetch the release index {url}: {details}")]
    IndexUnavailable { url: String, details: String },

    #[error("Download of PHP {version} failed, none of the {} candidate URLs worked:\n  {}\nSee https://windows.php.net/download for the builds that exist.", .tried.len(), .tried.join("\n  "))]
    DownloadExhausted { version: String, tried: Vec<String> },

    #[error("Could not extract {}: every extractor failed:\n  {}", .archive.display(), .attempts.join("\n  "))]
    ExtractionExhausted {
        archive: PathBuf,
        attempts: Vec<String>,
    },

    #[error("Failed to {action} {}: {source}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry {} is unreadable and was treated as empty: {details}", .path.display())]
    RegistryCorrupt { path: PathBuf, details: String },

    #[error("{} does not contain {executable}; the installation looks incomplete. Reinstall it with `pvm install {spec}`", .dir.display())]
    ActivationIncomplete {
        spec: String,
        dir: PathBuf,
        executable: String,
    },

    #[error("PHP {spec} is not installed. Install it with `pvm install {spec}`")]
    NotInstalled { spec: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Could not update the environment: {0}")]
    Environment(String),

    #[error("Could not build HTTP client: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

impl PvmError {
    pub fn fs(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type PvmResult<T> = Result<T, PvmError>;
