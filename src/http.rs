//! HTTP access behind a small trait so the resolver and fetcher can be
//! exercised without a network.

use crate::error::PvmError;
use crate::types::PvmSettings;
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("status {status}")]
    Status { status: u16 },

    #[error("{0}")]
    Transport(String),

    #[error("could not write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, HttpError>;

    /// Streams the body of `url` into `dest` when the server answers with a
    /// success status. Returns the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, HttpError>;
}

pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(settings: &PvmSettings) -> Result<Self, PvmError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pvm/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PvmError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_text(&self, url: &str) -> Result<String, HttpError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HttpError::Status {
                status: response.status().as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HttpError::Status {
                status: response.status().as_u16(),
            });
        }

        let total_size = response.content_length().unwrap_or(0);
        let filename = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let pb = ProgressBar::new(total_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Downloading {}", filename));

        let io_err = |source| HttpError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut file = fs::File::create(dest).map_err(io_err)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    pb.abandon_with_message("Download interrupted");
                    drop(file);
                    let _ = fs::remove_file(dest);
                    return Err(HttpError::Transport(e.to_string()));
                }
            };
            file.write_all(&chunk).map_err(io_err)?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().map_err(io_err)?;

        pb.finish_with_message("Download complete");
        Ok(downloaded)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned documents and archives, and records every URL requested.
    #[derive(Default)]
    pub struct MockHttp {
        pub pages: HashMap<String, String>,
        pub files: HashMap<String, Vec<u8>>,
        pub transport_failures: Vec<String>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockHttp {
        pub fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        pub fn with_file(mut self, url: &str, body: Vec<u8>) -> Self {
            self.files.insert(url.to_string(), body);
            self
        }

        pub fn failing(mut self, url: &str) -> Self {
            self.transport_failures.push(url.to_string());
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn record(&self, url: &str) {
            self.requests.lock().unwrap().push(url.to_string());
        }
    }

    #[async_trait]
    impl HttpClient for MockHttp {
        async fn get_text(&self, url: &str) -> Result<String, HttpError> {
            self.record(url);
            self.pages
                .get(url)
                .cloned()
                .ok_or(HttpError::Status { status: 404 })
        }

        async fn download(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
            self.record(url);
            if self.transport_failures.iter().any(|u| u == url) {
                return Err(HttpError::Transport("connection reset".to_string()));
            }
            let body = self.files.get(url).ok_or(HttpError::Status { status: 404 })?;
            fs::write(dest, body).map_err(|source| HttpError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
            Ok(body.len() as u64)
        }
    }
}
