//! Where category chunks come from.
//!
//! A source only moves bytes; JSON parsing, shape validation and timeouts
//! are the loader's job so every source gets the same treatment.

use super::LoadError;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

/// Fetches the raw body of `/categories/{index}.json`.
pub trait CategorySource: Send + Sync {
    fn fetch(&self, index: u32) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send;
}

/// Relative location of a category chunk on the published site.
pub fn category_path(index: u32) -> String {
    format!("categories/{index}.json")
}

/// Fetches chunks over HTTP from a deployed site.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    /// `base_url` is the site root, e.g. `https://nav.example.com`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn category_url(&self, index: u32) -> String {
        format!("{}/{}", self.base_url, category_path(index))
    }
}

impl CategorySource for HttpSource {
    async fn fetch(&self, index: u32) -> Result<Vec<u8>, LoadError> {
        let url = self.category_url(index);
        tracing::debug!(index, url = %url, "fetching category");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LoadError::Network {
                index,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                index,
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| LoadError::Network {
            index,
            message: e.to_string(),
        })?;
        Ok(body.to_vec())
    }
}

/// Reads chunks straight from a built site directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn category_file(&self, index: u32) -> PathBuf {
        self.root.join(category_path(index))
    }
}

impl CategorySource for DirSource {
    async fn fetch(&self, index: u32) -> Result<Vec<u8>, LoadError> {
        match tokio::fs::read(self.category_file(index)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(LoadError::Status {
                index,
                status: 404,
                reason: "Not Found".to_string(),
            }),
            Err(e) => Err(LoadError::Network {
                index,
                message: e.to_string(),
            }),
        }
    }
}
