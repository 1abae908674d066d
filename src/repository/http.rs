// Shared HTTP client and a generic downloadable file

use crate::error::Error;
use crate::repository::RemoteFile;
use crate::repository::hash::{self, HashAlgorithm};
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// User-Agent string for all HTTP requests
const USER_AGENT: &str = concat!("bucket/", env!("CARGO_PKG_VERSION"));

lazy_static::lazy_static! {
    /// Shared HTTP client with proper User-Agent
    static ref CLIENT: Client = Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .expect("Failed to create HTTP client");
}

/// Get a reference to the shared HTTP client
pub fn client() -> &'static Client {
    &CLIENT
}

/// Extract a file name from the last URL path segment
pub fn file_name_from_url(url: &str) -> String {
    url.split('?')
        .next()
        .and_then(|u| u.split('/').next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("download.jar")
        .to_string()
}

/// A file served over HTTP, optionally with a digest declared by its repository.
/// Repository implementations hand these out from `RemoteVersion::files`.
///
/// The digest of the downloaded bytes is captured while streaming and
/// checked by `verify`.
pub struct HttpFile {
    name: String,
    url: String,
    declared: Option<String>,
    optional: bool,
    captured: Mutex<Option<String>>,
}

impl HttpFile {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            name: file_name_from_url(&url),
            url,
            declared: None,
            optional: false,
            captured: Mutex::new(None),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declared digest in `algorithm:hex` form
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.declared = Some(digest.into());
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn algorithm(&self) -> Result<HashAlgorithm> {
        match &self.declared {
            Some(declared) => Ok(hash::parse_hash(declared)?.0),
            None => Ok(HashAlgorithm::Sha256),
        }
    }

    fn set_captured(&self, digest: String) -> Result<()> {
        let mut captured = self
            .captured
            .lock()
            .map_err(|_| anyhow::anyhow!("digest lock poisoned for {}", self.name))?;
        *captured = Some(digest);
        Ok(())
    }
}

#[async_trait]
impl RemoteFile for HttpFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn optional(&self) -> bool {
        self.optional
    }

    async fn download(&self, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let algorithm = self.algorithm()?;

        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled.into()),
            response = CLIENT.get(&self.url).send() => response?,
        };

        if response.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("Resource not found: {}", self.url);
        }

        if !response.status().is_success() {
            anyhow::bail!("Download failed: {} ({})", self.url, response.status());
        }

        let mut hasher = algorithm.hasher();
        let mut data = Vec::new();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled.into()),
                chunk = response.chunk() => chunk?,
            };

            match chunk {
                Some(bytes) => {
                    hasher.update(&bytes);
                    data.extend_from_slice(&bytes);
                }
                None => break,
            }
        }

        debug!("Downloaded {} ({} bytes)", self.name, data.len());
        self.set_captured(hasher.finish())?;

        Ok(data)
    }

    fn verify(&self) -> Result<()> {
        let captured = self
            .captured
            .lock()
            .map_err(|_| anyhow::anyhow!("digest lock poisoned for {}", self.name))?
            .clone()
            .ok_or_else(|| anyhow::anyhow!("{} has not been downloaded", self.name))?;

        let Some(declared) = &self.declared else {
            debug!("No digest declared for {}, skipping verification", self.name);
            return Ok(());
        };

        let (algorithm, expected) = hash::parse_hash(declared)?;
        let expected = hash::format_hash(&expected, algorithm);

        if captured != expected {
            anyhow::bail!(
                "Hash mismatch for {}: expected {}, got {}",
                self.name,
                expected,
                captured
            );
        }

        Ok(())
    }
}
