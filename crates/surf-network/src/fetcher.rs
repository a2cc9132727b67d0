//! Rule List Fetcher
//!
//! Downloads filter lists and compiles them into a [`RuleSet`].
//! One fetch runs at a time; compilation happens on the blocking pool.
//! An optional on-disk cache short-circuits the download while fresh.

use crate::client::{HttpClient, HttpError};
use crate::filter_list::{CompileError, RuleSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Why a fetch produced no rule set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rule list is empty")]
    Empty,
}

impl From<HttpError> for FetchError {
    fn from(e: HttpError) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<CompileError> for FetchError {
    fn from(e: CompileError) -> Self {
        match e {
            CompileError::Empty(_) => Self::Empty,
            CompileError::Io(e) => Self::Network(e.to_string()),
        }
    }
}

/// Header line tying a cache file to the list URLs it was built from
const CACHE_HEADER: &str = "! surf-sources: ";

/// Downloaded list text kept on disk
#[derive(Debug, Clone)]
pub struct RuleListCache {
    path: PathBuf,
    max_age: Duration,
}

impl RuleListCache {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached text for `sources` if younger than the max age
    pub async fn load_fresh(&self, sources: &str) -> Option<String> {
        let metadata = tokio::fs::metadata(&self.path).await.ok()?;
        let age = metadata
            .modified()
            .ok()?
            .elapsed()
            .unwrap_or(Duration::ZERO);
        if age >= self.max_age {
            debug!("Rule cache {} is stale ({:?})", self.path.display(), age);
            return None;
        }

        let text = tokio::fs::read_to_string(&self.path).await.ok()?;
        let header = text.lines().next()?;
        if header.strip_prefix(CACHE_HEADER) != Some(sources) {
            debug!("Rule cache {} was built from other lists", self.path.display());
            return None;
        }
        Some(text)
    }

    /// Write list text; failures are logged and ignored
    pub async fn store(&self, sources: &str, text: &str) {
        if let Err(e) = self.write(sources, text).await {
            warn!("Failed to write rule cache {}: {}", self.path.display(), e);
        }
    }

    async fn write(&self, sources: &str, text: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, format!("{}{}\n{}", CACHE_HEADER, sources, text)).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}

pub struct RuleListFetcher {
    client: HttpClient,
    cache: Option<RuleListCache>,
    in_flight: Mutex<()>,
}

impl RuleListFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            cache: None,
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(HttpClient::with_defaults())
    }

    pub fn with_cache(mut self, cache: RuleListCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Download and compile a single list
    pub async fn fetch(&self, source_url: &str) -> Result<RuleSet, FetchError> {
        self.fetch_many(&[source_url.to_string()]).await
    }

    /// Download every list and compile them as one rule set. Succeeds if
    /// at least one list downloads and the combined text yields rules.
    pub async fn fetch_many(&self, source_urls: &[String]) -> Result<RuleSet, FetchError> {
        let _guard = self.in_flight.lock().await;
        let sources = source_urls.join(" ");

        if let Some(cache) = &self.cache {
            if let Some(text) = cache.load_fresh(&sources).await {
                match compile(sources.clone(), text).await {
                    Ok(set) => {
                        info!("Loaded {} rules from cache {}", set.rule_count(), cache.path().display());
                        return Ok(set);
                    }
                    Err(e) => warn!("Ignoring unusable rule cache: {}", e),
                }
            }
        }

        let mut combined = String::new();
        let mut last_error = None;
        for url in source_urls {
            match self.client.get(url).await {
                Ok(response) => {
                    let text = response.text();
                    debug!("Downloaded {} ({} bytes)", url, text.len());
                    combined.push_str(&text);
                    combined.push('\n');
                }
                Err(e) => {
                    warn!("Failed to download filter list {}: {}", url, e);
                    last_error = Some(FetchError::from(e));
                }
            }
        }

        if combined.is_empty() {
            return Err(last_error.unwrap_or(FetchError::Empty));
        }
        if combined.trim().is_empty() {
            return Err(FetchError::Empty);
        }

        let set = compile(sources.clone(), combined.clone()).await?;
        if let Some(cache) = &self.cache {
            cache.store(&sources, &combined).await;
        }
        Ok(set)
    }
}

async fn compile(name: String, text: String) -> Result<RuleSet, FetchError> {
    tokio::task::spawn_blocking(move || RuleSet::compile(&name, text.lines()))
        .await
        .map_err(|e| FetchError::Network(format!("Compile task failed: {}", e)))?
        .map_err(FetchError::from)
}
