//! Manifest cache for async callers
//!
//! Parsing is synchronous filesystem work, so it runs on the blocking pool
//! and is bounded by the configured import timeout. Parsed manifests are kept
//! keyed by package root to avoid re-reading a package on every request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::config::ParserConfig;
use crate::error::{ParseError, Result};
use crate::manifest::BookManifest;
use crate::parser::ManifestParser;

/// Thread-safe manifest cache
#[derive(Clone)]
pub struct ManifestCache {
    parser: ManifestParser,
    manifests: Arc<RwLock<HashMap<PathBuf, Arc<BookManifest>>>>,
}

impl Default for ManifestCache {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl ManifestCache {
    /// Create a new empty cache
    pub fn new(config: ParserConfig) -> Self {
        Self {
            parser: ManifestParser::new(config),
            manifests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the cached manifest for `root`, parsing it on first use
    pub async fn load<P: AsRef<Path>>(&self, root: P) -> Result<Arc<BookManifest>> {
        let key = cache_key(root.as_ref());

        if let Some(manifest) = self.get(&key).await {
            return Ok(manifest);
        }

        let manifest = Arc::new(self.parse_blocking(key.clone()).await?);

        // Cache the parsed manifest
        {
            let mut manifests = self.manifests.write().await;
            manifests.insert(key, manifest.clone());
        }

        Ok(manifest)
    }

    /// Parse `root` again, replacing any cached manifest
    pub async fn reload<P: AsRef<Path>>(&self, root: P) -> Result<Arc<BookManifest>> {
        self.remove(root.as_ref()).await;
        self.load(root).await
    }

    async fn parse_blocking(&self, root: PathBuf) -> Result<BookManifest> {
        let parser = self.parser.clone();
        let seconds = parser.config().import_timeout_secs;
        let task = tokio::task::spawn_blocking(move || parser.parse(&root));

        let joined = if seconds == 0 {
            task.await
        } else {
            tokio::time::timeout(Duration::from_secs(seconds), task)
                .await
                .map_err(|_| ParseError::Timeout { seconds })?
        };

        joined.map_err(|e| ParseError::TaskFailed(e.to_string()))?
    }

    /// Get a cached manifest
    pub async fn get<P: AsRef<Path>>(&self, root: P) -> Option<Arc<BookManifest>> {
        let manifests = self.manifests.read().await;
        manifests.get(&cache_key(root.as_ref())).cloned()
    }

    /// Check if a package root is cached
    pub async fn contains<P: AsRef<Path>>(&self, root: P) -> bool {
        let manifests = self.manifests.read().await;
        manifests.contains_key(&cache_key(root.as_ref()))
    }

    /// Remove a package root from the cache
    pub async fn remove<P: AsRef<Path>>(&self, root: P) {
        let mut manifests = self.manifests.write().await;
        manifests.remove(&cache_key(root.as_ref()));
    }

    /// Clear the entire cache
    pub async fn clear(&self) {
        let mut manifests = self.manifests.write().await;
        manifests.clear();
    }

    /// Get the number of cached manifests
    pub async fn len(&self) -> usize {
        let manifests = self.manifests.read().await;
        manifests.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        let manifests = self.manifests.read().await;
        manifests.is_empty()
    }
}

fn cache_key(root: &Path) -> PathBuf {
    std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}
