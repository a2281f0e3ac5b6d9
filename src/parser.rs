//! Manifest extraction entry point
//!
//! One call walks container → package → (toc, cover, direction) → assemble
//! over a read-only package root and returns an immutable [`BookManifest`].

use std::path::Path;

use crate::config::ParserConfig;
use crate::container;
use crate::cover;
use crate::direction;
use crate::error::Result;
use crate::manifest::{assemble, BookManifest};
use crate::package;
use crate::path_guard::PathGuard;
use crate::toc;

/// Stateless manifest parser
#[derive(Debug, Clone, Default)]
pub struct ManifestParser {
    config: ParserConfig,
}

impl ManifestParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse the unpacked package at `root`
    pub fn parse<P: AsRef<Path>>(&self, root: P) -> Result<BookManifest> {
        let root = root.as_ref();
        let start = std::time::Instant::now();
        let guard = PathGuard::new(root);

        let opf_path = container::locate(&guard, &self.config)?;
        let package = package::parse(&guard, &opf_path, &self.config)?;
        let toc = toc::resolve(&guard, &package, &self.config);
        let cover_href = cover::resolve(&guard, &package, &self.config);
        let vertical = direction::detect(&guard, &package, &self.config);

        tracing::info!(
            "Parsed {:?} from {}: {} spine entries, {} chapters from {:?}, cover {:?}, vertical {} in {:?}",
            package.title,
            root.display(),
            package.spine.len(),
            toc.chapters.len(),
            toc.source,
            cover_href,
            vertical,
            start.elapsed()
        );

        Ok(assemble(
            package.title,
            opf_path,
            package.spine,
            toc.chapters,
            cover_href,
            vertical,
        ))
    }
}

/// Parse with the default configuration
pub fn parse_book<P: AsRef<Path>>(root: P) -> Result<BookManifest> {
    ManifestParser::default().parse(root)
}
