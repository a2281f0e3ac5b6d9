//! Los Libros manifest extraction
//!
//! Reads an already-unpacked EPUB package and produces a [`BookManifest`]:
//! title, reading order, one chapter per spine entry, cover image and
//! writing direction. Real-world packages are routinely non-conformant, so
//! every stage past the spine degrades instead of failing.
//!
//! # Modules
//!
//! - `path_guard`: containment checks for every package-derived path
//! - `container`: locating the package document
//! - `package`: title, manifest table and spine
//! - `toc`: chapter titles from NCX, nav document or the documents themselves
//! - `cover`: cover image lookup
//! - `direction`: vertical writing detection
//! - `manifest`: the assembled output
//! - `cache`: async, timeout-bounded loading for servers
//!
//! # Usage
//!
//! ```rust,ignore
//! use libros_manifest::parse_book;
//!
//! let manifest = parse_book("/srv/library/unpacked/book-123")?;
//! println!("{} ({} chapters)", manifest.title, manifest.chapters.len());
//! ```

pub mod cache;
pub mod config;
pub mod container;
pub mod cover;
pub mod direction;
pub mod error;
pub mod manifest;
pub mod markup;
pub mod package;
pub mod parser;
pub mod path_guard;
pub mod toc;

#[cfg(test)]
mod test_helpers;

pub use cache::ManifestCache;
pub use config::ParserConfig;
pub use error::{ParseError, Result};
pub use manifest::{BookManifest, ChapterEntry};
pub use parser::{parse_book, ManifestParser};
pub use path_guard::PathGuard;
