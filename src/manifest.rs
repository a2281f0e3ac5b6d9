//! Book manifest types
//!
//! The serialized shape of these types is consumed by the reader client and
//! the import endpoint, so field names are part of the contract.

use serde::{Deserialize, Serialize};

/// One reading-order chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterEntry {
    /// Display title
    pub title: String,
    /// Root-relative href, possibly with a fragment
    pub href: String,
}

impl ChapterEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }
}

/// Reading metadata extracted from one unpacked package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookManifest {
    pub title: String,
    /// Root-relative path of the package document
    pub opf_path: String,
    /// Root-relative hrefs in reading order
    pub spine: Vec<String>,
    /// One entry per spine position
    pub chapters: Vec<ChapterEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_href: Option<String>,
    /// Vertical writing direction; absent means horizontal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<bool>,
}

impl BookManifest {
    pub fn is_vertical(&self) -> bool {
        self.vertical.unwrap_or(false)
    }
}

/// Compose the final manifest. No I/O, no validation.
pub fn assemble(
    title: String,
    opf_path: String,
    spine: Vec<String>,
    chapters: Vec<ChapterEntry>,
    cover_href: Option<String>,
    vertical: bool,
) -> BookManifest {
    BookManifest {
        title,
        opf_path,
        spine,
        chapters,
        cover_href,
        vertical: Some(vertical),
    }
}
