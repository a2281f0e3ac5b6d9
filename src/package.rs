//! OPF package document parsing
//!
//! Extracts the title, manifest table and resolved spine. The parsed
//! `<meta>` entries and spine attributes are kept around for the cover and
//! direction detectors.

use std::collections::{BTreeSet, HashMap};

use crate::config::ParserConfig;
use crate::error::{ParseError, Result};
use crate::markup::{Document, Element};
use crate::path_guard::{parent_dir, strip_fragment, PathGuard};

/// Manifest item (resource in the package)
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestItem {
    /// Unique ID within the package
    pub id: String,
    /// Href as declared, relative to the package document
    pub href: String,
    /// Whitespace-separated `properties` (nav, cover-image, ...)
    pub properties: BTreeSet<String>,
    /// MIME type
    pub media_type: Option<String>,
    /// Declaration position in the manifest
    pub index: usize,
}

impl ManifestItem {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties.contains(property)
    }

    /// Root-relative path of this item, fragment stripped
    pub fn resolve(&self, guard: &PathGuard, opf_dir: &str) -> Result<String> {
        guard
            .resolve_href(opf_dir, &self.href)
            .map(|href| strip_fragment(&href).to_string())
    }
}

/// A `<meta name=... content=...>` element from the package metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetaEntry {
    pub name: Option<String>,
    pub content: Option<String>,
}

/// Manifest table keyed by item id
pub type ManifestTable = HashMap<String, ManifestItem>;

/// First declared manifest item matching `pred`
pub fn first_item<'a>(
    manifest: &'a ManifestTable,
    pred: impl Fn(&ManifestItem) -> bool,
) -> Option<&'a ManifestItem> {
    manifest
        .values()
        .filter(|item| pred(item))
        .min_by_key(|item| item.index)
}

/// Parsed package document
#[derive(Debug, Clone)]
pub struct PackageDocument {
    /// Root-relative path of the OPF file
    pub opf_path: String,
    pub title: String,
    pub metas: Vec<MetaEntry>,
    pub manifest: ManifestTable,
    /// Root-relative hrefs in reading order
    pub spine: Vec<String>,
    /// `spine/@toc`, the legacy NCX reference
    pub toc_id: Option<String>,
    /// `spine/@page-progression-direction`
    pub page_progression_direction: Option<String>,
}

impl PackageDocument {
    /// Directory holding the package document
    pub fn opf_dir(&self) -> &str {
        parent_dir(&self.opf_path)
    }

    /// Content of the first `<meta name=...>` entry
    pub fn meta_content(&self, name: &str) -> Option<&str> {
        self.metas
            .iter()
            .filter(|meta| {
                meta.name
                    .as_deref()
                    .map(|n| n.eq_ignore_ascii_case(name))
                    .unwrap_or(false)
            })
            .find_map(|meta| meta.content.as_deref())
            .map(str::trim)
            .filter(|content| !content.is_empty())
    }
}

/// Read and parse the package document at `opf_path`
pub fn parse(guard: &PathGuard, opf_path: &str, config: &ParserConfig) -> Result<PackageDocument> {
    let content = guard.read_to_string(opf_path, config.max_document_bytes)?;
    parse_str(guard, opf_path, &content, &config.default_title)
}

/// Parse package document markup already in memory
pub fn parse_str(
    guard: &PathGuard,
    opf_path: &str,
    content: &str,
    default_title: &str,
) -> Result<PackageDocument> {
    let doc = Document::parse(content);
    let package = doc
        .root()
        .find("package")
        .unwrap_or_else(|| doc.root());
    let metadata = package.find("metadata");

    let title = metadata
        .and_then(extract_title)
        .unwrap_or_else(|| default_title.to_string());
    let metas = metadata.map(extract_metas).unwrap_or_default();
    let manifest = package.find("manifest").map(extract_manifest).unwrap_or_default();

    let spine_el = package.find("spine");
    let opf_dir = parent_dir(opf_path);
    let spine = match spine_el {
        Some(el) => resolve_spine(guard, opf_dir, el, &manifest)?,
        None => Vec::new(),
    };

    if spine.is_empty() {
        return Err(ParseError::EmptySpine {
            opf_path: opf_path.to_string(),
        });
    }

    let toc_id = spine_el
        .and_then(|el| el.attr("toc"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    let page_progression_direction = spine_el
        .and_then(|el| el.attr("page-progression-direction"))
        .map(|dir| dir.trim().to_ascii_lowercase());

    tracing::debug!(
        "Parsed {}: {} manifest items, {} spine entries",
        opf_path,
        manifest.len(),
        spine.len()
    );

    Ok(PackageDocument {
        opf_path: opf_path.to_string(),
        title,
        metas,
        manifest,
        spine,
        toc_id,
        page_progression_direction,
    })
}

/// First non-empty title in the metadata block, however deeply it is nested
fn extract_title(metadata: &Element) -> Option<String> {
    metadata
        .descendants()
        .filter(|el| el.is("title"))
        .map(|el| {
            let text = el.text_content();
            if text.is_empty() {
                // Some generators put the title in an attribute
                el.attr("content").map(|c| c.trim().to_string()).unwrap_or_default()
            } else {
                text
            }
        })
        .find(|text| !text.is_empty())
}

fn extract_metas(metadata: &Element) -> Vec<MetaEntry> {
    metadata
        .descendants()
        .filter(|el| el.is("meta"))
        .map(|el| MetaEntry {
            name: el.attr("name").map(str::to_string),
            content: el.attr("content").map(str::to_string),
        })
        .collect()
}

/// Duplicate ids overwrite earlier entries
fn extract_manifest(manifest: &Element) -> ManifestTable {
    let mut table = ManifestTable::new();

    for (index, el) in manifest.descendants().filter(|el| el.is("item")).enumerate() {
        let (Some(id), Some(href)) = (el.attr("id"), el.attr("href")) else {
            continue;
        };
        let (id, href) = (id.trim(), href.trim());
        if id.is_empty() || href.is_empty() {
            continue;
        }

        let item = ManifestItem {
            id: id.to_string(),
            href: href.to_string(),
            properties: el
                .attr("properties")
                .map(|p| p.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            media_type: el.attr("media-type").map(|m| m.trim().to_string()),
            index,
        };

        if table.insert(item.id.clone(), item).is_some() {
            tracing::debug!("Duplicate manifest id {}, keeping the later item", id);
        }
    }

    table
}

fn resolve_spine(
    guard: &PathGuard,
    opf_dir: &str,
    spine: &Element,
    manifest: &ManifestTable,
) -> Result<Vec<String>> {
    let mut hrefs = Vec::new();

    for itemref in spine.children_named("itemref") {
        let Some(idref) = itemref.attr("idref").map(str::trim) else {
            continue;
        };
        match manifest.get(idref) {
            Some(item) => hrefs.push(item.resolve(guard, opf_dir)?),
            None => tracing::debug!("Spine idref {} not in manifest, skipping", idref),
        }
    }

    Ok(hrefs)
}
