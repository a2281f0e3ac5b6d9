//! Cover image resolution
//!
//! Tried in order: `<meta name="cover">` naming a manifest id, the manifest
//! item carrying the `cover-image` property, and finally the first image
//! embedded in the first spine document.

use crate::config::ParserConfig;
use crate::markup::Document;
use crate::package::{first_item, ManifestItem, PackageDocument};
use crate::path_guard::{is_external, parent_dir, strip_fragment, PathGuard};

/// Root-relative href of the cover image, if any tier finds one
pub fn resolve(guard: &PathGuard, package: &PackageDocument, config: &ParserConfig) -> Option<String> {
    from_meta(guard, package)
        .or_else(|| from_property(guard, package))
        .or_else(|| from_first_document(guard, package, config))
}

fn resolve_item(guard: &PathGuard, package: &PackageDocument, item: &ManifestItem) -> Option<String> {
    item.resolve(guard, package.opf_dir())
        .map_err(|e| tracing::debug!("Cover item {} rejected: {}", item.id, e))
        .ok()
}

/// Tier 1: `<meta name="cover" content="item-id"/>`
fn from_meta(guard: &PathGuard, package: &PackageDocument) -> Option<String> {
    let id = package.meta_content("cover")?;
    let item = package.manifest.get(id)?;
    resolve_item(guard, package, item)
}

/// Tier 2: manifest item flagged `cover-image`
fn from_property(guard: &PathGuard, package: &PackageDocument) -> Option<String> {
    let item = first_item(&package.manifest, |item| item.has_property("cover-image"))?;
    resolve_item(guard, package, item)
}

/// Tier 3: first `<img>` or SVG `<image>` in the first spine document
fn from_first_document(
    guard: &PathGuard,
    package: &PackageDocument,
    config: &ParserConfig,
) -> Option<String> {
    let first = strip_fragment(package.spine.first()?);
    let content = guard
        .read_to_string(first, config.max_document_bytes)
        .map_err(|e| tracing::debug!("Cannot scan {} for a cover image: {}", first, e))
        .ok()?;
    let doc = Document::parse(&content);

    let src = doc.descendants().find_map(|el| {
        let attr = if el.is("img") {
            "src"
        } else if el.is("image") {
            "href"
        } else {
            return None;
        };
        let src = el.attr(attr)?.trim();
        (!src.is_empty() && !is_external(src)).then_some(src)
    })?;

    guard
        .resolve_href(parent_dir(first), src)
        .map(|href| strip_fragment(&href).to_string())
        .map_err(|e| tracing::debug!("Embedded image {} rejected: {}", src, e))
        .ok()
}
