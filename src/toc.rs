//! Chapter list resolution
//!
//! Three sources are tried in order and the first non-empty one wins:
//!
//! 1. the legacy NCX referenced from the spine,
//! 2. the EPUB 3 navigation document,
//! 3. the spine documents themselves (page titles, file names).
//!
//! Whatever tier 1 or 2 produced is then merged onto the spine so there is
//! exactly one chapter per spine entry, in spine order.

use crate::config::ParserConfig;
use crate::manifest::ChapterEntry;
use crate::markup::{Document, Element};
use crate::package::{first_item, ManifestItem, PackageDocument};
use crate::path_guard::{is_external, parent_dir, strip_fragment, PathGuard};

/// Media type of legacy NCX documents
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Which tier supplied the chapter titles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocSource {
    LegacyToc,
    NavDocument,
    Scraped,
}

/// Chapters merged onto the spine, plus where the titles came from
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedToc {
    pub chapters: Vec<ChapterEntry>,
    pub source: TocSource,
}

pub fn resolve(guard: &PathGuard, package: &PackageDocument, config: &ParserConfig) -> ResolvedToc {
    let legacy = legacy_toc(guard, package, config);
    if !legacy.is_empty() {
        return ResolvedToc {
            chapters: merge(guard, &package.spine, &legacy, config),
            source: TocSource::LegacyToc,
        };
    }

    let nav = nav_toc(guard, package, config);
    if !nav.is_empty() {
        return ResolvedToc {
            chapters: merge(guard, &package.spine, &nav, config),
            source: TocSource::NavDocument,
        };
    }

    tracing::debug!("No usable NCX or nav document, deriving chapters from the spine");
    ResolvedToc {
        chapters: scrape(guard, &package.spine, config),
        source: TocSource::Scraped,
    }
}

/// Read a manifest item and parse it, or give up quietly
fn load_item(
    guard: &PathGuard,
    package: &PackageDocument,
    item: &ManifestItem,
    config: &ParserConfig,
) -> Option<(String, Document)> {
    let path = item
        .resolve(guard, package.opf_dir())
        .map_err(|e| tracing::debug!("TOC item {} rejected: {}", item.id, e))
        .ok()?;
    let content = guard
        .read_to_string(&path, config.max_document_bytes)
        .map_err(|e| tracing::debug!("TOC document {} unreadable: {}", path, e))
        .ok()?;
    Some((path, Document::parse(&content)))
}

/// Tier 1: NCX navMap, depth-first pre-order
pub fn legacy_toc(
    guard: &PathGuard,
    package: &PackageDocument,
    config: &ParserConfig,
) -> Vec<ChapterEntry> {
    let item = match &package.toc_id {
        Some(id) => package.manifest.get(id),
        None => first_item(&package.manifest, |item| {
            item.media_type
                .as_deref()
                .map(|m| m.eq_ignore_ascii_case(NCX_MEDIA_TYPE))
                .unwrap_or(false)
        }),
    };
    let Some(item) = item else {
        return Vec::new();
    };
    let Some((path, doc)) = load_item(guard, package, item, config) else {
        return Vec::new();
    };
    let Some(nav_map) = doc.find("navMap") else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    let mut stack: Vec<&Element> = nav_map.children_named("navPoint").collect();
    stack.reverse();

    while let Some(point) = stack.pop() {
        let label = point
            .child("navLabel")
            .map(|label| match label.child("text") {
                Some(text) => text.text_content(),
                None => label.text_content(),
            })
            .unwrap_or_default();
        let target = point
            .child("content")
            .and_then(|content| content.attr("src"))
            .unwrap_or_default();

        if !label.is_empty() && !target.trim().is_empty() {
            if let Some(href) = resolve_target(guard, &path, target) {
                entries.push(ChapterEntry::new(label, href));
            }
        }

        let start = stack.len();
        stack.extend(point.children_named("navPoint"));
        stack[start..].reverse();
    }

    tracing::debug!("NCX {} yielded {} entries", path, entries.len());
    entries
}

/// Tier 2: links inside the navigation document's toc block
pub fn nav_toc(
    guard: &PathGuard,
    package: &PackageDocument,
    config: &ParserConfig,
) -> Vec<ChapterEntry> {
    let Some(item) = first_item(&package.manifest, |item| item.has_property("nav")) else {
        return Vec::new();
    };
    let Some((path, doc)) = load_item(guard, package, item, config) else {
        return Vec::new();
    };

    let block = doc
        .descendants()
        .find(|el| is_toc_block(el))
        .unwrap_or_else(|| doc.root());

    let entries: Vec<ChapterEntry> = block
        .descendants()
        .filter(|el| el.is("a"))
        .filter_map(|a| {
            let target = a.attr("href")?;
            let title = a.text_content();
            if title.is_empty() || target.trim().is_empty() {
                return None;
            }
            Some(ChapterEntry::new(title, resolve_target(guard, &path, target)?))
        })
        .collect();

    tracing::debug!("Nav document {} yielded {} entries", path, entries.len());
    entries
}

fn is_toc_block(el: &Element) -> bool {
    // `type` and `epub:type` may both be present
    let typed = el
        .attr_values("type")
        .any(|t| t.split_whitespace().any(|t| t.eq_ignore_ascii_case("toc")));
    let role = el
        .attr("role")
        .map(|r| r.trim().eq_ignore_ascii_case("doc-toc"))
        .unwrap_or(false);
    typed || role
}

fn resolve_target(guard: &PathGuard, toc_path: &str, target: &str) -> Option<String> {
    let target = target.trim();
    if is_external(target) {
        return None;
    }
    if target.starts_with('#') {
        return Some(format!("{}{}", toc_path, target));
    }
    guard
        .resolve_href(parent_dir(toc_path), target)
        .map_err(|e| tracing::debug!("Dropping TOC target {}: {}", target, e))
        .ok()
}

/// Tier 3: one derived entry per spine document
pub fn scrape(guard: &PathGuard, spine: &[String], config: &ParserConfig) -> Vec<ChapterEntry> {
    spine
        .iter()
        .enumerate()
        .map(|(index, href)| {
            ChapterEntry::new(derived_title(guard, index, href, config), href.clone())
        })
        .collect()
}

/// Walk the spine, preferring the earliest TOC entry for each document
pub fn merge(
    guard: &PathGuard,
    spine: &[String],
    toc: &[ChapterEntry],
    config: &ParserConfig,
) -> Vec<ChapterEntry> {
    spine
        .iter()
        .enumerate()
        .map(|(index, href)| {
            let doc = strip_fragment(href);
            match toc.iter().find(|entry| strip_fragment(&entry.href) == doc) {
                Some(entry) => entry.clone(),
                None => ChapterEntry::new(derived_title(guard, index, href, config), href.clone()),
            }
        })
        .collect()
}

/// Page title, then file stem, then "Chapter N"
fn derived_title(guard: &PathGuard, index: usize, href: &str, config: &ParserConfig) -> String {
    page_title(guard, href, config)
        .or_else(|| file_label(href))
        .unwrap_or_else(|| format!("Chapter {}", index + 1))
}

/// `<title>` text of a content document
pub fn page_title(guard: &PathGuard, href: &str, config: &ParserConfig) -> Option<String> {
    let content = guard
        .read_to_string(strip_fragment(href), config.max_document_bytes)
        .map_err(|e| tracing::debug!("Cannot read {} for its title: {}", href, e))
        .ok()?;
    let doc = Document::parse(&content);
    doc.find("head")
        .and_then(|head| head.find("title"))
        .or_else(|| doc.find("title"))
        .map(|title| title.text_content())
        .filter(|title| !title.is_empty())
}

/// File name with the extension dropped
fn file_label(href: &str) -> Option<String> {
    let name = strip_fragment(href).rsplit('/').next()?;
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    };
    let stem = stem.trim();
    (!stem.is_empty()).then(|| stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package;
    use crate::test_helpers::{package_root, xhtml};

    fn opf(manifest: &str, spine_attrs: &str, itemrefs: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>T</dc:title></metadata>
  <manifest>{}</manifest>
  <spine {}>{}</spine>
</package>"#,
            manifest, spine_attrs, itemrefs
        )
    }

    const CHAPTER_ITEMS: &str = r#"
        <item id="c1" href="Text/c1.xhtml" media-type="application/xhtml+xml"/>
        <item id="c2" href="Text/c2.xhtml" media-type="application/xhtml+xml"/>
        <item id="c3" href="Text/c3.xhtml" media-type="application/xhtml+xml"/>"#;

    const ITEMREFS: &str = r#"<itemref idref="c1"/><itemref idref="c2"/><itemref idref="c3"/>"#;

    const NCX: &str = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="p1" playOrder="1">
      <navLabel><text>Opening</text></navLabel>
      <content src="Text/c1.xhtml#start"/>
      <navPoint id="p1a">
        <navLabel><text>No target</text></navLabel>
      </navPoint>
    </navPoint>
    <navPoint id="p3" playOrder="2">
      <navLabel><text>Closing</text></navLabel>
      <content src="Text/c3.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

    const NAV: &str = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Nav</title></head>
<body>
  <nav epub:type="landmarks"><ol><li><a href="Text/c2.xhtml">Landmark</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <ol>
      <li><a href="Text/c1.xhtml">Nav <b>One</b></a></li>
      <li><a href="Text/c2.xhtml">Nav Two</a>
        <ol><li><a href="Text/c2.xhtml#part">Nav Two, Part</a></li></ol>
      </li>
      <li><a href="http://example.com">External</a></li>
    </ol>
  </nav>
</body>
</html>"#;

    fn load(files: &[(&str, &str)]) -> (tempfile::TempDir, PathGuard, PackageDocument) {
        let dir = package_root(files);
        let guard = PathGuard::new(dir.path());
        let pkg = package::parse(&guard, "OEBPS/content.opf", &ParserConfig::default()).unwrap();
        (dir, guard, pkg)
    }

    #[test]
    fn test_legacy_toc_merged_onto_spine() {
        let manifest = format!(
            r#"{}<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
            CHAPTER_ITEMS
        );
        let c2 = xhtml("Middle Page", "<p>two</p>");
        let opf = opf(&manifest, r#"toc="ncx""#, ITEMREFS);
        let (_dir, guard, pkg) = load(&[
            ("OEBPS/content.opf", opf.as_str()),
            ("OEBPS/toc.ncx", NCX),
            ("OEBPS/Text/c2.xhtml", c2.as_str()),
        ]);

        let toc = resolve(&guard, &pkg, &ParserConfig::default());
        assert_eq!(toc.source, TocSource::LegacyToc);
        assert_eq!(
            toc.chapters,
            vec![
                ChapterEntry::new("Opening", "OEBPS/Text/c1.xhtml#start"),
                ChapterEntry::new("Middle Page", "OEBPS/Text/c2.xhtml"),
                ChapterEntry::new("Closing", "OEBPS/Text/c3.xhtml"),
            ]
        );
    }

    #[test]
    fn test_legacy_toc_wins_over_nav() {
        let manifest = format!(
            r#"{}<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
               <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
            CHAPTER_ITEMS
        );
        let opf = opf(&manifest, r#"toc="ncx""#, ITEMREFS);
        let (_dir, guard, pkg) = load(&[
            ("OEBPS/content.opf", opf.as_str()),
            ("OEBPS/toc.ncx", NCX),
            ("OEBPS/nav.xhtml", NAV),
        ]);

        let toc = resolve(&guard, &pkg, &ParserConfig::default());
        assert_eq!(toc.source, TocSource::LegacyToc);
        assert!(toc.chapters.iter().all(|c| !c.title.starts_with("Nav")));
        // c2 has no document on disk and no NCX entry
        assert_eq!(toc.chapters[1].title, "c2");
    }

    #[test]
    fn test_ncx_found_by_media_type() {
        let manifest = format!(
            r#"{}<item id="whatever" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
            CHAPTER_ITEMS
        );
        let opf = opf(&manifest, "", ITEMREFS);
        let (_dir, guard, pkg) = load(&[("OEBPS/content.opf", opf.as_str()), ("OEBPS/toc.ncx", NCX)]);

        let entries = legacy_toc(&guard, &pkg, &ParserConfig::default());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Opening");
    }

    #[test]
    fn test_nav_document_tier() {
        let manifest = format!(
            r#"{}<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
            CHAPTER_ITEMS
        );
        let opf = opf(&manifest, "", ITEMREFS);
        let (_dir, guard, pkg) = load(&[("OEBPS/content.opf", opf.as_str()), ("OEBPS/nav.xhtml", NAV)]);

        let entries = nav_toc(&guard, &pkg, &ParserConfig::default());
        assert_eq!(
            entries,
            vec![
                ChapterEntry::new("Nav One", "OEBPS/Text/c1.xhtml"),
                ChapterEntry::new("Nav Two", "OEBPS/Text/c2.xhtml"),
                ChapterEntry::new("Nav Two, Part", "OEBPS/Text/c2.xhtml#part"),
            ]
        );

        let toc = resolve(&guard, &pkg, &ParserConfig::default());
        assert_eq!(toc.source, TocSource::NavDocument);
        assert_eq!(toc.chapters.len(), 3);
        assert_eq!(toc.chapters[1].title, "Nav Two");
        assert_eq!(toc.chapters[2].title, "c3");
    }

    #[test]
    fn test_nav_without_toc_marker_uses_whole_document() {
        let manifest = format!(
            r#"{}<item id="nav" href="nav.xhtml" properties="nav"/>"#,
            CHAPTER_ITEMS
        );
        let nav = r#"<html><body><div role="navigation">
            <p><a href="Text/c3.xhtml">Only Three</a></p></div></body></html>"#;
        let opf = opf(&manifest, "", ITEMREFS);
        let (_dir, guard, pkg) = load(&[("OEBPS/content.opf", opf.as_str()), ("OEBPS/nav.xhtml", nav)]);

        let entries = nav_toc(&guard, &pkg, &ParserConfig::default());
        assert_eq!(entries, vec![ChapterEntry::new("Only Three", "OEBPS/Text/c3.xhtml")]);
    }

    #[test]
    fn test_nav_block_found_by_role() {
        let manifest = format!(
            r#"{}<item id="nav" href="nav.xhtml" properties="nav"/>"#,
            CHAPTER_ITEMS
        );
        let nav = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml"><body>
  <nav role="doc-pagelist"><ol><li><a href="Text/c1.xhtml#p1">Page 1</a></li></ol></nav>
  <section role="doc-toc"><ol>
    <li><a href="Text/c2.xhtml">Role Two</a></li>
    <li><a href="Text/c3.xhtml">Role Three</a></li>
  </ol></section>
  <nav role="doc-landmarks"><a href="Text/c1.xhtml">Start</a></nav>
</body></html>"#;
        let opf = opf(&manifest, "", ITEMREFS);
        let (_dir, guard, pkg) = load(&[("OEBPS/content.opf", opf.as_str()), ("OEBPS/nav.xhtml", nav)]);

        let entries = nav_toc(&guard, &pkg, &ParserConfig::default());
        assert_eq!(
            entries,
            vec![
                ChapterEntry::new("Role Two", "OEBPS/Text/c2.xhtml"),
                ChapterEntry::new("Role Three", "OEBPS/Text/c3.xhtml"),
            ]
        );
    }

    #[test]
    fn test_nav_block_with_plain_type_attribute() {
        let manifest = format!(
            r#"{}<item id="nav" href="nav.xhtml" properties="nav"/>"#,
            CHAPTER_ITEMS
        );
        let nav = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops"><body>
  <nav epub:type="landmarks"><a href="Text/c3.xhtml">Landmark</a></nav>
  <nav type="menu" epub:type="toc"><ol><li><a href="Text/c1.xhtml">Typed One</a></li></ol></nav>
</body></html>"#;
        let opf = opf(&manifest, "", ITEMREFS);
        let (_dir, guard, pkg) = load(&[("OEBPS/content.opf", opf.as_str()), ("OEBPS/nav.xhtml", nav)]);

        let entries = nav_toc(&guard, &pkg, &ParserConfig::default());
        assert_eq!(entries, vec![ChapterEntry::new("Typed One", "OEBPS/Text/c1.xhtml")]);
    }

    #[test]
    fn test_scraped_tier() {
        let c1 = xhtml("First Light", "<p>one</p>");
        let c2 = xhtml("   ", "<p>two</p>");
        let manifest = r#"
            <item id="c1" href="Text/c1.xhtml"/>
            <item id="c2" href="Text/part-two.xhtml"/>
            <item id="c3" href="Text/.xhtml"/>"#;
        let opf = opf(manifest, r#"toc="missing""#, ITEMREFS);
        let (_dir, guard, pkg) = load(&[
            ("OEBPS/content.opf", opf.as_str()),
            ("OEBPS/Text/c1.xhtml", c1.as_str()),
            ("OEBPS/Text/part-two.xhtml", c2.as_str()),
        ]);

        let toc = resolve(&guard, &pkg, &ParserConfig::default());
        assert_eq!(toc.source, TocSource::Scraped);
        assert_eq!(
            toc.chapters,
            vec![
                ChapterEntry::new("First Light", "OEBPS/Text/c1.xhtml"),
                ChapterEntry::new("part-two", "OEBPS/Text/part-two.xhtml"),
                ChapterEntry::new("Chapter 3", "OEBPS/Text/.xhtml"),
            ]
        );
    }

    #[test]
    fn test_escaping_toc_targets_dropped() {
        let manifest = format!(
            r#"{}<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
            CHAPTER_ITEMS
        );
        let ncx = r#"<ncx><navMap>
            <navPoint><navLabel><text>Evil</text></navLabel><content src="../../../etc/passwd"/></navPoint>
            <navPoint><navLabel><text>Good</text></navLabel><content src="Text/c2.xhtml"/></navPoint>
            </navMap></ncx>"#;
        let opf = opf(&manifest, r#"toc="ncx""#, ITEMREFS);
        let (_dir, guard, pkg) = load(&[("OEBPS/content.opf", opf.as_str()), ("OEBPS/toc.ncx", ncx)]);

        let entries = legacy_toc(&guard, &pkg, &ParserConfig::default());
        assert_eq!(entries, vec![ChapterEntry::new("Good", "OEBPS/Text/c2.xhtml")]);
    }

    #[test]
    fn test_file_label() {
        assert_eq!(file_label("OEBPS/Text/ch01.xhtml#x").as_deref(), Some("ch01"));
        assert_eq!(file_label("README").as_deref(), Some("README"));
        assert_eq!(file_label("OEBPS/.xhtml"), None);
    }
}
