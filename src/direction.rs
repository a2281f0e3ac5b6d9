//! Vertical writing detection
//!
//! Heuristic only. Looks at the first spine document's styles, then at the
//! package's page progression. Never fails; a miss just means horizontal.

use crate::config::ParserConfig;
use crate::markup::{Document, Element};
use crate::package::PackageDocument;
use crate::path_guard::{is_external, parent_dir, strip_fragment, PathGuard};

pub fn detect(guard: &PathGuard, package: &PackageDocument, config: &ParserConfig) -> bool {
    if let Some(first) = package.spine.first() {
        if first_document_is_vertical(guard, strip_fragment(first), config) {
            tracing::debug!("Vertical writing declared by {}", first);
            return true;
        }
    }

    if package.page_progression_direction.as_deref() == Some("rtl") {
        tracing::debug!("Package declares right-to-left page progression");
        return true;
    }

    package
        .meta_content("primary-writing-mode")
        .map(|mode| mode.to_ascii_lowercase().starts_with("vertical"))
        .unwrap_or(false)
}

fn first_document_is_vertical(guard: &PathGuard, href: &str, config: &ParserConfig) -> bool {
    let Ok(content) = guard.read_to_string(href, config.max_document_bytes) else {
        return false;
    };
    let doc = Document::parse(&content);

    let inline = doc.descendants().any(|el| {
        el.attr("style").map(is_vertical_css).unwrap_or(false)
            || (el.is("style") && is_vertical_css(&el.raw_text()))
            || el
                .attr("page-progression-direction")
                .map(|dir| dir.trim().eq_ignore_ascii_case("rtl"))
                .unwrap_or(false)
    });
    if inline {
        return true;
    }

    let base_dir = parent_dir(href);
    doc.descendants()
        .filter(|el| is_stylesheet_link(el))
        .filter_map(|el| el.attr("href"))
        .filter(|target| !is_external(target))
        .filter_map(|target| guard.resolve_href(base_dir, target).ok())
        .any(|css_path| {
            guard
                .read_to_string(strip_fragment(&css_path), config.max_document_bytes)
                .map(|css| is_vertical_css(&css))
                .unwrap_or(false)
        })
}

fn is_stylesheet_link(el: &Element) -> bool {
    el.is("link")
        && el
            .attr("rel")
            .map(|rel| {
                rel.split_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("stylesheet"))
            })
            .unwrap_or(false)
}

/// True for `writing-mode: vertical-*` (any vendor prefix) or legacy `tb-rl`
pub fn is_vertical_css(css: &str) -> bool {
    let compact: String = css
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    compact.contains("writing-mode:vertical-") || compact.contains("writing-mode:tb-rl")
}
