//! Package document discovery
//!
//! The OPF location normally comes from `META-INF/container.xml`. Packages
//! unpacked by sloppy tools sometimes lose that file, in which case the tree
//! is scanned for the first `.opf` file instead.

use std::fs;
use std::path::Path;

use crate::config::ParserConfig;
use crate::error::{ParseError, Result};
use crate::markup::Document;
use crate::path_guard::{strip_fragment, PathGuard};

/// Fixed container descriptor location
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Package document file extension
pub const PACKAGE_EXTENSION: &str = "opf";

/// Find the package document, returning its root-relative path
pub fn locate(guard: &PathGuard, config: &ParserConfig) -> Result<String> {
    match find_container(guard)? {
        Some(container) => {
            let content = guard.read_to_string(&container, config.max_document_bytes)?;
            let rootfile = first_rootfile(&content).ok_or_else(|| ParseError::MissingRootfile {
                container: guard.root().join(&container),
            })?;
            let opf_path = strip_fragment(&guard.resolve_href("", &rootfile)?).to_string();
            tracing::debug!("container.xml declares package document {}", opf_path);
            Ok(opf_path)
        }
        None => {
            tracing::debug!(
                "No container.xml under {}, scanning for .{} files",
                guard.root().display(),
                PACKAGE_EXTENSION
            );
            let found = scan(guard.root(), "", 0, config.scan_max_depth)
                .map_err(|e| ParseError::io(guard.root(), e))?;
            let rel = found.ok_or_else(|| ParseError::NoPackageDocument {
                root: guard.root().to_path_buf(),
            })?;
            // Re-check through the guard in case the scan crossed a symlink
            guard.resolve(&rel)?;
            Ok(rel)
        }
    }
}

/// Locate container.xml, tolerating case differences in its path
fn find_container(guard: &PathGuard) -> Result<Option<String>> {
    if guard.resolve(CONTAINER_PATH)?.is_file() {
        return Ok(Some(CONTAINER_PATH.to_string()));
    }

    let Some(meta_inf) = find_entry_ignore_case(guard.root(), "META-INF", true) else {
        return Ok(None);
    };
    let Some(container) = find_entry_ignore_case(&guard.root().join(&meta_inf), "container.xml", false)
    else {
        return Ok(None);
    };

    let rel = format!("{}/{}", meta_inf, container);
    guard.resolve(&rel)?;
    Ok(Some(rel))
}

fn find_entry_ignore_case(dir: &Path, name: &str, want_dir: bool) -> Option<String> {
    let entries = fs::read_dir(dir).ok()?;
    entries.filter_map(|entry| entry.ok()).find_map(|entry| {
        let file_name = entry.file_name().to_str()?.to_string();
        let file_type = entry.file_type().ok()?;
        let kind_ok = if want_dir {
            file_type.is_dir()
        } else {
            file_type.is_file()
        };
        (kind_ok && file_name.eq_ignore_ascii_case(name)).then_some(file_name)
    })
}

/// First non-empty `rootfile/@full-path` in a container descriptor
fn first_rootfile(content: &str) -> Option<String> {
    let doc = Document::parse(content);
    doc.descendants()
        .filter(|el| el.is("rootfile"))
        .filter_map(|el| el.attr("full-path"))
        .map(str::trim)
        .find(|path| !path.is_empty())
        .map(str::to_string)
}

/// Depth-first scan, visiting each directory's entries in lexicographic order
fn scan(dir: &Path, rel: &str, depth: usize, max_depth: usize) -> std::io::Result<Option<String>> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let child_rel = if rel.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", rel, name)
        };

        if file_type.is_dir() {
            if depth >= max_depth {
                continue;
            }
            match scan(&entry.path(), &child_rel, depth + 1, max_depth) {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => {}
                Err(e) => tracing::debug!("Skipping unreadable directory {}: {}", child_rel, e),
            }
        } else if file_type.is_file() && has_package_extension(&name) {
            return Ok(Some(child_rel));
        }
    }

    Ok(None)
}

fn has_package_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(PACKAGE_EXTENSION))
        .unwrap_or(false)
}
