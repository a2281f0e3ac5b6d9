//! Path containment for package-derived paths
//!
//! Every path that comes out of package markup goes through [`PathGuard`]
//! before the filesystem sees it.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{ParseError, Result};

/// Resolves package-relative paths against a fixed root
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexically normalize `rel` into a root-relative, `/`-separated path.
    ///
    /// Backslashes count as separators, `.` segments vanish, and a leading
    /// `/` means the package root. Any `..` that would climb above the root
    /// is rejected.
    pub fn normalize(&self, rel: &str) -> Result<String> {
        let unified = rel.replace('\\', "/");
        let mut parts: Vec<&str> = Vec::new();

        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(ParseError::PathTraversal {
                            path: rel.to_string(),
                        });
                    }
                }
                other => parts.push(other),
            }
        }

        Ok(parts.join("/"))
    }

    /// Resolve `rel` to an absolute path inside the root
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let normalized = self.normalize(rel)?;
        let path = if normalized.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&normalized)
        };

        // Symlinks inside the package must not lead outside it
        if path.symlink_metadata().is_ok() {
            if let (Ok(real_root), Ok(real_path)) = (fs::canonicalize(&self.root), fs::canonicalize(&path)) {
                if !real_path.starts_with(&real_root) {
                    return Err(ParseError::PathTraversal {
                        path: rel.to_string(),
                    });
                }
            }
        }

        Ok(path)
    }

    /// Resolve an href found in a document living in `base_dir`.
    ///
    /// Returns the root-relative path with the fragment (if any) re-attached.
    pub fn resolve_href(&self, base_dir: &str, href: &str) -> Result<String> {
        let (path, fragment) = split_fragment(href.trim());
        let decoded = decode_href(path);
        let joined = if decoded.starts_with('/') || base_dir.is_empty() {
            decoded
        } else {
            format!("{}/{}", base_dir, decoded)
        };

        let mut resolved = self.normalize(&joined)?;
        self.resolve(&resolved)?;
        if let Some(fragment) = fragment {
            resolved.push('#');
            resolved.push_str(fragment);
        }
        Ok(resolved)
    }

    /// Read a root-relative document as text, refusing files over `max_bytes`
    pub fn read_to_string(&self, rel: &str, max_bytes: u64) -> Result<String> {
        let path = self.resolve(rel)?;
        read_limited(&path, max_bytes).map_err(|e| ParseError::io(path, e))
    }
}

fn read_limited(path: &Path, max_bytes: u64) -> io::Result<String> {
    let file = fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.take(max_bytes.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("document exceeds {} bytes", max_bytes),
        ));
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Split `chapter.xhtml#sec1` into `("chapter.xhtml", Some("sec1"))`
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    }
}

/// Path part of an href
pub fn strip_fragment(href: &str) -> &str {
    split_fragment(href).0
}

/// Directory part of a root-relative path, empty for top-level files
pub fn parent_dir(rel: &str) -> &str {
    rel.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Hrefs pointing outside the package (web links, inline data)
pub fn is_external(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    lower.contains("://")
        || lower.starts_with("mailto:")
        || lower.starts_with("data:")
        || lower.starts_with("javascript:")
}

fn decode_href(path: &str) -> String {
    urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
