//! Configuration for manifest extraction

use serde::Deserialize;
use std::env;

const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 16 * 1024 * 1024;
const DEFAULT_SCAN_MAX_DEPTH: usize = 8;
const DEFAULT_IMPORT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Markup documents larger than this are treated as unreadable
    pub max_document_bytes: u64,
    /// Directory depth searched when container.xml is missing
    pub scan_max_depth: usize,
    /// Title used when the package declares none
    pub default_title: String,
    /// Upper bound on an async import, 0 disables it
    pub import_timeout_secs: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            scan_max_depth: DEFAULT_SCAN_MAX_DEPTH,
            default_title: "Untitled".to_string(),
            import_timeout_secs: DEFAULT_IMPORT_TIMEOUT_SECS,
        }
    }
}

impl ParserConfig {
    pub fn from_env() -> Self {
        let defaults = ParserConfig::default();
        ParserConfig {
            max_document_bytes: parse_var("LIBROS_MAX_DOCUMENT_BYTES", defaults.max_document_bytes),
            scan_max_depth: parse_var("LIBROS_SCAN_MAX_DEPTH", defaults.scan_max_depth),
            default_title: env::var("LIBROS_DEFAULT_TITLE")
                .ok()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(defaults.default_title),
            import_timeout_secs: parse_var(
                "LIBROS_IMPORT_TIMEOUT_SECS",
                defaults.import_timeout_secs,
            ),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value {:?} for {}, using default", raw, name);
            default
        }),
        Err(_) => default,
    }
}
