//! Los Libros manifest tool
//!
//! Prints the reading manifest of an unpacked EPUB package as JSON.
//!
//! Usage: `libros-manifest <package-root> [--compact]`

use std::path::PathBuf;

use anyhow::Context;
use libros_manifest::{ManifestParser, ParserConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "libros_manifest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = ParserConfig::from_env();

    let mut root: Option<PathBuf> = None;
    let mut compact = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--compact" => compact = true,
            _ if root.is_none() => root = Some(PathBuf::from(&arg)),
            _ => anyhow::bail!("unexpected argument: {}", arg),
        }
    }
    let root = root.context("usage: libros-manifest <package-root> [--compact]")?;
    let root = std::fs::canonicalize(&root)
        .with_context(|| format!("package root {} is not accessible", root.display()))?;

    let manifest = ManifestParser::new(config)
        .parse(&root)
        .map_err(|e| anyhow::anyhow!("import failed at {} stage: {}", e.stage(), e))?;

    let json = if compact {
        serde_json::to_string(&manifest)?
    } else {
        serde_json::to_string_pretty(&manifest)?
    };
    println!("{}", json);

    Ok(())
}
