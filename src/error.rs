//! Error types for manifest extraction
//!
//! Only terminal failures live here. Per-document problems inside the
//! table-of-contents, cover and direction tiers never surface as errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for manifest extraction
pub type Result<T> = std::result::Result<T, ParseError>;

/// Terminal parse error
#[derive(Debug, Error)]
pub enum ParseError {
    /// A path derived from package contents escapes the package root
    #[error("Path escapes package root: {path}")]
    PathTraversal { path: String },

    /// container.xml exists but declares no usable rootfile
    #[error("No rootfile declared in {}", container.display())]
    MissingRootfile { container: PathBuf },

    /// No container descriptor and no .opf file anywhere under the root
    #[error("No package document found under {}", root.display())]
    NoPackageDocument { root: PathBuf },

    /// The spine resolved to zero documents
    #[error("Package document {opf_path} has an empty spine")]
    EmptySpine { opf_path: String },

    /// Filesystem failure on a path the parse cannot do without
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The async import did not finish in time
    #[error("Import timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// The blocking import task panicked or was cancelled
    #[error("Import task failed: {0}")]
    TaskFailed(String),
}

impl ParseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ParseError::Io {
            path: path.into(),
            source,
        }
    }

    /// Name of the pipeline stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            ParseError::PathTraversal { .. } => "path-guard",
            ParseError::MissingRootfile { .. } | ParseError::NoPackageDocument { .. } => {
                "container"
            }
            ParseError::EmptySpine { .. } => "package",
            ParseError::Io { .. } => "io",
            ParseError::Timeout { .. } | ParseError::TaskFailed(_) => "import",
        }
    }
}
