use std::path::PathBuf;

/// Typed error taxonomy shared by every engine component.
///
/// `Io`/`Embedder` failures on a single file or chunk are swallowed and
/// logged by the caller (see the coordinator); only the variants below are
/// meant to propagate out of the public API.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embedder error: {0}")]
    Embedder(String),

    #[error("corrupt index at {path}: {detail}")]
    Corrupt { path: PathBuf, detail: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type RagResult<T> = Result<T, RagError>;

impl RagError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RagError::Io { path: path.into(), source }
    }

    pub fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        RagError::Corrupt { path: path.into(), detail: detail.into() }
    }
}
