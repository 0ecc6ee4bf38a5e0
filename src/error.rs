use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("could not read {path}: {source}")]
    AssetRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        // Keep the whole context chain; the UI shows it verbatim.
        CatalogError::Storage(format!("{err:#}"))
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
