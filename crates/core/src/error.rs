use crate::models::DocumentKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf had no readable page text: {0}")]
    NoText(String),

    #[error("no extractor registered for {0:?} documents")]
    Unsupported(DocumentKind),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from embedding backend: {0}")]
    Backend(String),

    #[error("embedding model error: {0}")]
    Model(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vector store encode error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("metadata sidecar error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("persisted index is inconsistent: {0}")]
    Mismatch(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("no valid text to index")]
    EmptyCorpus,

    #[error("index not initialized: build the index before searching")]
    IndexNotInitialized,

    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("embedder returned {found} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, found: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),
}

pub type Result<T, E = RetrievalError> = std::result::Result<T, E>;
