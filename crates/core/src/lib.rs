pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod metadata;
pub mod models;
pub mod service;
pub mod store;

pub use config::{RetrievalConfig, DEFAULT_MODEL, DEFAULT_STORE_DIR, DEFAULT_TOP_K};
#[cfg(feature = "local-embed")]
pub use embeddings::FastEmbedder;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, HttpEmbedderConfig,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbedError, ExtractError, PersistenceError, Result, RetrievalError};
pub use extractor::{
    extract_page_texts, ExtractorRegistry, LopdfExtractor, PageText, PdfExtractor,
    PlainTextExtractor, TextExtractor,
};
pub use index::{FlatL2Index, Neighbor};
pub use ingest::{collect_documents, count_by_kind, discover_files};
pub use metadata::MetadataStore;
pub use models::{
    BuildReport, Document, DocumentKind, DocumentSet, DocumentSource, MetadataRecord, SearchHit,
    SkipReason, SkippedDocument,
};
pub use service::RetrievalService;
pub use store::{IndexedCorpus, PersistenceManager, METADATA_FILE, VECTORS_FILE};
