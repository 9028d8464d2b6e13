use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
use std::path::PathBuf;

pub const DEFAULT_STORE_DIR: &str = ".file-rag";
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub store_dir: PathBuf,
    pub model: String,
    pub dimensions: usize,
    pub top_k: usize,
    pub indexed_extensions: &'static [&'static str],
    pub ignored_dirs: &'static [&'static str],
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            top_k: DEFAULT_TOP_K,
            indexed_extensions: &["py", "md", "txt", "pdf"],
            ignored_dirs: &[
                ".venv",
                "__pycache__",
                ".git",
                "node_modules",
                "dist",
                "build",
            ],
        }
    }
}
