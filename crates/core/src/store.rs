use crate::error::{PersistenceError, Result, RetrievalError};
use crate::index::FlatL2Index;
use crate::metadata::MetadataStore;
use crate::models::{MetadataRecord, SearchHit};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";

/// A vector index and its metadata, always the same length.
#[derive(Debug, Clone)]
pub struct IndexedCorpus {
    index: FlatL2Index,
    metadata: MetadataStore,
}

impl IndexedCorpus {
    pub fn new(dimensions: usize) -> Self {
        Self {
            index: FlatL2Index::new(dimensions),
            metadata: MetadataStore::new(),
        }
    }

    pub fn from_parts(
        index: FlatL2Index,
        metadata: MetadataStore,
    ) -> Result<Self, PersistenceError> {
        if index.len() != metadata.len() {
            return Err(PersistenceError::Mismatch(format!(
                "{} vectors but {} metadata records",
                index.len(),
                metadata.len()
            )));
        }
        Ok(Self { index, metadata })
    }

    pub fn append(&mut self, records: Vec<MetadataRecord>, vectors: &[Vec<f32>]) -> Result<()> {
        if records.len() != vectors.len() {
            return Err(RetrievalError::EmbeddingCount {
                expected: records.len(),
                found: vectors.len(),
            });
        }

        self.index.add(vectors)?;
        for record in records {
            self.metadata.push(record);
        }
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let neighbors = self.index.search(query, k)?;

        Ok(neighbors
            .into_iter()
            .filter_map(|neighbor| {
                self.metadata
                    .record_at(neighbor.position)
                    .map(|record| SearchHit {
                        position: neighbor.position,
                        file_name: record.file_name.clone(),
                        file_contents: record.file_contents.clone(),
                        distance: neighbor.distance,
                    })
            })
            .collect())
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorArtifact {
    dimensions: u32,
    count: u64,
    metadata_digest: String,
    data: Vec<f32>,
}

/// Reads and writes the `vectors.bin` / `metadata.json` pair in one directory.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    root: PathBuf,
}

impl PersistenceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.root.join(VECTORS_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn exists(&self) -> bool {
        self.vectors_path().is_file() && self.metadata_path().is_file()
    }

    /// Writes both artifacts.
    ///
    /// Both files are staged before either is moved into place, and the
    /// vector file records a digest of the sidecar it was written with, so a
    /// load never pairs vectors with metadata from another build.
    pub fn save(&self, corpus: &IndexedCorpus) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.root)?;

        let index = corpus.index();
        let metadata = serde_json::to_vec_pretty(corpus.metadata().records())?;
        let artifact = VectorArtifact {
            dimensions: u32::try_from(index.dimensions()).map_err(|_| {
                PersistenceError::Mismatch(format!("dimension {} too large", index.dimensions()))
            })?,
            count: index.len() as u64,
            metadata_digest: digest(&metadata),
            data: index.vectors().flatten().copied().collect(),
        };
        let vectors = bincode::serialize(&artifact)?;

        let vectors_path = self.vectors_path();
        let metadata_path = self.metadata_path();
        let vectors_staging = stage(&vectors_path, &vectors)?;
        let metadata_staging = match stage(&metadata_path, &metadata) {
            Ok(staging) => staging,
            Err(error) => {
                discard(&vectors_staging);
                return Err(error);
            }
        };

        if let Err(error) = fs::rename(&vectors_staging, &vectors_path) {
            discard(&vectors_staging);
            discard(&metadata_staging);
            return Err(error.into());
        }
        if let Err(error) = fs::rename(&metadata_staging, &metadata_path) {
            discard(&metadata_staging);
            // the new vectors no longer match the old sidecar
            discard(&vectors_path);
            return Err(error.into());
        }

        debug!(
            root = %self.root.display(),
            count = index.len(),
            "persisted index"
        );
        Ok(())
    }

    /// Loads the persisted pair, or `None` when it is missing or unusable.
    pub fn load(&self) -> Option<IndexedCorpus> {
        let vectors_present = self.vectors_path().is_file();
        let metadata_present = self.metadata_path().is_file();

        match (vectors_present, metadata_present) {
            (false, false) => {
                debug!(root = %self.root.display(), "no persisted index");
                return None;
            }
            (true, true) => {}
            _ => {
                warn!(
                    root = %self.root.display(),
                    vectors_present,
                    metadata_present,
                    "persisted index is incomplete, ignoring it"
                );
                return None;
            }
        }

        match self.read_pair() {
            Ok(corpus) => Some(corpus),
            Err(error) => {
                warn!(root = %self.root.display(), %error, "failed to load persisted index");
                None
            }
        }
    }

    fn read_pair(&self) -> Result<IndexedCorpus, PersistenceError> {
        let artifact: VectorArtifact = bincode::deserialize(&fs::read(self.vectors_path())?)?;
        let metadata = fs::read(self.metadata_path())?;
        if digest(&metadata) != artifact.metadata_digest {
            return Err(PersistenceError::Mismatch(
                "metadata sidecar does not belong to the stored vectors".to_string(),
            ));
        }
        let records: Vec<MetadataRecord> = serde_json::from_slice(&metadata)?;

        let dimensions = artifact.dimensions as usize;
        let count = usize::try_from(artifact.count)
            .map_err(|_| PersistenceError::Mismatch("vector count overflows".to_string()))?;
        if dimensions == 0 || artifact.data.len() != count.saturating_mul(dimensions) {
            return Err(PersistenceError::Mismatch(format!(
                "vector data holds {} values, header says {count} x {dimensions}",
                artifact.data.len()
            )));
        }

        let rows: Vec<Vec<f32>> = artifact
            .data
            .chunks_exact(dimensions)
            .map(<[f32]>::to_vec)
            .collect();
        let mut index = FlatL2Index::new(dimensions);
        index
            .add(&rows)
            .map_err(|error| PersistenceError::Mismatch(error.to_string()))?;

        IndexedCorpus::from_parts(index, MetadataStore::from_records(records))
    }
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}

fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf, PersistenceError> {
    let staging = staging_path(path);
    if let Err(error) = fs::write(&staging, bytes) {
        discard(&staging);
        return Err(error.into());
    }
    Ok(staging)
}

fn discard(path: &Path) {
    if path.is_file() {
        if let Err(error) = fs::remove_file(path) {
            warn!(path = %path.display(), %error, "failed to remove stale index file");
        }
    }
}
