use crate::embeddings::Embedder;
use crate::error::{Result, RetrievalError};
use crate::extractor::ExtractorRegistry;
use crate::models::{
    BuildReport, DocumentSet, MetadataRecord, SearchHit, SkipReason, SkippedDocument,
};
use crate::store::{IndexedCorpus, PersistenceManager};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Owns the embedder, the extractors and the current index.
///
/// The service starts out empty. [`build_index`](Self::build_index) replaces
/// the whole index; [`search`](Self::search) never changes it.
pub struct RetrievalService<E> {
    embedder: E,
    registry: ExtractorRegistry,
    persistence: Option<PersistenceManager>,
    corpus: Option<IndexedCorpus>,
}

impl<E: Embedder> RetrievalService<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            registry: ExtractorRegistry::default(),
            persistence: None,
            corpus: None,
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_persistence(mut self, store_dir: impl Into<PathBuf>) -> Self {
        self.persistence = Some(PersistenceManager::new(store_dir));
        self
    }

    /// Creates a service backed by `store_dir`, loading a previous build if
    /// one is there.
    ///
    /// A missing or damaged store leaves the service empty. A store built
    /// with a different embedding width is an error.
    pub fn open(embedder: E, store_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut service = Self::new(embedder).with_persistence(store_dir);
        service.load_persisted()?;
        Ok(service)
    }

    pub fn load_persisted(&mut self) -> Result<bool> {
        let Some(persistence) = &self.persistence else {
            return Ok(false);
        };
        let Some(corpus) = persistence.load() else {
            return Ok(false);
        };

        if corpus.dimensions() != self.embedder.dimensions() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.embedder.dimensions(),
                found: corpus.dimensions(),
            });
        }

        info!(
            root = %persistence.root().display(),
            documents = corpus.len(),
            "loaded persisted index"
        );
        self.corpus = Some(corpus);
        Ok(true)
    }

    pub fn build_index(&mut self, documents: DocumentSet) -> Result<BuildReport> {
        let mut records = Vec::with_capacity(documents.len());
        let mut skipped = Vec::new();

        for document in documents.iter() {
            match self.registry.extract(document) {
                Ok(text) if text.trim().is_empty() => {
                    warn!(document = %document.name, "no text extracted, skipping");
                    skipped.push(SkippedDocument {
                        name: document.name.clone(),
                        reason: SkipReason::Empty,
                    });
                }
                Ok(text) => records.push(MetadataRecord {
                    file_name: document.name.clone(),
                    file_contents: text,
                }),
                Err(error) => {
                    warn!(document = %document.name, %error, "extraction failed, skipping");
                    skipped.push(SkippedDocument {
                        name: document.name.clone(),
                        reason: SkipReason::Failed(error.to_string()),
                    });
                }
            }
        }

        if records.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }

        let texts: Vec<String> = records
            .iter()
            .map(|record| record.file_contents.clone())
            .collect();
        let vectors = self.embedder.encode(&texts)?;

        let mut corpus = IndexedCorpus::new(self.embedder.dimensions());
        corpus.append(records, &vectors)?;

        let persisted = match &self.persistence {
            Some(persistence) => match persistence.save(&corpus) {
                Ok(()) => true,
                Err(error) => {
                    warn!(
                        root = %persistence.root().display(),
                        %error,
                        "failed to persist index, keeping it in memory only"
                    );
                    false
                }
            },
            None => false,
        };

        let report = BuildReport {
            indexed: corpus.len(),
            skipped,
            persisted,
        };
        info!(
            indexed = report.indexed,
            skipped = report.skipped.len(),
            persisted = report.persisted,
            "index built"
        );

        self.corpus = Some(corpus);
        Ok(report)
    }

    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }

        let corpus = self
            .corpus
            .as_ref()
            .ok_or(RetrievalError::IndexNotInitialized)?;

        let query_vector = self.embedder.embed(query)?;
        let hits = corpus.search(&query_vector, top_k)?;
        debug!(top_k, hits = hits.len(), "search complete");
        Ok(hits)
    }

    /// Renders the best matches as `[name]` headed blocks for a prompt.
    pub fn context_for(&self, query: &str, top_k: usize) -> Result<String> {
        let hits = self.search(query, top_k)?;

        Ok(hits
            .iter()
            .map(|hit| format!("[{}]\n{}", hit.file_name, hit.file_contents))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    pub fn is_ready(&self) -> bool {
        self.corpus.is_some()
    }

    pub fn len(&self) -> usize {
        self.corpus.as_ref().map_or(0, IndexedCorpus::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    pub fn corpus(&self) -> Option<&IndexedCorpus> {
        self.corpus.as_ref()
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::EmbedError;
    use crate::models::Document;
    use std::fs;
    use tempfile::tempdir;

    /// Scores each text against a handful of topic word lists.
    struct TopicEmbedder;

    const TOPICS: [&[&str]; 3] = [
        &["apple", "pie", "recipe", "baking", "dessert", "cake", "oven"],
        &["rocket", "engine", "design", "space", "propulsion", "orbit", "thrust"],
        &["unique", "marker", "zebra"],
    ];

    impl Embedder for TopicEmbedder {
        fn dimensions(&self) -> usize {
            TOPICS.len()
        }

        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let lowered = text.to_lowercase();
                    let mut row: Vec<f32> = TOPICS
                        .iter()
                        .map(|words| {
                            lowered
                                .split_whitespace()
                                .filter(|token| words.contains(token))
                                .count() as f32
                        })
                        .collect();
                    crate::embeddings::normalize(&mut row);
                    row
                })
                .collect())
        }
    }

    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
        }
    }

    fn scenario() -> DocumentSet {
        vec![
            ("a.txt", "apple pie recipe"),
            ("b.txt", "rocket engine design"),
        ]
        .into_iter()
        .collect()
    }

    fn names(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|hit| hit.file_name.as_str()).collect()
    }

    #[test]
    fn search_before_build_is_not_initialized() {
        let service = RetrievalService::new(CharacterNgramEmbedder::default());
        assert!(!service.is_ready());
        assert!(matches!(
            service.search("anything", 3),
            Err(RetrievalError::IndexNotInitialized)
        ));
    }

    #[test]
    fn queries_find_the_matching_topic() {
        let mut service = RetrievalService::new(TopicEmbedder);
        service.build_index(scenario()).expect("build should succeed");

        let hits = service.search("baking dessert", 1).expect("search works");
        assert_eq!(names(&hits), vec!["a.txt"]);

        let hits = service.search("space propulsion", 1).expect("search works");
        assert_eq!(names(&hits), vec!["b.txt"]);
    }

    #[test]
    fn empty_input_is_an_empty_corpus() {
        let mut service = RetrievalService::new(CharacterNgramEmbedder::default());
        assert!(matches!(
            service.build_index(DocumentSet::new()),
            Err(RetrievalError::EmptyCorpus)
        ));
        assert!(!service.is_ready());
    }

    #[test]
    fn all_blank_documents_are_an_empty_corpus() {
        let mut service = RetrievalService::new(CharacterNgramEmbedder::default());
        let documents: DocumentSet = vec![("a.txt", "   "), ("b.txt", "\n\t")]
            .into_iter()
            .collect();
        assert!(matches!(
            service.build_index(documents),
            Err(RetrievalError::EmptyCorpus)
        ));
    }

    #[test]
    fn failed_build_keeps_the_previous_index() {
        let mut service = RetrievalService::new(TopicEmbedder);
        service.build_index(scenario()).expect("build should succeed");

        let blank: DocumentSet = vec![("c.txt", " ")].into_iter().collect();
        assert!(service.build_index(blank).is_err());
        assert_eq!(service.len(), 2);
        assert!(service.search("apple", 1).is_ok());
    }

    #[test]
    fn unreadable_documents_are_skipped_with_reasons() {
        let mut service = RetrievalService::new(CharacterNgramEmbedder::default());
        let mut documents = DocumentSet::new();
        documents.insert_text("good.md", "real words here");
        documents.insert_text("blank.md", "  ");
        documents.insert(Document::path("missing.pdf", "/definitely/not/here.pdf"));

        let report = service.build_index(documents).expect("one document survives");
        assert_eq!(report.indexed, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].name, "blank.md");
        assert_eq!(report.skipped[0].reason, SkipReason::Empty);
        assert!(matches!(report.skipped[1].reason, SkipReason::Failed(_)));
        assert!(!report.persisted);
    }

    #[test]
    fn top_k_is_capped_at_index_size() {
        let mut service = RetrievalService::new(CharacterNgramEmbedder::default());
        service.build_index(scenario()).expect("build should succeed");

        assert_eq!(service.search("recipe", 1).expect("search works").len(), 1);
        assert_eq!(service.search("recipe", 2).expect("search works").len(), 2);
        let hits = service.search("recipe", 50).expect("search works");
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let mut service = RetrievalService::new(CharacterNgramEmbedder::default());
        service.build_index(scenario()).expect("build should succeed");
        assert!(matches!(
            service.search("recipe", 0),
            Err(RetrievalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rebuild_replaces_instead_of_appending() {
        let mut service = RetrievalService::new(TopicEmbedder);
        service.build_index(scenario()).expect("build should succeed");
        let first = service.search("baking", 2).expect("search works");

        service.build_index(scenario()).expect("build should succeed");
        assert_eq!(service.len(), 2);
        assert_eq!(service.search("baking", 2).expect("search works"), first);

        let other: DocumentSet = vec![("c.txt", "orbit thrust")].into_iter().collect();
        service.build_index(other).expect("build should succeed");
        assert_eq!(names(&service.search("baking", 5).expect("search works")), vec!["c.txt"]);
    }

    #[test]
    fn duplicate_names_index_the_last_value() {
        let mut service = RetrievalService::new(TopicEmbedder);
        let documents: DocumentSet = vec![
            ("a.txt", "apple pie recipe"),
            ("b.txt", "rocket engine design"),
            ("a.txt", "zebra marker"),
        ]
        .into_iter()
        .collect();
        service.build_index(documents).expect("build should succeed");
        assert_eq!(service.len(), 2);

        let matches: Vec<_> = service
            .search("unique zebra", 5)
            .expect("search works")
            .into_iter()
            .filter(|hit| hit.file_contents.contains("zebra"))
            .collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].file_name, "a.txt");
    }

    #[test]
    fn wrong_width_embeddings_are_a_dimension_mismatch() {
        let mut service = RetrievalService::new(ShortEmbedder);
        assert!(matches!(
            service.build_index(scenario()),
            Err(RetrievalError::DimensionMismatch {
                expected: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn context_lists_matches_as_named_blocks() {
        let mut service = RetrievalService::new(TopicEmbedder);
        service.build_index(scenario()).expect("build should succeed");

        let context = service.context_for("apple dessert", 1).expect("search works");
        assert_eq!(context, "[a.txt]\napple pie recipe");
    }

    #[test]
    fn open_restores_a_persisted_build() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut service = RetrievalService::open(TopicEmbedder, dir.path())?;
        assert!(!service.is_ready());

        let report = service.build_index(scenario())?;
        assert!(report.persisted);
        let before = service.search("space", 2)?;

        let reopened = RetrievalService::open(TopicEmbedder, dir.path())?;
        assert!(reopened.is_ready());
        assert_eq!(reopened.search("space", 2)?, before);
        Ok(())
    }

    #[test]
    fn open_rejects_a_store_of_another_width() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut service = RetrievalService::open(TopicEmbedder, dir.path())?;
        service.build_index(scenario())?;

        let result = RetrievalService::open(CharacterNgramEmbedder { dimensions: 8 }, dir.path());
        assert!(matches!(
            result,
            Err(RetrievalError::DimensionMismatch {
                expected: 8,
                found: 3
            })
        ));
        Ok(())
    }

    #[test]
    fn save_failure_keeps_the_index_in_memory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file in the way")?;

        let mut service = RetrievalService::new(TopicEmbedder).with_persistence(&blocker);
        let report = service.build_index(scenario())?;
        assert!(!report.persisted);
        assert_eq!(names(&service.search("rocket", 1)?), vec!["b.txt"]);
        Ok(())
    }

    #[test]
    fn interrupted_save_never_reloads_mismatched_names() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let mut service = RetrievalService::open(TopicEmbedder, dir.path())?;
        service.build_index(scenario())?;

        fs::create_dir(dir.path().join("metadata.json.tmp"))?;
        let swapped: DocumentSet = vec![
            ("x.txt", "rocket engine design"),
            ("y.txt", "apple pie recipe"),
        ]
        .into_iter()
        .collect();
        let report = service.build_index(swapped)?;
        assert!(!report.persisted);
        let live = service.search("baking dessert", 1)?;
        assert_eq!(names(&live), vec!["y.txt"]);

        let reopened = RetrievalService::open(TopicEmbedder, dir.path())?;
        let hits = reopened.search("baking dessert", 1)?;
        assert_eq!(names(&hits), vec!["a.txt"]);
        assert_eq!(hits[0].file_contents, "apple pie recipe");
        Ok(())
    }
}
