use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    pub fn detect(name: &str, source: &DocumentSource) -> Self {
        let by_path = match source {
            DocumentSource::Path(path) => has_pdf_suffix(&path.to_string_lossy()),
            DocumentSource::Inline(_) => false,
        };

        if by_path || has_pdf_suffix(name) {
            DocumentKind::Pdf
        } else {
            DocumentKind::Text
        }
    }
}

fn has_pdf_suffix(value: &str) -> bool {
    Path::new(value)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Inline(String),
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub source: DocumentSource,
    pub kind: DocumentKind,
}

impl Document {
    pub fn new(name: impl Into<String>, source: DocumentSource) -> Self {
        let name = name.into();
        let kind = DocumentKind::detect(&name, &source);
        Self { name, source, kind }
    }

    pub fn inline(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, DocumentSource::Inline(text.into()))
    }

    pub fn path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name, DocumentSource::Path(path.into()))
    }
}

/// Name-keyed build input.
///
/// Inserting a name that is already present replaces its document but keeps
/// its first position, the way an insertion-ordered map would.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: Vec<Document>,
    positions: HashMap<String, usize>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document: Document) -> Option<Document> {
        match self.positions.get(&document.name) {
            Some(&position) => Some(std::mem::replace(&mut self.documents[position], document)),
            None => {
                self.positions
                    .insert(document.name.clone(), self.documents.len());
                self.documents.push(document);
                None
            }
        }
    }

    pub fn insert_text(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.insert(Document::inline(name, text));
    }

    pub fn insert_path(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.insert(Document::path(name, path));
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }
}

impl FromIterator<Document> for DocumentSet {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        let mut set = DocumentSet::new();
        for document in iter {
            set.insert(document);
        }
        set
    }
}

impl<N, T> FromIterator<(N, T)> for DocumentSet
where
    N: Into<String>,
    T: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(name, text)| Document::inline(name, text))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataRecord {
    pub file_name: String,
    pub file_contents: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub position: usize,
    pub file_name: String,
    pub file_contents: String,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: Vec<SkippedDocument>,
    pub persisted: bool,
}
