use crate::error::ExtractError;
use crate::models::{Document, DocumentKind, DocumentSource};
use lopdf::Document as PdfDocument;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait TextExtractor {
    fn extract(&self, source: &DocumentSource) -> Result<String, ExtractError>;
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError>;
}

/// Uses inline content verbatim and reads path sources as UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, source: &DocumentSource) -> Result<String, ExtractError> {
        match source {
            DocumentSource::Inline(text) => Ok(text.clone()),
            DocumentSource::Path(path) => Ok(fs::read_to_string(path)?),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError> {
        let document =
            PdfDocument::load(path).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

            let text = text.trim();
            if !text.is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text: text.to_string(),
                });
            }
        }

        if pages.is_empty() {
            return Err(ExtractError::NoText(path.display().to_string()));
        }

        Ok(pages)
    }
}

impl TextExtractor for LopdfExtractor {
    fn extract(&self, source: &DocumentSource) -> Result<String, ExtractError> {
        let DocumentSource::Path(path) = source else {
            return Err(ExtractError::PdfParse(
                "pdf documents must be supplied as a file path".to_string(),
            ));
        };

        let pages = self.extract_pages(path)?;
        Ok(join_pages(&pages))
    }
}

/// Page order is preserved; each page is already trimmed.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, ExtractError> {
    LopdfExtractor.extract_pages(path)
}

pub struct ExtractorRegistry {
    extractors: HashMap<DocumentKind, Box<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    pub fn register<E>(&mut self, kind: DocumentKind, extractor: E) -> &mut Self
    where
        E: TextExtractor + 'static,
    {
        self.extractors.insert(kind, Box::new(extractor));
        self
    }

    pub fn supports(&self, kind: DocumentKind) -> bool {
        self.extractors.contains_key(&kind)
    }

    pub fn extract(&self, document: &Document) -> Result<String, ExtractError> {
        let extractor = self
            .extractors
            .get(&document.kind)
            .ok_or(ExtractError::Unsupported(document.kind))?;

        extractor.extract(&document.source)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(DocumentKind::Text, PlainTextExtractor)
            .register(DocumentKind::Pdf, LopdfExtractor);
        registry
    }
}
