use crate::config::RetrievalConfig;
use crate::models::{Document, DocumentKind, DocumentSet};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Lists indexable files under `folder`, relative names sorted.
pub fn discover_files(folder: &Path, config: &RetrievalConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_entry(|entry| !is_ignored_dir(entry, config))
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let indexable = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                config
                    .indexed_extensions
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            });

        if indexable {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn is_ignored_dir(entry: &DirEntry, config: &RetrievalConfig) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| config.ignored_dirs.contains(&name))
}

/// Builds the name-keyed input for a folder.
///
/// Text files are passed as paths and read during extraction, so unreadable
/// files surface as per-document skips rather than aborting the walk.
pub fn collect_documents(folder: &Path, config: &RetrievalConfig) -> DocumentSet {
    discover_files(folder, config)
        .into_iter()
        .map(|path| {
            let name = path
                .strip_prefix(folder)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            Document::path(name, path)
        })
        .collect()
}

pub fn count_by_kind(documents: &DocumentSet, kind: DocumentKind) -> usize {
    documents
        .iter()
        .filter(|document| document.kind == kind)
        .count()
}
