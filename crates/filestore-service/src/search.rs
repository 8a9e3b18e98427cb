use filestore_core::{FileEntry, StorageError};
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{Result, ServiceError, ServiceErrorCode};
use crate::service::StoreService;

pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Matched against file names
    pub pattern: Option<Regex>,
    /// Required file name suffix, e.g. `.md`
    pub extension: Option<String>,
    /// Directories deeper than this are not listed (the root is depth 0)
    pub max_depth: usize,
    /// Scan file contents instead of names
    pub include_content: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            pattern: None,
            extension: None,
            max_depth: DEFAULT_MAX_DEPTH,
            include_content: false,
            cancel: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineMatch {
    /// 1-based
    pub line_number: usize,
    /// Trimmed line text
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMatch {
    pub file: FileEntry,
    pub matched_lines: Vec<LineMatch>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResult {
    pub files: Vec<FileEntry>,
    pub matches: Vec<FileMatch>,
}

/// Case-insensitive line scan; line numbers start at 1.
pub fn matching_lines(content: &str, term: &str) -> Vec<LineMatch> {
    let needle = term.to_lowercase();
    content
        .split('\n')
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(&needle))
        .map(|(index, line)| LineMatch {
            line_number: index + 1,
            content: line.trim().to_string(),
        })
        .collect()
}

impl StoreService {
    /// Depth-first walk from the root, returning every entry found.
    ///
    /// Uses an explicit stack instead of recursion. A directory that cannot
    /// be listed is skipped; cancellation stops the walk.
    pub(crate) async fn walk(
        &self,
        max_depth: usize,
        cancel: Option<&CancellationToken>,
    ) -> std::result::Result<Vec<FileEntry>, StorageError> {
        let mut found = Vec::new();
        let mut pending = vec![(String::new(), 0usize)];

        while let Some((dir, depth)) = pending.pop() {
            if cancel.is_some_and(|token| token.is_cancelled()) {
                return Err(StorageError::Cancelled);
            }
            if depth > max_depth {
                continue;
            }

            let items = match self.call(self.repository().list_directory(&dir, None)).await {
                Ok(items) => items,
                Err(StorageError::Cancelled) => return Err(StorageError::Cancelled),
                Err(e) => {
                    warn!("Cannot read directory \"{}\": {}", dir, e);
                    continue;
                }
            };

            // Reversed so the stack pops subdirectories in listing order
            let subdirs: Vec<String> = items
                .iter()
                .filter(|item| item.is_dir())
                .map(|item| item.path.clone())
                .collect();
            pending.extend(subdirs.into_iter().rev().map(|path| (path, depth + 1)));
            found.extend(items);
        }

        Ok(found)
    }

    /// Find files by name, or by content when `include_content` is set.
    ///
    /// By name: case-insensitive substring of the file name, no content is
    /// fetched. By content: every file passing the extension and pattern
    /// filters is read and its matching lines reported.
    #[instrument(skip(self, options), level = "debug")]
    pub async fn search_files(&self, term: &str, options: SearchOptions) -> Result<SearchResult> {
        self.search(term, &options).await.map_err(|e| {
            ServiceError::wrap(
                ServiceErrorCode::SearchFailed,
                format!("Failed to search files with term \"{}\"", term),
                e,
            )
        })
    }

    async fn search(
        &self,
        term: &str,
        options: &SearchOptions,
    ) -> std::result::Result<SearchResult, StorageError> {
        let cancel = options.cancel.as_ref();
        let candidates: Vec<FileEntry> = self
            .walk(options.max_depth, cancel)
            .await?
            .into_iter()
            .filter(|entry| entry.is_file())
            .filter(|entry| {
                options
                    .extension
                    .as_deref()
                    .is_none_or(|ext| entry.name.ends_with(ext))
            })
            .filter(|entry| {
                options
                    .pattern
                    .as_ref()
                    .is_none_or(|pattern| pattern.is_match(&entry.name))
            })
            .collect();

        if !options.include_content {
            let needle = term.to_lowercase();
            let files: Vec<FileEntry> = candidates
                .into_iter()
                .filter(|entry| entry.name.to_lowercase().contains(&needle))
                .collect();
            debug!("Name search for \"{}\" found {} files", term, files.len());
            return Ok(SearchResult {
                files,
                matches: Vec::new(),
            });
        }

        let mut result = SearchResult::default();
        for candidate in candidates {
            if cancel.is_some_and(|token| token.is_cancelled()) {
                return Err(StorageError::Cancelled);
            }
            let file = match self
                .call(self.repository().retrieve_file(&candidate.path, None))
                .await
            {
                Ok(file) => file,
                Err(e) => {
                    warn!("Skipping unreadable file \"{}\": {}", candidate.path, e);
                    continue;
                }
            };

            let matched_lines = matching_lines(file.content.as_deref().unwrap_or_default(), term);
            if !matched_lines.is_empty() {
                result.matches.push(FileMatch {
                    file: file.clone(),
                    matched_lines,
                });
            }
            result.files.push(file);
        }

        debug!(
            "Content search for \"{}\" scanned {} files, {} matched",
            term,
            result.files.len(),
            result.matches.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_matches_are_one_based_and_trimmed() {
        let content = "first line\n  Needle here  \nnothing\nneedle again";
        let matches = matching_lines(content, "NEEDLE");
        assert_eq!(
            matches,
            vec![
                LineMatch {
                    line_number: 2,
                    content: "Needle here".to_string(),
                },
                LineMatch {
                    line_number: 4,
                    content: "needle again".to_string(),
                },
            ]
        );
    }

    #[test]
    fn empty_term_matches_every_line() {
        assert_eq!(matching_lines("a\nb", "").len(), 2);
    }
}
