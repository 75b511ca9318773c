//! Turn raw repository status entries into change records.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::change::record::{ChangeKind, ChangeRecord};
use crate::error::StatusEntryError;

/// One raw status line, using porcelain-style single-character codes.
///
/// `?` marks an untracked file, `' '` means unchanged on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: String,
    pub index_status: String,
    pub worktree_status: String,
    /// Source path for renames.
    pub old_path: Option<String>,
}

impl StatusEntry {
    pub fn new(path: impl Into<String>, index_status: &str, worktree_status: &str) -> Self {
        Self {
            path: path.into(),
            index_status: index_status.to_string(),
            worktree_status: worktree_status.to_string(),
            old_path: None,
        }
    }

    pub fn with_old_path(mut self, old_path: impl Into<String>) -> Self {
        self.old_path = Some(old_path.into());
        self
    }

    /// Whether either side of the entry carries one of `codes`.
    fn has_code(&self, codes: &[&str]) -> bool {
        [self.index_status.trim(), self.worktree_status.trim()]
            .iter()
            .any(|s| codes.contains(s))
    }
}

/// Result of a collection pass: the records that could be built plus the
/// entries that were skipped.
#[derive(Debug, Default)]
pub struct Collection {
    pub records: Vec<ChangeRecord>,
    pub errors: Vec<StatusEntryError>,
}

impl Collection {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Builds change records from status entries.
///
/// Content loading is off by default; when on, file content is read relative
/// to `workdir` for everything except deletions.
#[derive(Debug, Clone)]
pub struct StatusCollector {
    workdir: PathBuf,
    load_content: bool,
}

impl StatusCollector {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            load_content: false,
        }
    }

    pub fn with_content(mut self, load_content: bool) -> Self {
        self.load_content = load_content;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Collect one record per entry. A failing entry is logged and skipped;
    /// it never aborts the pass.
    pub fn collect(&self, entries: &[StatusEntry]) -> Collection {
        let mut collection = Collection::default();

        for entry in entries {
            match self.collect_entry(entry) {
                Ok(record) => collection.records.push(record),
                Err(e) => {
                    warn!("Skipping status entry: {}", e);
                    collection.errors.push(e);
                }
            }
        }

        debug!(
            "Collected {} change records ({} skipped)",
            collection.records.len(),
            collection.errors.len()
        );

        collection
    }

    fn collect_entry(&self, entry: &StatusEntry) -> Result<ChangeRecord, StatusEntryError> {
        if entry.path.trim().is_empty() {
            return Err(StatusEntryError::EmptyPath);
        }

        let kind = derive_kind(entry)?;
        let mut record = ChangeRecord::new(entry.path.clone(), kind);

        if self.load_content && record.kind != ChangeKind::Deleted {
            let full_path = self.workdir.join(&entry.path);
            let content = std::fs::read_to_string(&full_path).map_err(|source| {
                StatusEntryError::Unreadable {
                    path: entry.path.clone(),
                    source,
                }
            })?;
            record.content = Some(content);
        }

        Ok(record)
    }
}

/// Derive the change kind from the status codes. First match wins:
/// added/untracked, then deleted, then renamed, otherwise modified.
pub fn derive_kind(entry: &StatusEntry) -> Result<ChangeKind, StatusEntryError> {
    if entry.has_code(&["A", "?", "??"]) {
        return Ok(ChangeKind::Added);
    }
    if entry.has_code(&["D"]) {
        return Ok(ChangeKind::Deleted);
    }
    if entry.has_code(&["R"]) {
        let old_path = entry
            .old_path
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| StatusEntryError::MissingRenameSource(entry.path.clone()))?;
        return Ok(ChangeKind::Renamed { old_path });
    }
    Ok(ChangeKind::Modified)
}
