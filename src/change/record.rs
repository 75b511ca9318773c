//! The change record value type.

use std::fmt;
use std::path::Path;

use serde::Serialize;

/// How a path changed relative to the last commit.
///
/// Only renames carry a second path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed { old_path: String },
}

impl ChangeKind {
    /// Short verb used in assistant request summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "add",
            ChangeKind::Modified => "modify",
            ChangeKind::Deleted => "delete",
            ChangeKind::Renamed { .. } => "rename",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One path's change in the working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub path: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChangeRecord {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            content: None,
        }
    }

    pub fn added(path: impl Into<String>) -> Self {
        Self::new(path, ChangeKind::Added)
    }

    pub fn modified(path: impl Into<String>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::new(path, ChangeKind::Deleted)
    }

    pub fn renamed(old_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(
            path,
            ChangeKind::Renamed {
                old_path: old_path.into(),
            },
        )
    }

    /// Source path of a rename.
    pub fn old_path(&self) -> Option<&str> {
        match &self.kind {
            ChangeKind::Renamed { old_path } => Some(old_path),
            _ => None,
        }
    }

    /// Final path component, falling back to the whole path.
    pub fn file_name(&self) -> &str {
        basename(&self.path)
    }
}

/// Final component of a slash- or platform-separated path.
pub(crate) fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}
