//! File size monitoring.
//!
//! Watches source files and raises an [`Advisory`] when one grows past the
//! line threshold. What to do with an advisory is up to the caller.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::MonitorError;

pub const DEFAULT_THRESHOLD: usize = 500;

/// Extensions monitored when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["rs", "ts", "tsx", "js", "jsx", "py", "go"];

/// Directory names never monitored.
pub const IGNORED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// A file that crossed the line threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub path: PathBuf,
    pub file_name: String,
    pub line_count: usize,
    pub threshold: usize,
    pub detected_at: DateTime<Utc>,
}

impl Advisory {
    pub fn summary(&self) -> String {
        format!(
            "{} has {} lines (threshold {})",
            self.file_name, self.line_count, self.threshold
        )
    }
}

/// Number of newline-delimited segments.
///
/// A trailing newline counts as one more (empty) segment.
pub fn count_lines(content: &str) -> usize {
    content.split('\n').count()
}

#[derive(Debug, Clone)]
pub struct FileSizeMonitor {
    threshold: usize,
    extensions: Vec<String>,
    root: Option<PathBuf>,
}

impl Default for FileSizeMonitor {
    fn default() -> Self {
        Self::new(
            DEFAULT_THRESHOLD,
            DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        )
    }
}

impl FileSizeMonitor {
    /// Extensions are given without the leading dot.
    pub fn new(threshold: usize, extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Self {
            threshold,
            extensions,
            root: None,
        }
    }

    /// Judge ignored directories relative to `root`, so a project that
    /// itself lives under a `target/` directory is still monitored.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether `path` has a watched extension and lies outside ignored dirs.
    pub fn is_watched(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            return false;
        }

        let relative = self
            .root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);

        !relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|name| IGNORED_DIRS.contains(&name))
        })
    }

    /// Count the lines of `path`, returning an advisory when the count
    /// exceeds the threshold.
    pub async fn check_file(&self, path: &Path) -> Result<Option<Advisory>, MonitorError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| MonitorError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;

        let line_count = count_lines(&content);
        debug!("{}: {} lines", path.display(), line_count);

        if line_count <= self.threshold {
            return Ok(None);
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Some(Advisory {
            path: path.to_path_buf(),
            file_name,
            line_count,
            threshold: self.threshold,
            detected_at: Utc::now(),
        }))
    }

    /// Check every watched path of a create or modify event, sending
    /// advisories to `sink`. Returns how many advisories were sent.
    ///
    /// Read failures are logged and skipped.
    pub async fn handle_event(
        &self,
        event: &Event,
        sink: &mpsc::UnboundedSender<Advisory>,
    ) -> usize {
        if !is_content_event(&event.kind) {
            return 0;
        }

        let mut sent = 0;
        for path in event.paths.iter().filter(|p| self.is_watched(p)) {
            match self.check_file(path).await {
                Ok(Some(advisory)) => {
                    debug!("Advisory: {}", advisory.summary());
                    if sink.send(advisory).is_err() {
                        debug!("Advisory sink closed");
                        return sent;
                    }
                    sent += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        sent
    }

    /// Process watcher events until the event channel closes.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        sink: mpsc::UnboundedSender<Advisory>,
    ) {
        while let Some(result) = events.recv().await {
            match result {
                Ok(event) => {
                    self.handle_event(&event, &sink).await;
                }
                Err(e) => warn!("File watcher error: {}", e),
            }
        }
        debug!("File watcher channel closed");
    }
}

fn is_content_event(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Watch `root` recursively, forwarding raw events into a tokio channel.
///
/// Watching stops when the returned watcher is dropped.
pub fn watch(
    root: &Path,
) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<notify::Result<Event>>), MonitorError> {
    let (tx, rx) = mpsc::unbounded_channel();

    let to_error = |source| MonitorError::WatchFailed {
        path: root.to_path_buf(),
        source,
    };

    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })
    .map_err(to_error)?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(to_error)?;

    debug!("Watching {}", root.display());
    Ok((watcher, rx))
}
