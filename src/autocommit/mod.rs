//! Autocommit: collect status, write a message, stage, commit.
//!
//! The message comes from (in order) an explicit caller message, the
//! assistant, or the deterministic synthesizer. Assistant failures never fail
//! the commit; repository failures always do.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::assistant::Assistant;
use crate::change::{
    ChangeRecord, ClassifiedGroups, StatusCollector, StatusEntry, classify_all,
    synthesize_message,
};
use crate::error::CommitError;
use crate::git::{GitRepo, Identity, Repo};

/// Where the commit message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    Explicit,
    Assistant,
    Synthesized,
}

impl fmt::Display for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageSource::Explicit => "explicit",
            MessageSource::Assistant => "assistant",
            MessageSource::Synthesized => "synthesized",
        })
    }
}

/// Successful result of an autocommit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutocommitOutcome {
    Committed {
        id: String,
        message: String,
        source: MessageSource,
        files: usize,
    },
    NothingToCommit,
}

/// Classification of the pending changes without committing anything.
#[derive(Debug, Clone)]
pub struct Preview {
    pub groups: ClassifiedGroups,
    pub message: String,
    pub skipped: usize,
}

/// Runs autocommits against one repository, one at a time.
///
/// The mutex around the repository doubles as the in-flight flag: a call that
/// finds it held is rejected with [`CommitError::InFlight`] instead of queuing.
pub struct AutoCommitter<R: Repo> {
    repo: Mutex<Option<R>>,
    assistant: Option<Assistant>,
}

impl<R: Repo> AutoCommitter<R> {
    /// An autocommitter with no repository attached yet.
    pub fn new(assistant: Option<Assistant>) -> Self {
        Self {
            repo: Mutex::new(None),
            assistant,
        }
    }

    pub fn with_repo(repo: R, assistant: Option<Assistant>) -> Self {
        Self {
            repo: Mutex::new(Some(repo)),
            assistant,
        }
    }

    /// Attach (or replace) the repository.
    pub async fn attach(&self, repo: R) {
        *self.repo.lock().await = Some(repo);
    }

    /// Commit all pending changes.
    ///
    /// A non-blank `explicit_message` is used as is; otherwise the assistant
    /// is asked first when configured, then the synthesizer.
    pub async fn autocommit(
        &self,
        explicit_message: Option<&str>,
    ) -> Result<AutocommitOutcome, CommitError> {
        let guard = self.repo.try_lock().map_err(|_| CommitError::InFlight)?;

        let (entries, workdir) = {
            let repo = guard.as_ref().ok_or(CommitError::Uninitialized)?;
            (repo.status()?, repo.workdir())
        };

        if entries.is_empty() {
            info!("Nothing to commit");
            return Ok(AutocommitOutcome::NothingToCommit);
        }

        let collection = StatusCollector::new(workdir).collect(&entries);
        for record in &collection.records {
            debug!("Change: {} ({})", record.path, record.kind);
        }

        let (message, source) = self
            .compose_message(explicit_message, &collection.records)
            .await;

        let repo = guard.as_ref().ok_or(CommitError::Uninitialized)?;
        let paths = staged_paths(&entries);
        repo.add(&paths)?;
        let id = repo.commit(&message)?;

        info!("Committed {} ({} message, {} paths)", id, source, paths.len());

        Ok(AutocommitOutcome::Committed {
            id,
            message,
            source,
            files: entries.len(),
        })
    }

    /// Classify pending changes and render the synthesized message.
    pub async fn preview(&self) -> Result<Preview, CommitError> {
        let guard = self.repo.lock().await;
        let repo = guard.as_ref().ok_or(CommitError::Uninitialized)?;

        let entries = repo.status()?;
        let collection = StatusCollector::new(repo.workdir()).collect(&entries);
        let groups = classify_all(collection.records);
        let message = synthesize_message(&groups);

        Ok(Preview {
            groups,
            message,
            skipped: collection.errors.len(),
        })
    }

    async fn compose_message(
        &self,
        explicit_message: Option<&str>,
        records: &[ChangeRecord],
    ) -> (String, MessageSource) {
        if let Some(message) = explicit_message.map(str::trim).filter(|m| !m.is_empty()) {
            return (message.to_string(), MessageSource::Explicit);
        }

        if let Some(assistant) = &self.assistant {
            match assistant.request_commit_message(records).await {
                Ok(message) => return (message, MessageSource::Assistant),
                Err(e) => warn!("Assistant commit message unavailable: {}. Using synthesized message.", e),
            }
        }

        let groups = classify_all(records.iter().cloned());
        (synthesize_message(&groups), MessageSource::Synthesized)
    }
}

impl AutoCommitter<GitRepo> {
    /// Open the repository at `workdir`, bootstrapping one on first use.
    pub fn open(
        workdir: &Path,
        identity: Option<Identity>,
        assistant: Option<Assistant>,
    ) -> Result<Self, CommitError> {
        let (repo, bootstrapped) = GitRepo::open_or_bootstrap(workdir, identity)?;
        if bootstrapped {
            info!("Bootstrapped new repository at {}", workdir.display());
        }
        Ok(Self::with_repo(repo, assistant))
    }
}

/// Every path touched by the status, including rename sources.
fn staged_paths(entries: &[StatusEntry]) -> Vec<String> {
    let mut paths = BTreeSet::new();
    for entry in entries {
        if !entry.path.is_empty() {
            paths.insert(entry.path.clone());
        }
        if let Some(old) = &entry.old_path {
            paths.insert(old.clone());
        }
    }
    paths.into_iter().collect()
}
