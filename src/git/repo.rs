//! Repository operations used by autocommit, implemented with git2.

use std::io::Write;
use std::path::{Path, PathBuf};

use git2::{
    ErrorCode, IndexAddOption, Repository, Signature, Status, StatusEntry as GitStatusEntry,
    StatusOptions,
};
use tracing::{debug, info};

use crate::change::StatusEntry;
use crate::error::CommitError;

/// Message of the commit made when a repository is first created.
pub const BOOTSTRAP_MESSAGE: &str = "Initial commit";

/// Ignore file written into freshly initialized repositories.
pub const DEFAULT_GITIGNORE: &str = "# Build output
target/
dist/
out/
node_modules/

# Environment
.env
.env.local

# Editor settings
.vscode/*
!.vscode/settings.json
!.vscode/tasks.json
!.vscode/launch.json
!.vscode/extensions.json
.idea/

# OS files
.DS_Store
Thumbs.db
";

/// Repository operations the autocommit flow depends on.
#[cfg_attr(test, mockall::automock)]
pub trait Repo: Send {
    /// Root of the working tree.
    fn workdir(&self) -> PathBuf;

    /// Pending changes, one entry per path.
    fn status(&self) -> Result<Vec<StatusEntry>, CommitError>;

    /// Stage the given pathspecs, including deletions.
    fn add(&self, paths: &[String]) -> Result<(), CommitError>;

    /// Commit the index on HEAD, returning the new commit id.
    fn commit(&self, message: &str) -> Result<String, CommitError>;
}

/// Author identity used instead of the git config `user.*` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// A git2-backed repository.
pub struct GitRepo {
    repo: Repository,
    identity: Option<Identity>,
}

impl GitRepo {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self, CommitError> {
        match Repository::discover(path) {
            Ok(repo) => Ok(Self {
                repo,
                identity: None,
            }),
            Err(e) if e.code() == ErrorCode::NotFound => {
                Err(CommitError::NotARepository(path.to_path_buf()))
            }
            Err(e) => Err(CommitError::OpenFailed(e)),
        }
    }

    /// Create a new, empty repository at `path`.
    pub fn init(path: &Path) -> Result<Self, CommitError> {
        let repo = Repository::init(path).map_err(|e| CommitError::InitFailed(e.to_string()))?;
        info!("Initialized git repository at {}", path.display());
        Ok(Self {
            repo,
            identity: None,
        })
    }

    /// Open the repository at `path`, creating and bootstrapping one if none
    /// exists. Returns whether a bootstrap happened.
    ///
    /// Bootstrapping writes a default `.gitignore` (an existing one is kept),
    /// stages it, and makes the first commit.
    pub fn open_or_bootstrap(
        path: &Path,
        identity: Option<Identity>,
    ) -> Result<(Self, bool), CommitError> {
        match Self::open(path) {
            Ok(repo) => Ok((repo.with_identity(identity), false)),
            Err(CommitError::NotARepository(_)) => {
                let repo = Self::init(path)?.with_identity(identity);
                repo.bootstrap()?;
                Ok((repo, true))
            }
            Err(e) => Err(e),
        }
    }

    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// The underlying git2 repository.
    pub fn inner(&self) -> &Repository {
        &self.repo
    }

    fn bootstrap(&self) -> Result<(), CommitError> {
        write_default_gitignore(&self.workdir())?;
        self.add(&[".gitignore".to_string()])?;
        let id = self.commit(BOOTSTRAP_MESSAGE)?;
        info!("Created bootstrap commit {}", id);
        Ok(())
    }

    fn signature(&self) -> Result<Signature<'static>, CommitError> {
        match &self.identity {
            Some(identity) => {
                Signature::now(&identity.name, &identity.email).map_err(CommitError::ConfigError)
            }
            None => self.repo.signature().map_err(CommitError::ConfigError),
        }
    }
}

impl Repo for GitRepo {
    fn workdir(&self) -> PathBuf {
        self.repo
            .workdir()
            .unwrap_or_else(|| self.repo.path())
            .to_path_buf()
    }

    fn status(&self) -> Result<Vec<StatusEntry>, CommitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .renames_head_to_index(true)
            .renames_index_to_workdir(true);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(CommitError::StatusFailed)?;

        let entries: Vec<StatusEntry> = statuses
            .iter()
            .filter(|e| !e.status().is_ignored() && e.status() != Status::CURRENT)
            .map(|e| convert_entry(&e))
            .collect();

        debug!("Repository status: {} entries", entries.len());
        Ok(entries)
    }

    fn add(&self, paths: &[String]) -> Result<(), CommitError> {
        let mut index = self.repo.index().map_err(CommitError::StagingFailed)?;
        index
            .add_all(paths.iter(), IndexAddOption::DEFAULT, None)
            .map_err(CommitError::StagingFailed)?;
        // add_all skips files missing from disk; update_all stages their removal.
        index
            .update_all(paths.iter(), None)
            .map_err(CommitError::StagingFailed)?;
        index.write().map_err(CommitError::StagingFailed)?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String, CommitError> {
        let mut index = self.repo.index().map_err(CommitError::StagingFailed)?;
        let tree_id = index.write_tree().map_err(CommitError::StagingFailed)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(CommitError::CommitFailed)?;

        let sig = self.signature()?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(CommitError::CommitFailed)?),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                None
            }
            Err(e) => return Err(CommitError::CommitFailed(e)),
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .map_err(CommitError::CommitFailed)?;

        Ok(oid.to_string())
    }
}

/// Write the default ignore file atomically unless one already exists.
fn write_default_gitignore(workdir: &Path) -> Result<(), CommitError> {
    let path = workdir.join(".gitignore");
    if path.exists() {
        debug!("Keeping existing {}", path.display());
        return Ok(());
    }

    let write_err = |e: std::io::Error| {
        CommitError::InitFailed(format!("Failed to write {}: {}", path.display(), e))
    };

    let mut file = tempfile::NamedTempFile::new_in(workdir).map_err(write_err)?;
    file.write_all(DEFAULT_GITIGNORE.as_bytes())
        .map_err(write_err)?;
    file.persist(&path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Map a git2 status entry to porcelain-style codes.
fn convert_entry(entry: &GitStatusEntry<'_>) -> StatusEntry {
    let status = entry.status();

    let index = if status.is_index_new() {
        "A"
    } else if status.is_index_modified() {
        "M"
    } else if status.is_index_deleted() {
        "D"
    } else if status.is_index_renamed() {
        "R"
    } else if status.is_index_typechange() {
        "T"
    } else if status.is_conflicted() {
        "U"
    } else {
        " "
    };

    let worktree = if status.is_wt_new() {
        "?"
    } else if status.is_wt_modified() {
        "M"
    } else if status.is_wt_deleted() {
        "D"
    } else if status.is_wt_renamed() {
        "R"
    } else if status.is_wt_typechange() {
        "T"
    } else {
        " "
    };

    // Untracked files show as "??".
    let index = if worktree == "?" && index == " " { "?" } else { index };

    let rename = if status.is_index_renamed() {
        entry.head_to_index()
    } else if status.is_wt_renamed() {
        entry.index_to_workdir()
    } else {
        None
    };

    let lossy = |p: Option<&Path>| p.map(|p| p.to_string_lossy().to_string());

    let (path, old_path) = match rename {
        Some(delta) => (
            lossy(delta.new_file().path()).unwrap_or_default(),
            lossy(delta.old_file().path()),
        ),
        None => (String::from_utf8_lossy(entry.path_bytes()).to_string(), None),
    };

    StatusEntry {
        path,
        index_status: index.to_string(),
        worktree_status: worktree.to_string(),
        old_path,
    }
}
