//! Git operations using git2-rs.

pub mod repo;

#[cfg(test)]
pub use repo::MockRepo;
pub use repo::{BOOTSTRAP_MESSAGE, DEFAULT_GITIGNORE, GitRepo, Identity, Repo};
