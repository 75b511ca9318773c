//! repotidy - keeps a working tree tidy: intent-grouped autocommits and
//! file size advisories.
//!
//! # Overview
//!
//! repotidy reads the git status of a working tree, classifies each change
//! by intent (feature, fix, documentation, refactoring, other) and commits
//! everything with a message from an external assistant CLI, or a
//! deterministic synthesized one when the assistant is slow or absent. It can
//! also watch source files and flag those that grow past a line threshold.

pub mod assistant;
pub mod autocommit;
pub mod change;
pub mod config;
pub mod error;
pub mod git;
pub mod monitor;
pub mod waiter;

// Re-export commonly used types
pub use assistant::{Assistant, AssistantTransport, CommandTransport, RequestTimeouts};
pub use autocommit::{AutoCommitter, AutocommitOutcome, MessageSource, Preview};
pub use change::{Category, ChangeKind, ChangeRecord, ClassifiedGroups, classify, classify_all, synthesize_message};
pub use config::Settings;
pub use error::{AssistantError, CommitError, ConfigError, MonitorError, StatusEntryError, WaiterError};
pub use monitor::{Advisory, FileSizeMonitor};
pub use waiter::{Signal, SignalBus, Waiter, WaiterState};
