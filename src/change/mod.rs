//! Change records, classification, and commit message synthesis.

pub mod classify;
pub mod message;
pub mod record;
pub mod status;

pub use classify::{Category, ClassifiedGroups, classify, classify_all};
pub use message::{PLACEHOLDER_MESSAGE, changes_summary, synthesize_message};
pub use record::{ChangeKind, ChangeRecord};
pub use status::{Collection, StatusCollector, StatusEntry};
