//! Deterministic commit message synthesis.

use crate::change::classify::ClassifiedGroups;
use crate::change::record::{ChangeKind, ChangeRecord, basename};

/// Message used when there is nothing to describe.
pub const PLACEHOLDER_MESSAGE: &str = "Update files";

/// Render classified changes as a commit message.
///
/// Produces one header per non-empty category, highest priority first, each
/// followed by a bullet per change:
///
/// ```text
/// ✨ Features:
/// - parser.rs: added
/// 📚 Documentation:
/// - README.md: updated
/// ```
///
/// Never fails and never returns an empty string.
pub fn synthesize_message(groups: &ClassifiedGroups) -> String {
    let mut lines = Vec::new();

    for (category, records) in groups.iter() {
        lines.push(category.header());
        lines.extend(records.iter().map(bullet));
    }

    if lines.is_empty() {
        return PLACEHOLDER_MESSAGE.to_string();
    }

    lines.join("\n")
}

fn bullet(record: &ChangeRecord) -> String {
    format!("- {}: {}", record.file_name(), describe(&record.kind))
}

fn describe(kind: &ChangeKind) -> String {
    match kind {
        ChangeKind::Added => "added".to_string(),
        ChangeKind::Modified => "updated".to_string(),
        ChangeKind::Deleted => "deleted".to_string(),
        ChangeKind::Renamed { old_path } => format!("renamed from {}", basename(old_path)),
    }
}

/// One `"<kind>: <path>"` line per record, for assistant requests.
pub fn changes_summary(records: &[ChangeRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}: {}", r.kind, r.path))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::classify::{Category, classify_all};

    #[test]
    fn test_empty_returns_placeholder() {
        let groups = classify_all(Vec::new());
        assert_eq!(synthesize_message(&groups), PLACEHOLDER_MESSAGE);
    }

    #[test]
    fn test_added_feature_bullet() {
        let groups = classify_all(vec![ChangeRecord::added("src/feature-test.ts")]);
        let message = synthesize_message(&groups);
        assert_eq!(message, "✨ Features:\n- feature-test.ts: added");
    }

    #[test]
    fn test_descriptions_per_kind() {
        let groups = classify_all(vec![
            ChangeRecord::modified("src/main.rs"),
            ChangeRecord::deleted("src/old.rs"),
            ChangeRecord::renamed("src/legacy/util.rs", "src/util.rs"),
        ]);
        let message = synthesize_message(&groups);
        assert!(message.contains("- main.rs: updated"));
        assert!(message.contains("- old.rs: deleted"));
        assert!(message.contains("- util.rs: renamed from util.rs"));
    }

    #[test]
    fn test_headers_in_priority_order() {
        let groups = classify_all(vec![
            ChangeRecord::modified("src/main.rs"),
            ChangeRecord::modified("src/refactor/engine.rs"),
            ChangeRecord::modified("README.md"),
            ChangeRecord::modified("src/bugfix.rs"),
            ChangeRecord::added("src/new.rs"),
        ]);
        let message = synthesize_message(&groups);

        let headers: Vec<&str> = message.lines().filter(|l| !l.starts_with("- ")).collect();
        let expected: Vec<String> = Category::ALL.iter().map(Category::header).collect();
        assert_eq!(headers, expected);
    }

    #[test]
    fn test_empty_categories_omitted() {
        let groups = classify_all(vec![ChangeRecord::modified("docs/guide.md")]);
        let message = synthesize_message(&groups);
        assert_eq!(message, "📚 Documentation:\n- guide.md: updated");
        assert!(!message.contains(Category::Feature.label()));
    }

    #[test]
    fn test_changes_summary() {
        let records = vec![
            ChangeRecord::added("src/a.rs"),
            ChangeRecord::renamed("b.rs", "c.rs"),
        ];
        assert_eq!(changes_summary(&records), "add: src/a.rs\nrename: c.rs");
        assert_eq!(changes_summary(&[]), "");
    }
}
