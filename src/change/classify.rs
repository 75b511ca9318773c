//! Intent classification of change records.
//!
//! Every record maps to exactly one [`Category`]. Rules are checked in
//! priority order and the first match wins, so an added file whose name
//! mentions a fix is still a feature.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::change::record::{ChangeKind, ChangeRecord, basename};

/// Intent buckets, declared in priority order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Feature,
    Fix,
    Doc,
    Refactor,
    Other,
}

impl Category {
    /// All categories, highest priority first.
    pub const ALL: [Category; 5] = [
        Category::Feature,
        Category::Fix,
        Category::Doc,
        Category::Refactor,
        Category::Other,
    ];

    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Feature => "✨",
            Self::Fix => "🐛",
            Self::Doc => "📚",
            Self::Refactor => "♻️",
            Self::Other => "🔨",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Feature => "Features",
            Self::Fix => "Fixes",
            Self::Doc => "Documentation",
            Self::Refactor => "Refactoring",
            Self::Other => "Other",
        }
    }

    /// Header line used in synthesized commit messages.
    pub fn header(&self) -> String {
        format!("{} {}:", self.glyph(), self.label())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const FEATURE_MARKERS: &[&str] = &["feature", "新功能"];
const TEST_DIRS: &[&str] = &["test", "tests"];
const TEST_STEM_SUFFIXES: &[&str] = &[".test", ".spec", "_test"];
const FIX_MARKERS: &[&str] = &["fix", "bug", "hotfix", "修复"];
const DOC_EXTENSIONS: &[&str] = &[".md", ".markdown"];
const DOC_MARKERS: &[&str] = &["doc", "readme", "changelog", "文档"];
const REFACTOR_MARKERS: &[&str] = &["refactor", "重构"];

type Rule = fn(&ChangeRecord) -> bool;

/// Ordered rule list. `Other` is the fallthrough and has no rule.
const RULES: &[(Category, Rule)] = &[
    (Category::Feature, is_feature),
    (Category::Fix, is_fix),
    (Category::Doc, is_doc),
    (Category::Refactor, is_refactor),
];

/// Classify a single record.
pub fn classify(record: &ChangeRecord) -> Category {
    RULES
        .iter()
        .find(|(_, rule)| rule(record))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

/// Partition a batch into categories, preserving input order within each.
pub fn classify_all<I>(records: I) -> ClassifiedGroups
where
    I: IntoIterator<Item = ChangeRecord>,
{
    let mut groups = ClassifiedGroups::default();
    for record in records {
        groups.push(classify(&record), record);
    }
    groups
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn is_feature(record: &ChangeRecord) -> bool {
    if record.kind == ChangeKind::Added {
        return true;
    }

    let path = record.path.to_lowercase();
    contains_any(&path, FEATURE_MARKERS) || is_under_test_dir(&path) || has_test_suffix(&path)
}

fn is_under_test_dir(path: &str) -> bool {
    let mut components: Vec<&str> = path.split(['/', '\\']).collect();
    components.pop();
    components.iter().any(|c| TEST_DIRS.contains(c))
}

fn has_test_suffix(path: &str) -> bool {
    let name = basename(path);
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    TEST_STEM_SUFFIXES.iter().any(|s| stem.ends_with(s))
}

fn is_fix(record: &ChangeRecord) -> bool {
    contains_any(&record.path.to_lowercase(), FIX_MARKERS)
}

fn is_doc(record: &ChangeRecord) -> bool {
    let path = record.path.to_lowercase();
    DOC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) || contains_any(&path, DOC_MARKERS)
}

// Case-sensitive, unlike the other markers.
fn is_refactor(record: &ChangeRecord) -> bool {
    contains_any(&record.path, REFACTOR_MARKERS)
}

/// Records grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedGroups {
    groups: BTreeMap<Category, Vec<ChangeRecord>>,
}

impl ClassifiedGroups {
    pub fn push(&mut self, category: Category, record: ChangeRecord) {
        self.groups.entry(category).or_default().push(record);
    }

    /// Records in `category`, in input order.
    pub fn get(&self, category: Category) -> &[ChangeRecord] {
        self.groups.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty groups, highest priority first.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[ChangeRecord])> {
        self.groups
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(category, records)| (*category, records.as_slice()))
    }

    /// Total number of records across all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
