//! Prompt construction for assistant requests.

/// Maximum summary lines sent for a commit message request.
const MAX_SUMMARY_LINES: usize = 200;

/// Build the prompt asking for a commit message from a change summary.
///
/// `summary` is one `"<kind>: <path>"` line per change.
pub fn build_commit_message_prompt(summary: &str) -> String {
    let summary = sanitize_for_prompt(summary, MAX_SUMMARY_LINES);
    let summary = if summary.trim().is_empty() {
        "(no changes)".to_string()
    } else {
        summary
    };

    format!(
        r#"You are writing a Git commit message for the following working tree changes.

## Changes
{summary}

## Instructions
1. Group the changes by intent: features, fixes, documentation, refactoring, other
2. Start with a one-line subject of at most 72 characters
3. Follow with a blank line and a short bullet list of the notable changes
4. Do not invent changes that are not listed above

Respond with ONLY the commit message text (no markdown fences, no explanation)."#
    )
}

/// Build the prompt asking for a structural review of a large file.
pub fn build_analysis_prompt(file_name: &str, content: &str) -> String {
    let content = sanitize_for_prompt(content, usize::MAX);

    format!(
        r#"Analyze the structure of the source file "{file_name}" and suggest improvements.

## Source
```
{content}
```

## Instructions
1. Summarize the responsibilities the file currently holds
2. Identify parts that could be split into separate modules
3. Propose a concrete refactoring plan, smallest steps first"#
    )
}

/// Neutralize markdown fences and headings so quoted text cannot break out
/// of its section, keeping at most `max_lines` lines.
pub fn sanitize_for_prompt(text: &str, max_lines: usize) -> String {
    text.replace("```", "'''")
        .replace("##", "//")
        .lines()
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n")
}
