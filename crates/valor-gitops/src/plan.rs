//! Plan-document parsing and PR body templating.
//!
//! Sessions may leave a markdown plan file in their worktree. Its
//! "Original Request" and "Implementation Notes" sections, when
//! present, are lifted verbatim into the PR description.

use std::path::{Path, PathBuf};

use tracing::debug;

/// File name a session's plan document is expected under, relative to
/// the worktree root.
pub const PLAN_FILE_NAME: &str = "PLAN.md";

/// The worktree's plan document, if the session left one.
pub fn branch_plan_file(worktree: &Path) -> Option<PathBuf> {
    let path = worktree.join(PLAN_FILE_NAME);
    path.is_file().then_some(path)
}

/// Sections extracted from a session plan document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlanSections {
    pub original_request: Option<String>,
    pub implementation_notes: Option<String>,
}

impl PlanSections {
    pub fn is_empty(&self) -> bool {
        self.original_request.is_none() && self.implementation_notes.is_none()
    }
}

/// Extracts the known sections from plan markdown by `##` heading
/// match. Headings are matched case-insensitively; a section runs
/// until the next `##` heading or end of file.
pub fn extract_plan_sections(markdown: &str) -> PlanSections {
    PlanSections {
        original_request: section_body(markdown, "original request"),
        implementation_notes: section_body(markdown, "implementation notes"),
    }
}

fn section_body(markdown: &str, heading: &str) -> Option<String> {
    let mut collecting = false;
    let mut body = String::new();

    for line in markdown.lines() {
        if let Some(title) = line.strip_prefix("## ") {
            if collecting {
                break;
            }
            collecting = title.trim().eq_ignore_ascii_case(heading);
            continue;
        }
        if collecting {
            body.push_str(line);
            body.push('\n');
        }
    }

    let body = body.trim().to_string();
    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

const COMPLETION_CHECKLIST: &str = "\
## Checklist

- [x] Implementation complete
- [x] Changes committed on the session branch
- [ ] Review and merge";

const GENERIC_BODY: &str = "Automated session work. See branch commits for details.";

/// Builds the PR body for a session branch.
///
/// If a plan file exists and yields at least one known section, the
/// sections are templated in verbatim; otherwise a minimal generic
/// body is used. Both variants carry the completion checklist.
pub fn build_pr_body(plan_file: Option<&Path>) -> String {
    let sections = plan_file
        .and_then(|path| match std::fs::read_to_string(path) {
            Ok(text) => Some(extract_plan_sections(&text)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Plan file unreadable");
                None
            }
        })
        .unwrap_or_default();

    if sections.is_empty() {
        return format!("{}\n\n{}", GENERIC_BODY, COMPLETION_CHECKLIST);
    }

    let mut body = String::new();
    if let Some(request) = &sections.original_request {
        body.push_str("## Original Request\n\n");
        body.push_str(request);
        body.push_str("\n\n");
    }
    if let Some(notes) = &sections.implementation_notes {
        body.push_str("## Implementation Notes\n\n");
        body.push_str(notes);
        body.push_str("\n\n");
    }
    body.push_str(COMPLETION_CHECKLIST);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = "\
# Session Plan

## Original Request

Fix login bug

## Implementation Notes

Added null check

## Scratch

ignore this
";

    #[test]
    fn test_extracts_both_sections() {
        let sections = extract_plan_sections(PLAN);
        assert_eq!(sections.original_request.as_deref(), Some("Fix login bug"));
        assert_eq!(
            sections.implementation_notes.as_deref(),
            Some("Added null check")
        );
    }

    #[test]
    fn test_heading_match_is_case_insensitive() {
        let sections = extract_plan_sections("## ORIGINAL REQUEST\n\nDo the thing\n");
        assert_eq!(sections.original_request.as_deref(), Some("Do the thing"));
    }

    #[test]
    fn test_missing_sections_are_none() {
        let sections = extract_plan_sections("# Notes\n\njust prose\n");
        assert!(sections.is_empty());
    }

    #[test]
    fn test_body_contains_sections_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let plan = dir.path().join("plan.md");
        std::fs::write(&plan, PLAN).unwrap();

        let body = build_pr_body(Some(&plan));
        assert!(body.contains("Fix login bug"));
        assert!(body.contains("Added null check"));
        assert!(body.contains("## Checklist"));
        assert!(!body.contains("ignore this"));
    }

    #[test]
    fn test_branch_plan_file_lookup() {
        let dir = tempfile::tempdir().unwrap();
        assert!(branch_plan_file(dir.path()).is_none());

        std::fs::write(dir.path().join(PLAN_FILE_NAME), PLAN).unwrap();
        let found = branch_plan_file(dir.path()).unwrap();
        assert!(found.ends_with(PLAN_FILE_NAME));
    }

    #[test]
    fn test_missing_plan_falls_back_to_generic_body() {
        let body = build_pr_body(None);
        assert!(body.contains(GENERIC_BODY));
        assert!(body.contains("## Checklist"));

        let unparsable = tempfile::tempdir().unwrap();
        let plan = unparsable.path().join("plan.md");
        std::fs::write(&plan, "no headings at all").unwrap();
        assert!(build_pr_body(Some(&plan)).contains(GENERIC_BODY));
    }
}
