//! Branch completion for finished sessions.
//!
//! Once the agent is done in its worktree, the branch is pushed to the
//! remote and, for projects that prefer pull requests, a PR is opened
//! via the host CLI. The PR body is templated from the session's plan
//! document when one exists.

pub mod error;
pub mod plan;
pub mod pr;

pub use error::{GitOpsError, Result};
pub use plan::{branch_plan_file, build_pr_body, extract_plan_sections, PlanSections, PLAN_FILE_NAME};
pub use pr::{is_pr_required, title_from_branch, Completion, PrManager};
