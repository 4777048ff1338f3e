//! Git worktree lifecycle management.
//!
//! Every work item gets an isolated git worktree on its own branch:
//! `{worktrees_root}/{slug}` checked out on `session/{slug}`. Trees
//! are disposable; once the branch is pushed or merged, removal is
//! forceful and discards anything uncommitted.

pub mod error;
pub mod manager;

pub use error::{Result, WorktreeError};
pub use manager::{branch_for, WorktreeInfo, WorktreeManager};
