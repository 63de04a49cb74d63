//! Deterministic system-prompt assembly for the action router.
//!
//! [`PromptComposer`] renders the behavioral contract, the action grammar and
//! a size-bounded JSON `CONTEXT` section from a [`WorkspaceContext`] snapshot.
//!
//! [`WorkspaceContext`]: pp_domain::workspace::WorkspaceContext

pub mod composer;
pub mod preamble;
pub mod report;
pub mod truncation;

pub use composer::PromptComposer;
pub use report::{PromptReport, SectionReport};
