//! Shared domain types for PortalPilot.
//!
//! Every other crate in the workspace depends on this one for the workspace
//! snapshot model, the action grammar, conversation state, configuration and
//! the common error type.

pub mod action;
pub mod capability;
pub mod config;
pub mod conversation;
pub mod error;
pub mod message;
pub mod trace;
pub mod workspace;
