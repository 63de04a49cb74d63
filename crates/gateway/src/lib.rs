//! PortalPilot gateway: HTTP surface, routing pipeline and CLI.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod extract;
pub mod runtime;
pub mod skills;
pub mod state;
