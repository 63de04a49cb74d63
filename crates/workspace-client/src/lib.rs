//! `pp-workspace`: access to the caller's workspace data.
//!
//! Provides the [`WorkspaceStore`] trait (reads for the context snapshot
//! plus the per-entity mutators the action executor calls), the
//! [`WorkspaceConnector`] trait that turns a caller's bearer token into an
//! authenticated, user-scoped store, a production REST implementation
//! ([`RestConnector`]) against a PostgREST-style hosted backend, and an
//! in-memory implementation ([`InMemoryWorkspace`]) for tests and the
//! offline demo mode.
//!
//! | `workspace.mode` | Connector            |
//! |------------------|----------------------|
//! | `rest`           | [`RestConnector`]    |
//! | `memory`         | [`InMemoryConnector`]|

pub mod memory;
pub mod rest;
pub mod store;

pub use memory::{InMemoryConnector, InMemoryWorkspace, WorkspaceFixture};
pub use rest::{RestConnector, RestWorkspaceStore};
pub use store::{
    ArticleRecord, AuthUser, GoalRecord, ProjectRecord, Session, TaskRecord, WorkspaceConnector,
    WorkspaceStore,
};

use std::sync::Arc;

use pp_domain::config::{WorkspaceConfig, WorkspaceMode};
use pp_domain::error::{Error, Result};

/// Create the connector selected by `workspace.mode`.
pub fn create_connector(cfg: &WorkspaceConfig) -> Result<Arc<dyn WorkspaceConnector>> {
    match cfg.mode {
        WorkspaceMode::Rest => {
            let connector = RestConnector::new(cfg)?;
            tracing::info!(base_url = %cfg.base_url, "using REST workspace backend");
            Ok(Arc::new(connector))
        }
        WorkspaceMode::Memory => {
            let fixture = match &cfg.fixture_path {
                Some(path) => {
                    let raw = std::fs::read_to_string(path).map_err(|e| {
                        Error::Other(format!("reading fixture {}: {e}", path.display()))
                    })?;
                    serde_json::from_str(&raw)?
                }
                None => WorkspaceFixture::default(),
            };
            tracing::warn!(
                fixture = ?cfg.fixture_path,
                "using in-memory workspace; any bearer token is accepted"
            );
            Ok(Arc::new(InMemoryConnector::new(Arc::new(
                InMemoryWorkspace::new(fixture),
            ))))
        }
    }
}
