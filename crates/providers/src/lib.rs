//! LLM provider adapters and the role-based provider registry.

pub mod anthropic;
pub mod openai_compat;
pub mod registry;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use registry::ProviderRegistry;
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
pub use util::classify_http_error;
