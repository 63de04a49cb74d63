//! External enrichment lookups used by the action executor.
//!
//! Each lookup is a trait so the pipeline can run against scripted doubles
//! in tests; the HTTP implementations are wired in `bootstrap`.

pub mod image_search;
pub mod places;

pub use image_search::{HttpImageSearch, ImageSearch};
pub use places::{format_place_markdown, HttpPlaceLookup, PlaceDetails, PlaceLookup};

/// Read an optional API key from the environment; blank counts as unset.
pub(crate) fn key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
