use serde::{Deserialize, Serialize};

/// Per-collection report within a prompt build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionReport {
    /// Key under `CONTEXT` (e.g. `summarizedProjects`).
    pub name: String,
    pub raw_items: usize,
    pub injected_items: usize,
    pub raw_chars: usize,
    pub injected_chars: usize,
    pub truncated_per_section: bool,
    pub truncated_total_cap: bool,
    /// False when the total cap left no room; the key is still rendered
    /// with an empty list.
    pub included: bool,
}

/// Full report of a prompt build, logged with every dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptReport {
    pub sections: Vec<SectionReport>,
    pub context_chars: usize,
    pub total_chars: usize,
}

impl PromptReport {
    pub fn sections_truncated(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.included && (s.truncated_per_section || s.truncated_total_cap))
            .count()
    }

    pub fn sections_excluded(&self) -> usize {
        self.sections.iter().filter(|s| !s.included).count()
    }
}
