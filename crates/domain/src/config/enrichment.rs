use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// External lookups and attachment extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Image search API (`GET {url}?query=..&per_page=1`, Unsplash-style).
    #[serde(default = "d_image_search_url")]
    pub image_search_url: String,
    #[serde(default = "d_image_search_key_env")]
    pub image_search_key_env: String,
    /// Place lookup API (`POST {url}` with `{"textQuery": ..}`, Places-style).
    #[serde(default = "d_places_url")]
    pub places_url: String,
    #[serde(default = "d_places_key_env")]
    pub places_key_env: String,
    /// OpenAI-compatible base URL used for `/audio/transcriptions`.
    #[serde(default = "d_transcription_url")]
    pub transcription_base_url: String,
    #[serde(default = "d_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "d_transcription_key_env")]
    pub transcription_key_env: String,
    /// Attachments larger than this are refused.
    #[serde(default = "d_max_bytes")]
    pub attachment_max_bytes: usize,
    /// Extracted document text beyond this is cut.
    #[serde(default = "d_max_text")]
    pub attachment_max_text_chars: usize,
    #[serde(default = "d_20000")]
    pub timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            image_search_url: d_image_search_url(),
            image_search_key_env: d_image_search_key_env(),
            places_url: d_places_url(),
            places_key_env: d_places_key_env(),
            transcription_base_url: d_transcription_url(),
            transcription_model: d_transcription_model(),
            transcription_key_env: d_transcription_key_env(),
            attachment_max_bytes: d_max_bytes(),
            attachment_max_text_chars: d_max_text(),
            timeout_ms: 20_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_image_search_url() -> String {
    "https://api.unsplash.com/search/photos".into()
}
fn d_image_search_key_env() -> String {
    "PP_IMAGE_SEARCH_KEY".into()
}
fn d_places_url() -> String {
    "https://places.googleapis.com/v1/places:searchText".into()
}
fn d_places_key_env() -> String {
    "PP_PLACES_KEY".into()
}
fn d_transcription_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_transcription_model() -> String {
    "whisper-1".into()
}
fn d_transcription_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_max_bytes() -> usize {
    20 * 1024 * 1024
}
fn d_max_text() -> usize {
    40_000
}
fn d_20000() -> u64 {
    20_000
}
