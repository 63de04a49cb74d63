//! Attachment text extraction.
//!
//! Attachments arrive as a URL plus an optional MIME type. They are
//! downloaded with a hard size cap and turned into text: PDFs and Word
//! documents are text-extracted, audio is transcribed, images are passed
//! through to the model untouched.

pub mod audio;
pub mod docx;
pub mod download;
pub mod pdf;

use std::time::Duration;

use async_trait::async_trait;
use pp_domain::config::EnrichmentConfig;
use pp_domain::error::{Error, Result};

/// What an attachment is, decided from its MIME type or file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentKind {
    Pdf,
    Docx,
    Audio,
    Image,
    Unsupported(String),
}

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

impl AttachmentKind {
    pub fn classify(media_type: Option<&str>, url: &str) -> Self {
        let mt = media_type
            .map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty());
        if let Some(mt) = mt {
            return match mt.as_str() {
                "application/pdf" => AttachmentKind::Pdf,
                DOCX_MIME => AttachmentKind::Docx,
                m if m.starts_with("audio/") => AttachmentKind::Audio,
                m if m.starts_with("image/") => AttachmentKind::Image,
                other => AttachmentKind::Unsupported(other.to_string()),
            };
        }

        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        let path = match path.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
            None => path.as_str(),
        };
        let file_name = path.rsplit('/').next().unwrap_or("");
        let ext = file_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        match ext {
            "pdf" => AttachmentKind::Pdf,
            "docx" => AttachmentKind::Docx,
            "mp3" | "m4a" | "wav" | "webm" | "ogg" | "mpga" | "mpeg" => AttachmentKind::Audio,
            "png" | "jpg" | "jpeg" | "gif" | "webp" => AttachmentKind::Image,
            other => AttachmentKind::Unsupported(if other.is_empty() {
                "unknown".to_string()
            } else {
                format!(".{other}")
            }),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AttachmentKind::Pdf => "PDF document",
            AttachmentKind::Docx => "Word document",
            AttachmentKind::Audio => "audio recording",
            AttachmentKind::Image => "image",
            AttachmentKind::Unsupported(_) => "file",
        }
    }
}

/// Turns attachment bytes into text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Download an attachment, failing once it exceeds the size cap.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
    async fn extract_pdf(&self, bytes: Vec<u8>) -> Result<String>;
    async fn extract_docx(&self, bytes: Vec<u8>) -> Result<String>;
    async fn transcribe_audio(&self, bytes: Vec<u8>, media_type: &str) -> Result<String>;
}

/// Production extractor: `pdf-extract`, `zip` + `quick-xml`, and an
/// OpenAI-compatible transcription endpoint.
pub struct DefaultExtractor {
    http: reqwest::Client,
    max_bytes: usize,
    transcriber: audio::Transcriber,
}

impl DefaultExtractor {
    pub fn from_config(cfg: &EnrichmentConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            transcriber: audio::Transcriber::from_config(cfg, http.clone()),
            http,
            max_bytes: cfg.attachment_max_bytes,
        })
    }
}

#[async_trait]
impl TextExtractor for DefaultExtractor {
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        download::fetch_capped(&self.http, url, self.max_bytes).await
    }

    async fn extract_pdf(&self, bytes: Vec<u8>) -> Result<String> {
        run_blocking(move || pdf::extract(&bytes)).await
    }

    async fn extract_docx(&self, bytes: Vec<u8>) -> Result<String> {
        run_blocking(move || docx::extract(&bytes)).await
    }

    async fn transcribe_audio(&self, bytes: Vec<u8>, media_type: &str) -> Result<String> {
        self.transcriber.transcribe(bytes, media_type).await
    }
}

/// Parsers are CPU-bound and may panic on hostile input; keep them off the
/// async workers and turn a panic into an extraction error.
async fn run_blocking<F>(f: F) -> Result<String>
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Extraction(format!("parser crashed: {e}")))?
}

/// Cap extracted text, cutting on a char boundary.
pub fn truncate_text(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        (text.to_string(), false)
    } else {
        (text.chars().take(max_chars).collect(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_wins_over_extension() {
        assert_eq!(
            AttachmentKind::classify(Some("application/pdf"), "https://x/file.docx"),
            AttachmentKind::Pdf
        );
        assert_eq!(
            AttachmentKind::classify(Some("audio/webm;codecs=opus"), "blob"),
            AttachmentKind::Audio
        );
    }

    #[test]
    fn extension_is_used_without_media_type() {
        assert_eq!(
            AttachmentKind::classify(None, "https://cdn/x/brief.DOCX?token=abc"),
            AttachmentKind::Docx
        );
        assert_eq!(
            AttachmentKind::classify(Some(""), "https://cdn/photo.jpeg"),
            AttachmentKind::Image
        );
    }

    #[test]
    fn unknown_types_are_unsupported() {
        assert_eq!(
            AttachmentKind::classify(Some("application/zip"), "x.zip"),
            AttachmentKind::Unsupported("application/zip".into())
        );
        assert_eq!(
            AttachmentKind::classify(None, "https://cdn/noext"),
            AttachmentKind::Unsupported("unknown".into())
        );
    }

    #[test]
    fn host_dots_are_not_extensions() {
        assert_eq!(
            AttachmentKind::classify(None, "https://cdn.example.com/file"),
            AttachmentKind::Unsupported("unknown".into())
        );
        assert_eq!(
            AttachmentKind::classify(None, "https://cdn.example.com"),
            AttachmentKind::Unsupported("unknown".into())
        );
        assert_eq!(
            AttachmentKind::classify(None, "https://files.v2.example.com/docs/brief.pdf#page=2"),
            AttachmentKind::Pdf
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let (t, cut) = truncate_text("héllo wörld", 4);
        assert_eq!(t, "héll");
        assert!(cut);
        assert_eq!(truncate_text("ok", 10), ("ok".to_string(), false));
    }
}
