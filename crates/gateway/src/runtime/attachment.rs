//! Attachment normalization.
//!
//! Before the model call an attachment becomes either extra text on the
//! user's message (documents), the message itself (audio transcription) or
//! an image part. Extraction failures never abort the turn on their own.

use pp_domain::error::Error;

use crate::extract::{truncate_text, AttachmentKind, TextExtractor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub media_type: Option<String>,
}

/// The user's side of one turn after normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTurn {
    /// What the model sees as the user message.
    pub text: String,
    /// What is persisted to history.
    pub stored: String,
    /// `(url, media_type)` of an image to pass through.
    pub image: Option<(String, Option<String>)>,
    /// Apology to show when the attachment could not be used.
    pub notice: Option<String>,
}

impl UserTurn {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            stored: text.to_string(),
            ..Default::default()
        }
    }

    /// Nothing left to act on.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image.is_none()
    }
}

pub async fn normalize(
    extractor: &dyn TextExtractor,
    request: &str,
    attachment: Option<&Attachment>,
    max_text_chars: usize,
) -> UserTurn {
    let request = request.trim();
    let mut turn = UserTurn::plain(request);
    let Some(att) = attachment.filter(|a| !a.url.trim().is_empty()) else {
        return turn;
    };
    let kind = AttachmentKind::classify(att.media_type.as_deref(), &att.url);

    match extract(extractor, &kind, att).await {
        Ok(Extracted::Image) => {
            if turn.text.is_empty() {
                turn.text = "Please look at the attached image.".into();
            }
            turn.image = Some((att.url.clone(), att.media_type.clone()));
            turn.stored = format!("{request}\n[Attached image]").trim().to_string();
        }
        Ok(Extracted::Transcript(text)) => {
            let text = text.trim().to_string();
            tracing::debug!(chars = text.len(), "audio transcribed");
            turn.text = text.clone();
            turn.stored = text;
        }
        Ok(Extracted::Document(text)) => {
            let (body, truncated) = truncate_text(text.trim(), max_text_chars);
            let mut appended = format!("--- Attached document ({}) ---\n{body}", kind.label());
            if truncated {
                appended.push_str("\n[document truncated]");
            }
            appended.push_str("\n--- End of document ---");
            turn.text = if request.is_empty() {
                appended
            } else {
                format!("{request}\n\n{appended}")
            };
            turn.stored = format!("{request}\n[Attached {}]", kind.label())
                .trim()
                .to_string();
        }
        Err(e) => {
            tracing::warn!(error = %e, url = %att.url, kind = kind.label(), "attachment extraction failed");
            turn.notice = Some(apology(&kind, &e));
        }
    }
    turn
}

enum Extracted {
    Image,
    Transcript(String),
    Document(String),
}

async fn extract(
    extractor: &dyn TextExtractor,
    kind: &AttachmentKind,
    att: &Attachment,
) -> pp_domain::error::Result<Extracted> {
    match kind {
        AttachmentKind::Image => Ok(Extracted::Image),
        AttachmentKind::Unsupported(what) => Err(Error::Extraction(format!(
            "{what} files are not supported"
        ))),
        AttachmentKind::Pdf => {
            let bytes = extractor.download(&att.url).await?;
            extractor.extract_pdf(bytes).await.map(Extracted::Document)
        }
        AttachmentKind::Docx => {
            let bytes = extractor.download(&att.url).await?;
            extractor.extract_docx(bytes).await.map(Extracted::Document)
        }
        AttachmentKind::Audio => {
            let bytes = extractor.download(&att.url).await?;
            let media_type = att.media_type.as_deref().unwrap_or("audio/mpeg");
            extractor
                .transcribe_audio(bytes, media_type)
                .await
                .map(Extracted::Transcript)
        }
    }
}

fn apology(kind: &AttachmentKind, err: &Error) -> String {
    let detail = match err {
        Error::Extraction(msg) => msg.clone(),
        other => other.to_string(),
    };
    format!("Sorry, I couldn't process the attached {} ({detail}).", kind.label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pp_domain::error::Result;

    struct Scripted;

    #[async_trait]
    impl TextExtractor for Scripted {
        async fn download(&self, url: &str) -> Result<Vec<u8>> {
            if url.contains("huge") {
                return Err(Error::Extraction("attachment is larger than 10 bytes".into()));
            }
            Ok(b"raw".to_vec())
        }
        async fn extract_pdf(&self, _bytes: Vec<u8>) -> Result<String> {
            Ok("Venue: Riverside Hall\nBudget: 25000".into())
        }
        async fn extract_docx(&self, _bytes: Vec<u8>) -> Result<String> {
            Ok("x".repeat(50))
        }
        async fn transcribe_audio(&self, _bytes: Vec<u8>, _media_type: &str) -> Result<String> {
            Ok(" create a project called Winter Fair ".into())
        }
    }

    fn att(url: &str, mt: Option<&str>) -> Attachment {
        Attachment {
            url: url.into(),
            media_type: mt.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn pdf_text_is_appended() {
        let a = att("https://files/brief.pdf", Some("application/pdf"));
        let turn = normalize(&Scripted, "make a project from this brief", Some(&a), 1_000).await;
        assert!(turn.text.starts_with("make a project from this brief\n\n--- Attached document (PDF document) ---"));
        assert!(turn.text.contains("Riverside Hall"));
        assert_eq!(turn.stored, "make a project from this brief\n[Attached PDF document]");
        assert!(turn.notice.is_none());
    }

    #[tokio::test]
    async fn long_documents_are_truncated() {
        let a = att("https://files/notes.docx", None);
        let turn = normalize(&Scripted, "", Some(&a), 10).await;
        assert!(turn.text.contains(&format!("{}\n[document truncated]", "x".repeat(10))));
    }

    #[tokio::test]
    async fn audio_replaces_the_message() {
        let a = att("https://files/memo.m4a", Some("audio/mp4"));
        let turn = normalize(&Scripted, "", Some(&a), 1_000).await;
        assert_eq!(turn.text, "create a project called Winter Fair");
        assert_eq!(turn.stored, turn.text);
    }

    #[tokio::test]
    async fn images_pass_through() {
        let a = att("https://files/flyer.png", None);
        let turn = normalize(&Scripted, "what venue is this?", Some(&a), 1_000).await;
        assert_eq!(turn.image, Some(("https://files/flyer.png".to_string(), None)));
        assert_eq!(turn.text, "what venue is this?");
    }

    #[tokio::test]
    async fn failures_keep_the_text_and_apologize() {
        let a = att("https://files/huge.pdf", None);
        let turn = normalize(&Scripted, "summarize this", Some(&a), 1_000).await;
        assert_eq!(turn.text, "summarize this");
        assert_eq!(
            turn.notice.as_deref(),
            Some("Sorry, I couldn't process the attached PDF document (attachment is larger than 10 bytes).")
        );
    }

    #[tokio::test]
    async fn unsupported_type_with_no_text_leaves_nothing() {
        let a = att("https://files/sheet.xlsx", None);
        let turn = normalize(&Scripted, "  ", Some(&a), 1_000).await;
        assert!(turn.is_empty());
        assert!(turn.notice.unwrap().contains(".xlsx files are not supported"));
    }
}
