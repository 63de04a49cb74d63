//! Audio transcription against an OpenAI-compatible
//! `POST {base}/audio/transcriptions` endpoint.

use pp_domain::config::EnrichmentConfig;
use pp_domain::error::{Error, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

pub struct Transcriber {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    key_env: String,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl Transcriber {
    pub fn from_config(cfg: &EnrichmentConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            url: format!(
                "{}/audio/transcriptions",
                cfg.transcription_base_url.trim_end_matches('/')
            ),
            model: cfg.transcription_model.clone(),
            api_key: crate::skills::key_from_env(&cfg.transcription_key_env),
            key_env: cfg.transcription_key_env.clone(),
        }
    }

    pub async fn transcribe(&self, bytes: Vec<u8>, media_type: &str) -> Result<String> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            Error::Extraction(format!(
                "transcription is not configured ({} is not set)",
                self.key_env
            ))
        })?;
        let part = Part::bytes(bytes)
            .file_name(format!("recording.{}", file_extension(media_type)))
            .mime_str(media_type)
            .map_err(|e| Error::Extraction(format!("invalid audio type '{media_type}': {e}")))?;
        let form = Form::new().text("model", self.model.clone()).part("file", part);

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Extraction(format!("transcription request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::Extraction(format!(
                "transcription failed (HTTP {}): {snippet}",
                status.as_u16()
            )));
        }
        let parsed: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("unexpected transcription response: {e}")))?;
        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(Error::Extraction("the recording contained no speech".into()));
        }
        Ok(text)
    }
}

fn file_extension(media_type: &str) -> &'static str {
    match media_type.split(';').next().unwrap_or("").trim() {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        _ => "webm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_media_type() {
        assert_eq!(file_extension("audio/mpeg"), "mp3");
        assert_eq!(file_extension("audio/webm;codecs=opus"), "webm");
        assert_eq!(file_extension("audio/x-m4a"), "m4a");
    }

    #[tokio::test]
    async fn missing_key_is_an_extraction_error() {
        let cfg = EnrichmentConfig {
            transcription_key_env: "PP_TEST_NO_TRANSCRIBE_KEY_5521".into(),
            ..Default::default()
        };
        let t = Transcriber::from_config(&cfg, reqwest::Client::new());
        let err = t.transcribe(vec![0u8; 4], "audio/webm").await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
