//! Header image lookup for articles.

use std::time::Duration;

use async_trait::async_trait;
use pp_domain::config::EnrichmentConfig;
use pp_domain::error::{Error, Result};
use serde::Deserialize;

#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// The URL of the best matching image, or `None` when nothing fits.
    async fn find_one(&self, query: &str) -> Result<Option<String>>;
}

/// Unsplash-style photo search (`GET ?query=..`, `Client-ID` auth).
pub struct HttpImageSearch {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Deserialize)]
struct PhotoUrls {
    #[serde(default)]
    regular: Option<String>,
    #[serde(default)]
    full: Option<String>,
}

impl HttpImageSearch {
    pub fn from_config(cfg: &EnrichmentConfig) -> Result<Self> {
        let api_key = super::key_from_env(&cfg.image_search_key_env);
        if api_key.is_none() {
            tracing::info!(
                env = %cfg.image_search_key_env,
                "image search key not set; articles will be created without header images"
            );
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            url: cfg.image_search_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ImageSearch for HttpImageSearch {
    async fn find_one(&self, query: &str) -> Result<Option<String>> {
        let Some(key) = &self.api_key else {
            return Ok(None);
        };
        let resp = self
            .client
            .get(&self.url)
            .query(&[("query", query), ("per_page", "1"), ("orientation", "landscape")])
            .header("Authorization", format!("Client-ID {key}"))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!(
                "image search returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Http(format!("image search response: {e}")))?;
        Ok(first_image_url(body))
    }
}

fn first_image_url(body: SearchResponse) -> Option<String> {
    body.results
        .into_iter()
        .next()
        .and_then(|p| p.urls.regular.or(p.urls.full))
}
