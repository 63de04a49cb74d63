//! Business / place lookup for `SEARCH_EXTERNAL`.

use std::time::Duration;

use async_trait::async_trait;
use pp_domain::config::EnrichmentConfig;
use pp_domain::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Structured lookup result. Every field except `name` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub name: String,
    pub rating: Option<f64>,
    pub rating_count: Option<u32>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub hours: Vec<String>,
    pub socials: Vec<String>,
    pub maps_url: Option<String>,
}

#[async_trait]
pub trait PlaceLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Option<PlaceDetails>>;
}

/// Render a place as a markdown summary. Missing fields are left out.
pub fn format_place_markdown(place: &PlaceDetails) -> String {
    let mut out = format!("**{}**\n", place.name);
    if let Some(rating) = place.rating {
        match place.rating_count {
            Some(n) => out.push_str(&format!("- Rating: {rating:.1}/5 ({n} reviews)\n")),
            None => out.push_str(&format!("- Rating: {rating:.1}/5\n")),
        }
    }
    if let Some(address) = &place.address {
        out.push_str(&format!("- Address: {address}\n"));
    }
    if let Some(phone) = &place.phone {
        out.push_str(&format!("- Phone: {phone}\n"));
    }
    if let Some(website) = &place.website {
        out.push_str(&format!("- Website: {website}\n"));
    }
    if !place.hours.is_empty() {
        out.push_str("- Hours:\n");
        for line in &place.hours {
            out.push_str(&format!("  - {line}\n"));
        }
    }
    if !place.socials.is_empty() {
        out.push_str(&format!("- Socials: {}\n", place.socials.join(", ")));
    }
    if let Some(maps) = &place.maps_url {
        out.push_str(&format!("- [Open in Maps]({maps})\n"));
    }
    out.trim_end().to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP implementation (Places Text Search)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const FIELD_MASK: &str = "places.displayName,places.formattedAddress,places.rating,\
places.userRatingCount,places.nationalPhoneNumber,places.websiteUri,\
places.regularOpeningHours,places.googleMapsUri";

const SOCIAL_HOSTS: [&str; 6] = [
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
];

pub struct HttpPlaceLookup {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    key_env: String,
}

impl HttpPlaceLookup {
    pub fn from_config(cfg: &EnrichmentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            url: cfg.places_url.clone(),
            api_key: super::key_from_env(&cfg.places_key_env),
            key_env: cfg.places_key_env.clone(),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextSearchResponse {
    #[serde(default)]
    places: Vec<PlaceRow>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceRow {
    #[serde(default)]
    display_name: Option<LocalizedText>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    user_rating_count: Option<u32>,
    #[serde(default)]
    national_phone_number: Option<String>,
    #[serde(default)]
    website_uri: Option<String>,
    #[serde(default)]
    regular_opening_hours: Option<OpeningHours>,
    #[serde(default)]
    google_maps_uri: Option<String>,
}

#[derive(Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpeningHours {
    #[serde(default)]
    weekday_descriptions: Vec<String>,
}

impl PlaceRow {
    fn into_details(self, query: &str) -> PlaceDetails {
        let (website, socials) = match self.website_uri {
            Some(uri) if SOCIAL_HOSTS.iter().any(|h| uri.contains(h)) => (None, vec![uri]),
            other => (other, Vec::new()),
        };
        PlaceDetails {
            name: self
                .display_name
                .map(|n| n.text)
                .unwrap_or_else(|| query.to_string()),
            rating: self.rating,
            rating_count: self.user_rating_count,
            address: self.formatted_address,
            phone: self.national_phone_number,
            website,
            hours: self
                .regular_opening_hours
                .map(|h| h.weekday_descriptions)
                .unwrap_or_default(),
            socials,
            maps_url: self.google_maps_uri,
        }
    }
}

#[async_trait]
impl PlaceLookup for HttpPlaceLookup {
    async fn lookup(&self, query: &str) -> Result<Option<PlaceDetails>> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            Error::Config(format!("place lookup key env var '{}' is not set", self.key_env))
        })?;
        let resp = self
            .client
            .post(&self.url)
            .header("X-Goog-Api-Key", key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&serde_json::json!({ "textQuery": query }))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!(
                "place lookup returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        let body: TextSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Http(format!("place lookup response: {e}")))?;
        Ok(body.places.into_iter().next().map(|p| p.into_details(query)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_omits_missing_fields() {
        let place = PlaceDetails {
            name: "Riverside Hall".into(),
            address: Some("1 River Rd".into()),
            ..Default::default()
        };
        let md = format_place_markdown(&place);
        assert_eq!(md, "**Riverside Hall**\n- Address: 1 River Rd");
        assert!(!md.contains("Phone"));
        assert!(!md.contains("Rating"));
    }

    #[test]
    fn markdown_lists_hours_and_rating() {
        let place = PlaceDetails {
            name: "Cafe Uno".into(),
            rating: Some(4.46),
            rating_count: Some(212),
            hours: vec!["Monday: 8 AM - 5 PM".into()],
            ..Default::default()
        };
        let md = format_place_markdown(&place);
        assert!(md.contains("- Rating: 4.5/5 (212 reviews)"));
        assert!(md.contains("  - Monday: 8 AM - 5 PM"));
    }

    #[test]
    fn social_website_is_listed_as_social() {
        let row: PlaceRow = serde_json::from_str(
            r#"{"displayName": {"text": "Bakery"}, "websiteUri": "https://instagram.com/bakery"}"#,
        )
        .unwrap();
        let details = row.into_details("bakery");
        assert!(details.website.is_none());
        assert_eq!(details.socials, vec!["https://instagram.com/bakery"]);
    }

    #[test]
    fn row_without_name_falls_back_to_query() {
        let row: PlaceRow = serde_json::from_str(r#"{"rating": 4.0}"#).unwrap();
        assert_eq!(row.into_details("Riverside Hall").name, "Riverside Hall");
    }
}
