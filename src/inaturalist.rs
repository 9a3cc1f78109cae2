use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::KiraError;
use crate::http;
use crate::images::ImageProvider;

pub const INATURALIST_TAXA_API: &str = "https://api.inaturalist.org/v1/taxa";

#[derive(Clone)]
pub struct InaturalistHttpClient {
    client: Client,
}

impl InaturalistHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, KiraError> {
        let client = http::blocking_client(timeout).map_err(KiraError::InaturalistHttp)?;
        Ok(Self { client })
    }

    pub fn search_taxa(&self, query: &str) -> Result<Value, KiraError> {
        debug!(query, "inaturalist.request");
        let response = self
            .client
            .get(INATURALIST_TAXA_API)
            .query(&[("q", query)])
            .send()
            .map_err(|err| KiraError::InaturalistHttp(err.to_string()))?;
        let response = http::check_status(response)
            .map_err(|(status, message)| KiraError::InaturalistStatus { status, message })?;
        response
            .json()
            .map_err(|err| KiraError::InaturalistHttp(err.to_string()))
    }
}

impl ImageProvider for InaturalistHttpClient {
    fn name(&self) -> &'static str {
        "inaturalist"
    }

    fn lookup(&self, title: &str) -> Result<Option<String>, KiraError> {
        let payload = self.search_taxa(title)?;
        Ok(extract_default_photo(&payload))
    }
}

/// Large photo of the best-matching taxon, falling back to the medium size.
pub fn extract_default_photo(payload: &Value) -> Option<String> {
    let photo = payload
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .and_then(|taxon| taxon.get("default_photo"))?;
    ["large_url", "medium_url"].iter().find_map(|key| {
        photo
            .get(*key)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prefers_large_photo() {
        let payload = json!({"total_results": 2, "results": [
            {"name": "Vulpes vulpes", "default_photo": {
                "medium_url": "https://static.inaturalist.org/photos/1/medium.jpg",
                "large_url": "https://static.inaturalist.org/photos/1/large.jpg"
            }},
            {"name": "Vulpes lagopus", "default_photo": {
                "large_url": "https://static.inaturalist.org/photos/2/large.jpg"
            }}
        ]});
        assert_eq!(
            extract_default_photo(&payload).as_deref(),
            Some("https://static.inaturalist.org/photos/1/large.jpg")
        );
    }

    #[test]
    fn falls_back_to_medium_then_none() {
        let medium = json!({"results": [{"default_photo": {"large_url": null, "medium_url": "https://static.inaturalist.org/photos/3/medium.jpeg"}}]});
        assert_eq!(
            extract_default_photo(&medium).as_deref(),
            Some("https://static.inaturalist.org/photos/3/medium.jpeg")
        );

        assert_eq!(extract_default_photo(&json!({"results": []})), None);
        assert_eq!(
            extract_default_photo(&json!({"results": [{"default_photo": null}]})),
            None
        );
    }
}
