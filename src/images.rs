use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::domain::Record;
use crate::error::KiraError;
use crate::http;

pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// One external image source, queried by search title.
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn lookup(&self, title: &str) -> Result<Option<String>, KiraError>;
}

pub trait ImageResolver: Send + Sync {
    /// Best image URL for the record, or `None` when no provider has one.
    fn resolve_image(&self, record: &Record) -> Option<String>;
}

pub trait ImageDownloader: Send + Sync {
    fn download(&self, url: &str) -> Result<Vec<u8>, KiraError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Wikipedia,
    Inaturalist,
}

impl ProviderKind {
    pub fn default_order() -> Vec<ProviderKind> {
        vec![ProviderKind::Wikipedia, ProviderKind::Inaturalist]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Wikipedia => write!(f, "wikipedia"),
            ProviderKind::Inaturalist => write!(f, "inaturalist"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "wikipedia" => Ok(ProviderKind::Wikipedia),
            "inaturalist" => Ok(ProviderKind::Inaturalist),
            _ => Err(KiraError::UnknownProvider(value.to_string())),
        }
    }
}

/// Tries providers in order and returns the first non-empty URL. A failing
/// provider is logged and the next one is tried.
pub struct ChainedImageResolver {
    providers: Vec<Box<dyn ImageProvider>>,
}

impl ChainedImageResolver {
    pub fn new(providers: Vec<Box<dyn ImageProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }
}

impl ImageResolver for ChainedImageResolver {
    fn resolve_image(&self, record: &Record) -> Option<String> {
        let title = record.search_title();
        if title.is_empty() {
            return None;
        }
        for provider in &self.providers {
            match provider.lookup(title) {
                Ok(Some(url)) if !url.trim().is_empty() => {
                    debug!(provider = provider.name(), title, "image resolved");
                    return Some(url);
                }
                Ok(_) => debug!(provider = provider.name(), title, "no image"),
                Err(err) => warn!(
                    provider = provider.name(),
                    title, "image lookup failed: {err}"
                ),
            }
        }
        None
    }
}

#[derive(Clone)]
pub struct HttpImageDownloader {
    client: Client,
}

impl HttpImageDownloader {
    pub fn new(timeout: Duration) -> Result<Self, KiraError> {
        let client = http::blocking_client(timeout).map_err(KiraError::ImageHttp)?;
        Ok(Self { client })
    }
}

impl ImageDownloader for HttpImageDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, KiraError> {
        debug!(url, "image.request");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| KiraError::ImageHttp(err.to_string()))?;
        let response = http::check_status(response).map_err(|(status, _)| {
            KiraError::ImageStatus {
                status,
                url: url.to_string(),
            }
        })?;
        let bytes = response
            .bytes()
            .map_err(|err| KiraError::ImageHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Extension of the last path segment of `url`, or [`DEFAULT_IMAGE_EXTENSION`]
/// when the URL has none. Query strings and fragments are ignored.
pub fn image_extension(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return DEFAULT_IMAGE_EXTENSION.to_string();
    };
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|ch| ch.is_ascii_alphanumeric())
        })
        .unwrap_or(DEFAULT_IMAGE_EXTENSION)
        .to_string()
}

pub fn image_file_name(url: &str) -> String {
    format!("image.{}", image_extension(url))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;

    use super::*;

    struct FixedProvider {
        name: &'static str,
        result: Result<Option<String>, String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FixedProvider {
        fn new(name: &'static str, result: Result<Option<&str>, &str>) -> Self {
            Self {
                name,
                result: result
                    .map(|url| url.map(str::to_string))
                    .map_err(str::to_string),
                calls: Arc::default(),
            }
        }
    }

    impl ImageProvider for FixedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn lookup(&self, title: &str) -> Result<Option<String>, KiraError> {
            self.calls.lock().unwrap().push(title.to_string());
            self.result
                .clone()
                .map_err(KiraError::WikipediaHttp)
        }
    }

    fn fox() -> Record {
        Record::from_fields([("speciesName", "Vulpes vulpes (Linnaeus)")]).unwrap()
    }

    #[test]
    fn first_provider_wins() {
        let resolver = ChainedImageResolver::new(vec![
            Box::new(FixedProvider::new("a", Ok(Some("https://a.test/fox.png")))),
            Box::new(FixedProvider::new("b", Ok(Some("https://b.test/fox.jpg")))),
        ]);
        assert_eq!(
            resolver.resolve_image(&fox()).as_deref(),
            Some("https://a.test/fox.png")
        );
    }

    #[test]
    fn failure_falls_through_to_next_provider() {
        let resolver = ChainedImageResolver::new(vec![
            Box::new(FixedProvider::new("a", Err("timeout"))),
            Box::new(FixedProvider::new("b", Ok(Some("https://b.test/fox.jpg")))),
        ]);
        assert_eq!(
            resolver.resolve_image(&fox()).as_deref(),
            Some("https://b.test/fox.jpg")
        );
        assert_eq!(resolver.provider_names(), vec!["a", "b"]);
    }

    #[test]
    fn resolver_queries_providers_with_search_title() {
        let first = FixedProvider::new("a", Ok(None));
        let second = FixedProvider::new("b", Ok(Some("https://b.test/fox.jpg")));
        let (first_calls, second_calls) = (first.calls.clone(), second.calls.clone());
        let resolver = ChainedImageResolver::new(vec![Box::new(first), Box::new(second)]);

        assert_eq!(
            resolver.resolve_image(&fox()).as_deref(),
            Some("https://b.test/fox.jpg")
        );
        assert_eq!(*first_calls.lock().unwrap(), vec!["Vulpes vulpes"]);
        assert_eq!(*second_calls.lock().unwrap(), vec!["Vulpes vulpes"]);
    }

    #[test]
    fn none_when_every_provider_misses() {
        let resolver = ChainedImageResolver::new(vec![
            Box::new(FixedProvider::new("a", Ok(None))),
            Box::new(FixedProvider::new("b", Ok(Some("  ")))),
        ]);
        assert_eq!(resolver.resolve_image(&fox()), None);
    }

    #[test]
    fn extension_from_url_path() {
        assert_eq!(
            image_extension("https://upload.wikimedia.org/thumb/a/ab/Vulpes_vulpes.jpg/1200px-Vulpes_vulpes.jpg"),
            "jpg"
        );
        assert_eq!(
            image_extension("https://static.inaturalist.org/photos/1/large.jpeg?12345"),
            "jpeg"
        );
        assert_eq!(image_extension("https://example.org/photo.PNG#frag"), "PNG");
        assert_eq!(image_extension("https://example.org/photos/12345"), "jpg");
        assert_eq!(image_extension("https://example.org/"), "jpg");
        assert_eq!(image_extension("not a url"), "jpg");
        assert_eq!(image_file_name("https://a.test/x.webp"), "image.webp");
    }

    #[test]
    fn provider_kind_parsing() {
        assert_eq!(
            "iNaturalist".parse::<ProviderKind>().unwrap(),
            ProviderKind::Inaturalist
        );
        assert_matches!(
            "flickr".parse::<ProviderKind>(),
            Err(KiraError::UnknownProvider(_))
        );
    }
}
