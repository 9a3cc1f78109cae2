use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::domain::search_title;
use crate::error::KiraError;
use crate::http;
use crate::images::ImageProvider;

pub const WIKIPEDIA_ORIGIN: &str = "https://en.wikipedia.org";
pub const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 1200;

static WIKI_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(href\s*=\s*["']?)/wiki/"#).expect("wiki link regex"));
static PROTOCOL_RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(["'\s,(])//([A-Za-z0-9][A-Za-z0-9.-]*\.[A-Za-z]{2,})"#)
        .expect("protocol-relative regex")
});

const OFFLINE_STYLE: &str = "body{font-family:sans-serif;line-height:1.6;max-width:960px;margin:0 auto;padding:1rem 2rem;color:#202122}\
img{max-width:100%;height:auto}\
table{border-collapse:collapse}\
.offline-note{background:#eaf3ff;border:1px solid #a3c9ff;padding:.5rem 1rem;border-radius:4px}";

/// A Wikipedia article rewritten to render without the live site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineArticle {
    pub title: String,
    pub html: String,
}

impl OfflineArticle {
    pub fn from_raw(title: &str, raw_html: &str) -> Self {
        let body = rewrite_for_offline(raw_html);
        Self {
            title: title.to_string(),
            html: offline_document(title, &body),
        }
    }
}

pub trait ArticleFetcher: Send + Sync {
    /// Best-effort lookup; every failure is logged and reported as `None`.
    fn fetch_offline_article(&self, canonical_name: &str) -> Option<OfflineArticle>;
}

#[derive(Clone)]
pub struct WikipediaHttpClient {
    client: Client,
    thumbnail_size: u32,
}

impl WikipediaHttpClient {
    pub fn new(timeout: Duration, thumbnail_size: u32) -> Result<Self, KiraError> {
        let client = http::blocking_client(timeout).map_err(KiraError::WikipediaHttp)?;
        Ok(Self {
            client,
            thumbnail_size,
        })
    }

    fn query(&self, params: &[(&str, String)]) -> Result<Value, KiraError> {
        debug!(?params, "wikipedia.request");
        let response = self
            .client
            .get(WIKIPEDIA_API)
            .query(params)
            .send()
            .map_err(|err| KiraError::WikipediaHttp(err.to_string()))?;
        let response = http::check_status(response)
            .map_err(|(status, message)| KiraError::WikipediaStatus { status, message })?;
        response
            .json()
            .map_err(|err| KiraError::WikipediaHttp(err.to_string()))
    }

    /// Parsed article HTML for `title`, following redirects.
    pub fn fetch_article_html(&self, title: &str) -> Result<Option<String>, KiraError> {
        let payload = self.query(&[
            ("action", "parse".to_string()),
            ("page", title.to_string()),
            ("prop", "text".to_string()),
            ("redirects", "1".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
        ])?;
        extract_article_html(&payload)
    }

    pub fn fetch_page_image(&self, title: &str) -> Result<Option<String>, KiraError> {
        let payload = self.query(&[
            ("action", "query".to_string()),
            ("titles", title.to_string()),
            ("prop", "pageimages".to_string()),
            ("pithumbsize", self.thumbnail_size.to_string()),
            ("format", "json".to_string()),
        ])?;
        Ok(extract_page_image(&payload))
    }
}

impl ArticleFetcher for WikipediaHttpClient {
    fn fetch_offline_article(&self, canonical_name: &str) -> Option<OfflineArticle> {
        let title = search_title(canonical_name);
        if title.is_empty() {
            return None;
        }
        match self.fetch_article_html(title) {
            Ok(Some(html)) => Some(OfflineArticle::from_raw(title, &html)),
            Ok(None) => {
                debug!(title, "wikipedia article has no html payload");
                None
            }
            Err(err) => {
                warn!(title, "wikipedia article unavailable: {err}");
                None
            }
        }
    }
}

impl ImageProvider for WikipediaHttpClient {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    fn lookup(&self, title: &str) -> Result<Option<String>, KiraError> {
        self.fetch_page_image(title)
    }
}

/// Pulls the article HTML out of an `action=parse` response. Accepts both
/// format versions (`text` as a string or as `{"*": ...}`).
pub fn extract_article_html(payload: &Value) -> Result<Option<String>, KiraError> {
    if let Some(error) = payload.get("error") {
        let info = error
            .get("info")
            .and_then(Value::as_str)
            .or_else(|| error.get("code").and_then(Value::as_str))
            .unwrap_or("unknown error");
        return Err(KiraError::WikipediaLookup(info.to_string()));
    }
    let text = payload.get("parse").and_then(|parse| parse.get("text"));
    let html = text
        .and_then(Value::as_str)
        .or_else(|| text.and_then(|value| value.get("*")).and_then(Value::as_str))
        .filter(|html| !html.trim().is_empty())
        .map(str::to_string);
    Ok(html)
}

/// First thumbnail in an `action=query&prop=pageimages` response. Missing
/// pages (id `-1` or a `missing` marker) are skipped.
pub fn extract_page_image(payload: &Value) -> Option<String> {
    let pages = payload.get("query").and_then(|query| query.get("pages"))?;
    let candidates: Vec<&Value> = match pages {
        Value::Object(map) => map
            .iter()
            .filter(|(id, _)| id.as_str() != "-1")
            .map(|(_, page)| page)
            .collect(),
        Value::Array(items) => items.iter().collect(),
        _ => return None,
    };
    candidates
        .into_iter()
        .filter(|page| page.get("missing").is_none())
        .find_map(|page| {
            page.get("thumbnail")
                .and_then(|thumb| thumb.get("source"))
                .and_then(Value::as_str)
                .filter(|source| !source.is_empty())
                .map(str::to_string)
        })
}

/// Makes article HTML usable from a local file: `/wiki/` links become absolute
/// Wikipedia URLs and protocol-relative references become `https://`.
pub fn rewrite_for_offline(html: &str) -> String {
    let linked = WIKI_LINK.replace_all(html, format!("${{1}}{WIKIPEDIA_ORIGIN}/wiki/"));
    PROTOCOL_RELATIVE
        .replace_all(&linked, "${1}https://${2}")
        .into_owned()
}

pub fn offline_document(title: &str, body: &str) -> String {
    let escaped_title = html_escape::encode_text(title);
    let online = article_url(title);
    let online = html_escape::encode_double_quoted_attribute(&online);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>{escaped_title} - Wikipedia (Offline Copy)</title>\n<style>{OFFLINE_STYLE}</style>\n</head>\n<body>\n\
<p class=\"offline-note\">Offline copy of the Wikipedia article. <a href=\"{online}\">Read the live article online</a>.</p>\n\
<h1>{escaped_title}</h1>\n{body}\n</body>\n</html>\n"
    )
}

/// `https://en.wikipedia.org/wiki/<title>` with the title percent-encoded as
/// one path segment.
pub fn article_url(title: &str) -> String {
    let base = format!("{WIKIPEDIA_ORIGIN}/wiki/");
    match Url::parse(&base) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(title);
            }
            url.to_string()
        }
        Err(_) => format!("{base}{title}"),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn rewrites_wiki_links_and_protocol_relative_urls() {
        let raw = r##"<p><a href="/wiki/Canidae" title="Canidae">Canidae</a> and <a href='/wiki/Fox'>fox</a></p>
<img src="//upload.wikimedia.org/a/b/Fox.jpg" srcset="//upload.wikimedia.org/a/1.5x.jpg 1.5x, //upload.wikimedia.org/a/2x.jpg 2x">
<a href="https://example.org/wiki/Keep">keep</a> <a href="#cite">cite</a>"##;
        let rewritten = rewrite_for_offline(raw);

        assert!(!rewritten.contains("href=\"/wiki/"));
        assert!(!rewritten.contains("href='/wiki/"));
        assert!(rewritten.contains(r#"href="https://en.wikipedia.org/wiki/Canidae""#));
        assert!(rewritten.contains("href='https://en.wikipedia.org/wiki/Fox'"));
        assert!(rewritten.contains(r#"src="https://upload.wikimedia.org/a/b/Fox.jpg""#));
        assert!(rewritten.contains("https://upload.wikimedia.org/a/1.5x.jpg 1.5x, https://upload.wikimedia.org/a/2x.jpg 2x"));
        assert!(rewritten.contains(r#"href="https://example.org/wiki/Keep""#));
        assert!(rewritten.contains(r##"href="#cite""##));
        assert!(!rewritten.contains("\"//"));
    }

    #[test]
    fn rewrites_unquoted_and_spaced_wiki_links() {
        let raw = r#"<a href=/wiki/Fox>fox</a> <a href = "/wiki/Dingo">dingo</a>"#;
        let rewritten = rewrite_for_offline(raw);

        assert_eq!(
            rewritten,
            r#"<a href=https://en.wikipedia.org/wiki/Fox>fox</a> <a href = "https://en.wikipedia.org/wiki/Dingo">dingo</a>"#
        );
    }

    #[test]
    fn rewrite_leaves_plain_text_alone() {
        let raw = "<p>No links here, just 1/2 of a story.</p>";
        assert_eq!(rewrite_for_offline(raw), raw);
    }

    #[test]
    fn article_html_from_both_format_versions() {
        let v2 = json!({"parse": {"title": "Red fox", "text": "<div>fox</div>"}});
        assert_eq!(
            extract_article_html(&v2).unwrap().as_deref(),
            Some("<div>fox</div>")
        );

        let v1 = json!({"parse": {"title": "Red fox", "text": {"*": "<div>fox</div>"}}});
        assert_eq!(
            extract_article_html(&v1).unwrap().as_deref(),
            Some("<div>fox</div>")
        );

        let empty = json!({"parse": {"title": "Red fox"}});
        assert_eq!(extract_article_html(&empty).unwrap(), None);
    }

    #[test]
    fn lookup_error_is_reported() {
        let payload = json!({"error": {"code": "missingtitle", "info": "The page you specified doesn't exist."}});
        assert_matches!(
            extract_article_html(&payload),
            Err(KiraError::WikipediaLookup(_))
        );
    }

    #[test]
    fn page_image_skips_missing_pages() {
        let missing = json!({"query": {"pages": {"-1": {"title": "Nope", "missing": ""}}}});
        assert_eq!(extract_page_image(&missing), None);

        let found = json!({"query": {"pages": {"23097": {
            "title": "Red fox",
            "thumbnail": {"source": "https://upload.wikimedia.org/thumb/Vulpes.jpg", "width": 1200}
        }}}});
        assert_eq!(
            extract_page_image(&found).as_deref(),
            Some("https://upload.wikimedia.org/thumb/Vulpes.jpg")
        );

        let no_thumb = json!({"query": {"pages": {"1": {"title": "Stub"}}}});
        assert_eq!(extract_page_image(&no_thumb), None);
    }

    #[test]
    fn offline_document_links_back_online() {
        let doc = OfflineArticle::from_raw("Vulpes vulpes", "<p>Fox</p>").html;
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<title>Vulpes vulpes - Wikipedia (Offline Copy)</title>"));
        assert!(doc.contains(r#"href="https://en.wikipedia.org/wiki/Vulpes%20vulpes""#));
        assert!(doc.contains("<p>Fox</p>"));
    }
}
