//! Static HTML pages for the offline library.
//!
//! Rendering is pure: the same inputs always produce byte-identical output.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use url::Url;

use crate::domain::{FolderKey, Record};
use crate::wikipedia;

pub const OFFLINE_ARTICLE_FILE: &str = "wikipedia.html";
pub const PAGE_FILE: &str = "index.html";
pub const NOT_AVAILABLE: &str = "N/A";

const BIODIVERSITY_TAXA_BASE: &str = "https://biodiversity.org.au/afd/taxa/";
const INATURALIST_SEARCH: &str = "https://www.inaturalist.org/taxa/search";

const PAGE_STYLE: &str = "body{font-family:sans-serif;background:#111827;color:#e5e7eb;max-width:960px;margin:0 auto;padding:1.5rem}\
a{color:#22d3ee}\
.card{background:#1f2937;border-radius:8px;padding:1rem;margin-bottom:1rem}\
.card h3{color:#22d3ee;border-bottom:1px solid #374151;margin-top:0}\
.row{display:flex;justify-content:space-between;padding:.2rem 0}\
.label{color:#9ca3af}\
.placeholder{background:#1f2937;border-radius:8px;padding:3rem;text-align:center;color:#6b7280}\
img.species{width:100%;border-radius:8px}";

/// One link of the library index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub folder: FolderKey,
    pub label: String,
}

/// Detail page for one record.
///
/// `local_image` is a path relative to the page; without it a placeholder is
/// shown. The Wikipedia link targets the local offline copy when
/// `has_offline_article` is set and the live site otherwise.
pub fn render_detail_page(
    record: &Record,
    local_image: Option<&str>,
    has_offline_article: bool,
) -> String {
    let display = record.display_name();
    let canonical = record.canonical_name();
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{PAGE_STYLE}</style>\n</head>\n<body>\n",
        text(display)
    );
    let _ = writeln!(html, "<h1>{}</h1>", text(display));
    let _ = write!(html, "<p><i>{}</i>", text(canonical));
    if let Some(authorship) = record.authorship() {
        let _ = write!(html, " {}", text(authorship));
    }
    html.push_str("</p>\n");

    match local_image {
        Some(path) => {
            let _ = writeln!(
                html,
                "<img class=\"species\" src=\"{}\" alt=\"Illustration of {}\">",
                attr(path),
                attr(display)
            );
        }
        None => {
            let _ = writeln!(
                html,
                "<div class=\"placeholder\"><p>Image not available</p><p>(Illustration of {})</p></div>",
                text(display)
            );
        }
    }

    html.push_str("<div class=\"card\">\n<h3>Taxonomy</h3>\n");
    for (label, value) in record.taxonomy().ranks() {
        push_row(&mut html, label, value.unwrap_or(NOT_AVAILABLE));
    }
    html.push_str("</div>\n");

    html.push_str("<div class=\"card\">\n<h3>Records</h3>\n");
    push_row(
        &mut html,
        "Number of records",
        record.number_of_records().unwrap_or(NOT_AVAILABLE),
    );
    for mention in record.mentions() {
        push_row(&mut html, &mention.label, mention.display_value());
    }
    html.push_str("</div>\n");

    if !record.listings().is_empty() {
        html.push_str("<div class=\"card\">\n<h3>Conservation Status</h3>\n");
        for listing in record.listings() {
            push_row(&mut html, &listing.label, &listing.value);
        }
        html.push_str("</div>\n");
    }

    let (wiki_href, wiki_label) = if has_offline_article {
        (
            format!("./{OFFLINE_ARTICLE_FILE}"),
            "Wikipedia (Offline Copy)",
        )
    } else {
        (
            wikipedia::article_url(canonical),
            "Wikipedia (Requires Internet)",
        )
    };
    html.push_str("<div class=\"card\">\n<h3>External Links</h3>\n<ul>\n");
    push_link(&mut html, &biodiversity_url(canonical), "Biodiversity.org.au");
    push_link(&mut html, &wiki_href, wiki_label);
    push_link(&mut html, &inaturalist_url(canonical), "iNaturalist");
    html.push_str("</ul>\n</div>\n</body>\n</html>\n");
    html
}

/// Root page of the library listing every record folder in the given order.
pub fn render_library_index(title: &str, entries: &[IndexEntry]) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{PAGE_STYLE}</style>\n</head>\n<body>\n<h1>{}</h1>\n",
        text(title),
        text(title)
    );
    html.push_str(
        "<p>This library works offline. Each species page links to a local copy of its Wikipedia article when one could be downloaded; other links need an internet connection.</p>\n",
    );
    html.push_str("<ul>\n");
    for entry in entries {
        let href = format!("./{}/{PAGE_FILE}", entry.folder);
        push_link(&mut html, &href, &entry.label);
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

pub fn biodiversity_url(canonical_name: &str) -> String {
    format!(
        "{BIODIVERSITY_TAXA_BASE}{}",
        canonical_name.replace(' ', "_")
    )
}

pub fn inaturalist_url(canonical_name: &str) -> String {
    match Url::parse_with_params(INATURALIST_SEARCH, &[("q", canonical_name)]) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{INATURALIST_SEARCH}?q={canonical_name}"),
    }
}

fn push_row(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        html,
        "<div class=\"row\"><span class=\"label\">{}:</span><span>{}</span></div>",
        text(label),
        text(value)
    );
}

fn push_link(html: &mut String, href: &str, label: &str) {
    let _ = writeln!(
        html,
        "<li><a href=\"{}\">{}</a></li>",
        attr(href),
        text(label)
    );
}
