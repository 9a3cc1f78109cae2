use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::KiraError;

pub const FIELD_CANONICAL_NAME: &str = "speciesName";
pub const FIELD_COMMON_NAME: &str = "vernacularName";
pub const FIELD_AUTHORSHIP: &str = "scientificNameAuthorship";
pub const FIELD_KINGDOM: &str = "kingdom";
pub const FIELD_PHYLUM: &str = "phylum";
pub const FIELD_CLASS: &str = "class";
pub const FIELD_ORDER: &str = "order";
pub const FIELD_FAMILY: &str = "family";
pub const FIELD_GENUS: &str = "genus";
pub const FIELD_NUMBER_OF_RECORDS: &str = "numberOfRecords";

const STATUS_MARKERS: &[&str] = &["status", "threatened"];
const MENTION_MARKERS: &[&str] = &["agreement", "taxa", "wons", "pests", "list"];

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("camel boundary regex"));
static LISTING_BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)conservation\s+status|status|priority|:").expect("listing boilerplate regex")
});
static EPBC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bepbc\b").expect("epbc regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Taxonomy {
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
}

impl Taxonomy {
    /// Ranks in display order, kingdom first.
    pub fn ranks(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("Kingdom", self.kingdom.as_deref()),
            ("Phylum", self.phylum.as_deref()),
            ("Class", self.class.as_deref()),
            ("Order", self.order.as_deref()),
            ("Family", self.family.as_deref()),
            ("Genus", self.genus.as_deref()),
        ]
    }
}

/// An active conservation status or threatened-species listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub field: String,
    pub label: String,
    pub value: String,
}

/// Membership in an agreement, weed/pest list or migratory-taxa convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mention {
    pub field: String,
    pub label: String,
    pub value: String,
}

impl Mention {
    pub fn display_value(&self) -> &str {
        if self.value == "Y" { "Yes" } else { &self.value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    canonical_name: String,
    common_name: Option<String>,
    authorship: Option<String>,
    taxonomy: Taxonomy,
    number_of_records: Option<String>,
    extras: Vec<(String, String)>,
    listings: Vec<Listing>,
    mentions: Vec<Mention>,
}

impl Record {
    /// Normalizes camel-cased column/value pairs into a record.
    ///
    /// Named columns are lifted into typed fields; every other column is kept
    /// in input order as an extra and classified once into listings and
    /// mentions.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self, KiraError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut canonical_name = None;
        let mut common_name = None;
        let mut authorship = None;
        let mut taxonomy = Taxonomy::default();
        let mut number_of_records = None;
        let mut extras = Vec::new();

        for (key, value) in fields {
            let key = key.into();
            let value = value.into().trim().to_string();
            let present = (!value.is_empty()).then(|| value.clone());
            match key.as_str() {
                FIELD_CANONICAL_NAME => canonical_name = present,
                FIELD_COMMON_NAME => common_name = present,
                FIELD_AUTHORSHIP => authorship = present,
                FIELD_KINGDOM => taxonomy.kingdom = present,
                FIELD_PHYLUM => taxonomy.phylum = present,
                FIELD_CLASS => taxonomy.class = present,
                FIELD_ORDER => taxonomy.order = present,
                FIELD_FAMILY => taxonomy.family = present,
                FIELD_GENUS => taxonomy.genus = present,
                FIELD_NUMBER_OF_RECORDS => number_of_records = present,
                _ => extras.push((key, value)),
            }
        }

        let canonical_name = canonical_name.ok_or_else(|| {
            KiraError::InvalidRecord(format!("missing {FIELD_CANONICAL_NAME}"))
        })?;

        let mut listings = Vec::new();
        let mut mentions = Vec::new();
        for (key, value) in &extras {
            if value.is_empty() {
                continue;
            }
            match classify_field(key) {
                Some(FieldClass::Status) => listings.push(Listing {
                    field: key.clone(),
                    label: listing_label(key),
                    value: value.clone(),
                }),
                Some(FieldClass::Mention) => mentions.push(Mention {
                    field: key.clone(),
                    label: mention_label(key),
                    value: value.clone(),
                }),
                None => {}
            }
        }

        Ok(Self {
            canonical_name,
            common_name,
            authorship,
            taxonomy,
            number_of_records,
            extras,
            listings,
            mentions,
        })
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    /// Common name if present, else canonical name.
    pub fn display_name(&self) -> &str {
        self.common_name.as_deref().unwrap_or(&self.canonical_name)
    }

    pub fn search_title(&self) -> &str {
        search_title(&self.canonical_name)
    }

    pub fn authorship(&self) -> Option<&str> {
        self.authorship.as_deref()
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn kingdom(&self) -> Option<&str> {
        self.taxonomy.kingdom.as_deref()
    }

    pub fn number_of_records(&self) -> Option<&str> {
        self.number_of_records.as_deref()
    }

    pub fn extras(&self) -> &[(String, String)] {
        &self.extras
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn mentions(&self) -> &[Mention] {
        &self.mentions
    }

    pub fn folder_key(&self) -> FolderKey {
        FolderKey::from_display_name(self.display_name())
    }
}

/// The part of a canonical name before any parenthetical qualifier.
pub fn search_title(canonical_name: &str) -> &str {
    canonical_name
        .split('(')
        .next()
        .unwrap_or(canonical_name)
        .trim()
}

/// Filesystem-safe directory name derived from a display name.
///
/// Alphanumerics are kept, whitespace runs become one underscore, `-` and `_`
/// survive, everything else is dropped. Distinct names may collapse to the
/// same key; the later record then reuses the earlier folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FolderKey(String);

impl FolderKey {
    pub fn from_display_name(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut last_underscore = false;
        for ch in name.chars() {
            if ch.is_alphanumeric() {
                out.push(ch);
                last_underscore = false;
            } else if ch.is_whitespace() || ch == '_' {
                if !last_underscore {
                    out.push('_');
                    last_underscore = true;
                }
            } else if ch == '-' {
                out.push(ch);
                last_underscore = false;
            }
        }
        let trimmed = out.trim_matches('_');
        if trimmed.is_empty() {
            Self("species".to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Status,
    Mention,
}

pub fn classify_field(key: &str) -> Option<FieldClass> {
    let lower = key.to_lowercase();
    if STATUS_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Some(FieldClass::Status)
    } else if MENTION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Some(FieldClass::Mention)
    } else {
        None
    }
}

pub fn listing_label(key: &str) -> String {
    let spaced = split_camel(key);
    let stripped = LISTING_BOILERPLATE.replace_all(&spaced, " ");
    let normalized = EPBC.replace_all(&stripped, "EPBC");
    capitalize(&collapse_whitespace(&normalized))
}

pub fn mention_label(key: &str) -> String {
    capitalize(&collapse_whitespace(&split_camel(key)))
}

fn split_camel(key: &str) -> String {
    CAMEL_BOUNDARY.replace_all(key, "$1 $2").into_owned()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
