use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::domain::Record;
use crate::error::KiraError;

pub const ALL_KINGDOMS: &str = "All";

/// Ordered, immutable collection of species records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn load(path: &Path) -> Result<Self, KiraError> {
        let content =
            fs::read_to_string(path).map_err(|_| KiraError::DatasetRead(path.to_path_buf()))?;
        Ok(Self::from_csv_str(&content))
    }

    /// Parses a CSV export whose first line is the header row.
    ///
    /// Rows without a canonical name are logged and skipped.
    pub fn from_csv_str(text: &str) -> Self {
        let mut lines = text.trim().lines();
        let Some(header_line) = lines.next() else {
            return Self::default();
        };
        let headers = split_line(header_line)
            .iter()
            .map(|cell| camel_case_header(cell))
            .collect::<Vec<_>>();

        let mut records = Vec::new();
        for (index, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let values = split_line(line);
            let fields = headers.iter().enumerate().map(|(column, header)| {
                let value = values.get(column).cloned().unwrap_or_default();
                (header.clone(), value)
            });
            match Record::from_fields(fields) {
                Ok(record) => records.push(record),
                Err(err) => warn!(row = index + 2, "skipping row: {err}"),
            }
        }
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct non-empty kingdoms, sorted.
    pub fn kingdoms(&self) -> Vec<String> {
        let mut kingdoms = self
            .records
            .iter()
            .filter_map(|record| record.kingdom())
            .map(str::to_string)
            .collect::<Vec<_>>();
        kingdoms.sort();
        kingdoms.dedup();
        kingdoms
    }

    /// Case-insensitive substring match on canonical or common name, optionally
    /// restricted to one kingdom. `None` or `"All"` matches every kingdom.
    pub fn search(&self, term: &str, kingdom: Option<&str>) -> Vec<&Record> {
        let needle = term.trim().to_lowercase();
        let kingdom = kingdom.filter(|value| *value != ALL_KINGDOMS);
        self.records
            .iter()
            .filter(|record| {
                let matches_name = record.canonical_name().to_lowercase().contains(&needle)
                    || record
                        .common_name()
                        .map(|name| name.to_lowercase().contains(&needle))
                        .unwrap_or(false);
                let matches_kingdom = kingdom
                    .map(|wanted| record.kingdom() == Some(wanted))
                    .unwrap_or(true);
                matches_name && matches_kingdom
            })
            .collect()
    }

    pub fn find(&self, name: &str) -> Result<&Record, KiraError> {
        let wanted = name.trim();
        self.records
            .iter()
            .find(|record| {
                record.canonical_name().eq_ignore_ascii_case(wanted)
                    || record
                        .common_name()
                        .map(|common| common.eq_ignore_ascii_case(wanted))
                        .unwrap_or(false)
            })
            .ok_or_else(|| KiraError::RecordNotFound(wanted.to_string()))
    }
}

/// Splits one CSV line on commas outside double quotes. Quote characters are
/// dropped and each field is trimmed.
fn split_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.trim_end_matches('\r').chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => values.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(ch),
        }
    }
    values.push(current.trim().to_string());
    values
}

/// `"EPBC Act Threatened Species"` -> `epbcActThreatenedSpecies`.
pub fn camel_case_header(header: &str) -> String {
    let cleaned = header
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == ' ')
        .collect::<String>();

    let mut out = String::with_capacity(cleaned.len());
    for (index, word) in cleaned.split_whitespace().enumerate() {
        let mut chars = word.chars();
        let Some(first) = chars.next() else {
            continue;
        };
        if index == 0 {
            out.push(first.to_ascii_lowercase());
            out.extend(lower_leading_caps(chars.as_str(), word.len() > 1));
        } else {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// The first header word keeps its inner casing unless the whole word is upper
/// case (`EPBC` -> `epbc`, `species` -> `species`, `speciesName` unchanged).
fn lower_leading_caps(rest: &str, multi_char: bool) -> Vec<char> {
    if multi_char && rest.chars().all(|ch| !ch.is_ascii_lowercase()) {
        rest.chars().map(|ch| ch.to_ascii_lowercase()).collect()
    } else {
        rest.chars().collect()
    }
}
