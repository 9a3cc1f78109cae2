use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid species record: {0}")]
    InvalidRecord(String),

    #[error("failed to read dataset at {0}")]
    DatasetRead(PathBuf),

    #[error("dataset contains no species records")]
    EmptyDataset,

    #[error("species not found: {0}")]
    RecordNotFound(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("unknown image provider: {0}")]
    UnknownProvider(String),

    #[error("Wikipedia request failed: {0}")]
    WikipediaHttp(String),

    #[error("Wikipedia returned status {status}: {message}")]
    WikipediaStatus { status: u16, message: String },

    #[error("Wikipedia lookup failed: {0}")]
    WikipediaLookup(String),

    #[error("iNaturalist request failed: {0}")]
    InaturalistHttp(String),

    #[error("iNaturalist returned status {status}: {message}")]
    InaturalistStatus { status: u16, message: String },

    #[error("image download failed: {0}")]
    ImageHttp(String),

    #[error("image host returned status {status} for {url}")]
    ImageStatus { status: u16, url: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("archive serialization failed: {0}")]
    Archive(String),
}
