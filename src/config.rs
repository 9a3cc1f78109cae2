use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::builder::{ARCHIVE_FILE_NAME, LIBRARY_DIR};
use crate::error::KiraError;
use crate::http::DEFAULT_TIMEOUT;
use crate::images::ProviderKind;
use crate::wikipedia::DEFAULT_THUMBNAIL_SIZE;

pub const DEFAULT_CONFIG_FILE: &str = "kira-sl.json";
pub const DEFAULT_DATASET: &str = "species.csv";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub library_name: Option<String>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub thumbnail_size: Option<u32>,
    #[serde(default)]
    pub image_providers: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub dataset: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub library_name: String,
    pub http_timeout: Duration,
    pub thumbnail_size: u32,
    pub image_providers: Vec<ProviderKind>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            dataset: Utf8PathBuf::from(DEFAULT_DATASET),
            output: Utf8PathBuf::from(ARCHIVE_FILE_NAME),
            library_name: LIBRARY_DIR.to_string(),
            http_timeout: DEFAULT_TIMEOUT,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            image_providers: ProviderKind::default_order(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kira-sl.json` when no path is given. Only an
    /// explicitly named file has to exist.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let defaults = ResolvedConfig::default();

        let library_name = match config.library_name {
            Some(name) if name.trim().is_empty() => {
                return Err(KiraError::ConfigParse(
                    "library_name must not be empty".to_string(),
                ));
            }
            Some(name) => name.trim().to_string(),
            None => defaults.library_name,
        };

        let http_timeout = match config.http_timeout_secs {
            Some(0) => {
                return Err(KiraError::ConfigParse(
                    "http_timeout_secs must be positive".to_string(),
                ));
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.http_timeout,
        };

        let image_providers = match config.image_providers {
            Some(names) => names
                .iter()
                .map(|name| name.parse())
                .collect::<Result<Vec<ProviderKind>, KiraError>>()?,
            None => defaults.image_providers,
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            dataset: config
                .dataset
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.dataset),
            output: config
                .output
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.output),
            library_name,
            http_timeout,
            thumbnail_size: config.thumbnail_size.unwrap_or(defaults.thumbnail_size),
            image_providers,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.output, "Flora_and_Fauna_Library.zip");
        assert_eq!(resolved.http_timeout, Duration::from_secs(30));
        assert_eq!(
            resolved.image_providers,
            vec![ProviderKind::Wikipedia, ProviderKind::Inaturalist]
        );
    }

    #[test]
    fn provider_order_follows_config() {
        let config = Config {
            image_providers: Some(vec!["inaturalist".to_string()]),
            thumbnail_size: Some(640),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.image_providers, vec![ProviderKind::Inaturalist]);
        assert_eq!(resolved.thumbnail_size, 640);
    }

    #[test]
    fn rejects_bad_values() {
        let config = Config {
            image_providers: Some(vec!["flickr".to_string()]),
            ..Config::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(config),
            Err(KiraError::UnknownProvider(name)) if name == "flickr"
        );

        let config = Config {
            http_timeout_secs: Some(0),
            ..Config::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(config),
            Err(KiraError::ConfigParse(_))
        );
    }
}
