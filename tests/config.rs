use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use kira_species_library::config::{Config, ConfigLoader, ResolvedConfig};
use kira_species_library::error::KiraError;
use kira_species_library::images::ProviderKind;

#[test]
fn resolve_reads_json_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-sl.json");
    fs::write(
        &path,
        r#"{
  "schema_version": 1,
  "dataset": "data/victoria.csv",
  "library_name": "Victorian_Species",
  "http_timeout_secs": 10,
  "image_providers": ["inaturalist", "wikipedia"]
}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.dataset, "data/victoria.csv");
    assert_eq!(resolved.output, "Flora_and_Fauna_Library.zip");
    assert_eq!(resolved.library_name, "Victorian_Species");
    assert_eq!(resolved.http_timeout, Duration::from_secs(10));
    assert_eq!(resolved.thumbnail_size, 1200);
    assert_eq!(
        resolved.image_providers,
        vec![ProviderKind::Inaturalist, ProviderKind::Wikipedia]
    );
}

#[test]
fn explicit_missing_path_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(KiraError::ConfigRead(missing)) if missing == path
    );
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-sl.json");
    fs::write(&path, "{ \"dataset\": ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(KiraError::ConfigParse(_))
    );
}

#[test]
fn blank_library_name_is_rejected() {
    let config = Config {
        library_name: Some("   ".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(KiraError::ConfigParse(_))
    );
    assert_eq!(
        ConfigLoader::resolve_config(Config::default()).unwrap(),
        ResolvedConfig::default()
    );
}
