use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_species_library::app::{App, BuildOptions, load_store};
use kira_species_library::builder::ArchiveBuilder;
use kira_species_library::domain::Record;
use kira_species_library::error::KiraError;
use kira_species_library::fs_util::validate_zip;
use kira_species_library::images::{ImageDownloader, ImageResolver};
use kira_species_library::output::JsonOutput;
use kira_species_library::records::RecordStore;
use kira_species_library::wikipedia::{ArticleFetcher, OfflineArticle};

const DATASET: &str = "Species,Species Name,Vernacular Name,Kingdom,Family,Number Of Records,EPBC Act Threatened Species\n\
urn:1,Vulpes vulpes,Red Fox,Animalia,Canidae,1042,\n\
urn:2,Eucalyptus regnans,Mountain Ash,Plantae,Myrtaceae,87,\n\
urn:3,Pteropus poliocephalus,Grey-headed Flying-fox,Animalia,Pteropodidae,12,Vulnerable\n";

struct NoImages;

impl ImageResolver for NoImages {
    fn resolve_image(&self, _record: &Record) -> Option<String> {
        None
    }
}

struct NoDownloads;

impl ImageDownloader for NoDownloads {
    fn download(&self, url: &str) -> Result<Vec<u8>, KiraError> {
        Err(KiraError::ImageHttp(url.to_string()))
    }
}

struct StubArticles;

impl ArticleFetcher for StubArticles {
    fn fetch_offline_article(&self, canonical_name: &str) -> Option<OfflineArticle> {
        Some(OfflineArticle::from_raw(canonical_name, "<p>article</p>"))
    }
}

fn app(store: RecordStore) -> App<NoImages, NoDownloads, StubArticles> {
    App::new(store, ArchiveBuilder::new(NoImages, NoDownloads, StubArticles))
}

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).unwrap()
}

#[test]
fn build_writes_filtered_archive() {
    let temp = tempfile::tempdir().unwrap();
    let output = utf8(temp.path().join("out").join("Flora_and_Fauna_Library.zip"));
    let app = app(RecordStore::from_csv_str(DATASET));
    let options = BuildOptions {
        output: output.clone(),
        search: None,
        kingdom: Some("Animalia".to_string()),
        limit: None,
    };

    let result = app.build(&options, &JsonOutput).unwrap();
    assert_eq!(result.summary.progress.total, 2);
    assert_eq!(result.summary.offline_articles, 2);
    assert_eq!(result.summary.images, 0);
    assert!(!result.summary.cancelled);
    assert_eq!(result.archive_bytes as u64, fs::metadata(&output).unwrap().len());

    let names = validate_zip(&output).unwrap();
    assert!(names.contains(&"Flora_and_Fauna_Library/Red_Fox/index.html".to_string()));
    assert!(names.contains(
        &"Flora_and_Fauna_Library/Grey-headed_Flying-fox/wikipedia.html".to_string()
    ));
    assert!(!names.iter().any(|name| name.contains("Mountain_Ash")));
}

#[test]
fn limit_and_search_select_in_store_order() {
    let app = app(RecordStore::from_csv_str(DATASET));
    let options = BuildOptions {
        output: Utf8PathBuf::from("unused.zip"),
        search: Some("e".to_string()),
        kingdom: None,
        limit: Some(2),
    };
    let selected = app
        .select(&options)
        .iter()
        .map(|record| record.display_name().to_string())
        .collect::<Vec<_>>();
    assert_eq!(selected, vec!["Red Fox", "Mountain Ash"]);
}

#[test]
fn build_rejects_empty_dataset() {
    let temp = tempfile::tempdir().unwrap();
    let options = BuildOptions {
        output: utf8(temp.path().join("library.zip")),
        search: None,
        kingdom: None,
        limit: None,
    };
    let result = app(RecordStore::default()).build(&options, &JsonOutput);
    assert_matches!(result, Err(KiraError::EmptyDataset));
    assert!(!temp.path().join("library.zip").exists());
}

#[test]
fn list_kingdoms_and_show() {
    let temp = tempfile::tempdir().unwrap();
    let app = app(RecordStore::from_csv_str(DATASET));

    let listed = app.list(Some("fox"), None);
    assert_eq!(listed.total, 3);
    assert_eq!(listed.records.len(), 2);
    assert_eq!(listed.records[1].listings, 1);
    assert_eq!(listed.records[1].folder, "Grey-headed_Flying-fox");

    assert_eq!(app.kingdoms().kingdoms, vec!["Animalia", "Plantae"]);

    let page_path = utf8(temp.path().join("fox.html"));
    let shown = app.show("red fox", Some(page_path.as_path())).unwrap();
    assert_eq!(shown.canonical_name, "Vulpes vulpes");
    let page = fs::read_to_string(&page_path).unwrap();
    assert_eq!(page, shown.html);
    assert!(page.contains("Wikipedia (Requires Internet)"));
    assert!(page.contains("Number of records:</span><span>1042"));

    assert_matches!(app.show("Dingo", None), Err(KiraError::RecordNotFound(name)) if name == "Dingo");
}

#[test]
fn load_store_reads_file_and_reports_missing() {
    let temp = tempfile::tempdir().unwrap();
    let path = utf8(temp.path().join("species.csv"));
    fs::write(&path, DATASET).unwrap();
    let store = load_store(&path).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(
        store.records()[2].listings()[0].label,
        "EPBC Act Threatened Species"
    );

    let missing = utf8(temp.path().join("missing.csv"));
    assert_matches!(load_store(&missing), Err(KiraError::DatasetRead(_)));
}
