use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::info;

use crate::builder::{ArchiveBuilder, BuildSummary, ProgressEvent, ProgressSink};
use crate::domain::Record;
use crate::error::KiraError;
use crate::fs_util;
use crate::images::{ImageDownloader, ImageResolver};
use crate::records::RecordStore;
use crate::render::render_detail_page;
use crate::wikipedia::ArticleFetcher;

/// Which records go into a build and where the archive is written.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub output: Utf8PathBuf,
    pub search: Option<String>,
    pub kingdom: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub output: String,
    pub archive_bytes: usize,
    pub finished_at: String,
    #[serde(flatten)]
    pub summary: BuildSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub total: usize,
    pub records: Vec<ListEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub display_name: String,
    pub canonical_name: String,
    pub kingdom: Option<String>,
    pub folder: String,
    pub listings: usize,
}

impl From<&Record> for ListEntry {
    fn from(record: &Record) -> Self {
        Self {
            display_name: record.display_name().to_string(),
            canonical_name: record.canonical_name().to_string(),
            kingdom: record.kingdom().map(str::to_string),
            folder: record.folder_key().to_string(),
            listings: record.listings().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KingdomsResult {
    pub kingdoms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowResult {
    pub canonical_name: String,
    pub folder: String,
    pub output: Option<String>,
    pub html: String,
}

pub struct App<I: ImageResolver, D: ImageDownloader, A: ArticleFetcher> {
    store: RecordStore,
    builder: ArchiveBuilder<I, D, A>,
}

impl<I: ImageResolver, D: ImageDownloader, A: ArticleFetcher> App<I, D, A> {
    pub fn new(store: RecordStore, builder: ArchiveBuilder<I, D, A>) -> Self {
        Self { store, builder }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Records selected by the options, in store order.
    pub fn select(&self, options: &BuildOptions) -> Vec<Record> {
        let term = options.search.as_deref().unwrap_or("");
        let selected = self.store.search(term, options.kingdom.as_deref());
        let limit = options.limit.unwrap_or(selected.len());
        selected.into_iter().take(limit).cloned().collect()
    }

    pub fn build(
        &self,
        options: &BuildOptions,
        sink: &dyn ProgressSink,
    ) -> Result<BuildResult, KiraError> {
        if self.store.is_empty() {
            return Err(KiraError::EmptyDataset);
        }
        let records = self.select(options);
        sink.event(ProgressEvent::phase(
            "Select",
            format!("{} of {} records", records.len(), self.store.len()),
        ));

        let build = self.builder.build(&records, sink)?;

        sink.event(ProgressEvent::phase("Save", options.output.as_str()));
        fs_util::write_atomic(&options.output, &build.bytes)?;
        info!(output = %options.output, bytes = build.bytes.len(), "archive saved");

        Ok(BuildResult {
            output: options.output.to_string(),
            archive_bytes: build.bytes.len(),
            finished_at: chrono::Utc::now().to_rfc3339(),
            summary: build.summary,
        })
    }

    pub fn list(&self, search: Option<&str>, kingdom: Option<&str>) -> ListResult {
        let records = self
            .store
            .search(search.unwrap_or(""), kingdom)
            .into_iter()
            .map(ListEntry::from)
            .collect::<Vec<_>>();
        ListResult {
            total: self.store.len(),
            records,
        }
    }

    pub fn kingdoms(&self) -> KingdomsResult {
        KingdomsResult {
            kingdoms: self.store.kingdoms(),
        }
    }

    /// Renders one detail page with remote links only. Written to `output`
    /// when given.
    pub fn show(&self, name: &str, output: Option<&Utf8Path>) -> Result<ShowResult, KiraError> {
        let record = self.store.find(name)?;
        let html = render_detail_page(record, None, false);
        if let Some(path) = output {
            fs_util::write_atomic(path, html.as_bytes())?;
        }
        Ok(ShowResult {
            canonical_name: record.canonical_name().to_string(),
            folder: record.folder_key().to_string(),
            output: output.map(|path| path.to_string()),
            html,
        })
    }
}

/// Reads a dataset, mapping a missing file to [`KiraError::DatasetRead`].
pub fn load_store(path: &Utf8Path) -> Result<RecordStore, KiraError> {
    if !path.as_std_path().is_file() {
        return Err(KiraError::DatasetRead(path.as_std_path().to_path_buf()));
    }
    let store = RecordStore::load(path.as_std_path())?;
    info!(dataset = %path, records = store.len(), "dataset loaded");
    Ok(store)
}

