use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::archive::{self, ArchiveDir};
use crate::domain::Record;
use crate::error::KiraError;
use crate::images::{ImageDownloader, ImageResolver, image_file_name};
use crate::render::{
    IndexEntry, OFFLINE_ARTICLE_FILE, PAGE_FILE, render_detail_page, render_library_index,
};
use crate::wikipedia::ArticleFetcher;

pub const LIBRARY_DIR: &str = "Flora_and_Fauna_Library";
pub const LIBRARY_TITLE: &str = "Flora & Fauna Offline Library";
pub const ARCHIVE_FILE_NAME: &str = "Flora_and_Fauna_Library.zip";

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn phase(phase: &str, detail: impl AsRef<str>) -> Self {
        Self {
            message: format!("phase={phase}; {}", detail.as_ref()),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);

    /// Called once per finished record with the overall percentage.
    fn progress(&self, _percent: u8) {}
}

/// Records completed out of records to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildProgress {
    pub completed: usize,
    pub total: usize,
}

impl BuildProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    /// `round(100 * completed / total)`, held at 99 until the last record so
    /// that 100 is reported exactly once.
    pub fn percent(&self) -> u8 {
        if self.total == 0 || self.completed >= self.total {
            return 100;
        }
        let rounded = (200 * self.completed + self.total) / (2 * self.total);
        rounded.min(99) as u8
    }

    pub fn advance(&mut self) -> u8 {
        self.completed = (self.completed + 1).min(self.total);
        self.percent()
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

/// What ended up in the archive for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub display_name: String,
    pub canonical_name: String,
    pub folder: String,
    pub image: Option<String>,
    pub offline_article: bool,
    pub folder_reused: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub library: String,
    pub progress: BuildProgress,
    pub cancelled: bool,
    pub images: usize,
    pub offline_articles: usize,
    pub records: Vec<RecordOutcome>,
}

/// Result of the tree-building phase, before serialization.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub library: ArchiveDir,
    pub index: Vec<IndexEntry>,
    pub records: Vec<RecordOutcome>,
    pub progress: BuildProgress,
    pub cancelled: bool,
}

impl BuildReport {
    pub fn summary(&self) -> BuildSummary {
        BuildSummary {
            library: self.library.name.clone(),
            progress: self.progress,
            cancelled: self.cancelled,
            images: self.records.iter().filter(|r| r.image.is_some()).count(),
            offline_articles: self.records.iter().filter(|r| r.offline_article).count(),
            records: self.records.clone(),
        }
    }
}

/// The serialized container plus what went into it.
#[derive(Debug, Clone)]
pub struct ArchiveBuild {
    pub bytes: Vec<u8>,
    pub summary: BuildSummary,
}

pub struct ArchiveBuilder<I: ImageResolver, D: ImageDownloader, A: ArticleFetcher> {
    images: I,
    downloader: D,
    articles: A,
    library_name: String,
    library_title: String,
    cancel: Option<Arc<AtomicBool>>,
}

impl<I: ImageResolver, D: ImageDownloader, A: ArticleFetcher> ArchiveBuilder<I, D, A> {
    pub fn new(images: I, downloader: D, articles: A) -> Self {
        Self {
            images,
            downloader,
            articles,
            library_name: LIBRARY_DIR.to_string(),
            library_title: LIBRARY_TITLE.to_string(),
            cancel: None,
        }
    }

    pub fn with_library_name(mut self, name: &str) -> Self {
        self.library_name = name.to_string();
        self
    }

    pub fn with_library_title(mut self, title: &str) -> Self {
        self.library_title = title.to_string();
        self
    }

    /// Checked before each record; once set, no further record is started.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Builds the archive tree and serializes it. Only serialization errors
    /// are returned; per-record failures end up as missing files.
    pub fn build(
        &self,
        records: &[Record],
        sink: &dyn ProgressSink,
    ) -> Result<ArchiveBuild, KiraError> {
        let report = self.build_tree(records, sink);
        sink.event(ProgressEvent::phase("Package", "serializing archive"));
        let start = Instant::now();
        let bytes = archive::to_zip(&report.library)?;
        sink.event(ProgressEvent {
            message: format!("archive.size bytes={}", bytes.len()),
            elapsed: Some(start.elapsed()),
        });
        info!(
            records = report.progress.completed,
            bytes = bytes.len(),
            "archive built"
        );
        Ok(ArchiveBuild {
            bytes,
            summary: report.summary(),
        })
    }

    /// Processes records strictly in order into a fresh in-memory tree.
    pub fn build_tree(&self, records: &[Record], sink: &dyn ProgressSink) -> BuildReport {
        let mut library = ArchiveDir::new(&self.library_name);
        let mut index = Vec::with_capacity(records.len());
        let mut outcomes = Vec::with_capacity(records.len());
        let mut progress = BuildProgress::new(records.len());
        let mut cancelled = false;

        info!(total = records.len(), library = %self.library_name, "build started");
        for record in records {
            if self.is_cancelled() {
                warn!(
                    completed = progress.completed,
                    total = progress.total,
                    "build cancelled"
                );
                sink.event(ProgressEvent::phase("Cancel", "stopping before next record"));
                cancelled = true;
                break;
            }

            let start = Instant::now();
            let outcome = self.build_record(record, &mut library, sink);
            index.push(IndexEntry {
                folder: record.folder_key(),
                label: record.display_name().to_string(),
            });
            outcomes.push(outcome);

            let percent = progress.advance();
            sink.event(ProgressEvent {
                message: format!(
                    "record {}/{} {}",
                    progress.completed,
                    progress.total,
                    record.display_name()
                ),
                elapsed: Some(start.elapsed()),
            });
            sink.progress(percent);
        }

        library.write_file(
            PAGE_FILE,
            render_library_index(&self.library_title, &index),
        );

        BuildReport {
            library,
            index,
            records: outcomes,
            progress,
            cancelled,
        }
    }

    fn build_record(
        &self,
        record: &Record,
        library: &mut ArchiveDir,
        sink: &dyn ProgressSink,
    ) -> RecordOutcome {
        let folder = record.folder_key();
        let folder_reused = library.get(folder.as_str()).is_some();
        if folder_reused {
            warn!(folder = %folder, "folder key collision; later record replaces the folder");
        }
        let dir = library.replace_dir(folder.as_str());

        sink.event(ProgressEvent::phase("Image", record.display_name()));
        let image = self.fetch_image(record, dir);

        sink.event(ProgressEvent::phase("Article", record.display_name()));
        let offline_article = match self.articles.fetch_offline_article(record.canonical_name())
        {
            Some(article) => {
                dir.write_file(OFFLINE_ARTICLE_FILE, article.html);
                true
            }
            None => false,
        };

        sink.event(ProgressEvent::phase("Render", record.display_name()));
        let page = render_detail_page(record, image.as_deref(), offline_article);
        dir.write_file(PAGE_FILE, page);

        RecordOutcome {
            display_name: record.display_name().to_string(),
            canonical_name: record.canonical_name().to_string(),
            folder: folder.to_string(),
            image,
            offline_article,
            folder_reused,
        }
    }

    /// Resolves and downloads the record image into `dir`, returning the
    /// file name relative to the record page.
    fn fetch_image(&self, record: &Record, dir: &mut ArchiveDir) -> Option<String> {
        let url = self.images.resolve_image(record)?;
        match self.downloader.download(&url) {
            Ok(bytes) => {
                let file_name = image_file_name(&url);
                dir.write_file(&file_name, bytes);
                Some(file_name)
            }
            Err(err) => {
                warn!(
                    species = record.canonical_name(),
                    url = url.as_str(),
                    "image download failed: {err}"
                );
                None
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}
