use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BuildResult, KingdomsResult, ListResult, ShowResult};
use crate::builder::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_build(result: &BuildResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_kingdoms(result: &KingdomsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_show(result: &ShowResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Plain-text rendering used outside the TUI.
pub struct TextOutput;

impl TextOutput {
    pub fn print_build(result: &BuildResult) -> io::Result<()> {
        let summary = &result.summary;
        let mut stdout = io::stdout();
        writeln!(
            stdout,
            "{} {}/{} records, {} images, {} offline articles -> {} ({} bytes)",
            if summary.cancelled { "Cancelled:" } else { "Built:" },
            summary.progress.completed,
            summary.progress.total,
            summary.images,
            summary.offline_articles,
            result.output,
            result.archive_bytes
        )
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        for entry in &result.records {
            writeln!(
                stdout,
                "{:<40} {:<40} {}",
                entry.display_name,
                entry.canonical_name,
                entry.kingdom.as_deref().unwrap_or("-")
            )?;
        }
        writeln!(stdout, "{} of {} records", result.records.len(), result.total)
    }

    pub fn print_kingdoms(result: &KingdomsResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        for kingdom in &result.kingdoms {
            writeln!(stdout, "{kingdom}")?;
        }
        Ok(())
    }

    pub fn print_show(result: &ShowResult) -> io::Result<()> {
        let mut stdout = io::stdout();
        match &result.output {
            Some(path) => writeln!(stdout, "{} -> {path}", result.canonical_name),
            None => stdout.write_all(result.html.as_bytes()),
        }
    }
}
