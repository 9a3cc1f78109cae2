use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;
use zip::ZipArchive;

use crate::error::KiraError;

/// Writes `bytes` to `dest` through a temp file in the same directory, so a
/// failed build never leaves a truncated archive behind.
pub fn write_atomic(dest: &Utf8Path, bytes: &[u8]) -> Result<(), KiraError> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("create {parent}: {err}")))?;
    let mut temp = tempfile::Builder::new()
        .prefix("kira-sl-output")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.write_all(bytes)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.flush()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("write {dest}: {}", err.error)))?;
    Ok(())
}

/// Reads every entry of the ZIP at `zip_path` and returns the entry names.
pub fn validate_zip(zip_path: &Utf8Path) -> Result<Vec<String>, KiraError> {
    let file = fs::File::open(zip_path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("open zip {zip_path}: {err}")))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| KiraError::Filesystem(err.to_string()))?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        names.push(entry.name().to_string());
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    }
    Ok(names)
}
