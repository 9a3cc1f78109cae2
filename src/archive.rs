use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::KiraError;

/// A node of the in-memory library tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveNode {
    Directory(ArchiveDir),
    File(ArchiveFile),
}

impl ArchiveNode {
    pub fn name(&self) -> &str {
        match self {
            ArchiveNode::Directory(dir) => &dir.name,
            ArchiveNode::File(file) => &file.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Directory node. Children keep insertion order and sibling names are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDir {
    pub name: String,
    children: Vec<ArchiveNode>,
}

impl ArchiveDir {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
        }
    }

    pub fn children(&self) -> &[ArchiveNode] {
        &self.children
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|child| child.name() == name)
    }

    /// Fresh, empty child directory `name`. An existing sibling of that name,
    /// file or directory, is swapped out in place so the child keeps its
    /// position.
    pub fn replace_dir(&mut self, name: &str) -> &mut ArchiveDir {
        let node = ArchiveNode::Directory(ArchiveDir::new(name));
        let index = match self.position(name) {
            Some(index) => {
                self.children[index] = node;
                index
            }
            None => {
                self.children.push(node);
                self.children.len() - 1
            }
        };
        match &mut self.children[index] {
            ArchiveNode::Directory(dir) => dir,
            ArchiveNode::File(_) => unreachable!("directory inserted above"),
        }
    }

    /// Writes `bytes` as file `name`. Returns `true` when an existing sibling of
    /// that name was replaced.
    pub fn write_file(&mut self, name: &str, bytes: impl Into<Vec<u8>>) -> bool {
        let node = ArchiveNode::File(ArchiveFile {
            name: name.to_string(),
            bytes: bytes.into(),
        });
        match self.position(name) {
            Some(index) => {
                self.children[index] = node;
                true
            }
            None => {
                self.children.push(node);
                false
            }
        }
    }

    /// Looks up a `/`-separated path relative to this directory.
    pub fn get(&self, path: &str) -> Option<&ArchiveNode> {
        let mut parts = path.split('/').filter(|part| !part.is_empty());
        let first = parts.next()?;
        let mut node = self.children.iter().find(|child| child.name() == first)?;
        for part in parts {
            let ArchiveNode::Directory(dir) = node else {
                return None;
            };
            node = dir.children.iter().find(|child| child.name() == part)?;
        }
        Some(node)
    }

    pub fn file_bytes(&self, path: &str) -> Option<&[u8]> {
        match self.get(path)? {
            ArchiveNode::File(file) => Some(&file.bytes),
            ArchiveNode::Directory(_) => None,
        }
    }

    /// Relative paths of every file below this directory, depth first in
    /// insertion order.
    pub fn file_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(self, "", &mut paths);
        paths
    }
}

fn collect_paths(dir: &ArchiveDir, prefix: &str, paths: &mut Vec<String>) {
    for child in &dir.children {
        match child {
            ArchiveNode::Directory(sub) => {
                collect_paths(sub, &format!("{prefix}{}/", sub.name), paths);
            }
            ArchiveNode::File(file) => paths.push(format!("{prefix}{}", file.name)),
        }
    }
}

/// Serializes `root` (itself included as the top-level folder) into a ZIP.
///
/// Entries carry a fixed timestamp so identical trees give identical bytes.
pub fn to_zip(root: &ArchiveDir) -> Result<Vec<u8>, KiraError> {
    let fixed_time = DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0)
        .map_err(|err| KiraError::Archive(err.to_string()))?;
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(fixed_time);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    write_dir(&mut zip, root, "", options)?;
    let cursor = zip
        .finish()
        .map_err(|err| KiraError::Archive(err.to_string()))?;
    Ok(cursor.into_inner())
}

fn write_dir(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    dir: &ArchiveDir,
    prefix: &str,
    options: SimpleFileOptions,
) -> Result<(), KiraError> {
    let path = format!("{prefix}{}/", dir.name);
    zip.add_directory(path.clone(), options)
        .map_err(|err| KiraError::Archive(err.to_string()))?;
    for child in &dir.children {
        match child {
            ArchiveNode::Directory(sub) => write_dir(zip, sub, &path, options)?,
            ArchiveNode::File(file) => {
                zip.start_file(format!("{path}{}", file.name), options)
                    .map_err(|err| KiraError::Archive(err.to_string()))?;
                zip.write_all(&file.bytes)
                    .map_err(|err| KiraError::Archive(err.to_string()))?;
            }
        }
    }
    Ok(())
}
