use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{DatasetError, Result};

/// Files backing a dataset, as resolved from a corpus path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataFiles {
    /// The corpus path named a single regular file.
    Single(PathBuf),
    /// The corpus path named a directory; one entry per directory member.
    Many(Vec<PathBuf>),
}

impl DataFiles {
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            DataFiles::Single(path) => std::slice::from_ref(path),
            DataFiles::Many(paths) => paths,
        }
    }

    pub fn len(&self) -> usize {
        self.paths().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths().is_empty()
    }
}

/// Resolve a corpus path into the files to load.
///
/// A directory expands to each of its entries joined with the directory path,
/// in enumeration order. A regular file is returned as-is.
pub fn resolve_data_files(path: impl AsRef<Path>) -> Result<DataFiles> {
    let path = path.as_ref();

    if path.is_dir() {
        let mut files = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("directory walk failed"));
                DatasetError::io(path, source)
            })?;
            files.push(entry.into_path());
        }
        debug!("Resolved {} files under {:?}", files.len(), path);
        return Ok(DataFiles::Many(files));
    }

    if path.is_file() {
        return Ok(DataFiles::Single(path.to_path_buf()));
    }

    Err(DatasetError::InvalidPath(path.to_path_buf()))
}
