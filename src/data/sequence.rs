use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::files::DataFiles;
use crate::error::{DatasetError, Result};

/// Indexable, lazily materialized sequence of records.
pub trait LazySequence<T>: Send + Sync {
    /// Number of records.
    fn len(&self) -> usize;

    /// Materialize the record at `index`.
    fn get(&self, index: usize) -> Result<T>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> LazySequence<T> for Vec<T> {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get(&self, index: usize) -> Result<T> {
        <[T]>::get(self, index)
            .cloned()
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: <[T]>::len(self),
            })
    }
}

/// Maps a global record index onto (file, record-within-file) given the
/// cumulative record count at the end of each file.
pub(crate) fn locate(ends: &[usize], index: usize) -> Option<(usize, usize)> {
    let total = ends.last().copied().unwrap_or(0);
    if index >= total {
        return None;
    }
    let file = ends.partition_point(|&end| end <= index);
    let start = if file == 0 { 0 } else { ends[file - 1] };
    Some((file, index - start))
}

#[derive(Debug)]
struct LineIndex {
    path: PathBuf,
    offsets: Vec<u64>,
}

/// Plain-text corpus with one record per line.
///
/// Opening scans each file once and keeps only the byte offset of every line;
/// records are read back from disk on access.
#[derive(Debug)]
pub struct LineSequence {
    files: Vec<LineIndex>,
    ends: Vec<usize>,
}

impl LineSequence {
    pub fn open(files: &DataFiles) -> Result<Self> {
        let mut indexed = Vec::with_capacity(files.len());
        let mut ends = Vec::with_capacity(files.len());
        let mut total = 0usize;

        for path in files.paths() {
            let offsets = Self::scan(path)?;
            debug!("Indexed {} lines in {:?}", offsets.len(), path);
            total += offsets.len();
            ends.push(total);
            indexed.push(LineIndex {
                path: path.clone(),
                offsets,
            });
        }

        Ok(Self {
            files: indexed,
            ends,
        })
    }

    fn scan(path: &Path) -> Result<Vec<u64>> {
        if !path.is_file() {
            return Err(DatasetError::format(path, "not a regular file"));
        }

        let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
        let mut reader = BufReader::new(file);
        let mut offsets = Vec::new();
        let mut buf = Vec::new();
        let mut offset = 0u64;

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| DatasetError::io(path, e))?;
            if n == 0 {
                break;
            }
            if std::str::from_utf8(&buf).is_err() {
                return Err(DatasetError::format(
                    path,
                    format!("line {} is not valid UTF-8", offsets.len() + 1),
                ));
            }
            offsets.push(offset);
            offset += n as u64;
        }

        Ok(offsets)
    }

    /// Paths backing this sequence, in load order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.path.as_path())
    }
}

impl LazySequence<String> for LineSequence {
    fn len(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    fn get(&self, index: usize) -> Result<String> {
        let (file_idx, line_idx) = locate(&self.ends, index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;
        let entry = &self.files[file_idx];
        let offset = entry.offsets[line_idx];

        let mut file = File::open(&entry.path).map_err(|e| DatasetError::io(&entry.path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| DatasetError::io(&entry.path, e))?;

        let mut buf = Vec::new();
        BufReader::new(file)
            .read_until(b'\n', &mut buf)
            .map_err(|e| DatasetError::io(&entry.path, e))?;

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        String::from_utf8(buf).map_err(|_| {
            DatasetError::format(&entry.path, format!("line {} is not valid UTF-8", line_idx + 1))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::files::resolve_data_files;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate_across_files() {
        let ends = vec![2, 2, 5];
        assert_eq!(locate(&ends, 0), Some((0, 0)));
        assert_eq!(locate(&ends, 1), Some((0, 1)));
        assert_eq!(locate(&ends, 2), Some((2, 0)));
        assert_eq!(locate(&ends, 4), Some((2, 2)));
        assert_eq!(locate(&ends, 5), None);
        assert_eq!(locate(&[], 0), None);
    }

    #[test]
    fn test_line_sequence_reads_lines_lazily() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.txt");
        fs::write(&path, "hello\r\nworld\n\nfoo bar baz").unwrap();

        let lines = LineSequence::open(&resolve_data_files(&path).unwrap()).unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.get(0).unwrap(), "hello");
        assert_eq!(lines.get(1).unwrap(), "world");
        assert_eq!(lines.get(2).unwrap(), "");
        assert_eq!(lines.get(3).unwrap(), "foo bar baz");
    }

    #[test]
    fn test_line_sequence_spans_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();
        fs::write(dir.path().join("b.txt"), "three\n").unwrap();

        let lines = LineSequence::open(&resolve_data_files(dir.path()).unwrap()).unwrap();
        assert_eq!(lines.len(), 3);

        let mut all: Vec<String> = (0..lines.len()).map(|i| lines.get(i).unwrap()).collect();
        all.sort();
        assert_eq!(all, vec!["one", "three", "two"]);
    }

    #[test]
    fn test_out_of_range_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.txt");
        fs::write(&path, "only\n").unwrap();

        let lines = LineSequence::open(&resolve_data_files(&path).unwrap()).unwrap();
        let err = lines.get(1).unwrap_err();
        assert!(matches!(err, DatasetError::IndexOutOfRange { index: 1, len: 1 }));
    }

    #[test]
    fn test_empty_file_has_no_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "").unwrap();

        let lines = LineSequence::open(&resolve_data_files(&path).unwrap()).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, [b'o', b'k', b'\n', 0xff, 0xfe, b'\n']).unwrap();

        let err = LineSequence::open(&resolve_data_files(&path).unwrap()).unwrap_err();
        assert!(matches!(err, DatasetError::Format { .. }));
    }

    #[test]
    fn test_vec_sequence() {
        let seq = vec!["a".to_string(), "b".to_string()];
        assert_eq!(LazySequence::len(&seq), 2);
        assert_eq!(LazySequence::get(&seq, 1).unwrap(), "b");
        assert!(LazySequence::get(&seq, 2).is_err());
    }
}
