use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::files::DataFiles;
use super::sequence::{locate, LazySequence};
use crate::error::{DatasetError, Result};

/// Cell values read as a missing label rather than a number.
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#NA", "<NA>", "N/A", "NA", "NULL", "None", "n/a", "null",
];

/// Column layout of a tabular corpus: the first column holds the text, the
/// remaining columns hold numeric labels in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<String>,
}

impl TableSchema {
    /// Returns `None` when there is no column to use as text.
    pub fn new(columns: Vec<String>) -> Option<Self> {
        if columns.is_empty() {
            return None;
        }
        Some(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn text_column(&self) -> &str {
        &self.columns[0]
    }

    pub fn label_columns(&self) -> &[String] {
        &self.columns[1..]
    }

    pub fn num_labels(&self) -> usize {
        self.columns.len() - 1
    }
}

/// One data row; cells are positional against the [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRow {
    cells: Vec<String>,
}

impl TableRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    pub fn cell(&self, column: usize) -> Option<&str> {
        self.cells.as_slice().get(column).map(String::as_str)
    }

    /// Text cell; an absent cell reads as empty.
    pub fn text(&self) -> &str {
        self.cell(0).unwrap_or("")
    }

    /// Parsed value of the `label`-th label column. Absent cells and missing
    /// markers yield `Ok(None)`.
    pub fn label(&self, label: usize) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
        parse_label_cell(self.cell(label + 1))
    }
}

pub fn parse_label_cell(
    cell: Option<&str>,
) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
    match cell.map(str::trim) {
        None => Ok(None),
        Some(s) if MISSING_MARKERS.contains(&s) => Ok(None),
        Some(s) => s.parse::<f64>().map(Some),
    }
}

/// A lazy sequence of table rows with a schema fixed at construction.
pub trait TabularSequence: LazySequence<TableRow> {
    fn schema(&self) -> &TableSchema;
}

/// Rows held in memory; useful for injecting prepared tables.
#[derive(Debug, Clone)]
pub struct InMemoryTable {
    schema: TableSchema,
    rows: Vec<TableRow>,
}

impl InMemoryTable {
    pub fn new(schema: TableSchema, rows: Vec<TableRow>) -> Self {
        Self { schema, rows }
    }
}

impl LazySequence<TableRow> for InMemoryTable {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, index: usize) -> Result<TableRow> {
        LazySequence::get(&self.rows, index)
    }
}

impl TabularSequence for InMemoryTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }
}

#[derive(Debug)]
struct RowIndex {
    path: PathBuf,
    offsets: Vec<u64>,
}

/// Delimiter-separated corpus with a header row in every file.
///
/// Opening reads each header, checks it against the first, and scans the rows
/// once to record their byte offsets and validate the label cells.
#[derive(Debug)]
pub struct CsvSequence {
    schema: TableSchema,
    delimiter: u8,
    files: Vec<RowIndex>,
    ends: Vec<usize>,
}

impl CsvSequence {
    pub fn open(files: &DataFiles, delimiter: u8) -> Result<Self> {
        let mut schema: Option<TableSchema> = None;
        let mut indexed = Vec::with_capacity(files.len());
        let mut ends = Vec::with_capacity(files.len());
        let mut total = 0usize;

        for path in files.paths() {
            if !path.is_file() {
                return Err(DatasetError::format(path, "not a regular file"));
            }

            let mut reader = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .flexible(true)
                .has_headers(true)
                .from_path(path)
                .map_err(|e| csv_error(path, e))?;

            let header: Vec<String> = reader
                .headers()
                .map_err(|e| csv_error(path, e))?
                .iter()
                .map(str::to_owned)
                .collect();

            let file_schema = TableSchema::new(header)
                .ok_or_else(|| DatasetError::format(path, "missing header row"))?;

            if let Some(existing) = &schema {
                if existing != &file_schema {
                    return Err(DatasetError::format(
                        path,
                        format!(
                            "header {:?} does not match {:?}",
                            file_schema.columns(),
                            existing.columns()
                        ),
                    ));
                }
            } else {
                schema = Some(file_schema.clone());
            }

            let offsets = Self::scan(&mut reader, path, &file_schema)?;
            debug!("Indexed {} rows in {:?}", offsets.len(), path);
            total += offsets.len();
            ends.push(total);
            indexed.push(RowIndex {
                path: path.clone(),
                offsets,
            });
        }

        let schema = schema.ok_or_else(|| DatasetError::format(PathBuf::new(), "no data files"))?;
        if schema.num_labels() == 0 {
            warn!("Table has no label columns besides {:?}", schema.text_column());
        }

        Ok(Self {
            schema,
            delimiter,
            files: indexed,
            ends,
        })
    }

    fn scan(
        reader: &mut csv::Reader<std::fs::File>,
        path: &Path,
        schema: &TableSchema,
    ) -> Result<Vec<u64>> {
        let mut offsets = Vec::new();
        let mut record = csv::StringRecord::new();
        let width = schema.columns().len();

        loop {
            let offset = reader.position().byte();
            if !reader
                .read_record(&mut record)
                .map_err(|e| csv_error(path, e))?
            {
                break;
            }
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            if record.len() > width {
                return Err(DatasetError::format(
                    path,
                    format!("line {}: {} fields, header has {}", line, record.len(), width),
                ));
            }
            for (label, name) in schema.label_columns().iter().enumerate() {
                if parse_label_cell(record.get(label + 1)).is_err() {
                    return Err(DatasetError::format(
                        path,
                        format!("line {}: column {:?} is not numeric", line, name),
                    ));
                }
            }

            offsets.push(offset);
        }

        Ok(offsets)
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }
}

impl LazySequence<TableRow> for CsvSequence {
    fn len(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    fn get(&self, index: usize) -> Result<TableRow> {
        let (file_idx, row_idx) = locate(&self.ends, index).ok_or(DatasetError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;
        let entry = &self.files[file_idx];

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .has_headers(false)
            .from_path(&entry.path)
            .map_err(|e| csv_error(&entry.path, e))?;

        let mut position = csv::Position::new();
        position.set_byte(entry.offsets[row_idx]);
        reader
            .seek(position)
            .map_err(|e| csv_error(&entry.path, e))?;

        let mut record = csv::StringRecord::new();
        if !reader
            .read_record(&mut record)
            .map_err(|e| csv_error(&entry.path, e))?
        {
            return Err(DatasetError::format(
                &entry.path,
                format!("row {} vanished from file", row_idx),
            ));
        }

        Ok(TableRow::new(record.iter().map(str::to_owned).collect()))
    }
}

impl TabularSequence for CsvSequence {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }
}

fn csv_error(path: &Path, err: csv::Error) -> DatasetError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => DatasetError::io(path, source),
        _ => DatasetError::format(path, message),
    }
}
