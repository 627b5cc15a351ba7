use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ber_cmp::CompareSpec;
use ber_core::errors::{BerError, ErrorInfo};
use chrono::Utc;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::grid::ParameterGrid;
use crate::hash::grid_hash;
use crate::matrix::ResultMatrix;
use crate::serde::{from_json_slice, to_pretty_json_bytes};

fn persist_error(code: &str, path: &Path, err: impl ToString) -> BerError {
    BerError::Persistence(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Lifecycle state recorded alongside persisted results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepStatus {
    /// Rows are still being produced.
    Running,
    /// Every grid row has been recorded.
    Complete,
    /// Stopped by a cancellation request.
    Interrupted,
    /// Stopped after the requested number of rows.
    Partial,
    /// Stopped by an orchestration error.
    Failed,
}

/// Layout of the persisted result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFormat {
    /// Field delimiter (a single ASCII character).
    #[serde(default = "TableFormat::default_delimiter")]
    pub delimiter: char,
    /// Label of the row-header column.
    #[serde(default = "TableFormat::default_row_header")]
    pub row_header: String,
    /// Decimal places for bandwidth row labels.
    #[serde(default = "TableFormat::default_row_precision")]
    pub row_label_precision: usize,
    /// Decimal places for noise column labels.
    #[serde(default = "TableFormat::default_column_precision")]
    pub column_label_precision: usize,
}

impl TableFormat {
    fn default_delimiter() -> char {
        '\t'
    }

    fn default_row_header() -> String {
        "Loop BW".to_string()
    }

    const fn default_row_precision() -> usize {
        4
    }

    const fn default_column_precision() -> usize {
        1
    }

    fn delimiter_byte(&self) -> Result<u8, BerError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                BerError::Config(
                    ErrorInfo::new("table-delimiter", "delimiter must be a single ASCII character")
                        .with_context("delimiter", self.delimiter.to_string()),
                )
            })
    }

    /// Formats a bandwidth row label.
    pub fn row_label(&self, bandwidth: f64) -> String {
        format!("{:.*}", self.row_label_precision, bandwidth)
    }

    /// Formats a noise column label.
    pub fn column_label(&self, noise: f64) -> String {
        format!("{:.*}", self.column_label_precision, noise)
    }
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            delimiter: Self::default_delimiter(),
            row_header: Self::default_row_header(),
            row_label_precision: Self::default_row_precision(),
            column_label_precision: Self::default_column_precision(),
        }
    }
}

/// Table read back from disk: labels and integer cells (`-1` for failures).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Header of the label column.
    pub row_header: String,
    /// Noise labels in column order.
    pub columns: Vec<String>,
    /// Bandwidth label and cell values per row.
    pub rows: Vec<(String, Vec<i64>)>,
}

/// Writes the result matrix as a rectangular delimited table.
#[derive(Debug, Clone)]
pub struct TablePersister {
    path: PathBuf,
    format: TableFormat,
}

impl TablePersister {
    /// Creates a persister writing to `path`.
    pub fn new(path: impl Into<PathBuf>, format: TableFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Destination of the table.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the table with every stored row of `matrix`.
    ///
    /// The table is written to a sibling temporary file and renamed into
    /// place, so concurrent readers see either the old or the new table.
    pub fn persist(&self, matrix: &ResultMatrix, grid: &ParameterGrid) -> Result<(), BerError> {
        let delimiter = self.format.delimiter_byte()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| persist_error("table-mkdir", parent, err))?;
        }
        let staging = staging_path(&self.path);
        let file =
            File::create(&staging).map_err(|err| persist_error("table-create", &staging, err))?;
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(BufWriter::new(file));

        let mut header = Vec::with_capacity(grid.columns() + 1);
        header.push(self.format.row_header.clone());
        header.extend(
            grid.noise_levels()
                .iter()
                .map(|noise| self.format.column_label(*noise)),
        );
        writer
            .write_record(&header)
            .map_err(|err| persist_error("table-write-header", &staging, err))?;

        for row in matrix.rows() {
            let mut record = Vec::with_capacity(row.outcomes.len() + 1);
            record.push(self.format.row_label(row.bandwidth));
            record.extend(row.outcomes.iter().map(|o| o.cell_value().to_string()));
            writer
                .write_record(&record)
                .map_err(|err| persist_error("table-write-row", &staging, err))?;
        }
        writer
            .flush()
            .map_err(|err| persist_error("table-flush", &staging, err))?;
        drop(writer);
        fs::rename(&staging, &self.path)
            .map_err(|err| persist_error("table-rename", &self.path, err))
    }

    /// Reads the table back.
    pub fn load(&self) -> Result<TableSnapshot, BerError> {
        load_table(&self.path, &self.format)
    }
}

/// Reads a delimited result table from `path`.
pub fn load_table(path: &Path, format: &TableFormat) -> Result<TableSnapshot, BerError> {
    let delimiter = format.delimiter_byte()?;
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|err| persist_error("table-open", path, err))?;
    let headers = reader
        .headers()
        .map_err(|err| persist_error("table-read-header", path, err))?
        .clone();
    let mut labels = headers.iter().map(str::to_string);
    let row_header = labels.next().unwrap_or_default();
    let columns: Vec<String> = labels.collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| persist_error("table-read-row", path, err))?;
        let mut fields = record.iter();
        let label = fields.next().unwrap_or_default().to_string();
        let cells = fields
            .map(|field| {
                field.trim().parse::<i64>().map_err(|err| {
                    BerError::Persistence(
                        ErrorInfo::new("table-parse-cell", err.to_string())
                            .with_context("path", path.display().to_string())
                            .with_context("row", idx.to_string())
                            .with_context("value", field.to_string()),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((label, cells));
    }
    Ok(TableSnapshot {
        row_header,
        columns,
        rows,
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    path.with_file_name(format!(".{name}.partial"))
}

/// Machine readable companion of the result table.
///
/// Unlike the table it keeps failure reasons, which makes it the source for
/// resuming an interrupted sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepManifest {
    /// Lifecycle state at the time of writing.
    pub status: SweepStatus,
    /// Hash over the grid and compare spec; resume requires a match.
    pub grid_hash: String,
    /// Swept axes.
    pub grid: ParameterGrid,
    /// Compare window used by every trial.
    pub compare: CompareSpec,
    /// Rows recorded so far.
    pub rows_completed: usize,
    /// Rows in the full grid.
    pub rows_total: usize,
    /// Failure outcomes recorded so far.
    pub failures: usize,
    /// Path of the table written alongside.
    pub table: PathBuf,
    /// RFC 3339 timestamp of the first checkpoint.
    pub created_at: String,
    /// RFC 3339 timestamp of the latest checkpoint.
    pub updated_at: String,
    /// Recorded outcomes.
    pub matrix: ResultMatrix,
}

impl SweepManifest {
    /// Restores the manifest from disk.
    pub fn load(path: &Path) -> Result<Self, BerError> {
        let bytes = fs::read(path).map_err(|err| persist_error("manifest-read", path, err))?;
        from_json_slice(&bytes)
    }

    /// Writes the manifest atomically.
    pub fn store(&self, path: &Path) -> Result<(), BerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| persist_error("manifest-mkdir", parent, err))?;
        }
        let bytes = to_pretty_json_bytes(self)?;
        let staging = staging_path(path);
        fs::write(&staging, bytes).map_err(|err| persist_error("manifest-write", &staging, err))?;
        fs::rename(&staging, path).map_err(|err| persist_error("manifest-rename", path, err))
    }

    /// Returns the stored matrix after checking it belongs to this grid and spec.
    pub fn resume_matrix(
        &self,
        grid: &ParameterGrid,
        compare: &CompareSpec,
    ) -> Result<ResultMatrix, BerError> {
        let expected = grid_hash(grid, compare)?;
        if expected != self.grid_hash {
            return Err(BerError::Config(
                ErrorInfo::new("resume-mismatch", "stored sweep used a different grid or spec")
                    .with_context("stored", self.grid_hash.clone())
                    .with_context("current", expected)
                    .with_hint("remove the manifest or rerun without --resume"),
            ));
        }
        self.matrix.ensure_prefix_of(grid)?;
        Ok(self.matrix.clone())
    }
}

/// Checkpoint sink used by the sweep orchestrator.
pub trait Persist {
    /// Persists the full matrix recorded so far.
    fn checkpoint(
        &mut self,
        matrix: &ResultMatrix,
        grid: &ParameterGrid,
        status: SweepStatus,
    ) -> Result<(), BerError>;
}

/// Writes the table and the manifest on every checkpoint.
#[derive(Debug, Clone)]
pub struct RunPersister {
    table: TablePersister,
    manifest_path: PathBuf,
    compare: CompareSpec,
    created_at: Option<String>,
}

impl RunPersister {
    /// Creates a persister for one sweep run.
    pub fn new(table: TablePersister, manifest_path: impl Into<PathBuf>, compare: CompareSpec) -> Self {
        Self {
            table,
            manifest_path: manifest_path.into(),
            compare,
            created_at: None,
        }
    }

    /// Keeps the creation timestamp of a resumed run.
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// Table writer used for every checkpoint.
    pub fn table(&self) -> &TablePersister {
        &self.table
    }

    /// Manifest destination.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }
}

impl Persist for RunPersister {
    fn checkpoint(
        &mut self,
        matrix: &ResultMatrix,
        grid: &ParameterGrid,
        status: SweepStatus,
    ) -> Result<(), BerError> {
        self.table.persist(matrix, grid)?;
        let now = Utc::now().to_rfc3339();
        let created_at = self.created_at.get_or_insert_with(|| now.clone()).clone();
        let manifest = SweepManifest {
            status,
            grid_hash: grid_hash(grid, &self.compare)?,
            grid: grid.clone(),
            compare: self.compare,
            rows_completed: matrix.row_count(),
            rows_total: grid.rows(),
            failures: matrix.failure_count(),
            table: self.table.path().to_path_buf(),
            created_at,
            updated_at: now,
            matrix: matrix.clone(),
        };
        manifest.store(&self.manifest_path)
    }
}
