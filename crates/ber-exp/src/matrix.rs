use ber_cmp::ComparisonOutcome;
use ber_core::errors::{BerError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::grid::ParameterGrid;

/// One completed bandwidth row: an outcome for every noise level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    /// Loop bandwidth labelling the row.
    pub bandwidth: f64,
    /// Outcomes ordered like the grid's noise axis.
    pub outcomes: Vec<ComparisonOutcome>,
}

/// Row-major sweep results in grid iteration order.
///
/// Rows are only appended once complete, so the matrix is always
/// rectangular and every stored row has one outcome per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMatrix {
    columns: usize,
    rows: Vec<MatrixRow>,
}

impl ResultMatrix {
    /// Creates an empty matrix with the given column count.
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Creates an empty matrix shaped for `grid`.
    pub fn for_grid(grid: &ParameterGrid) -> Self {
        Self::new(grid.columns())
    }

    /// Appends a completed row.
    pub fn push_row(&mut self, row: MatrixRow) -> Result<(), BerError> {
        if row.outcomes.len() != self.columns {
            return Err(BerError::Config(
                ErrorInfo::new("matrix-row-width", "row does not cover every column")
                    .with_context("expected", self.columns.to_string())
                    .with_context("actual", row.outcomes.len().to_string()),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Number of columns per row.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Completed rows in insertion order.
    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    /// Number of completed rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when no row has completed.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Outcome at (row, column).
    pub fn get(&self, row: usize, column: usize) -> Option<ComparisonOutcome> {
        self.rows.get(row)?.outcomes.get(column).copied()
    }

    /// Number of recorded outcomes.
    pub fn cell_count(&self) -> usize {
        self.rows.len() * self.columns
    }

    /// Number of recorded failure outcomes.
    pub fn failure_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.outcomes.iter())
            .filter(|outcome| outcome.is_failure())
            .count()
    }

    /// Checks that the stored rows are a prefix of `grid` in iteration order.
    pub fn ensure_prefix_of(&self, grid: &ParameterGrid) -> Result<(), BerError> {
        if self.columns != grid.columns() || self.rows.len() > grid.rows() {
            return Err(BerError::Config(
                ErrorInfo::new("matrix-shape", "stored results do not fit the grid")
                    .with_context("columns", self.columns.to_string())
                    .with_context("rows", self.rows.len().to_string())
                    .with_hint("start a fresh sweep or restore the original grid"),
            ));
        }
        for (idx, (row, expected)) in self.rows.iter().zip(grid.loop_bandwidths()).enumerate() {
            if row.bandwidth != *expected {
                return Err(BerError::Config(
                    ErrorInfo::new("matrix-row-order", "stored row does not match grid order")
                        .with_context("row", idx.to_string())
                        .with_context("stored", row.bandwidth.to_string())
                        .with_context("expected", expected.to_string()),
                ));
            }
        }
        Ok(())
    }
}
