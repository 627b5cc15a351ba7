use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ber_cmp::ComparisonOutcome;
use ber_core::errors::BerError;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::grid::ParameterGrid;
use crate::matrix::{MatrixRow, ResultMatrix};
use crate::persist::{Persist, SweepStatus};
use crate::trial::Trial;

/// Cooperative cancellation flag shared with a signal handler or another thread.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Flag,
}

#[derive(Debug, Clone)]
enum Flag {
    Shared(Arc<AtomicBool>),
    Static(&'static AtomicBool),
}

impl CancelToken {
    /// Creates a fresh, unset token.
    pub fn new() -> Self {
        Self {
            flag: Flag::Shared(Arc::new(AtomicBool::new(false))),
        }
    }

    /// Wraps a process-wide flag, e.g. one set from a signal handler.
    pub fn from_static(flag: &'static AtomicBool) -> Self {
        Self {
            flag: Flag::Static(flag),
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.atomic().store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.atomic().load(Ordering::Relaxed)
    }

    fn atomic(&self) -> &AtomicBool {
        match &self.flag {
            Flag::Shared(flag) => flag,
            Flag::Static(flag) => flag,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for [`run_sweep`].
#[derive(Debug, Clone, Default)]
pub struct SweepOpts {
    /// Checked before each trial; an unfinished row is discarded.
    pub cancel: CancelToken,
    /// Rows recorded by an earlier run of the same grid; they are not rerun.
    pub resume_from: Option<ResultMatrix>,
    /// Stop after this many newly run rows.
    pub max_rows: Option<usize>,
}

/// Summary returned once the sweep stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Why the sweep stopped.
    pub status: SweepStatus,
    /// Every recorded row, resumed rows included.
    pub matrix: ResultMatrix,
    /// Rows taken over from a previous run.
    pub rows_resumed: usize,
    /// Rows executed by this run.
    pub rows_run: usize,
    /// Failure outcomes in the final matrix.
    pub failures: usize,
    /// Wall-clock duration of this run in milliseconds.
    pub elapsed_ms: u64,
}

/// Runs every cell of `grid`, bandwidth rows outer and noise columns inner.
///
/// Each completed row is appended to the matrix and checkpointed through
/// `persister`. Trial failures are recorded as outcomes and never stop the
/// sweep. Cancellation is checked before every trial; no trial starts once it
/// is requested, the unfinished row is dropped and a final checkpoint is
/// written. A checkpoint error stops the sweep after one more best-effort
/// write and is returned to the caller.
pub fn run_sweep<T, P>(
    grid: &ParameterGrid,
    runner: &mut T,
    persister: &mut P,
    opts: SweepOpts,
) -> Result<SweepReport, BerError>
where
    T: Trial + ?Sized,
    P: Persist + ?Sized,
{
    let started = Instant::now();
    let mut matrix = match opts.resume_from {
        Some(previous) => {
            previous.ensure_prefix_of(grid)?;
            previous
        }
        None => ResultMatrix::for_grid(grid),
    };
    let rows_resumed = matrix.row_count();
    if rows_resumed > 0 {
        info!(rows = rows_resumed, "resuming sweep");
    }

    let mut rows_run = 0usize;
    let mut status = SweepStatus::Complete;
    for (row_idx, &bandwidth) in grid
        .loop_bandwidths()
        .iter()
        .enumerate()
        .skip(rows_resumed)
    {
        if opts.cancel.is_cancelled() {
            warn!(row = row_idx, "sweep interrupted, saving progress");
            status = SweepStatus::Interrupted;
            break;
        }
        if opts.max_rows.is_some_and(|limit| rows_run >= limit) {
            status = SweepStatus::Partial;
            break;
        }

        let span = info_span!("row", index = row_idx, bandwidth);
        let _entered = span.enter();
        let mut outcomes = Vec::with_capacity(grid.columns());
        for &noise in grid.noise_levels() {
            if opts.cancel.is_cancelled() {
                break;
            }
            let outcome = runner.run_trial(noise, bandwidth);
            match outcome {
                ComparisonOutcome::Mismatches(count) => {
                    info!(noise, bandwidth, errors = count, "trial complete")
                }
                ComparisonOutcome::Failed(kind) => {
                    warn!(noise, bandwidth, reason = %kind, "trial failed")
                }
            }
            outcomes.push(outcome);
        }
        // A row cut short by cancellation is discarded, including the cell
        // whose trial was in flight when the signal arrived.
        if opts.cancel.is_cancelled() {
            warn!(
                row = row_idx,
                discarded = outcomes.len(),
                "sweep interrupted, saving progress"
            );
            status = SweepStatus::Interrupted;
            break;
        }
        matrix.push_row(MatrixRow {
            bandwidth,
            outcomes,
        })?;
        rows_run += 1;

        if let Err(err) = persister.checkpoint(&matrix, grid, SweepStatus::Running) {
            error!(%err, row = row_idx, "checkpoint failed, stopping sweep");
            if let Err(retry) = persister.checkpoint(&matrix, grid, SweepStatus::Failed) {
                error!(err = %retry, "final save failed");
            }
            return Err(err);
        }
        debug!(rows = matrix.row_count(), "checkpoint written");
    }

    persister.checkpoint(&matrix, grid, status)?;
    let failures = matrix.failure_count();
    info!(
        ?status,
        rows = matrix.row_count(),
        failures,
        "sweep finished"
    );
    Ok(SweepReport {
        status,
        rows_resumed,
        rows_run,
        failures,
        elapsed_ms: started.elapsed().as_millis() as u64,
        matrix,
    })
}
