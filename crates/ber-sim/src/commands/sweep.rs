use std::error::Error;
use std::path::PathBuf;

use ber_exp::{run_sweep, CancelToken, SweepConfig, SweepManifest, SweepOpts};
use clap::Args;
use serde_json::json;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// YAML sweep configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Overrides the configured output directory.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Continue from the manifest left by an earlier run of the same grid.
    #[arg(long)]
    pub resume: bool,
    /// Stop after this many new rows.
    #[arg(long)]
    pub max_rows: Option<usize>,
}

pub fn run(args: &SweepArgs, cancel: CancelToken) -> Result<(), Box<dyn Error>> {
    let mut config = SweepConfig::load(&args.config)?;
    if let Some(out) = &args.out {
        config.output.dir = out.clone();
    }
    execute(&config, args.resume, args.max_rows, cancel)
}

/// Runs `config` to completion, interruption or the row limit.
///
/// Interrupted and partial sweeps are successful exits; their progress is
/// already on disk.
pub fn execute(
    config: &SweepConfig,
    resume: bool,
    max_rows: Option<usize>,
    cancel: CancelToken,
) -> Result<(), Box<dyn Error>> {
    let grid = config.grid()?;
    let mut persister = config.persister();
    let mut resume_from = None;
    if resume {
        let manifest_path = config.output.manifest_path();
        if manifest_path.exists() {
            let manifest = SweepManifest::load(&manifest_path)?;
            resume_from = Some(manifest.resume_matrix(&grid, &config.compare)?);
            persister = persister.with_created_at(manifest.created_at);
        } else {
            warn!(path = %manifest_path.display(), "no manifest to resume from, starting fresh");
        }
    }

    let mut runner = config.trial_runner();
    info!(
        scheme = %config.scheme,
        rows = grid.rows(),
        columns = grid.columns(),
        table = %config.output.table_path().display(),
        "starting sweep"
    );
    let opts = SweepOpts {
        cancel,
        resume_from,
        max_rows,
    };
    let report = run_sweep(&grid, &mut runner, &mut persister, opts)?;

    let summary = json!({
        "status": report.status,
        "rows_completed": report.matrix.row_count(),
        "rows_total": grid.rows(),
        "rows_resumed": report.rows_resumed,
        "rows_run": report.rows_run,
        "failures": report.failures,
        "elapsed_ms": report.elapsed_ms,
        "table": config.output.table_path(),
        "manifest": config.output.manifest_path(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
