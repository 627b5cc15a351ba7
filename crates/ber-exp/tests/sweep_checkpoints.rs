use std::path::Path;

use ber_cmp::{CompareSpec, ComparisonOutcome, FailureKind};
use ber_exp::{
    run_sweep, CancelToken, ParameterGrid, RunPersister, SweepManifest, SweepOpts, SweepStatus,
    TableFormat, TablePersister,
};

fn persister(root: &Path) -> RunPersister {
    RunPersister::new(
        TablePersister::new(root.join("results.csv"), TableFormat::default()),
        root.join("sweep_manifest.json"),
        CompareSpec::default(),
    )
}

fn ten_row_grid() -> ParameterGrid {
    let bandwidths = (0..10).map(|i| i as f64 * 0.0025).collect();
    ParameterGrid::new(vec![0.0, 0.5, 1.0], bandwidths).unwrap()
}

#[test]
fn all_failing_sweep_persists_sentinels_in_order() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let grid = ParameterGrid::new(vec![0.0, 0.5], vec![0.0, 0.0025]).unwrap();
    let mut persister = persister(temp.path());
    let mut calls = Vec::new();
    let mut trial = |noise: f64, bandwidth: f64| {
        calls.push((bandwidth, noise));
        ComparisonOutcome::Failed(FailureKind::MissingOrEmptyInput)
    };

    let report = run_sweep(&grid, &mut trial, &mut persister, SweepOpts::default())
        .expect("sweep runs");
    assert_eq!(report.status, SweepStatus::Complete);
    assert_eq!(report.failures, 4);
    assert_eq!(
        calls,
        vec![(0.0, 0.0), (0.0, 0.5), (0.0025, 0.0), (0.0025, 0.5)]
    );

    let table = persister.table().load().expect("load table");
    assert_eq!(table.row_header, "Loop BW");
    assert_eq!(table.columns, vec!["0.0", "0.5"]);
    assert_eq!(
        table.rows,
        vec![
            ("0.0000".to_string(), vec![-1, -1]),
            ("0.0025".to_string(), vec![-1, -1]),
        ]
    );

    let manifest = SweepManifest::load(persister.manifest_path()).expect("load manifest");
    assert_eq!(manifest.status, SweepStatus::Complete);
    assert_eq!(
        manifest.matrix.get(1, 1),
        Some(ComparisonOutcome::Failed(FailureKind::MissingOrEmptyInput))
    );
}

fn cancelling_trial(
    cancel_on: usize,
    handle: CancelToken,
) -> impl FnMut(f64, f64) -> ComparisonOutcome {
    let mut trials = 0usize;
    move |noise: f64, _bandwidth: f64| {
        trials += 1;
        if trials == cancel_on {
            handle.cancel();
        }
        ComparisonOutcome::Mismatches((noise * 10.0) as usize)
    }
}

#[test]
fn cancellation_during_row_keeps_only_completed_rows() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let grid = ten_row_grid();
    let mut persister = persister(temp.path());
    let cancel = CancelToken::new();
    let mut started = 0usize;
    // Fourth row, first cell.
    let mut inner = cancelling_trial(10, cancel.clone());
    let mut trial = |noise: f64, bandwidth: f64| {
        started += 1;
        inner(noise, bandwidth)
    };

    let opts = SweepOpts {
        cancel,
        ..SweepOpts::default()
    };
    let report = run_sweep(&grid, &mut trial, &mut persister, opts).expect("sweep runs");
    assert_eq!(report.status, SweepStatus::Interrupted);
    assert_eq!(report.rows_run, 3);
    assert_eq!(started, 10);

    let table = persister.table().load().expect("load table");
    assert_eq!(table.rows.len(), 3);
    assert!(table.rows.iter().all(|(_, cells)| cells == &vec![0, 5, 10]));

    let manifest = SweepManifest::load(persister.manifest_path()).expect("load manifest");
    assert_eq!(manifest.status, SweepStatus::Interrupted);
    assert_eq!(manifest.rows_completed, 3);
    assert_eq!(manifest.rows_total, 10);
}

#[test]
fn no_trial_starts_after_cancellation() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let grid = ParameterGrid::new(vec![0.0, 0.5, 1.0, 1.5], vec![0.0, 0.0025]).unwrap();
    let mut persister = persister(temp.path());
    let cancel = CancelToken::new();
    let mut started = 0usize;
    let mut inner = cancelling_trial(1, cancel.clone());
    let mut trial = |noise: f64, bandwidth: f64| {
        started += 1;
        inner(noise, bandwidth)
    };

    let opts = SweepOpts {
        cancel,
        ..SweepOpts::default()
    };
    let report = run_sweep(&grid, &mut trial, &mut persister, opts).expect("sweep runs");
    assert_eq!(started, 1);
    assert_eq!(report.status, SweepStatus::Interrupted);
    assert_eq!(report.rows_run, 0);

    // The in-flight cell is not recorded as a failure.
    let table = persister.table().load().expect("load table");
    assert!(table.rows.is_empty());
    let manifest = SweepManifest::load(persister.manifest_path()).expect("load manifest");
    assert_eq!(manifest.status, SweepStatus::Interrupted);
    assert_eq!(manifest.failures, 0);
}

#[test]
fn cancellation_mid_row_drops_the_partial_row() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let grid = ten_row_grid();
    let mut persister = persister(temp.path());
    let cancel = CancelToken::new();
    let mut started = 0usize;
    // Third row, second cell.
    let mut inner = cancelling_trial(8, cancel.clone());
    let mut trial = |noise: f64, bandwidth: f64| {
        started += 1;
        inner(noise, bandwidth)
    };

    let opts = SweepOpts {
        cancel,
        ..SweepOpts::default()
    };
    let report = run_sweep(&grid, &mut trial, &mut persister, opts).expect("sweep runs");
    assert_eq!(started, 8);
    assert_eq!(report.rows_run, 2);
    assert_eq!(persister.table().load().expect("load table").rows.len(), 2);
}

#[test]
fn resumed_sweep_only_runs_remaining_rows() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let grid = ten_row_grid();
    let mut first = persister(temp.path());
    let mut trial = |_noise: f64, bandwidth: f64| {
        ComparisonOutcome::Mismatches((bandwidth * 10_000.0).round() as usize)
    };
    let partial = SweepOpts {
        max_rows: Some(4),
        ..SweepOpts::default()
    };
    let report = run_sweep(&grid, &mut trial, &mut first, partial).expect("partial run");
    assert_eq!(report.status, SweepStatus::Partial);

    let manifest = SweepManifest::load(first.manifest_path()).expect("load manifest");
    let resume_from = manifest
        .resume_matrix(&grid, &CompareSpec::default())
        .expect("matrix fits grid");
    let mut seen = Vec::new();
    let mut second_trial = |_noise: f64, bandwidth: f64| {
        seen.push(bandwidth);
        ComparisonOutcome::Mismatches((bandwidth * 10_000.0).round() as usize)
    };
    let mut second = persister(temp.path()).with_created_at(manifest.created_at.clone());
    let opts = SweepOpts {
        resume_from: Some(resume_from),
        ..SweepOpts::default()
    };
    let report = run_sweep(&grid, &mut second_trial, &mut second, opts).expect("resumed run");
    assert_eq!(report.status, SweepStatus::Complete);
    assert_eq!(report.rows_resumed, 4);
    assert_eq!(report.rows_run, 6);
    assert_eq!(seen.len(), 6 * 3);
    assert!(seen.iter().all(|bw| *bw >= 0.01 - 1e-12));

    let table = second.table().load().expect("load table");
    let cells: Vec<i64> = table.rows.iter().map(|(_, cells)| cells[0]).collect();
    assert_eq!(cells, vec![0, 25, 50, 75, 100, 125, 150, 175, 200, 225]);
    let resumed = SweepManifest::load(second.manifest_path()).expect("load manifest");
    assert_eq!(resumed.created_at, manifest.created_at);
}

#[test]
fn resume_rejects_changed_compare_spec() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let grid = ten_row_grid();
    let mut persister = persister(temp.path());
    let mut trial = |_: f64, _: f64| ComparisonOutcome::Mismatches(0);
    let opts = SweepOpts {
        max_rows: Some(1),
        ..SweepOpts::default()
    };
    run_sweep(&grid, &mut trial, &mut persister, opts).expect("partial run");

    let manifest = SweepManifest::load(persister.manifest_path()).expect("load manifest");
    let other = CompareSpec::new(216, 0.98).unwrap();
    let err = manifest.resume_matrix(&grid, &other).unwrap_err();
    assert_eq!(err.info().code, "resume-mismatch");
}
