use std::error::Error;
use std::fmt::Write as _;
use std::path::PathBuf;

use ber_cmp::{DEFAULT_COMPARE_LENGTH_BITS, FAILURE_SENTINEL};
use ber_exp::{load_table, TableFormat, TableSnapshot};
use clap::Args;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Result table written by a sweep.
    #[arg(long)]
    pub table: PathBuf,
    /// Compare length the table was produced with.
    #[arg(long, default_value_t = DEFAULT_COMPARE_LENGTH_BITS)]
    pub length: usize,
    /// Field delimiter of the table.
    #[arg(long, default_value_t = '\t')]
    pub delimiter: char,
}

pub fn run(args: &ReportArgs) -> Result<(), Box<dyn Error>> {
    if args.length == 0 {
        return Err("--length must be positive".into());
    }
    let format = TableFormat {
        delimiter: args.delimiter,
        ..TableFormat::default()
    };
    let snapshot = load_table(&args.table, &format)?;
    print!("{}", render(&snapshot, args.length));
    Ok(())
}

/// Per-row mean over the cells that produced a count.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RowSummary {
    mean_ber: Option<f64>,
    failures: usize,
}

fn summarize(cells: &[i64], length: usize) -> RowSummary {
    let counts: Vec<i64> = cells
        .iter()
        .copied()
        .filter(|cell| *cell != FAILURE_SENTINEL)
        .collect();
    let mean_ber = if counts.is_empty() {
        None
    } else {
        let total: i64 = counts.iter().sum();
        Some(total as f64 / (counts.len() * length) as f64)
    };
    RowSummary {
        mean_ber,
        failures: cells.len() - counts.len(),
    }
}

fn render(snapshot: &TableSnapshot, length: usize) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:>8}", snapshot.row_header);
    for column in &snapshot.columns {
        let _ = write!(out, " {:>8}", column);
    }
    let _ = writeln!(out, " {:>10} {:>5}", "mean", "fail");

    let mut failures = 0;
    for (label, cells) in &snapshot.rows {
        let _ = write!(out, "{:>8}", label);
        for cell in cells {
            if *cell == FAILURE_SENTINEL {
                let _ = write!(out, " {:>8}", "-");
            } else {
                let _ = write!(out, " {:>8.4}", *cell as f64 / length as f64);
            }
        }
        let summary = summarize(cells, length);
        failures += summary.failures;
        match summary.mean_ber {
            Some(mean) => {
                let _ = write!(out, " {:>10.6}", mean);
            }
            None => {
                let _ = write!(out, " {:>10}", "-");
            }
        }
        let _ = writeln!(out, " {:>5}", summary.failures);
    }
    let _ = writeln!(
        out,
        "{} rows, {} failed cells",
        snapshot.rows.len(),
        failures
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> TableSnapshot {
        TableSnapshot {
            row_header: "Loop BW".to_string(),
            columns: vec!["0.0".to_string(), "0.5".to_string()],
            rows: vec![
                ("0.0000".to_string(), vec![0, 54]),
                ("0.0025".to_string(), vec![-1, -1]),
            ],
        }
    }

    #[test]
    fn failures_are_excluded_from_row_means() {
        let summary = summarize(&[0, 108, -1], 216);
        assert_eq!(summary.failures, 1);
        assert!((summary.mean_ber.unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(summarize(&[-1, -1], 216).mean_ber, None);
    }

    #[test]
    fn render_prints_fractions_and_totals() {
        let text = render(&snapshot(), 216);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Loop BW"));
        assert!(lines[1].contains("0.2500"));
        assert!(lines[2].trim_end().ends_with('2'));
        assert_eq!(lines[3], "2 rows, 2 failed cells");
    }
}
