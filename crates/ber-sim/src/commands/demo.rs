use std::error::Error;
use std::fs;
use std::path::PathBuf;

use ber_exp::{AxisSpec, CancelToken, CollaboratorConfig, Scheme, SweepConfig, TrialTiming};
use clap::Args;

use super::sweep;

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Directory receiving the config, artefacts, table and manifest.
    #[arg(long)]
    pub out: PathBuf,
    /// Scheme preset supplying the compare window and file names.
    #[arg(long, default_value = "bpsk")]
    pub scheme: Scheme,
    /// Seed of the synthetic channel.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Number of bandwidth rows to sweep.
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

/// Preset for `scheme` with the synthetic channel and no waits.
pub fn demo_config(args: &DemoArgs) -> SweepConfig {
    let mut config = SweepConfig::preset(args.scheme);
    config.grid.bandwidth = AxisSpec::Range {
        start: 0.0,
        stop: 0.0025 * args.rows.max(1) as f64,
        step: 0.0025,
        inclusive: false,
    };
    config.timing = TrialTiming::immediate();
    config.artifacts.dir = args.out.join("artifacts");
    config.output.dir = args.out.clone();
    config.collaborator = CollaboratorConfig::synthetic(args.seed);
    config
}

pub fn run(args: &DemoArgs, cancel: CancelToken) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let config = demo_config(args);
    config.validate()?;
    config.store(&args.out.join("demo_config.yaml"))?;
    sweep::execute(&config, false, None, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_grid_has_requested_rows() {
        let args = DemoArgs {
            out: PathBuf::from("/tmp/demo"),
            scheme: Scheme::Qpsk,
            seed: 1,
            rows: 4,
        };
        let config = demo_config(&args);
        let grid = config.grid().unwrap();
        assert_eq!(grid.rows(), 4);
        assert_eq!(grid.columns(), 9);
        assert_eq!(config.output.table, "qpsk_results.csv");
        assert!(config.validate().is_ok());
    }
}
