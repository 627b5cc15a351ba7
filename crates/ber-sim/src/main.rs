use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    compare::{self, CompareArgs},
    demo::{self, DemoArgs},
    init::{self, InitArgs},
    report::{self, ReportArgs},
    sweep::{self, SweepArgs},
};
use logging::{init_logging, LogConfig, LogFormat, LogLevel};

mod commands;
mod logging;
mod signals;

#[derive(Parser, Debug)]
#[command(name = "ber-sim", about = "Bit error rate sweep CLI")]
struct Cli {
    /// Minimum log level; `RUST_LOG` takes precedence when set.
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
    /// Log layout on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
    /// Per-target directives such as `ber_exp=debug,ber_sim=warn`; overrides
    /// both `--log-level` and `RUST_LOG`.
    #[arg(long, global = true)]
    log_filter: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare two bitstream files and print the outcome as JSON.
    Compare(CompareArgs),
    /// Run a (loop bandwidth x noise) sweep from a YAML configuration.
    Sweep(SweepArgs),
    /// Run a short sweep against the synthetic channel.
    Demo(DemoArgs),
    /// Write a preset configuration file.
    Init(InitArgs),
    /// Print a persisted result table as bit error rates.
    Report(ReportArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&LogConfig {
        level: cli.log_level,
        format: cli.log_format,
        filter: cli.log_filter,
    });
    match cli.command {
        Command::Compare(args) => compare::run(&args),
        Command::Sweep(args) => sweep::run(&args, signals::install_shutdown_handler()),
        Command::Demo(args) => demo::run(&args, signals::install_shutdown_handler()),
        Command::Init(args) => init::run(&args),
        Command::Report(args) => report::run(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_is_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "ber-sim",
            "init",
            "--out",
            "cfg.yaml",
            "--log-filter",
            "ber_exp=debug",
        ])
        .unwrap();
        assert_eq!(cli.log_filter.as_deref(), Some("ber_exp=debug"));
        assert!(matches!(cli.command, Command::Init(_)));
    }
}
