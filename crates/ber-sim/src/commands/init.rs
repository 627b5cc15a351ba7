use std::error::Error;
use std::path::PathBuf;

use ber_exp::{CollaboratorConfig, Scheme, SweepConfig};
use clap::Args;
use tracing::info;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Scheme preset to write.
    #[arg(long, default_value = "bpsk")]
    pub scheme: Scheme,
    /// Destination YAML file.
    #[arg(long)]
    pub out: PathBuf,
    /// Use the synthetic channel instead of the flowgraph script.
    #[arg(long)]
    pub synthetic: bool,
    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs) -> Result<(), Box<dyn Error>> {
    if args.out.exists() && !args.force {
        return Err(format!("{} already exists; pass --force to overwrite", args.out.display()).into());
    }
    let mut config = SweepConfig::preset(args.scheme);
    if args.synthetic {
        config.collaborator = CollaboratorConfig::synthetic(0);
    }
    config.store(&args.out)?;
    info!(path = %args.out.display(), scheme = %args.scheme, "wrote sweep config");
    Ok(())
}
