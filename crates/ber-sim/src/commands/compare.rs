use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ber_cmp::{compare, CompareSpec, DEFAULT_COMPARE_LENGTH_BITS, DEFAULT_SECOND_OFFSET_BITS};
use ber_core::Bitstream;
use clap::Args;
use serde_json::json;
use tracing::debug;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Reference (sent) bitstream.
    #[arg(long)]
    pub first: PathBuf,
    /// Recovered bitstream, read from the bit offset onward.
    #[arg(long)]
    pub second: PathBuf,
    /// Number of bits to compare.
    #[arg(long, default_value_t = DEFAULT_COMPARE_LENGTH_BITS)]
    pub length: usize,
    /// Bit offset into the second stream; fractional values are floored.
    #[arg(long, default_value_t = DEFAULT_SECOND_OFFSET_BITS)]
    pub offset: f64,
}

pub fn run(args: &CompareArgs) -> Result<(), Box<dyn Error>> {
    let spec = CompareSpec::new(args.length, args.offset)?;
    let first = read_stream(&args.first)?;
    let second = read_stream(&args.second)?;
    let outcome = compare(&first, &second, &spec);
    let summary = json!({
        "first": args.first,
        "second": args.second,
        "length_bits": spec.length_bits(),
        "offset_bits": spec.offset_bits(),
        "resolved_offset": spec.resolved_offset(),
        "outcome": outcome,
        "cell": outcome.cell_value(),
        "ber": outcome.bit_error_rate(&spec),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Missing files compare as empty streams so they surface as a failure outcome.
fn read_stream(path: &Path) -> Result<Bitstream, Box<dyn Error>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Bitstream::from_bytes(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "input missing");
            Ok(Bitstream::default())
        }
        Err(err) => Err(Box::new(err)),
    }
}
