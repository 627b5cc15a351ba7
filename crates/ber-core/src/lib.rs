#![deny(missing_docs)]
#![doc = "Core error and bitstream types for the BER sweep engine."]

pub mod bitstream;
pub mod errors;

pub use bitstream::Bitstream;
pub use errors::{BerError, ErrorInfo};
