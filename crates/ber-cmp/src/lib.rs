//! Bit-exact comparison of two MSB-first packed bitstreams.
//!
//! The comparator aligns the second stream by a configurable bit offset and
//! counts mismatches over a fixed window. It never reads out of range: short
//! or empty inputs produce a [`FailureKind`] instead of a count.

mod compare;
mod spec;

pub use compare::{compare, compare_bytes, ComparisonOutcome, FailureKind, FAILURE_SENTINEL};
pub use spec::{CompareSpec, DEFAULT_COMPARE_LENGTH_BITS, DEFAULT_SECOND_OFFSET_BITS};
