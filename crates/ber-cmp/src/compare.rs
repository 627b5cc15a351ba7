use ber_core::Bitstream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::CompareSpec;

/// Table value written for cells whose trial failed.
pub const FAILURE_SENTINEL: i64 = -1;

/// Reason a trial produced no mismatch count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// An artifact is absent or zero length.
    #[error("missing or empty input")]
    MissingOrEmptyInput,
    /// An artifact is too short for the compare length plus offset.
    #[error("insufficient data")]
    InsufficientData,
    /// The channel simulation could not be started or produced nothing usable.
    #[error("collaborator failure")]
    CollaboratorFailure,
}

impl FailureKind {
    /// Stable kebab-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingOrEmptyInput => "missing-or-empty-input",
            FailureKind::InsufficientData => "insufficient-data",
            FailureKind::CollaboratorFailure => "collaborator-failure",
        }
    }
}

/// Result of one trial: a mismatch count or a failure tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum ComparisonOutcome {
    /// Number of differing bits inside the compare window.
    Mismatches(usize),
    /// The trial could not be evaluated.
    Failed(FailureKind),
}

impl ComparisonOutcome {
    /// Mismatch count when the trial succeeded.
    pub fn mismatches(&self) -> Option<usize> {
        match self {
            ComparisonOutcome::Mismatches(count) => Some(*count),
            ComparisonOutcome::Failed(_) => None,
        }
    }

    /// Failure tag when the trial failed.
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            ComparisonOutcome::Mismatches(_) => None,
            ComparisonOutcome::Failed(kind) => Some(*kind),
        }
    }

    /// Returns true for failure outcomes.
    pub fn is_failure(&self) -> bool {
        matches!(self, ComparisonOutcome::Failed(_))
    }

    /// Integer written into the result table; failures map to [`FAILURE_SENTINEL`].
    pub fn cell_value(&self) -> i64 {
        match self {
            ComparisonOutcome::Mismatches(count) => *count as i64,
            ComparisonOutcome::Failed(_) => FAILURE_SENTINEL,
        }
    }

    /// Fraction of compared bits in error.
    pub fn bit_error_rate(&self, spec: &CompareSpec) -> Option<f64> {
        self.mismatches()
            .map(|count| count as f64 / spec.length_bits() as f64)
    }
}

/// Counts bit mismatches between `first[i]` and `second[i + offset]`.
///
/// Preconditions are checked before any bit is read, in order: both streams
/// non-empty, then `first` covers `ceil(L / 8)` bytes, then `second` covers
/// `ceil((L + offset) / 8)` bytes. Only the second stream is shifted, so the
/// comparison is not symmetric in its arguments.
pub fn compare(first: &Bitstream, second: &Bitstream, spec: &CompareSpec) -> ComparisonOutcome {
    compare_bytes(first.as_bytes(), second.as_bytes(), spec)
}

/// Byte-slice form of [`compare`].
pub fn compare_bytes(first: &[u8], second: &[u8], spec: &CompareSpec) -> ComparisonOutcome {
    if first.is_empty() || second.is_empty() {
        return ComparisonOutcome::Failed(FailureKind::MissingOrEmptyInput);
    }
    if first.len() < spec.required_first_bytes() || second.len() < spec.required_second_bytes() {
        return ComparisonOutcome::Failed(FailureKind::InsufficientData);
    }

    let length = spec.length_bits();
    let offset = spec.resolved_offset();
    let mut mismatches = 0usize;
    for (idx, &reference) in first[..length.div_ceil(8)].iter().enumerate() {
        let window = extract_byte(second, idx * 8 + offset);
        let valid = (length - idx * 8).min(8);
        let mask = !0u8 << (8 - valid);
        mismatches += ((reference ^ window) & mask).count_ones() as usize;
    }
    ComparisonOutcome::Mismatches(mismatches)
}

/// Reads 8 bits starting at an arbitrary bit position. Bits past the end read as zero.
fn extract_byte(bytes: &[u8], bit_position: usize) -> u8 {
    let index = bit_position / 8;
    let shift = bit_position % 8;
    let high = bytes.get(index).copied().unwrap_or(0);
    if shift == 0 {
        return high;
    }
    let low = bytes.get(index + 1).copied().unwrap_or(0);
    (high << shift) | (low >> (8 - shift))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(length: usize, offset: f64) -> CompareSpec {
        CompareSpec::new(length, offset).unwrap()
    }

    #[test]
    fn extract_byte_crosses_boundaries() {
        let bytes = [0b1010_1010, 0b1111_0000];
        assert_eq!(extract_byte(&bytes, 0), 0b1010_1010);
        assert_eq!(extract_byte(&bytes, 4), 0b1010_1111);
        assert_eq!(extract_byte(&bytes, 8), 0b1111_0000);
        assert_eq!(extract_byte(&bytes, 12), 0b0000_0000);
    }

    #[test]
    fn empty_inputs_are_reported_before_size_checks() {
        let outcome = compare_bytes(&[], &[0u8; 64], &spec(216, 49.0));
        assert_eq!(
            outcome,
            ComparisonOutcome::Failed(FailureKind::MissingOrEmptyInput)
        );
        let outcome = compare_bytes(&[0u8; 64], &[], &spec(216, 49.0));
        assert_eq!(
            outcome,
            ComparisonOutcome::Failed(FailureKind::MissingOrEmptyInput)
        );
    }

    #[test]
    fn partial_trailing_byte_is_masked() {
        let first = [0x00, 0x00];
        let second = [0x00, 0xff];
        assert_eq!(
            compare_bytes(&first, &second, &spec(12, 0.0)),
            ComparisonOutcome::Mismatches(4)
        );
    }

    #[test]
    fn sentinel_and_rate() {
        let spec = spec(216, 49.0);
        let ok = ComparisonOutcome::Mismatches(54);
        assert_eq!(ok.cell_value(), 54);
        assert_eq!(ok.bit_error_rate(&spec), Some(0.25));
        let failed = ComparisonOutcome::Failed(FailureKind::CollaboratorFailure);
        assert_eq!(failed.cell_value(), FAILURE_SENTINEL);
        assert_eq!(failed.bit_error_rate(&spec), None);
    }
}
