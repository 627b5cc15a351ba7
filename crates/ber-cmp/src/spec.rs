use ber_core::errors::{BerError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Number of payload bits compared per trial by the reference schemes.
pub const DEFAULT_COMPARE_LENGTH_BITS: usize = 216;

/// Leading bits of the received stream skipped before alignment (BPSK).
pub const DEFAULT_SECOND_OFFSET_BITS: f64 = 49.0;

/// Comparison window and alignment applied to every trial of a run.
///
/// The offset is real valued. Bit positions use `floor(offset)`, while the
/// length precondition on the second stream uses the unrounded value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCompareSpec", into = "RawCompareSpec")]
pub struct CompareSpec {
    length_bits: usize,
    offset_bits: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawCompareSpec {
    #[serde(default = "default_length_bits")]
    length_bits: usize,
    #[serde(default)]
    offset_bits: f64,
}

fn default_length_bits() -> usize {
    DEFAULT_COMPARE_LENGTH_BITS
}

impl CompareSpec {
    /// Validates and builds a compare spec.
    pub fn new(length_bits: usize, offset_bits: f64) -> Result<Self, BerError> {
        if length_bits == 0 {
            return Err(BerError::Config(
                ErrorInfo::new("compare-length", "compare length must be positive")
                    .with_context("length_bits", length_bits.to_string()),
            ));
        }
        if !offset_bits.is_finite() || offset_bits < 0.0 {
            return Err(BerError::Config(
                ErrorInfo::new("compare-offset", "offset must be a finite non-negative number")
                    .with_context("offset_bits", offset_bits.to_string()),
            ));
        }
        Ok(Self {
            length_bits,
            offset_bits,
        })
    }

    /// Number of bits compared.
    pub fn length_bits(&self) -> usize {
        self.length_bits
    }

    /// Configured (unrounded) offset into the second stream.
    pub fn offset_bits(&self) -> f64 {
        self.offset_bits
    }

    /// Integer offset used for bit addressing: `floor(offset_bits)`.
    pub fn resolved_offset(&self) -> usize {
        self.offset_bits.floor() as usize
    }

    /// Minimum size of the first stream in bytes.
    pub fn required_first_bytes(&self) -> usize {
        self.length_bits.div_ceil(8)
    }

    /// Minimum size of the second stream in bytes, `ceil((L + offset) / 8)`.
    pub fn required_second_bytes(&self) -> usize {
        ((self.length_bits as f64 + self.offset_bits) / 8.0).ceil() as usize
    }
}

impl Default for CompareSpec {
    fn default() -> Self {
        Self {
            length_bits: DEFAULT_COMPARE_LENGTH_BITS,
            offset_bits: DEFAULT_SECOND_OFFSET_BITS,
        }
    }
}

impl TryFrom<RawCompareSpec> for CompareSpec {
    type Error = BerError;

    fn try_from(raw: RawCompareSpec) -> Result<Self, Self::Error> {
        CompareSpec::new(raw.length_bits, raw.offset_bits)
    }
}

impl From<CompareSpec> for RawCompareSpec {
    fn from(spec: CompareSpec) -> Self {
        Self {
            length_bits: spec.length_bits,
            offset_bits: spec.offset_bits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_floored_for_addressing() {
        let integral = CompareSpec::new(216, 49.0).unwrap();
        assert_eq!(integral.resolved_offset(), 49);
        let fractional = CompareSpec::new(216, 49.7).unwrap();
        assert_eq!(fractional.resolved_offset(), 49);
        let scaled = CompareSpec::new(216, 49.0 * 0.02).unwrap();
        assert_eq!(scaled.resolved_offset(), 0);
    }

    #[test]
    fn second_stream_requirement_uses_unrounded_offset() {
        let spec = CompareSpec::new(216, 49.0).unwrap();
        assert_eq!(spec.required_first_bytes(), 27);
        assert_eq!(spec.required_second_bytes(), 34);
        let scaled = CompareSpec::new(216, 0.98).unwrap();
        assert_eq!(scaled.required_second_bytes(), 28);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(CompareSpec::new(0, 0.0).is_err());
        assert!(CompareSpec::new(8, -1.0).is_err());
        assert!(CompareSpec::new(8, f64::NAN).is_err());
        assert!(CompareSpec::new(8, f64::INFINITY).is_err());
    }
}
