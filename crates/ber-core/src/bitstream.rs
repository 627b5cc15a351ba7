//! Immutable MSB-first packed bit buffers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Immutable byte buffer read as a most-significant-bit-first bit sequence.
///
/// Bit position `p` lives in byte `p / 8` at bit `7 - p % 8`, which matches
/// the 8-bit packed artifacts written by the channel simulation.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Bitstream {
    bytes: Box<[u8]>,
}

impl Bitstream {
    /// Wraps the provided bytes without copying when given a `Vec`.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into().into_boxed_slice(),
        }
    }

    /// Packs a bit sequence MSB first. A trailing partial byte is zero padded.
    pub fn from_bits<I>(bits: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut bytes = Vec::new();
        let mut current = 0u8;
        let mut filled = 0u8;
        for bit in bits {
            current = (current << 1) | u8::from(bit);
            filled += 1;
            if filled == 8 {
                bytes.push(current);
                current = 0;
                filled = 0;
            }
        }
        if filled > 0 {
            bytes.push(current << (8 - filled));
        }
        Self::from_bytes(bytes)
    }

    /// Returns the raw packed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true when the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of addressable bits (always a multiple of eight).
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Returns the bit at `position`, or `None` past the end of the buffer.
    pub fn bit(&self, position: usize) -> Option<bool> {
        let byte = self.bytes.get(position / 8)?;
        let shift = 7 - (position % 8);
        Some((byte >> shift) & 1 == 1)
    }

    /// Iterates over every bit in MSB-first order.
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        self.bytes
            .iter()
            .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1 == 1))
    }
}

impl From<Vec<u8>> for Bitstream {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<&[u8]> for Bitstream {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Bitstream {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Bitstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitstream({} bytes: ", self.bytes.len())?;
        for byte in self.bytes.iter().take(8) {
            write!(f, "{byte:02x}")?;
        }
        if self.bytes.len() > 8 {
            write!(f, "..")?;
        }
        write!(f, ")")
    }
}
