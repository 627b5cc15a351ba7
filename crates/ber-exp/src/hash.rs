use ber_cmp::CompareSpec;
use ber_core::errors::BerError;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::grid::ParameterGrid;
use crate::serde::to_canonical_json_bytes;

/// Hex SHA-256 of the canonical JSON form of `value`.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, BerError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Identity of a sweep: stored rows are only reusable under the same grid and
/// compare window.
pub fn grid_hash(grid: &ParameterGrid, compare: &CompareSpec) -> Result<String, BerError> {
    stable_hash_string(&(grid, compare))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_hash_tracks_grid_and_window() {
        let grid = ParameterGrid::new(vec![0.0, 0.5], vec![0.0, 0.0025]).unwrap();
        let bpsk = CompareSpec::new(216, 49.0).unwrap();
        let base = grid_hash(&grid, &bpsk).unwrap();
        assert_eq!(base.len(), 64);
        assert_eq!(base, grid_hash(&grid.clone(), &bpsk).unwrap());

        let qpsk = CompareSpec::new(216, 0.98).unwrap();
        assert_ne!(base, grid_hash(&grid, &qpsk).unwrap());
        let wider = ParameterGrid::new(vec![0.0, 0.5, 1.0], vec![0.0, 0.0025]).unwrap();
        assert_ne!(base, grid_hash(&wider, &bpsk).unwrap());
    }
}
