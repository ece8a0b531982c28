//! BLAKE2b-256 hashing

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use lyra_primitives::H256;

type Blake2b256 = Blake2b<U32>;

/// Compute the BLAKE2b-256 hash of the input data
pub fn hash256(data: &[u8]) -> H256 {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    H256::from_bytes(result.into())
}
