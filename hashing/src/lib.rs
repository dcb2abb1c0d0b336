//! The canonical hash function.
//!
//! Every digest in the protocol — tree hashes, randao mixes, shuffle seeds —
//! goes through [`hash`]. Swapping the function for the whole tree means
//! swapping this crate; all nodes in a network must link the same one.

use ethereum_types::H256;
use tiny_keccak::{Hasher as _, Keccak};

#[must_use]
pub fn hash(bytes: impl AsRef<[u8]>) -> H256 {
    let mut output = H256::zero();
    let mut keccak = Keccak::v256();
    keccak.update(bytes.as_ref());
    keccak.finalize(output.as_bytes_mut());
    output
}

#[must_use]
pub fn hash_pair(left: impl AsRef<[u8]>, right: impl AsRef<[u8]>) -> H256 {
    let mut output = H256::zero();
    let mut keccak = Keccak::v256();
    keccak.update(left.as_ref());
    keccak.update(right.as_ref());
    keccak.finalize(output.as_bytes_mut());
    output
}

/// `hash(seed ‖ round)`, used to derive shuffle pivots.
#[must_use]
pub fn hash_256_8(seed: H256, round: u8) -> H256 {
    hash_pair(seed, [round])
}

/// `hash(seed ‖ round ‖ position_window)`, used to derive shuffle sources.
/// The position window is encoded little-endian like all seed inputs.
#[must_use]
pub fn hash_256_8_32(seed: H256, round: u8, position_window: u32) -> H256 {
    let mut output = H256::zero();
    let mut keccak = Keccak::v256();
    keccak.update(seed.as_bytes());
    keccak.update(&[round]);
    keccak.update(&position_window.to_le_bytes());
    keccak.finalize(output.as_bytes_mut());
    output
}
