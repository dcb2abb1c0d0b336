use ssz::SszHash as _;

use types::phase0::{
    containers::{AttestationData, AttestationDataAndCustodyBit},
    primitives::{Epoch, H256},
};

/// The message behind a randao reveal: the tree hash of the epoch number.
#[must_use]
pub fn randao_reveal_message(epoch: Epoch) -> H256 {
    epoch.hash_tree_root()
}

/// The message behind attestation signatures: the attestation data paired
/// with a custody bit. In phase 0 only the `false` bit is ever signed.
#[must_use]
pub fn attestation_message(data: AttestationData, custody_bit: bool) -> H256 {
    AttestationDataAndCustodyBit { data, custody_bit }.hash_tree_root()
}
