use types::{
    phase0::{
        containers::{AttestationData, ValidatorRecord},
        primitives::{Epoch, H256},
    },
    preset::Preset,
};

use crate::misc;

#[must_use]
pub fn is_active_validator(validator: &ValidatorRecord, epoch: Epoch) -> bool {
    validator.activation_epoch <= epoch && epoch < validator.exit_epoch
}

/// Whether a validator can still be slashed at `epoch`.
#[must_use]
pub fn is_slashable_validator(validator: &ValidatorRecord, epoch: Epoch) -> bool {
    !validator.slashed
        && validator.activation_epoch <= epoch
        && epoch < validator.withdrawable_epoch
}

/// Two votes for the same target epoch with different data.
#[must_use]
pub fn is_double_vote<P: Preset>(data_1: &AttestationData, data_2: &AttestationData) -> bool {
    misc::slot_to_epoch::<P>(data_1.slot) == misc::slot_to_epoch::<P>(data_2.slot)
}

/// `data_1` surrounds `data_2`: an earlier source with a later target.
#[must_use]
pub fn is_surround_vote<P: Preset>(data_1: &AttestationData, data_2: &AttestationData) -> bool {
    data_1.justified_epoch < data_2.justified_epoch
        && misc::slot_to_epoch::<P>(data_2.slot) < misc::slot_to_epoch::<P>(data_1.slot)
}

/// Verifies a Merkle branch of `depth` hashes from `leaf` at `index` up to
/// `root`.
#[must_use]
pub fn validate_merkle_branch(
    leaf: H256,
    branch: &[H256],
    depth: usize,
    index: u64,
    root: H256,
) -> bool {
    if branch.len() != depth {
        return false;
    }

    let mut value = leaf;

    for (height, sibling) in branch.iter().enumerate() {
        value = if index >> height & 1 == 1 {
            hashing::hash_pair(sibling, value)
        } else {
            hashing::hash_pair(value, sibling)
        };
    }

    value == root
}
