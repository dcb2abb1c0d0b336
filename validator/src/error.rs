use thiserror::Error;

use types::phase0::primitives::{ShardNumber, Slot, ValidatorIndex};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("no committees are assigned to slot {slot}")]
    NoCommitteesAtSlot { slot: Slot },
    #[error("validator {validator_index} is not in the committee for shard {shard}")]
    NotInCommittee {
        validator_index: ValidatorIndex,
        shard: ShardNumber,
    },
}
