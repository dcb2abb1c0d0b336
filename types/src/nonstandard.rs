//! Types used by the implementation that do not appear on the wire.

use crate::phase0::primitives::{ShardNumber, ValidatorIndex};

/// A committee assigned to a `(slot, shard)` pair. Member order is the
/// shuffle order; bitfield positions refer to it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ShardCommittee {
    pub committee: Vec<ValidatorIndex>,
    pub shard: ShardNumber,
}
