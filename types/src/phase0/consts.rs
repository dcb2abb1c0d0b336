use crate::phase0::primitives::{Epoch, ShardNumber, Slot};

pub const GENESIS_SLOT: Slot = 0;
pub const GENESIS_EPOCH: Epoch = 0;
pub const FAR_FUTURE_EPOCH: Epoch = Epoch::MAX;

/// The pseudo-shard attested to by committees voting on the beacon chain
/// itself rather than a shard crosslink.
pub const BEACON_CHAIN_SHARD_NUMBER: ShardNumber = ShardNumber::MAX;

pub const DEPOSIT_CONTRACT_TREE_DEPTH: usize = 32;
