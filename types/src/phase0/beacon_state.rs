use ssz::ContiguousVector;

use crate::{
    phase0::{
        containers::{Crosslink, Eth1Data, Eth1DataVote, Fork, PendingAttestationRecord,
            ValidatorRecord},
        primitives::{DepositIndex, Epoch, Gwei, Slot, UnixSeconds, H256},
    },
    preset::Preset,
};

/// The beacon state. Transitions never mutate a state in place at the chain
/// layer; they clone, advance, and hand out a new one.
#[derive(Clone, Debug)]
pub struct BeaconState<P: Preset> {
    // > Versioning
    pub slot: Slot,
    pub genesis_time: UnixSeconds,
    pub fork: Fork,

    // > Registry
    pub validator_registry: Vec<ValidatorRecord>,
    pub validator_balances: Vec<Gwei>,

    // > Randomness
    pub latest_randao_mixes: ContiguousVector<H256, P::LatestRandaoMixesLength>,

    // > Shards
    pub latest_crosslinks: ContiguousVector<Crosslink, P::ShardCount>,

    // > History
    pub latest_block_roots: ContiguousVector<H256, P::LatestBlockRootsLength>,
    pub latest_active_index_roots: ContiguousVector<H256, P::LatestActiveIndexRootsLength>,
    pub latest_slashed_balances: ContiguousVector<Gwei, P::LatestSlashedExitLength>,

    // > Finality
    pub previous_justified_epoch: Epoch,
    pub justified_epoch: Epoch,
    pub finalized_epoch: Epoch,
    pub justification_bitfield: u64,

    // > Attestations
    pub latest_attestations: Vec<PendingAttestationRecord>,

    // > Eth1
    pub latest_eth1_data: Eth1Data,
    pub eth1_data_votes: Vec<Eth1DataVote>,
    pub deposit_index: DepositIndex,
}

impl<P: Preset> PartialEq for BeaconState<P> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
            && self.genesis_time == other.genesis_time
            && self.fork == other.fork
            && self.validator_registry == other.validator_registry
            && self.validator_balances == other.validator_balances
            && self.latest_randao_mixes == other.latest_randao_mixes
            && self.latest_crosslinks == other.latest_crosslinks
            && self.latest_block_roots == other.latest_block_roots
            && self.latest_active_index_roots == other.latest_active_index_roots
            && self.latest_slashed_balances == other.latest_slashed_balances
            && self.previous_justified_epoch == other.previous_justified_epoch
            && self.justified_epoch == other.justified_epoch
            && self.finalized_epoch == other.finalized_epoch
            && self.justification_bitfield == other.justification_bitfield
            && self.latest_attestations == other.latest_attestations
            && self.latest_eth1_data == other.latest_eth1_data
            && self.eth1_data_votes == other.eth1_data_votes
            && self.deposit_index == other.deposit_index
    }
}

impl<P: Preset> Eq for BeaconState<P> {}

impl<P: Preset> Default for BeaconState<P> {
    fn default() -> Self {
        Self {
            slot: 0,
            genesis_time: 0,
            fork: Fork::default(),
            validator_registry: Vec::new(),
            validator_balances: Vec::new(),
            latest_randao_mixes: ContiguousVector::default(),
            latest_crosslinks: ContiguousVector::default(),
            latest_block_roots: ContiguousVector::default(),
            latest_active_index_roots: ContiguousVector::default(),
            latest_slashed_balances: ContiguousVector::default(),
            previous_justified_epoch: 0,
            justified_epoch: 0,
            finalized_epoch: 0,
            justification_bitfield: 0,
            latest_attestations: Vec::new(),
            latest_eth1_data: Eth1Data::default(),
            eth1_data_votes: Vec::new(),
            deposit_index: 0,
        }
    }
}
