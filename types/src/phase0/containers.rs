use bls::{PublicKeyBytes, SignatureBytes};
use ssz::Bitfield;

use crate::phase0::primitives::{
    DepositIndex, Epoch, Gwei, ShardNumber, Slot, ValidatorIndex, Version, H256,
};

// Signatures are carried as compressed bytes and only decompressed when
// verified, so containers with invalid signatures can still be decoded and
// rejected by the verifiers rather than the codec.

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Attestation {
    pub data: AttestationData,
    pub aggregation_bitfield: Bitfield,
    pub custody_bitfield: Bitfield,
    pub aggregate_signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct AttestationData {
    pub slot: Slot,
    pub shard: ShardNumber,
    pub beacon_block_root: H256,
    pub epoch_boundary_root: H256,
    pub crosslink_data_root: H256,
    pub latest_crosslink: Crosslink,
    pub justified_epoch: Epoch,
    pub justified_block_root: H256,
}

/// The message attesters actually sign. In phase 0 the custody bit is always
/// false.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct AttestationDataAndCustodyBit {
    pub data: AttestationData,
    pub custody_bit: bool,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct AttesterSlashing {
    pub slashable_attestation_1: SlashableAttestation,
    pub slashable_attestation_2: SlashableAttestation,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct BeaconBlock {
    pub slot: Slot,
    pub parent_root: H256,
    pub state_root: H256,
    pub randao_reveal: SignatureBytes,
    pub eth1_data: Eth1Data,
    pub body: BeaconBlockBody,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct BeaconBlockBody {
    pub proposer_slashings: Vec<ProposerSlashing>,
    pub attester_slashings: Vec<AttesterSlashing>,
    pub attestations: Vec<Attestation>,
    pub deposits: Vec<Deposit>,
    pub voluntary_exits: Vec<VoluntaryExit>,
    pub transfers: Vec<Transfer>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct Crosslink {
    pub epoch: Epoch,
    pub crosslink_data_root: H256,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Deposit {
    pub proof: Vec<H256>,
    pub index: DepositIndex,
    pub deposit_data: DepositData,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct DepositData {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
    pub proof_of_possession: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct Eth1Data {
    pub deposit_root: H256,
    pub block_hash: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Eth1DataVote {
    pub eth1_data: Eth1Data,
    pub vote_count: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Fork {
    pub previous_version: Version,
    pub current_version: Version,
    pub epoch: Epoch,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct PendingAttestationRecord {
    pub aggregation_bitfield: Bitfield,
    pub data: AttestationData,
    pub custody_bitfield: Bitfield,
    pub slot_included: Slot,
}

/// A signed proposal header. Two conflicting ones by the same proposer form a
/// [`ProposerSlashing`].
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Proposal {
    pub slot: Slot,
    pub shard: ShardNumber,
    pub block_root: H256,
    pub signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ProposerSlashing {
    pub proposer_index: ValidatorIndex,
    pub proposal_1: Proposal,
    pub proposal_2: Proposal,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct SlashableAttestation {
    pub validator_indices: Vec<ValidatorIndex>,
    pub data: AttestationData,
    pub custody_bitfield: Bitfield,
    pub aggregate_signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Transfer {
    pub sender: ValidatorIndex,
    pub recipient: ValidatorIndex,
    pub amount: Gwei,
    pub fee: Gwei,
    pub slot: Slot,
    pub pubkey: PublicKeyBytes,
    pub signature: SignatureBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ValidatorRecord {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
    pub initiated_exit: bool,
    pub slashed: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct VoluntaryExit {
    pub epoch: Epoch,
    pub validator_index: ValidatorIndex,
    pub signature: SignatureBytes,
}
