use derive_more::Display;
use thiserror::Error;

use types::phase0::primitives::{Epoch, ShardNumber, Slot, ValidatorIndex};

#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("no validators are active")]
    NoActiveValidators,
    #[error("no committee is assigned to shard {shard} at slot {slot}")]
    CommitteeNotFound { shard: ShardNumber, slot: Slot },
    #[error("bitfield of {bitfield_bytes} bytes does not fit a committee of {committee_size}")]
    BitfieldLengthMismatch {
        bitfield_bytes: usize,
        committee_size: usize,
    },
    #[error("bit {position} is set beyond the committee size of {committee_size}")]
    BitSetOutsideCommittee {
        position: usize,
        committee_size: usize,
    },
    #[error("slot {slot} is outside the block root window of the state at slot {state_slot}")]
    SlotOutOfRange { slot: Slot, state_slot: Slot },
    #[error("epoch {epoch} is outside the randao mix window")]
    RandaoMixOutOfRange { epoch: Epoch },
    #[error("validator {index} is not in the registry of {registry_size}")]
    ValidatorIndexOutOfBounds {
        index: ValidatorIndex,
        registry_size: usize,
    },
    #[error("validator {index} is already slashed")]
    ValidatorAlreadySlashed { index: ValidatorIndex },
    #[error("deposit proof does not match the deposit root")]
    DepositProofInvalid,
    #[error("{0} is invalid")]
    SignatureInvalid(SignatureKind),
    #[error("block at slot {slot} has no ancestry to the start block")]
    UnknownBlock { slot: Slot },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum SignatureKind {
    #[display("attestation signature")]
    Attestation,
    #[display("block proposal signature")]
    Proposal,
    #[display("deposit proof of possession")]
    Deposit,
    #[display("RANDAO reveal")]
    Randao,
    #[display("transfer signature")]
    Transfer,
    #[display("voluntary exit signature")]
    VoluntaryExit,
}
