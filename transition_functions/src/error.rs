use thiserror::Error;

use types::phase0::{
    containers::Crosslink,
    primitives::{DepositIndex, Epoch, Slot, ValidatorIndex, H256},
};

use crate::state_ex::TransitionType;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{attempted:?} transition cannot be applied after {previous:?}")]
    TransitionOrder {
        attempted: TransitionType,
        previous: TransitionType,
    },
    #[error("block slot {block_slot} does not match state slot {state_slot}")]
    SlotMismatch { state_slot: Slot, block_slot: Slot },
    #[error("block parent root {in_block:?} does not match head block {expected:?}")]
    ParentRootMismatch { expected: H256, in_block: H256 },
    #[error("computed state root {computed:?} does not match block state root {in_block:?}")]
    StateRootMismatch { computed: H256, in_block: H256 },
    #[error("block carries {actual} {kind}, at most {maximum} are allowed")]
    OperationListTooLong {
        kind: &'static str,
        maximum: usize,
        actual: usize,
    },
    #[error("deposit has index {observed}, the state expects {expected}")]
    DepositIndexMismatch {
        expected: DepositIndex,
        observed: DepositIndex,
    },
    #[error(
        "attestation for slot {attestation_slot} is outside the inclusion window \
         at state slot {state_slot}"
    )]
    AttestationOutsideInclusionWindow {
        attestation_slot: Slot,
        state_slot: Slot,
    },
    #[error("attestation justified epoch {in_attestation} does not match {computed}")]
    JustifiedEpochMismatch {
        in_attestation: Epoch,
        computed: Epoch,
    },
    #[error(
        "attestation justified block root {in_attestation:?} does not match {computed:?}"
    )]
    JustifiedBlockRootMismatch {
        in_attestation: H256,
        computed: H256,
    },
    #[error("attestation crosslink {in_attestation:?} does not match {latest:?}")]
    CrosslinkMismatch {
        in_attestation: Box<Crosslink>,
        latest: Box<Crosslink>,
    },
    #[error("aggregation bitfield is all zero")]
    AggregationBitfieldZero,
    #[error("custody bitfield is not all zero")]
    CustodyBitfieldNonZero,
    #[error("crosslink data root is not zero")]
    CrosslinkDataRootNonZero,
    #[error("proposals of proposer {proposer_index} do not conflict")]
    ProposalsDoNotConflict { proposer_index: ValidatorIndex },
    #[error("validator {index} is not slashable")]
    ValidatorNotSlashable { index: ValidatorIndex },
    #[error("slashable attestations do not conflict")]
    SlashableAttestationsDoNotConflict,
    #[error("attester slashing names no slashable validators")]
    NoSlashableIndices,
    #[error("validator {index} has already initiated an exit")]
    ExitAlreadyInitiated { index: ValidatorIndex },
    #[error("validator {index} is already exiting")]
    ValidatorAlreadyExited { index: ValidatorIndex },
    #[error("exit epoch {epoch} is after the current epoch {current_epoch}")]
    ExitEpochInFuture { epoch: Epoch, current_epoch: Epoch },
    #[error("transfer slot {transfer_slot} does not match state slot {state_slot}")]
    TransferSlotMismatch {
        transfer_slot: Slot,
        state_slot: Slot,
    },
    #[error("transfer requires {required} gwei, sender has {available}")]
    InsufficientBalance { required: u64, available: u64 },
    #[error("transfer public key does not match the sender's")]
    TransferPubkeyMismatch,
}
