//! The pool of operations waiting for inclusion in a block.
//!
//! Verified attestations and other operations accumulate here until a
//! proposer drains them into a block body or they become too old to include.

use typenum::Unsigned as _;

use types::{
    phase0::{
        containers::{
            Attestation, AttesterSlashing, BeaconBlockBody, ProposerSlashing, Transfer,
            VoluntaryExit,
        },
        primitives::Slot,
    },
    preset::Preset,
};

/// A snapshot of the pool, carried inside the observable state. Proposers
/// read from this; the pool itself keeps mutating behind them.
#[derive(Clone, Default, Debug)]
pub struct PendingOperations {
    pub attestations: Vec<Attestation>,
    pub proposer_slashings: Vec<ProposerSlashing>,
    pub attester_slashings: Vec<AttesterSlashing>,
    pub voluntary_exits: Vec<VoluntaryExit>,
    pub transfers: Vec<Transfer>,
}

impl PendingOperations {
    /// Attestations whose inclusion window contains `slot`, at most the
    /// per-block maximum.
    #[must_use]
    pub fn attestations_for_inclusion<P: Preset>(&self, slot: Slot) -> Vec<Attestation> {
        self.attestations
            .iter()
            .filter(|attestation| {
                let data_slot = attestation.data.slot;
                data_slot + P::MIN_ATTESTATION_INCLUSION_DELAY <= slot
                    && slot < data_slot + P::SlotsPerEpoch::U64
            })
            .take(P::MAX_ATTESTATIONS)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct OperationPool {
    pending: PendingOperations,
}

impl OperationPool {
    #[must_use]
    pub fn snapshot(&self) -> PendingOperations {
        self.pending.clone()
    }

    pub fn add_attestation(&mut self, attestation: Attestation) {
        if !self.pending.attestations.contains(&attestation) {
            self.pending.attestations.push(attestation);
        }
    }

    pub fn add_proposer_slashing(&mut self, slashing: ProposerSlashing) {
        if !self.pending.proposer_slashings.contains(&slashing) {
            self.pending.proposer_slashings.push(slashing);
        }
    }

    pub fn add_attester_slashing(&mut self, slashing: AttesterSlashing) {
        if !self.pending.attester_slashings.contains(&slashing) {
            self.pending.attester_slashings.push(slashing);
        }
    }

    pub fn add_voluntary_exit(&mut self, exit: VoluntaryExit) {
        if !self.pending.voluntary_exits.contains(&exit) {
            self.pending.voluntary_exits.push(exit);
        }
    }

    pub fn add_transfer(&mut self, transfer: Transfer) {
        if !self.pending.transfers.contains(&transfer) {
            self.pending.transfers.push(transfer);
        }
    }

    /// Drops everything a just-imported block already carries.
    pub fn prune_included(&mut self, body: &BeaconBlockBody) {
        self.pending
            .attestations
            .retain(|attestation| !body.attestations.contains(attestation));
        self.pending
            .proposer_slashings
            .retain(|slashing| !body.proposer_slashings.contains(slashing));
        self.pending
            .attester_slashings
            .retain(|slashing| !body.attester_slashings.contains(slashing));
        self.pending
            .voluntary_exits
            .retain(|exit| !body.voluntary_exits.contains(exit));
        self.pending
            .transfers
            .retain(|transfer| !body.transfers.contains(transfer));
    }

    /// Drops attestations whose inclusion window has closed entirely.
    pub fn prune_old_attestations<P: Preset>(&mut self, slot: Slot) {
        self.pending
            .attestations
            .retain(|attestation| slot < attestation.data.slot + P::SlotsPerEpoch::U64);
    }
}
