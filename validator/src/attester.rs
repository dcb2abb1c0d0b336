use anyhow::Result;

use fork_choice_control::ObservableBeaconState;
use helper_functions::{accessors, misc, signing};
use ssz::Bitfield;
use types::{
    config::Config,
    phase0::{
        consts::BEACON_CHAIN_SHARD_NUMBER,
        containers::{Attestation, AttestationData, Crosslink},
        primitives::{ShardNumber, ValidatorIndex, H256},
    },
    preset::Preset,
};

use crate::{error::Error, signer::Signer};

/// Produces the attestation of a single validator for its assigned shard at
/// the observable state's slot.
pub fn attest<P: Preset>(
    config: &Config,
    validator_index: ValidatorIndex,
    shard: ShardNumber,
    observable_state: &ObservableBeaconState<P>,
    signer: &dyn Signer,
) -> Result<Attestation> {
    let state_ex = &observable_state.latest_slot_state;
    let state = &state_ex.state;
    let head = &observable_state.head;
    let slot = state.slot;

    let committee = resolve_committee(state, slot, shard)?;

    let beacon_block_root = state_ex.head_block_root;

    let head_boundary_slot =
        misc::get_epoch_start_slot::<P>(misc::slot_to_epoch::<P>(head.slot));
    let epoch_boundary_root = if head_boundary_slot == head.slot {
        beacon_block_root
    } else {
        accessors::get_block_root(state, head_boundary_slot)?
    };

    let latest_crosslink = if shard == BEACON_CHAIN_SHARD_NUMBER {
        Crosslink::default()
    } else {
        *state.latest_crosslinks.mod_index(shard)
    };

    let justified_slot = misc::get_epoch_start_slot::<P>(state.justified_epoch);
    let justified_block_root = if justified_slot == head.slot {
        beacon_block_root
    } else {
        accessors::get_block_root(state, justified_slot)?
    };

    let data = AttestationData {
        slot,
        shard,
        beacon_block_root,
        epoch_boundary_root,
        // A phase 0 stub, like the custody bitfield below.
        crosslink_data_root: H256::zero(),
        latest_crosslink,
        justified_epoch: state.justified_epoch,
        justified_block_root,
    };

    let position = committee
        .iter()
        .position(|member| *member == validator_index)
        .ok_or(Error::NotInCommittee {
            validator_index,
            shard,
        })?;

    let mut aggregation_bitfield = Bitfield::with_bit_count(committee.len());
    aggregation_bitfield.set_bit(position, true);

    let custody_bitfield = Bitfield::with_bit_count(committee.len());

    let domain = misc::get_domain(
        &state.fork,
        accessors::get_current_epoch(state),
        config.domain_attestation,
    );
    let aggregate_signature = signer.sign(signing::attestation_message(data, false), domain);

    Ok(Attestation {
        data,
        aggregation_bitfield,
        custody_bitfield,
        aggregate_signature,
    })
}

/// The committee attesting to `shard` at `slot`. The beacon-chain
/// pseudo-shard maps to the first committee of the slot.
fn resolve_committee<P: Preset>(
    state: &types::phase0::beacon_state::BeaconState<P>,
    slot: types::phase0::primitives::Slot,
    shard: ShardNumber,
) -> Result<Vec<ValidatorIndex>> {
    let committees = accessors::get_crosslink_committees_at_slot(state, slot)?;

    if shard == BEACON_CHAIN_SHARD_NUMBER {
        return committees
            .into_iter()
            .next()
            .map(|shard_committee| shard_committee.committee)
            .ok_or_else(|| Error::NoCommitteesAtSlot { slot }.into());
    }

    committees
        .into_iter()
        .find(|shard_committee| shard_committee.shard == shard)
        .map(|shard_committee| shard_committee.committee)
        .ok_or_else(|| {
            helper_functions::error::Error::CommitteeNotFound { shard, slot }.into()
        })
}
