use anyhow::Result;
use arithmetic::U64Ext as _;

use helper_functions::accessors;
use ssz::SszHash as _;
use types::{phase0::primitives::Slot, preset::Preset};

use crate::{
    epoch_processing,
    state_ex::{BeaconStateEx, TransitionType},
};

/// Advances the state by one slot: records the head block root in the ring
/// and refreshes the active index root entry the committee lookahead reads.
pub fn process_slot<P: Preset>(state_ex: &mut BeaconStateEx<P>) -> Result<()> {
    TransitionType::Slot.ensure_can_follow(state_ex.transition)?;

    let head_block_root = state_ex.head_block_root;
    let state = &mut state_ex.state;

    *state.latest_block_roots.mod_index_mut(state.slot) = head_block_root;

    state.slot += 1;

    // Idempotent within an epoch; the epoch transition performs the
    // authoritative rotation.
    let lookahead_epoch =
        accessors::get_current_epoch(state) + 1 + P::ACTIVATION_EXIT_DELAY;
    let active_indices =
        accessors::get_active_validator_indices(&state.validator_registry, lookahead_epoch);
    *state.latest_active_index_roots.mod_index_mut(lookahead_epoch) =
        active_indices.hash_tree_root();

    state_ex.transition = TransitionType::Slot;

    Ok(())
}

/// Advances the state through empty slots up to `target_slot`, running epoch
/// processing at each epoch boundary it crosses.
pub fn process_slots<P: Preset>(state_ex: &mut BeaconStateEx<P>, target_slot: Slot) -> Result<()> {
    while state_ex.state.slot < target_slot {
        if (state_ex.state.slot + 1).mod_typenum::<P::SlotsPerEpoch>() == 0 {
            epoch_processing::process_epoch(state_ex)?;
        }

        process_slot(state_ex)?;
    }

    Ok(())
}
