use anyhow::{ensure, Result};
use log::debug;

use helper_functions::verifier::Verifier;
use types::{config::Config, phase0::containers::BeaconBlock, preset::Preset};

use crate::{
    block_processing,
    error::Error,
    slot_processing,
    state_ex::BeaconStateEx,
};

/// Whether to check the block's claimed post-state root. Proposers building
/// their own blocks trust themselves; everything received from outside is
/// verified.
pub enum StateRootPolicy {
    Verify,
    Trust,
}

/// The full block transition: advance through empty slots (and epoch
/// boundaries) to the block's slot, apply the block, and check the state
/// root it claims.
pub fn state_transition<P: Preset>(
    config: &Config,
    state_ex: &mut BeaconStateEx<P>,
    block: &BeaconBlock,
    state_root_policy: StateRootPolicy,
    verifier: impl Verifier,
) -> Result<()> {
    debug!(
        "applying block at slot {} to state at slot {}",
        block.slot, state_ex.state.slot,
    );

    if state_ex.state.slot < block.slot {
        slot_processing::process_slots(state_ex, block.slot)?;
    }

    block_processing::process_block(config, state_ex, block, verifier)?;

    if let StateRootPolicy::Verify = state_root_policy {
        let computed = state_ex.state_root();

        ensure!(
            computed == block.state_root,
            Error::StateRootMismatch {
                computed,
                in_block: block.state_root,
            },
        );
    }

    Ok(())
}
