//! Construction of the initial state from a chain start event.

use anyhow::Result;

use eth1::ChainStart;
use helper_functions::{
    accessors,
    mutators::{self, DepositVerification},
};
use ssz::SszHash as _;
use transition_functions::{BeaconStateEx, TransitionType};
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::{GENESIS_EPOCH, GENESIS_SLOT},
        containers::{BeaconBlock, Fork},
        primitives::H256,
    },
    preset::Preset,
};

/// Builds the genesis state from a chain start event and tags it as the
/// result of the initial transition. Deposit proofs are not checked; the
/// deposit contract produced both the tree and the event.
pub fn initial_state<P: Preset>(
    config: &Config,
    chain_start: &ChainStart,
) -> Result<BeaconStateEx<P>> {
    let ChainStart {
        genesis_time,
        eth1_data,
        initial_deposits,
    } = chain_start;

    let mut state = BeaconState::<P>::default();

    state.slot = GENESIS_SLOT;
    state.genesis_time = *genesis_time;
    state.latest_eth1_data = *eth1_data;
    state.fork = Fork {
        previous_version: config.genesis_fork_version,
        current_version: config.genesis_fork_version,
        epoch: GENESIS_EPOCH,
    };

    for deposit in initial_deposits {
        mutators::process_deposit(config, &mut state, deposit, DepositVerification::NoProof)?;
    }

    for index in 0..state.validator_registry.len() as u64 {
        if accessors::balance(&state, index)? >= P::MAX_DEPOSIT_AMOUNT {
            mutators::activate_validator(&mut state, index, true)?;
        }
    }

    let genesis_active_index_root =
        accessors::get_active_validator_indices(&state.validator_registry, GENESIS_EPOCH)
            .hash_tree_root();
    state
        .latest_active_index_roots
        .fill(genesis_active_index_root);

    let genesis_block_root = genesis_block(&state).hash_tree_root();

    Ok(BeaconStateEx::new(
        state,
        genesis_block_root,
        TransitionType::Initial,
    ))
}

/// The empty block every chain starts from. Its state root commits to the
/// genesis state; everything else is zero.
#[must_use]
pub fn genesis_block<P: Preset>(state: &BeaconState<P>) -> BeaconBlock {
    BeaconBlock {
        slot: GENESIS_SLOT,
        parent_root: H256::zero(),
        state_root: state.hash_tree_root(),
        ..BeaconBlock::default()
    }
}

#[cfg(test)]
mod tests {
    use types::{phase0::containers::Eth1Data, preset::Minimal};

    use super::*;

    #[test]
    fn the_initial_state_binds_the_chain_start() {
        let config = Config::minimal();

        let chain_start = ChainStart {
            genesis_time: 600,
            eth1_data: Eth1Data {
                deposit_root: H256::repeat_byte(1),
                block_hash: H256::repeat_byte(2),
            },
            initial_deposits: interop::quick_start_deposits::<Minimal>(&config, 8),
        };

        let state_ex =
            initial_state::<Minimal>(&config, &chain_start).expect("the deposits are valid");
        let state = &state_ex.state;

        assert_eq!(state.slot, GENESIS_SLOT);
        assert_eq!(state.genesis_time, 600);
        assert_eq!(state.validator_registry.len(), 8);
        assert_eq!(state.validator_balances.len(), 8);
        assert_eq!(state.deposit_index, 8);
        assert_eq!(state.latest_eth1_data, chain_start.eth1_data);
        assert_eq!(state_ex.transition, TransitionType::Initial);

        for validator in &state.validator_registry {
            assert_eq!(validator.activation_epoch, GENESIS_EPOCH);
        }
    }

    #[test]
    fn three_slot_transitions_on_the_initial_state() {
        let config = Config::minimal();

        let chain_start = ChainStart {
            genesis_time: 600,
            eth1_data: Eth1Data {
                deposit_root: H256::repeat_byte(1),
                block_hash: H256::repeat_byte(2),
            },
            initial_deposits: interop::quick_start_deposits::<Minimal>(&config, 8),
        };

        let mut state_ex =
            initial_state::<Minimal>(&config, &chain_start).expect("the deposits are valid");
        let genesis_block_root = state_ex.head_block_root;

        for _ in 0..3 {
            transition_functions::slot_processing::process_slot(&mut state_ex)
                .expect("slot transitions are legal after the initial transition");
        }

        assert_eq!(state_ex.state.slot, GENESIS_SLOT + 3);
        assert_eq!(
            *state_ex.state.latest_block_roots.mod_index(GENESIS_SLOT),
            genesis_block_root,
        );
    }

    #[test]
    fn the_genesis_block_commits_to_the_state() {
        let config = Config::minimal();

        let chain_start = ChainStart {
            genesis_time: 600,
            eth1_data: Eth1Data::default(),
            initial_deposits: interop::quick_start_deposits::<Minimal>(&config, 2),
        };

        let state_ex =
            initial_state::<Minimal>(&config, &chain_start).expect("the deposits are valid");
        let block = genesis_block(&state_ex.state);

        assert_eq!(block.state_root, state_ex.state_root());
        assert_eq!(state_ex.head_block_root, block.hash_tree_root());
    }
}
