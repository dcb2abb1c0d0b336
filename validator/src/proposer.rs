use anyhow::Result;

use eth1::DepositContract;
use fork_choice_control::ObservableBeaconState;
use helper_functions::{accessors, misc, signing, verifier::NullVerifier};
use transition_functions::block_processing;
use types::{
    config::Config,
    phase0::containers::{BeaconBlock, BeaconBlockBody},
    preset::Preset,
};

use crate::signer::Signer;

/// Builds, executes, and signs a block on top of the observable state, which
/// has already been advanced to the proposer's slot.
///
/// The block's own transition is applied with verification disabled — the
/// proposer trusts the operations it just took from the pool and fills in
/// the resulting state root.
pub fn propose<P: Preset>(
    config: &Config,
    observable_state: &ObservableBeaconState<P>,
    deposit_contract: &dyn DepositContract,
    signer: &dyn Signer,
) -> Result<BeaconBlock> {
    let state_ex = &observable_state.latest_slot_state;
    let state = &state_ex.state;
    let current_epoch = accessors::get_current_epoch(state);

    let randao_reveal = signer.sign(
        signing::randao_reveal_message(current_epoch),
        misc::get_domain(&state.fork, current_epoch, config.domain_randao),
    );

    let eth1_data = deposit_contract
        .latest_eth1_data()
        .unwrap_or(state.latest_eth1_data);

    let pending = &observable_state.pending_operations;

    let mut expected_index = state.deposit_index;
    let deposits = deposit_contract
        .peek_deposits(P::MAX_DEPOSITS, state.latest_eth1_data, eth1_data)
        .into_iter()
        .map(|info| info.deposit)
        .skip_while(|deposit| deposit.index < state.deposit_index)
        .take_while(|deposit| {
            let contiguous = deposit.index == expected_index;
            expected_index += 1;
            contiguous
        })
        .collect();

    let body = BeaconBlockBody {
        proposer_slashings: pending
            .proposer_slashings
            .iter()
            .take(P::MAX_PROPOSER_SLASHINGS)
            .copied()
            .collect(),
        attester_slashings: pending
            .attester_slashings
            .iter()
            .take(P::MAX_ATTESTER_SLASHINGS)
            .cloned()
            .collect(),
        attestations: pending.attestations_for_inclusion::<P>(state.slot),
        deposits,
        voluntary_exits: pending
            .voluntary_exits
            .iter()
            .take(P::MAX_VOLUNTARY_EXITS)
            .copied()
            .collect(),
        transfers: pending
            .transfers
            .iter()
            .take(P::MAX_TRANSFERS)
            .copied()
            .collect(),
    };

    let mut block = BeaconBlock {
        slot: state.slot,
        parent_root: state_ex.head_block_root,
        body,
        randao_reveal,
        eth1_data,
        ..BeaconBlock::default()
    };

    let mut trial_state_ex = state_ex.clone();
    block_processing::process_block(config, &mut trial_state_ex, &block, NullVerifier)?;
    block.state_root = trial_state_ex.state_root();

    let domain = misc::get_domain(
        &state.fork,
        misc::slot_to_epoch::<P>(block.slot),
        config.domain_proposal,
    );
    block.signature = signer.sign(block.signed_root(), domain);

    Ok(block)
}

#[cfg(test)]
mod tests {
    use bls::{PublicKey, Signature};
    use eth1::{ChainStart, InMemoryDepositContract};
    use ssz::SszHash as _;
    use transition_functions::{
        slot_processing, state_transition, StateRootPolicy,
    };
    use types::{phase0::containers::Eth1Data, preset::Minimal};

    use crate::signer::{LocalSigner, Signer as _};

    use super::*;

    fn observable_state_at_slot_one() -> ObservableBeaconState<Minimal> {
        let config = Config::minimal();

        let chain_start = ChainStart {
            genesis_time: 600,
            eth1_data: Eth1Data::default(),
            initial_deposits: interop::quick_start_deposits::<Minimal>(&config, 8),
        };

        let state_ex = genesis::initial_state::<Minimal>(&config, &chain_start)
            .expect("the quick start deposits are valid");
        let head = genesis::genesis_block(&state_ex.state);

        let mut state_ex = state_ex;
        slot_processing::process_slot(&mut state_ex).expect("a slot transition is legal here");

        ObservableBeaconState {
            head,
            latest_slot_state: state_ex,
            pending_operations: Default::default(),
        }
    }

    #[test]
    fn a_proposed_block_replays_to_its_own_state_root() {
        let config = Config::minimal();
        let observable_state = observable_state_at_slot_one();
        let state = &observable_state.latest_slot_state.state;

        let proposer_index = accessors::get_beacon_proposer_index(state, state.slot)
            .expect("validators are active");
        let signer = LocalSigner::new(interop::secret_key(proposer_index));
        let deposit_contract = InMemoryDepositContract::default();

        let block = propose(&config, &observable_state, &deposit_contract, &signer)
            .expect("the proposer builds on a clean state");

        assert_eq!(block.slot, state.slot);
        assert_eq!(
            block.parent_root,
            observable_state.latest_slot_state.head_block_root,
        );

        // Replaying the block with full verification checks the state root,
        // the proposal signature, and the randao reveal all at once.
        let mut replay = observable_state.latest_slot_state.clone();
        state_transition(
            &config,
            &mut replay,
            &block,
            StateRootPolicy::Verify,
            helper_functions::verifier::SingleVerifier,
        )
        .expect("the proposed block is valid under full verification");

        assert_eq!(replay.state_root(), block.state_root);
    }

    #[test]
    fn the_proposal_signature_covers_the_signed_root() {
        let config = Config::minimal();
        let observable_state = observable_state_at_slot_one();
        let state = &observable_state.latest_slot_state.state;

        let proposer_index = accessors::get_beacon_proposer_index(state, state.slot)
            .expect("validators are active");
        let signer = LocalSigner::new(interop::secret_key(proposer_index));
        let deposit_contract = InMemoryDepositContract::default();

        let block = propose(&config, &observable_state, &deposit_contract, &signer)
            .expect("the proposer builds on a clean state");

        let domain = misc::get_domain(
            &state.fork,
            misc::slot_to_epoch::<Minimal>(block.slot),
            config.domain_proposal,
        );

        let signature =
            Signature::try_from(block.signature).expect("the signature was just produced");
        let public_key =
            PublicKey::try_from(signer.public_key()).expect("the key was just derived");

        assert!(signature.verify(block.signed_root(), domain, &public_key));
        assert_ne!(block.signed_root(), block.hash_tree_root());
    }
}
