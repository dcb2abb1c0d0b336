use anyhow::{ensure, Result};
use itertools::Itertools as _;
use typenum::Unsigned as _;

use helper_functions::{
    accessors,
    error::SignatureKind,
    misc,
    mutators::{self, DepositVerification},
    predicates, signing,
    verifier::Verifier,
};
use ssz::SszHash as _;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        containers::{
            Attestation, AttesterSlashing, BeaconBlock, BeaconBlockBody, Crosslink, Deposit,
            Eth1DataVote, PendingAttestationRecord, ProposerSlashing, SlashableAttestation,
            Transfer, VoluntaryExit,
        },
        primitives::{ValidatorIndex, H256},
    },
    preset::Preset,
};

use crate::{
    error::Error,
    state_ex::{BeaconStateEx, TransitionType},
};

/// Applies a block to a state freshly advanced to the block's slot. Any
/// verifier or processing failure is fatal for the whole block.
pub fn process_block<P: Preset, V: Verifier>(
    config: &Config,
    state_ex: &mut BeaconStateEx<P>,
    block: &BeaconBlock,
    mut verifier: V,
) -> Result<()> {
    TransitionType::Block.ensure_can_follow(state_ex.transition)?;

    process_block_header(config, state_ex, block, &mut verifier)?;

    let state = &mut state_ex.state;
    process_randao(config, state, block, &mut verifier)?;
    process_eth1_data(state, block);
    process_operations::<P, V>(config, state, &block.body, &mut verifier)?;

    state_ex.head_block_root = block.hash_tree_root();
    state_ex.transition = TransitionType::Block;

    Ok(())
}

fn process_block_header<P: Preset>(
    config: &Config,
    state_ex: &BeaconStateEx<P>,
    block: &BeaconBlock,
    mut verifier: impl Verifier,
) -> Result<()> {
    let state = &state_ex.state;

    ensure!(
        state.slot == block.slot,
        Error::SlotMismatch {
            state_slot: state.slot,
            block_slot: block.slot,
        },
    );

    ensure!(
        block.parent_root == state_ex.head_block_root,
        Error::ParentRootMismatch {
            expected: state_ex.head_block_root,
            in_block: block.parent_root,
        },
    );

    let proposer_index = accessors::get_beacon_proposer_index(state, block.slot)?;
    let proposer_pubkey = accessors::validator(state, proposer_index)?.pubkey;
    let domain = misc::get_domain(
        &state.fork,
        misc::slot_to_epoch::<P>(block.slot),
        config.domain_proposal,
    );

    verifier.verify_singular(
        block.signed_root(),
        domain,
        block.signature,
        proposer_pubkey,
        SignatureKind::Proposal,
    )
}

fn process_randao<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    block: &BeaconBlock,
    mut verifier: impl Verifier,
) -> Result<()> {
    let current_epoch = accessors::get_current_epoch(state);
    let proposer_index = accessors::get_beacon_proposer_index(state, state.slot)?;
    let proposer_pubkey = accessors::validator(state, proposer_index)?.pubkey;

    verifier.verify_singular(
        signing::randao_reveal_message(current_epoch),
        misc::get_domain(&state.fork, current_epoch, config.domain_randao),
        block.randao_reveal,
        proposer_pubkey,
        SignatureKind::Randao,
    )?;

    let mix = *state.latest_randao_mixes.mod_index(current_epoch);
    let reveal_hash = hashing::hash(block.randao_reveal.as_bytes());
    *state.latest_randao_mixes.mod_index_mut(current_epoch) = hashing::hash(mix ^ reveal_hash);

    Ok(())
}

fn process_eth1_data<P: Preset>(state: &mut BeaconState<P>, block: &BeaconBlock) {
    let existing = state
        .eth1_data_votes
        .iter_mut()
        .find(|vote| vote.eth1_data == block.eth1_data);

    match existing {
        Some(vote) => vote.vote_count += 1,
        None => state.eth1_data_votes.push(Eth1DataVote {
            eth1_data: block.eth1_data,
            vote_count: 1,
        }),
    }
}

fn process_operations<P: Preset, V: Verifier>(
    config: &Config,
    state: &mut BeaconState<P>,
    body: &BeaconBlockBody,
    verifier: &mut V,
) -> Result<()> {
    ensure_bound("proposer slashings", body.proposer_slashings.len(), P::MAX_PROPOSER_SLASHINGS)?;
    ensure_bound("attester slashings", body.attester_slashings.len(), P::MAX_ATTESTER_SLASHINGS)?;
    ensure_bound("attestations", body.attestations.len(), P::MAX_ATTESTATIONS)?;
    ensure_bound("deposits", body.deposits.len(), P::MAX_DEPOSITS)?;
    ensure_bound("voluntary exits", body.voluntary_exits.len(), P::MAX_VOLUNTARY_EXITS)?;
    ensure_bound("transfers", body.transfers.len(), P::MAX_TRANSFERS)?;

    for proposer_slashing in &body.proposer_slashings {
        validate_proposer_slashing(config, state, proposer_slashing, &mut *verifier)?;
        mutators::slash_validator(state, proposer_slashing.proposer_index)?;
    }

    for attester_slashing in &body.attester_slashings {
        let slashable_indices =
            validate_attester_slashing(config, state, attester_slashing, &mut *verifier)?;

        for index in slashable_indices {
            mutators::slash_validator(state, index)?;
        }
    }

    for attestation in &body.attestations {
        validate_attestation(config, state, attestation, &mut *verifier)?;

        let record = PendingAttestationRecord {
            aggregation_bitfield: attestation.aggregation_bitfield.clone(),
            data: attestation.data,
            custody_bitfield: attestation.custody_bitfield.clone(),
            slot_included: state.slot,
        };
        state.latest_attestations.push(record);
    }

    validate_deposit_list(state, &body.deposits)?;

    // Disabling signature checks by composition extends to deposit proofs
    // of possession.
    let deposit_verification = if V::IS_NULL {
        DepositVerification::Disabled
    } else {
        DepositVerification::Complete
    };

    for deposit in &body.deposits {
        mutators::process_deposit(config, state, deposit, deposit_verification)?;
    }

    for voluntary_exit in &body.voluntary_exits {
        validate_voluntary_exit(config, state, voluntary_exit, &mut *verifier)?;
        mutators::initiate_validator_exit(state, voluntary_exit.validator_index)?;
    }

    for transfer in &body.transfers {
        validate_transfer(config, state, transfer, &mut *verifier)?;
        apply_transfer(state, transfer)?;
    }

    Ok(())
}

fn ensure_bound(kind: &'static str, actual: usize, maximum: usize) -> Result<()> {
    ensure!(
        actual <= maximum,
        Error::OperationListTooLong {
            kind,
            maximum,
            actual,
        },
    );
    Ok(())
}

pub fn validate_proposer_slashing<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    proposer_slashing: &ProposerSlashing,
    mut verifier: impl Verifier,
) -> Result<()> {
    let ProposerSlashing {
        proposer_index,
        proposal_1,
        proposal_2,
    } = proposer_slashing;

    let proposer = accessors::validator(state, *proposer_index)?;

    ensure!(
        proposal_1.slot == proposal_2.slot
            && proposal_1.shard == proposal_2.shard
            && proposal_1.block_root != proposal_2.block_root,
        Error::ProposalsDoNotConflict {
            proposer_index: *proposer_index,
        },
    );

    ensure!(
        predicates::is_slashable_validator(proposer, accessors::get_current_epoch(state)),
        Error::ValidatorNotSlashable {
            index: *proposer_index,
        },
    );

    for proposal in [proposal_1, proposal_2] {
        let domain = misc::get_domain(
            &state.fork,
            misc::slot_to_epoch::<P>(proposal.slot),
            config.domain_proposal,
        );

        verifier.verify_singular(
            proposal.signed_root(),
            domain,
            proposal.signature,
            proposer.pubkey,
            SignatureKind::Proposal,
        )?;
    }

    Ok(())
}

/// Validates an attester slashing and returns the indices to slash.
pub fn validate_attester_slashing<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    attester_slashing: &AttesterSlashing,
    mut verifier: impl Verifier,
) -> Result<Vec<ValidatorIndex>> {
    let AttesterSlashing {
        slashable_attestation_1,
        slashable_attestation_2,
    } = attester_slashing;

    let data_1 = &slashable_attestation_1.data;
    let data_2 = &slashable_attestation_2.data;

    ensure!(
        data_1 != data_2
            && (predicates::is_double_vote::<P>(data_1, data_2)
                || predicates::is_surround_vote::<P>(data_1, data_2)),
        Error::SlashableAttestationsDoNotConflict,
    );

    validate_slashable_attestation(config, state, slashable_attestation_1, &mut verifier)?;
    validate_slashable_attestation(config, state, slashable_attestation_2, &mut verifier)?;

    let current_epoch = accessors::get_current_epoch(state);

    let slashable_indices = slashable_attestation_1
        .validator_indices
        .iter()
        .filter(|index| slashable_attestation_2.validator_indices.contains(index))
        .copied()
        .filter(|index| {
            accessors::validator(state, *index)
                .is_ok_and(|validator| predicates::is_slashable_validator(validator, current_epoch))
        })
        .collect_vec();

    ensure!(!slashable_indices.is_empty(), Error::NoSlashableIndices);

    Ok(slashable_indices)
}

fn validate_slashable_attestation<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    slashable_attestation: &SlashableAttestation,
    mut verifier: impl Verifier,
) -> Result<()> {
    ensure!(
        slashable_attestation.custody_bitfield.is_zero(),
        Error::CustodyBitfieldNonZero,
    );

    ensure!(
        !slashable_attestation.validator_indices.is_empty()
            && slashable_attestation
                .validator_indices
                .iter()
                .tuple_windows()
                .all(|(a, b)| a < b),
        Error::SlashableAttestationsDoNotConflict,
    );

    let pubkeys = slashable_attestation
        .validator_indices
        .iter()
        .map(|index| accessors::validator(state, *index).map(|validator| validator.pubkey))
        .collect::<Result<Vec<_>>>()?;

    let domain = misc::get_domain(
        &state.fork,
        misc::slot_to_epoch::<P>(slashable_attestation.data.slot),
        config.domain_attestation,
    );

    verifier.verify_aggregate(
        signing::attestation_message(slashable_attestation.data, false),
        domain,
        slashable_attestation.aggregate_signature,
        pubkeys,
        SignatureKind::Attestation,
    )
}

/// Every clause of the attestation verifier. Phase 0 mandates an all-zero
/// custody bitfield, so the custody-bit-1 half of the aggregate check is
/// required to be empty rather than verified against the identity point.
pub fn validate_attestation<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    attestation: &Attestation,
    mut verifier: impl Verifier,
) -> Result<()> {
    let data = attestation.data;

    ensure!(
        data.slot + P::MIN_ATTESTATION_INCLUSION_DELAY <= state.slot
            && state.slot < data.slot + P::SlotsPerEpoch::U64,
        Error::AttestationOutsideInclusionWindow {
            attestation_slot: data.slot,
            state_slot: state.slot,
        },
    );

    let expected_justified_epoch =
        if misc::slot_to_epoch::<P>(data.slot + 1) >= accessors::get_current_epoch(state) {
            state.justified_epoch
        } else {
            state.previous_justified_epoch
        };

    ensure!(
        data.justified_epoch == expected_justified_epoch,
        Error::JustifiedEpochMismatch {
            in_attestation: data.justified_epoch,
            computed: expected_justified_epoch,
        },
    );

    let justified_block_root = accessors::get_block_root(
        state,
        misc::get_epoch_start_slot::<P>(data.justified_epoch),
    )?;

    ensure!(
        data.justified_block_root == justified_block_root,
        Error::JustifiedBlockRootMismatch {
            in_attestation: data.justified_block_root,
            computed: justified_block_root,
        },
    );

    let latest_crosslink = *state.latest_crosslinks.mod_index(data.shard);
    let candidate_crosslink = Crosslink {
        epoch: misc::slot_to_epoch::<P>(data.slot),
        crosslink_data_root: data.crosslink_data_root,
    };

    ensure!(
        latest_crosslink == data.latest_crosslink || latest_crosslink == candidate_crosslink,
        Error::CrosslinkMismatch {
            in_attestation: Box::new(data.latest_crosslink),
            latest: Box::new(latest_crosslink),
        },
    );

    ensure!(
        !attestation.aggregation_bitfield.is_zero(),
        Error::AggregationBitfieldZero,
    );

    ensure!(
        attestation.custody_bitfield.is_zero(),
        Error::CustodyBitfieldNonZero,
    );

    ensure!(
        data.crosslink_data_root == H256::zero(),
        Error::CrosslinkDataRootNonZero,
    );

    let participants =
        accessors::get_attestation_participants(state, &data, &attestation.aggregation_bitfield)?;

    let pubkeys = participants
        .into_iter()
        .map(|index| accessors::validator(state, index).map(|validator| validator.pubkey))
        .collect::<Result<Vec<_>>>()?;

    let domain = misc::get_domain(
        &state.fork,
        misc::slot_to_epoch::<P>(data.slot),
        config.domain_attestation,
    );

    verifier.verify_aggregate(
        signing::attestation_message(data, false),
        domain,
        attestation.aggregate_signature,
        pubkeys,
        SignatureKind::Attestation,
    )
}

/// Deposits must appear in contiguous index order starting at the state's
/// deposit index.
pub fn validate_deposit_list<P: Preset>(
    state: &BeaconState<P>,
    deposits: &[Deposit],
) -> Result<()> {
    let mut expected = state.deposit_index;

    for deposit in deposits {
        ensure!(
            deposit.index == expected,
            Error::DepositIndexMismatch {
                expected,
                observed: deposit.index,
            },
        );
        expected += 1;
    }

    Ok(())
}

pub fn validate_voluntary_exit<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    voluntary_exit: &VoluntaryExit,
    mut verifier: impl Verifier,
) -> Result<()> {
    let validator = accessors::validator(state, voluntary_exit.validator_index)?;
    let current_epoch = accessors::get_current_epoch(state);

    ensure!(
        validator.exit_epoch > misc::compute_activation_exit_epoch::<P>(current_epoch),
        Error::ValidatorAlreadyExited {
            index: voluntary_exit.validator_index,
        },
    );

    ensure!(
        !validator.initiated_exit,
        Error::ExitAlreadyInitiated {
            index: voluntary_exit.validator_index,
        },
    );

    ensure!(
        current_epoch >= voluntary_exit.epoch,
        Error::ExitEpochInFuture {
            epoch: voluntary_exit.epoch,
            current_epoch,
        },
    );

    let domain = misc::get_domain(&state.fork, voluntary_exit.epoch, config.domain_exit);

    verifier.verify_singular(
        voluntary_exit.signed_root(),
        domain,
        voluntary_exit.signature,
        validator.pubkey,
        SignatureKind::VoluntaryExit,
    )
}

pub fn validate_transfer<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    transfer: &Transfer,
    mut verifier: impl Verifier,
) -> Result<()> {
    ensure!(
        transfer.slot == state.slot,
        Error::TransferSlotMismatch {
            transfer_slot: transfer.slot,
            state_slot: state.slot,
        },
    );

    let sender = accessors::validator(state, transfer.sender)?;
    let available = accessors::balance(state, transfer.sender)?;
    let required = transfer.amount + transfer.fee;

    ensure!(
        available >= required,
        Error::InsufficientBalance {
            required,
            available,
        },
    );

    ensure!(
        transfer.pubkey == sender.pubkey,
        Error::TransferPubkeyMismatch,
    );

    let domain = misc::get_domain(
        &state.fork,
        accessors::get_current_epoch(state),
        config.domain_transfer,
    );

    verifier.verify_singular(
        transfer.signed_root(),
        domain,
        transfer.signature,
        transfer.pubkey,
        SignatureKind::Transfer,
    )
}

fn apply_transfer<P: Preset>(state: &mut BeaconState<P>, transfer: &Transfer) -> Result<()> {
    let proposer_index = accessors::get_beacon_proposer_index(state, state.slot)?;

    mutators::decrease_balance(state, transfer.sender, transfer.amount + transfer.fee)?;
    mutators::increase_balance(state, transfer.recipient, transfer.amount)?;
    mutators::increase_balance(state, proposer_index, transfer.fee)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use bls::PublicKeyBytes;
    use helper_functions::verifier::NullVerifier;
    use types::phase0::consts::FAR_FUTURE_EPOCH;
    use types::phase0::containers::{DepositData, Eth1Data, ValidatorRecord};
    use types::preset::Minimal;

    use crate::slot_processing;

    use super::*;

    fn genesis_state_ex() -> BeaconStateEx<Minimal> {
        let mut state = BeaconState::default();

        for fill in 0..8 {
            state.validator_registry.push(ValidatorRecord {
                pubkey: PublicKeyBytes::repeat_byte(fill + 1),
                activation_epoch: 0,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
                ..ValidatorRecord::default()
            });
            state.validator_balances.push(32_000_000_000);
        }

        BeaconStateEx::new(state, H256::repeat_byte(0xaa), TransitionType::Initial)
    }

    fn state_ex_at_slot_one() -> BeaconStateEx<Minimal> {
        let mut state_ex = genesis_state_ex();
        slot_processing::process_slot(&mut state_ex).expect("a slot transition is legal here");
        state_ex
    }

    fn empty_block_for(state_ex: &BeaconStateEx<Minimal>) -> BeaconBlock {
        BeaconBlock {
            slot: state_ex.state.slot,
            parent_root: state_ex.head_block_root,
            ..BeaconBlock::default()
        }
    }

    #[test]
    fn an_empty_block_applies_cleanly() {
        let mut state_ex = state_ex_at_slot_one();
        let block = empty_block_for(&state_ex);

        process_block(&Config::minimal(), &mut state_ex, &block, NullVerifier)
            .expect("an empty block on the right parent is valid");

        assert_eq!(state_ex.transition, TransitionType::Block);
        assert_eq!(state_ex.head_block_root, block.hash_tree_root());
        assert_eq!(state_ex.state.eth1_data_votes.len(), 1);
    }

    #[test]
    fn a_block_cannot_follow_another_block() {
        let mut state_ex = state_ex_at_slot_one();
        let block = empty_block_for(&state_ex);

        process_block(&Config::minimal(), &mut state_ex, &block, NullVerifier)
            .expect("the first application is valid");

        let error = process_block(&Config::minimal(), &mut state_ex, &block, NullVerifier)
            .expect_err("a block transition cannot follow a block transition");

        assert_eq!(
            error.downcast::<Error>().expect("the error is typed"),
            Error::TransitionOrder {
                attempted: TransitionType::Block,
                previous: TransitionType::Block,
            },
        );
    }

    #[test]
    fn a_wrong_parent_root_is_rejected() {
        let mut state_ex = state_ex_at_slot_one();
        let mut block = empty_block_for(&state_ex);
        block.parent_root = H256::repeat_byte(0xdd);

        let error = process_block(&Config::minimal(), &mut state_ex, &block, NullVerifier)
            .expect_err("the parent root does not match");

        assert!(matches!(
            error.downcast::<Error>().expect("the error is typed"),
            Error::ParentRootMismatch { .. },
        ));
    }

    #[test]
    fn repeated_eth1_data_tallies_a_single_vote() {
        let mut state_ex = state_ex_at_slot_one();
        let eth1_data = Eth1Data {
            deposit_root: H256::repeat_byte(1),
            block_hash: H256::repeat_byte(2),
        };

        let mut block = empty_block_for(&state_ex);
        block.eth1_data = eth1_data;

        process_block(&Config::minimal(), &mut state_ex, &block, NullVerifier)
            .expect("the block is valid");

        slot_processing::process_slot(&mut state_ex).expect("a slot transition is legal here");

        let mut second = empty_block_for(&state_ex);
        second.eth1_data = eth1_data;

        process_block(&Config::minimal(), &mut state_ex, &second, NullVerifier)
            .expect("the block is valid");

        assert_eq!(state_ex.state.eth1_data_votes.len(), 1);
        assert_eq!(state_ex.state.eth1_data_votes[0].vote_count, 2);
    }

    #[test]
    fn deposit_at_the_wrong_index_names_both_indices() {
        let state_ex = state_ex_at_slot_one();

        let deposit = Deposit {
            proof: Vec::new(),
            index: 3,
            deposit_data: DepositData::default(),
        };

        let error = validate_deposit_list(&state_ex.state, &[deposit])
            .expect_err("the state expects deposit index 0");

        assert_eq!(
            error.downcast::<Error>().expect("the error is typed"),
            Error::DepositIndexMismatch {
                expected: 0,
                observed: 3,
            },
        );
    }

    #[test]
    fn too_many_transfers_are_rejected() {
        let mut state_ex = state_ex_at_slot_one();
        let mut block = empty_block_for(&state_ex);
        block.body.transfers = vec![Transfer::default(); 17];

        let error = process_block(&Config::minimal(), &mut state_ex, &block, NullVerifier)
            .expect_err("the transfer list exceeds the bound");

        assert!(matches!(
            error.downcast::<Error>().expect("the error is typed"),
            Error::OperationListTooLong {
                kind: "transfers",
                ..
            },
        ));
    }
}
