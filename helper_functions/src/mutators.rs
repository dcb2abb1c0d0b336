use anyhow::{ensure, Result};
use typenum::Unsigned as _;

use bls::{PublicKey, Signature};
use ssz::SszHash as _;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::{DEPOSIT_CONTRACT_TREE_DEPTH, FAR_FUTURE_EPOCH, GENESIS_EPOCH},
        containers::{Deposit, ValidatorRecord},
        primitives::{Gwei, ValidatorIndex},
    },
    preset::Preset,
};

use crate::{
    accessors,
    error::{Error, SignatureKind},
    misc, predicates,
};

pub fn increase_balance<P: Preset>(
    state: &mut BeaconState<P>,
    index: ValidatorIndex,
    delta: Gwei,
) -> Result<()> {
    let balance = balance_mut(state, index)?;
    *balance += delta;
    Ok(())
}

/// Balances never go below zero; penalties saturate.
pub fn decrease_balance<P: Preset>(
    state: &mut BeaconState<P>,
    index: ValidatorIndex,
    delta: Gwei,
) -> Result<()> {
    let balance = balance_mut(state, index)?;
    *balance = balance.saturating_sub(delta);
    Ok(())
}

fn balance_mut<P: Preset>(
    state: &mut BeaconState<P>,
    index: ValidatorIndex,
) -> Result<&mut Gwei> {
    let registry_size = state.validator_balances.len();
    let position = usize::try_from(index)?;

    state
        .validator_balances
        .get_mut(position)
        .ok_or_else(|| Error::ValidatorIndexOutOfBounds {
            index,
            registry_size,
        }
        .into())
}

fn validator_mut<P: Preset>(
    state: &mut BeaconState<P>,
    index: ValidatorIndex,
) -> Result<&mut ValidatorRecord> {
    let registry_size = state.validator_registry.len();
    let position = usize::try_from(index)?;

    state
        .validator_registry
        .get_mut(position)
        .ok_or_else(|| Error::ValidatorIndexOutOfBounds {
            index,
            registry_size,
        }
        .into())
}

pub fn activate_validator<P: Preset>(
    state: &mut BeaconState<P>,
    index: ValidatorIndex,
    is_genesis: bool,
) -> Result<()> {
    let activation_epoch = if is_genesis {
        GENESIS_EPOCH
    } else {
        misc::compute_activation_exit_epoch::<P>(accessors::get_current_epoch(state))
    };

    validator_mut(state, index)?.activation_epoch = activation_epoch;
    Ok(())
}

/// Marks a voluntary exit; the registry update picks it up at the end of the
/// epoch.
pub fn initiate_validator_exit<P: Preset>(
    state: &mut BeaconState<P>,
    index: ValidatorIndex,
) -> Result<()> {
    validator_mut(state, index)?.initiated_exit = true;
    Ok(())
}

pub fn exit_validator<P: Preset>(
    state: &mut BeaconState<P>,
    index: ValidatorIndex,
) -> Result<()> {
    let delayed_exit_epoch =
        misc::compute_activation_exit_epoch::<P>(accessors::get_current_epoch(state));
    let validator = validator_mut(state, index)?;

    // Already exiting earlier than the delay allows; nothing to do.
    if validator.exit_epoch <= delayed_exit_epoch {
        return Ok(());
    }

    validator.exit_epoch = delayed_exit_epoch;
    Ok(())
}

/// Slashes a validator: forces the exit, records the slashed balance in the
/// ring, moves the whistleblower reward to the current proposer, and pushes
/// the withdrawable epoch a full ring length away.
pub fn slash_validator<P: Preset>(state: &mut BeaconState<P>, index: ValidatorIndex) -> Result<()> {
    ensure!(
        !accessors::validator(state, index)?.slashed,
        Error::ValidatorAlreadySlashed { index },
    );

    exit_validator(state, index)?;

    let current_epoch = accessors::get_current_epoch(state);
    let effective_balance = accessors::get_effective_balance(state, index)?;

    *state.latest_slashed_balances.mod_index_mut(current_epoch) += effective_balance;

    let whistleblower_index = accessors::get_beacon_proposer_index(state, state.slot)?;
    let whistleblower_reward = effective_balance / P::WHISTLEBLOWER_REWARD_QUOTIENT;

    increase_balance(state, whistleblower_index, whistleblower_reward)?;
    decrease_balance(state, index, whistleblower_reward)?;

    let validator = validator_mut(state, index)?;
    validator.slashed = true;
    validator.withdrawable_epoch = current_epoch + P::LatestSlashedExitLength::U64;

    Ok(())
}

/// How much of a deposit to check before applying it. Production block
/// processing checks everything; genesis construction skips the proof since
/// it built the tree itself; tests may disable checks entirely.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DepositVerification {
    Complete,
    NoProof,
    Disabled,
}

/// Applies a deposit: appends a new validator or tops up an existing one and
/// advances `deposit_index`.
pub fn process_deposit<P: Preset>(
    config: &Config,
    state: &mut BeaconState<P>,
    deposit: &Deposit,
    verification: DepositVerification,
) -> Result<()> {
    let deposit_data = deposit.deposit_data;

    if verification == DepositVerification::Complete {
        ensure!(
            predicates::validate_merkle_branch(
                deposit_data.hash_tree_root(),
                &deposit.proof,
                DEPOSIT_CONTRACT_TREE_DEPTH,
                deposit.index,
                state.latest_eth1_data.deposit_root,
            ),
            Error::DepositProofInvalid,
        );
    }

    if verification != DepositVerification::Disabled {
        let domain = misc::get_domain(
            &state.fork,
            accessors::get_current_epoch(state),
            config.domain_deposit,
        );

        let public_key = PublicKey::try_from(deposit_data.pubkey)
            .map_err(|_| Error::SignatureInvalid(SignatureKind::Deposit))?;
        let signature = Signature::try_from(deposit_data.proof_of_possession)
            .map_err(|_| Error::SignatureInvalid(SignatureKind::Deposit))?;

        ensure!(
            signature.verify(deposit_data.signed_root(), domain, &public_key),
            Error::SignatureInvalid(SignatureKind::Deposit),
        );
    }

    match accessors::index_of_public_key(state, deposit_data.pubkey) {
        Some(index) => {
            increase_balance(state, index, deposit_data.amount)?;
        }
        None => {
            state.validator_registry.push(ValidatorRecord {
                pubkey: deposit_data.pubkey,
                withdrawal_credentials: deposit_data.withdrawal_credentials,
                activation_epoch: FAR_FUTURE_EPOCH,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
                initiated_exit: false,
                slashed: false,
            });
            state.validator_balances.push(deposit_data.amount);
        }
    }

    state.deposit_index += 1;
    Ok(())
}
