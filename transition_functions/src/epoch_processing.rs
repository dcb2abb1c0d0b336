use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use typenum::Unsigned as _;

use helper_functions::{accessors, misc, mutators};
use ssz::SszHash as _;
use types::{
    phase0::{
        beacon_state::BeaconState,
        consts::FAR_FUTURE_EPOCH,
        primitives::{Epoch, Gwei, Slot, ValidatorIndex},
    },
    preset::Preset,
};

use crate::state_ex::{BeaconStateEx, TransitionType};

/// The per-epoch transition, run at the last slot of every epoch.
pub fn process_epoch<P: Preset>(state_ex: &mut BeaconStateEx<P>) -> Result<()> {
    TransitionType::Epoch.ensure_can_follow(state_ex.transition)?;

    let state = &mut state_ex.state;
    let statistics = Statistics::compute(state)?;

    process_eth1_data_votes(state);
    process_justification_and_finalization(state, &statistics);
    process_rewards_and_penalties(state, &statistics)?;
    process_registry_updates(state, &statistics)?;
    process_slashings(state, &statistics)?;
    process_final_updates(state)?;

    state_ex.transition = TransitionType::Epoch;

    Ok(())
}

/// Participation figures for the epoch being closed out, derived from the
/// pending attestations accumulated in the state.
#[derive(Default)]
pub(crate) struct Statistics {
    pub current_epoch: Epoch,
    pub previous_epoch: Epoch,
    /// Total effective balance of validators active in the current epoch.
    pub total_balance: Gwei,
    pub previous_total_balance: Gwei,
    pub current_boundary_attesting_balance: Gwei,
    pub previous_boundary_attesting_balance: Gwei,
    /// Validators whose previous-epoch attestation was included (FFG source).
    pub previous_attesters: BTreeSet<ValidatorIndex>,
    /// Of those, the ones that voted for the epoch boundary (FFG target).
    pub previous_boundary_attesters: BTreeSet<ValidatorIndex>,
    /// Of those, the ones that voted for the correct head at their slot.
    pub previous_head_attesters: BTreeSet<ValidatorIndex>,
    /// Minimum inclusion distance per previous-epoch attester.
    pub inclusion_distances: BTreeMap<ValidatorIndex, Slot>,
}

impl Statistics {
    pub(crate) fn compute<P: Preset>(state: &BeaconState<P>) -> Result<Self> {
        let current_epoch = accessors::get_current_epoch(state);
        let previous_epoch = accessors::get_previous_epoch(state);

        let mut statistics = Self {
            current_epoch,
            previous_epoch,
            ..Self::default()
        };

        statistics.total_balance = accessors::get_total_balance(
            state,
            accessors::get_active_validator_indices(&state.validator_registry, current_epoch),
        )?;
        statistics.previous_total_balance = accessors::get_total_balance(
            state,
            accessors::get_active_validator_indices(&state.validator_registry, previous_epoch),
        )?;

        let current_boundary_root =
            accessors::get_block_root(state, misc::get_epoch_start_slot::<P>(current_epoch)).ok();
        let previous_boundary_root =
            accessors::get_block_root(state, misc::get_epoch_start_slot::<P>(previous_epoch)).ok();

        let mut current_boundary_attesters = BTreeSet::new();

        for record in &state.latest_attestations {
            let data = &record.data;
            let epoch = misc::slot_to_epoch::<P>(data.slot);

            let participants = accessors::get_attestation_participants(
                state,
                data,
                &record.aggregation_bitfield,
            )?;

            if epoch == current_epoch
                && Some(data.epoch_boundary_root) == current_boundary_root
            {
                current_boundary_attesters.extend(participants.iter().copied());
            }

            if epoch == previous_epoch {
                let head_root = accessors::get_block_root(state, data.slot).ok();
                let distance = record.slot_included - data.slot;

                for participant in participants {
                    statistics.previous_attesters.insert(participant);

                    statistics
                        .inclusion_distances
                        .entry(participant)
                        .and_modify(|existing| *existing = distance.min(*existing))
                        .or_insert(distance);

                    if Some(data.epoch_boundary_root) == previous_boundary_root {
                        statistics.previous_boundary_attesters.insert(participant);
                    }

                    if Some(data.beacon_block_root) == head_root {
                        statistics.previous_head_attesters.insert(participant);
                    }
                }
            }
        }

        statistics.current_boundary_attesting_balance =
            accessors::get_total_balance(state, current_boundary_attesters)?;
        statistics.previous_boundary_attesting_balance = accessors::get_total_balance(
            state,
            statistics.previous_boundary_attesters.iter().copied(),
        )?;

        Ok(statistics)
    }
}

/// At the end of a voting period, adopts the eth1 data a majority of slots
/// voted for and clears the votes.
fn process_eth1_data_votes<P: Preset>(state: &mut BeaconState<P>) {
    let next_epoch = accessors::get_current_epoch(state) + 1;

    if next_epoch % P::EPOCHS_PER_ETH1_VOTING_PERIOD != 0 {
        return;
    }

    let period_slots = P::EPOCHS_PER_ETH1_VOTING_PERIOD.get() * P::SlotsPerEpoch::U64;

    if let Some(winner) = state
        .eth1_data_votes
        .iter()
        .find(|vote| vote.vote_count * 2 > period_slots)
    {
        state.latest_eth1_data = winner.eth1_data;
    }

    state.eth1_data_votes.clear();
}

pub(crate) fn process_justification_and_finalization<P: Preset>(
    state: &mut BeaconState<P>,
    statistics: &Statistics,
) {
    let Statistics {
        current_epoch,
        previous_epoch,
        total_balance,
        previous_total_balance,
        current_boundary_attesting_balance,
        previous_boundary_attesting_balance,
        ..
    } = *statistics;

    let mut new_justified_epoch = state.justified_epoch;
    let mut bitfield = state.justification_bitfield << 1;

    if 3 * previous_boundary_attesting_balance >= 2 * previous_total_balance {
        bitfield |= 0b10;
        new_justified_epoch = previous_epoch;
    }

    if 3 * current_boundary_attesting_balance >= 2 * total_balance {
        bitfield |= 0b01;
        new_justified_epoch = current_epoch;
    }

    state.justification_bitfield = bitfield;

    // The four finalization rules: a justified epoch becomes final when the
    // bitfield shows an unbroken chain of justifications reaching it.
    let previous_justified = state.previous_justified_epoch;
    let justified = state.justified_epoch;

    if bitfield >> 1 & 0b111 == 0b111 && current_epoch.checked_sub(3) == Some(previous_justified) {
        state.finalized_epoch = previous_justified;
    }
    if bitfield >> 1 & 0b11 == 0b11 && current_epoch.checked_sub(2) == Some(previous_justified) {
        state.finalized_epoch = previous_justified;
    }
    if bitfield & 0b111 == 0b111 && current_epoch.checked_sub(2) == Some(justified) {
        state.finalized_epoch = justified;
    }
    if bitfield & 0b11 == 0b11 && current_epoch.checked_sub(1) == Some(justified) {
        state.finalized_epoch = justified;
    }

    state.previous_justified_epoch = state.justified_epoch;
    state.justified_epoch = new_justified_epoch;
}

fn process_rewards_and_penalties<P: Preset>(
    state: &mut BeaconState<P>,
    statistics: &Statistics,
) -> Result<()> {
    let previous_active =
        accessors::get_active_validator_indices(&state.validator_registry, statistics.previous_epoch);

    if previous_active.is_empty() {
        return Ok(());
    }

    let base_reward_quotient =
        (integer_squareroot(statistics.previous_total_balance) / P::BASE_REWARD_QUOTIENT).max(1);

    let base_reward = |state: &BeaconState<P>, index: ValidatorIndex| -> Result<Gwei> {
        Ok(accessors::get_effective_balance(state, index)? / base_reward_quotient / 5)
    };

    let previous_attesting_balance =
        accessors::get_total_balance(state, statistics.previous_attesters.iter().copied())?;
    let head_attesting_balance =
        accessors::get_total_balance(state, statistics.previous_head_attesters.iter().copied())?;

    let epochs_since_finality = statistics.current_epoch + 1 - state.finalized_epoch;
    let total = statistics.previous_total_balance.max(1);

    for index in previous_active {
        let reward_base = base_reward(state, index)?;

        if epochs_since_finality <= P::MIN_EPOCHS_TO_INACTIVITY_PENALTY {
            // Expected FFG source, target, and head votes; rewards scale
            // with overall participation.
            if statistics.previous_attesters.contains(&index) {
                let reward = reward_base * previous_attesting_balance / total;
                mutators::increase_balance(state, index, reward)?;
            } else {
                mutators::decrease_balance(state, index, reward_base)?;
            }

            if statistics.previous_boundary_attesters.contains(&index) {
                let reward =
                    reward_base * statistics.previous_boundary_attesting_balance / total;
                mutators::increase_balance(state, index, reward)?;
            } else {
                mutators::decrease_balance(state, index, reward_base)?;
            }

            if statistics.previous_head_attesters.contains(&index) {
                let reward = reward_base * head_attesting_balance / total;
                mutators::increase_balance(state, index, reward)?;
            } else {
                mutators::decrease_balance(state, index, reward_base)?;
            }
        } else {
            // The inactivity leak: everyone bleeds until finality resumes,
            // non-participants fastest.
            let effective = accessors::get_effective_balance(state, index)?;
            let inactivity_penalty = reward_base
                + effective * epochs_since_finality / P::INACTIVITY_PENALTY_QUOTIENT / 2;

            if !statistics.previous_attesters.contains(&index) {
                mutators::decrease_balance(state, index, inactivity_penalty)?;
            }
            if !statistics.previous_boundary_attesters.contains(&index) {
                mutators::decrease_balance(state, index, inactivity_penalty)?;
            }
            if !statistics.previous_head_attesters.contains(&index) {
                mutators::decrease_balance(state, index, reward_base)?;
            }
        }

        // Prompt inclusion pays regardless of finality.
        if let Some(distance) = statistics.inclusion_distances.get(&index) {
            let reward =
                reward_base * P::MIN_ATTESTATION_INCLUSION_DELAY / (*distance).max(1);
            mutators::increase_balance(state, index, reward)?;
        }
    }

    Ok(())
}

fn process_registry_updates<P: Preset>(
    state: &mut BeaconState<P>,
    statistics: &Statistics,
) -> Result<()> {
    let current_epoch = statistics.current_epoch;

    // Eject validators whose balance has drained below the floor.
    for index in
        accessors::get_active_validator_indices(&state.validator_registry, current_epoch)
    {
        if accessors::balance(state, index)? < P::EJECTION_BALANCE {
            mutators::exit_validator(state, index)?;
        }
    }

    let max_balance_churn = P::MAX_DEPOSIT_AMOUNT
        .max(statistics.total_balance / (2 * P::MAX_BALANCE_CHURN_QUOTIENT.get()));

    // Activations, bounded by churn.
    let mut balance_churn = 0;
    for index in 0..state.validator_registry.len() as u64 {
        let validator = &state.validator_registry[index as usize];

        if validator.activation_epoch == FAR_FUTURE_EPOCH
            && accessors::balance(state, index)? >= P::MAX_DEPOSIT_AMOUNT
        {
            balance_churn += accessors::get_effective_balance(state, index)?;
            if balance_churn > max_balance_churn {
                break;
            }

            mutators::activate_validator(state, index, false)?;
        }
    }

    // Exits for initiated validators, bounded by the same churn.
    let mut balance_churn = 0;
    for index in 0..state.validator_registry.len() as u64 {
        let validator = &state.validator_registry[index as usize];

        if validator.exit_epoch == FAR_FUTURE_EPOCH && validator.initiated_exit {
            balance_churn += accessors::get_effective_balance(state, index)?;
            if balance_churn > max_balance_churn {
                break;
            }

            mutators::exit_validator(state, index)?;
        }
    }

    Ok(())
}

/// The slashing penalty sweep: halfway through a slashed validator's
/// withdrawability delay, apply a penalty scaled by how much stake was
/// slashed around the same time.
fn process_slashings<P: Preset>(state: &mut BeaconState<P>, statistics: &Statistics) -> Result<()> {
    let current_epoch = statistics.current_epoch;
    let ring_length = P::LatestSlashedExitLength::U64;
    let total_balance = statistics.total_balance.max(1);

    let total_at_end = *state.latest_slashed_balances.mod_index(current_epoch);
    let total_at_start = *state.latest_slashed_balances.mod_index(current_epoch + 1);
    let total_penalties = total_at_end.saturating_sub(total_at_start);

    for index in 0..state.validator_registry.len() as u64 {
        let validator = &state.validator_registry[index as usize];

        if !validator.slashed
            || current_epoch + ring_length / 2 != validator.withdrawable_epoch
        {
            continue;
        }

        let effective = accessors::get_effective_balance(state, index)?;
        let scaled = effective * (total_penalties * 3).min(total_balance) / total_balance;
        let penalty = scaled.max(effective / P::MIN_PENALTY_QUOTIENT);

        mutators::decrease_balance(state, index, penalty)?;
    }

    Ok(())
}

fn process_final_updates<P: Preset>(state: &mut BeaconState<P>) -> Result<()> {
    let current_epoch = accessors::get_current_epoch(state);
    let next_epoch = current_epoch + 1;

    let index_root_epoch = next_epoch + P::ACTIVATION_EXIT_DELAY;
    let active_indices =
        accessors::get_active_validator_indices(&state.validator_registry, index_root_epoch);
    *state.latest_active_index_roots.mod_index_mut(index_root_epoch) =
        active_indices.hash_tree_root();

    *state.latest_slashed_balances.mod_index_mut(next_epoch) =
        *state.latest_slashed_balances.mod_index(current_epoch);

    *state.latest_randao_mixes.mod_index_mut(next_epoch) =
        accessors::get_randao_mix(state, current_epoch)?;

    // Attestations from before the closing epoch can no longer influence
    // justification; drop them.
    state
        .latest_attestations
        .retain(|record| misc::slot_to_epoch::<P>(record.data.slot) >= current_epoch);

    Ok(())
}

fn integer_squareroot(n: u64) -> u64 {
    let mut x = n;
    let mut y = x.div_ceil(2);

    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }

    x
}

#[cfg(test)]
mod tests {
    use bls::PublicKeyBytes;
    use test_case::test_case;
    use types::phase0::containers::{Eth1Data, Eth1DataVote, ValidatorRecord};
    use types::phase0::primitives::H256;
    use types::preset::Minimal;

    use super::*;

    fn state_at_last_slot_of_epoch(epoch: Epoch) -> BeaconState<Minimal> {
        let mut state = BeaconState::default();
        state.slot = misc::get_epoch_start_slot::<Minimal>(epoch + 1) - 1;

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

        state
    }

    fn statistics_with_boundary_support(
        state: &BeaconState<Minimal>,
        previous_supported: bool,
        current_supported: bool,
    ) -> Statistics {
        let total = 8 * 32_000_000_000;

        Statistics {
            current_epoch: accessors::get_current_epoch(state),
            previous_epoch: accessors::get_previous_epoch(state),
            total_balance: total,
            previous_total_balance: total,
            current_boundary_attesting_balance: if current_supported { total } else { 0 },
            previous_boundary_attesting_balance: if previous_supported { total } else { 0 },
            ..Statistics::default()
        }
    }

    #[test]
    fn justification_bitfield_shifts_without_support() {
        let mut state = state_at_last_slot_of_epoch(2);
        state.justification_bitfield = 0b1;

        let statistics = statistics_with_boundary_support(&state, false, false);
        process_justification_and_finalization(&mut state, &statistics);

        assert_eq!(state.justification_bitfield, 0b10);
        assert_eq!(state.justified_epoch, 0);
        assert_eq!(state.finalized_epoch, 0);
    }

    #[test]
    fn supermajority_current_boundary_justifies_the_current_epoch() {
        let mut state = state_at_last_slot_of_epoch(2);

        let statistics = statistics_with_boundary_support(&state, false, true);
        process_justification_and_finalization(&mut state, &statistics);

        assert_eq!(state.justified_epoch, 2);
        assert_eq!(state.previous_justified_epoch, 0);
    }

    #[test]
    fn consecutive_justifications_finalize() {
        let mut state = state_at_last_slot_of_epoch(2);
        // Epoch 1 was justified in the previous epoch transition.
        state.justified_epoch = 1;
        state.previous_justified_epoch = 0;
        state.justification_bitfield = 0b1;

        let statistics = statistics_with_boundary_support(&state, false, true);
        process_justification_and_finalization(&mut state, &statistics);

        // Rule 4: the bitfield shows epochs 1 and 2 justified back to back,
        // so epoch 1 is final.
        assert_eq!(state.finalized_epoch, 1);
        assert_eq!(state.justified_epoch, 2);
        assert_eq!(state.previous_justified_epoch, 1);
    }

    #[test]
    fn eth1_votes_reset_at_the_period_boundary() {
        // Epoch 15 is the last epoch of a 16-epoch voting period.
        let mut state = state_at_last_slot_of_epoch(15);

        let winning = Eth1Data {
            deposit_root: H256::repeat_byte(1),
            block_hash: H256::repeat_byte(2),
        };

        state.eth1_data_votes = vec![Eth1DataVote {
            eth1_data: winning,
            vote_count: 16 * 8 / 2 + 1,
        }];

        process_eth1_data_votes(&mut state);

        assert_eq!(state.latest_eth1_data, winning);
        assert!(state.eth1_data_votes.is_empty());
    }

    #[test]
    fn eth1_votes_persist_mid_period() {
        let mut state = state_at_last_slot_of_epoch(3);
        state.eth1_data_votes = vec![Eth1DataVote::default()];

        process_eth1_data_votes(&mut state);

        assert_eq!(state.eth1_data_votes.len(), 1);
    }

    #[test]
    fn stale_attestations_are_purged() {
        let mut state = state_at_last_slot_of_epoch(2);

        for slot in [3, 11, 17] {
            state
                .latest_attestations
                .push(types::phase0::containers::PendingAttestationRecord {
                    data: types::phase0::containers::AttestationData {
                        slot,
                        ..Default::default()
                    },
                    slot_included: slot + 1,
                    ..Default::default()
                });
        }

        process_final_updates(&mut state).expect("ring reads are in range");

        let remaining = state
            .latest_attestations
            .iter()
            .map(|record| record.data.slot)
            .collect::<Vec<_>>();

        assert_eq!(remaining, vec![17]);
    }

    #[test_case(0, 0)]
    #[test_case(1, 1)]
    #[test_case(3, 1)]
    #[test_case(4, 2)]
    #[test_case(15, 3)]
    #[test_case(16, 4)]
    #[test_case(1 << 40, 1 << 20)]
    fn integer_squareroot_rounds_down(n: u64, expected: u64) {
        assert_eq!(integer_squareroot(n), expected);
    }
}
