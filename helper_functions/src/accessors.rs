use anyhow::{ensure, Result};
use itertools::Itertools as _;
use typenum::Unsigned as _;

use bls::PublicKeyBytes;
use ssz::Bitfield;
use types::{
    nonstandard::ShardCommittee,
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_EPOCH,
        containers::{AttestationData, ValidatorRecord},
        primitives::{Epoch, Gwei, Slot, ValidatorIndex, H256},
    },
    preset::Preset,
};

use crate::{error::Error, misc, predicates};

#[must_use]
pub fn get_current_epoch<P: Preset>(state: &BeaconState<P>) -> Epoch {
    misc::slot_to_epoch::<P>(state.slot)
}

#[must_use]
pub fn get_previous_epoch<P: Preset>(state: &BeaconState<P>) -> Epoch {
    get_current_epoch(state)
        .saturating_sub(1)
        .max(GENESIS_EPOCH)
}

/// The randao mix at `epoch`. Fails outside the ring window of the state.
pub fn get_randao_mix<P: Preset>(state: &BeaconState<P>, epoch: Epoch) -> Result<H256> {
    let current_epoch = get_current_epoch(state);
    let window = P::LatestRandaoMixesLength::U64;

    ensure!(
        epoch <= current_epoch && current_epoch < epoch + window,
        Error::RandaoMixOutOfRange { epoch },
    );

    Ok(*state.latest_randao_mixes.mod_index(epoch))
}

/// The block root at `slot`. Fails outside the ring window of the state.
pub fn get_block_root<P: Preset>(state: &BeaconState<P>, slot: Slot) -> Result<H256> {
    let window = P::LatestBlockRootsLength::U64;

    ensure!(
        slot < state.slot && state.slot <= slot + window,
        Error::SlotOutOfRange {
            slot,
            state_slot: state.slot,
        },
    );

    Ok(*state.latest_block_roots.mod_index(slot))
}

#[must_use]
pub fn get_active_validator_indices(
    validator_registry: &[ValidatorRecord],
    epoch: Epoch,
) -> Vec<ValidatorIndex> {
    (0..)
        .zip(validator_registry)
        .filter(|(_, validator)| predicates::is_active_validator(validator, epoch))
        .map(|(index, _)| index)
        .collect()
}

pub fn validator<'state, P: Preset>(
    state: &'state BeaconState<P>,
    index: ValidatorIndex,
) -> Result<&'state ValidatorRecord> {
    let position = usize::try_from(index)?;

    state
        .validator_registry
        .get(position)
        .ok_or_else(|| {
            Error::ValidatorIndexOutOfBounds {
                index,
                registry_size: state.validator_registry.len(),
            }
            .into()
        })
}

pub fn balance<P: Preset>(state: &BeaconState<P>, index: ValidatorIndex) -> Result<Gwei> {
    let position = usize::try_from(index)?;

    state
        .validator_balances
        .get(position)
        .copied()
        .ok_or_else(|| {
            Error::ValidatorIndexOutOfBounds {
                index,
                registry_size: state.validator_balances.len(),
            }
            .into()
        })
}

/// `min(balance, MAX_DEPOSIT_AMOUNT)`; the weight a validator carries in
/// committees, rewards, and fork choice.
pub fn get_effective_balance<P: Preset>(
    state: &BeaconState<P>,
    index: ValidatorIndex,
) -> Result<Gwei> {
    Ok(balance(state, index)?.min(P::MAX_DEPOSIT_AMOUNT))
}

pub fn get_total_balance<P: Preset>(
    state: &BeaconState<P>,
    indices: impl IntoIterator<Item = ValidatorIndex>,
) -> Result<Gwei> {
    indices
        .into_iter()
        .map(|index| get_effective_balance(state, index))
        .sum()
}

#[must_use]
pub fn index_of_public_key<P: Preset>(
    state: &BeaconState<P>,
    public_key: PublicKeyBytes,
) -> Option<ValidatorIndex> {
    (0..)
        .zip(&state.validator_registry)
        .find(|(_, validator)| validator.pubkey == public_key)
        .map(|(index, _)| index)
}

/// Number of committees formed in an epoch with `active_validator_count`
/// active validators. Always a multiple of the epoch length so every slot
/// gets the same number of committees.
#[must_use]
pub fn get_epoch_committee_count<P: Preset>(active_validator_count: usize) -> u64 {
    let slots_per_epoch = P::SlotsPerEpoch::U64;
    let shard_bound = P::ShardCount::U64 / slots_per_epoch;
    let size_bound = active_validator_count as u64 / slots_per_epoch / P::TARGET_COMMITTEE_SIZE;

    size_bound.clamp(1, shard_bound.max(1)) * slots_per_epoch
}

/// The committees assigned to `slot`, each with its shard, in shuffle order.
/// Committees of one epoch are disjoint and cover every validator active in
/// it.
pub fn get_crosslink_committees_at_slot<P: Preset>(
    state: &BeaconState<P>,
    slot: Slot,
) -> Result<Vec<ShardCommittee>> {
    let epoch = misc::slot_to_epoch::<P>(slot);
    let active_validators = get_active_validator_indices(&state.validator_registry, epoch);

    ensure!(!active_validators.is_empty(), Error::NoActiveValidators);

    let committees_per_epoch = get_epoch_committee_count::<P>(active_validators.len());
    let committees_per_slot = committees_per_epoch / P::SlotsPerEpoch::U64;
    let offset = slot % P::SlotsPerEpoch::U64;
    let slot_start_shard = committees_per_slot * offset % P::ShardCount::U64;

    let seed = misc::generate_seed(state, epoch);
    let mut shuffled = active_validators;
    shuffling::shuffle_slice::<P, _>(&mut shuffled, seed);

    let committees = (0..committees_per_slot)
        .map(|index| {
            let committee_index = committees_per_slot * offset + index;
            ShardCommittee {
                committee: split_part(&shuffled, committee_index, committees_per_epoch),
                shard: (slot_start_shard + index) % P::ShardCount::U64,
            }
        })
        .collect();

    Ok(committees)
}

// The canonical `split`: part `i` of `n` is `values[i * len / n .. (i + 1) * len / n]`.
fn split_part(values: &[ValidatorIndex], part: u64, parts: u64) -> Vec<ValidatorIndex> {
    let len = values.len() as u64;
    let start = usize::try_from(part * len / parts).expect("start index fits in usize");
    let end = usize::try_from((part + 1) * len / parts).expect("end index fits in usize");
    values[start..end].to_vec()
}

/// The proposer at `slot`: the first member of the committee whose shard is
/// `slot mod SHARD_COUNT`, falling back to the first committee when no shard
/// matches.
pub fn get_beacon_proposer_index<P: Preset>(
    state: &BeaconState<P>,
    slot: Slot,
) -> Result<ValidatorIndex> {
    let committees = get_crosslink_committees_at_slot(state, slot)?;
    let target_shard = slot % P::ShardCount::U64;

    let committee = committees
        .iter()
        .find(|shard_committee| shard_committee.shard == target_shard)
        .or_else(|| committees.first())
        .ok_or(Error::NoActiveValidators)?;

    committee
        .committee
        .first()
        .copied()
        .ok_or_else(|| Error::NoActiveValidators.into())
}

/// Committee members selected by `bitfield`, in committee order. The
/// bitfield must be exactly `ceil(committee_size / 8)` bytes with no bits
/// set past the committee size.
pub fn get_attestation_participants<P: Preset>(
    state: &BeaconState<P>,
    data: &AttestationData,
    bitfield: &Bitfield,
) -> Result<Vec<ValidatorIndex>> {
    let committees = get_crosslink_committees_at_slot(state, data.slot)?;

    let committee = committees
        .into_iter()
        .find(|shard_committee| shard_committee.shard == data.shard)
        .ok_or(Error::CommitteeNotFound {
            shard: data.shard,
            slot: data.slot,
        })?
        .committee;

    ensure!(
        bitfield.num_bytes() == committee.len().div_ceil(8),
        Error::BitfieldLengthMismatch {
            bitfield_bytes: bitfield.num_bytes(),
            committee_size: committee.len(),
        },
    );

    if let Some(position) = (committee.len()..bitfield.num_bits()).find(|bit| bitfield.get_bit(*bit))
    {
        return Err(Error::BitSetOutsideCommittee {
            position,
            committee_size: committee.len(),
        }
        .into());
    }

    Ok(committee
        .into_iter()
        .enumerate()
        .filter(|(position, _)| bitfield.get_bit(*position))
        .map(|(_, index)| index)
        .collect_vec())
}

#[cfg(test)]
mod tests {
    use bls::PublicKeyBytes;
    use types::phase0::consts::FAR_FUTURE_EPOCH;
    use types::preset::Minimal;

    use super::*;

    fn active_validator(fill: u8) -> ValidatorRecord {
        ValidatorRecord {
            pubkey: PublicKeyBytes::repeat_byte(fill),
            withdrawal_credentials: H256::zero(),
            activation_epoch: 0,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            initiated_exit: false,
            slashed: false,
        }
    }

    fn state_with_validators(count: u8) -> BeaconState<Minimal> {
        let mut state = BeaconState::default();
        for fill in 0..count {
            state.validator_registry.push(active_validator(fill));
            state.validator_balances.push(32_000_000_000);
        }
        state
    }

    #[test]
    fn committees_cover_all_active_validators_once_per_epoch() {
        let state = state_with_validators(8);
        let mut seen = Vec::new();

        for slot in 0..8 {
            for shard_committee in
                get_crosslink_committees_at_slot(&state, slot).expect("validators are active")
            {
                seen.extend(shard_committee.committee);
            }
        }

        seen.sort_unstable();
        assert_eq!(seen, (0..8_u64).collect_vec());
    }

    #[test]
    fn committees_at_a_slot_are_stable() {
        let state = state_with_validators(8);

        assert_eq!(
            get_crosslink_committees_at_slot(&state, 3).expect("validators are active"),
            get_crosslink_committees_at_slot(&state, 3).expect("validators are active"),
        );
    }

    #[test]
    fn proposer_is_a_member_of_a_committee_at_the_slot() {
        let state = state_with_validators(8);
        let slot = 5;

        let proposer =
            get_beacon_proposer_index(&state, slot).expect("validators are active");

        let in_committee = get_crosslink_committees_at_slot(&state, slot)
            .expect("validators are active")
            .iter()
            .any(|shard_committee| shard_committee.committee.contains(&proposer));

        assert!(in_committee);
    }

    #[test]
    fn no_active_validators_is_an_error() {
        let state = BeaconState::<Minimal>::default();
        assert!(get_crosslink_committees_at_slot(&state, 0).is_err());
    }

    #[test]
    fn participants_follow_the_bitfield() {
        let state = state_with_validators(8);

        let shard_committee = get_crosslink_committees_at_slot(&state, 0)
            .expect("validators are active")
            .into_iter()
            .next()
            .expect("there is at least one committee per slot");

        let data = AttestationData {
            slot: 0,
            shard: shard_committee.shard,
            ..AttestationData::default()
        };

        let mut bitfield = Bitfield::with_bit_count(shard_committee.committee.len());
        bitfield.set_bit(0, true);

        let participants = get_attestation_participants(&state, &data, &bitfield)
            .expect("the bitfield is well formed");

        assert_eq!(participants, vec![shard_committee.committee[0]]);
    }

    #[test]
    fn bit_beyond_committee_size_is_rejected() {
        let state = state_with_validators(8);

        let shard_committee = get_crosslink_committees_at_slot(&state, 0)
            .expect("validators are active")
            .into_iter()
            .next()
            .expect("there is at least one committee per slot");

        let committee_size = shard_committee.committee.len();
        // A whole byte of padding guarantees an out-of-committee bit exists.
        if committee_size % 8 == 0 {
            return;
        }

        let data = AttestationData {
            slot: 0,
            shard: shard_committee.shard,
            ..AttestationData::default()
        };

        let mut bitfield = Bitfield::with_bit_count(committee_size);
        bitfield.set_bit(committee_size, true);

        assert!(get_attestation_participants(&state, &data, &bitfield).is_err());
    }

    #[test]
    fn effective_balance_is_capped() {
        let mut state = state_with_validators(1);
        state.validator_balances[0] = 40_000_000_000;

        assert_eq!(
            get_effective_balance(&state, 0).expect("validator exists"),
            32_000_000_000,
        );
    }
}
