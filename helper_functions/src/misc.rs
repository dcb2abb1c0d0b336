use ssz::SszHash as _;
use typenum::Unsigned as _;

use arithmetic::U64Ext as _;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_SLOT,
        containers::Fork,
        primitives::{Domain, DomainType, Epoch, Slot, UnixMillis, Version, H256},
    },
    preset::Preset,
};

#[must_use]
pub fn slot_to_epoch<P: Preset>(slot: Slot) -> Epoch {
    slot.div_typenum::<P::SlotsPerEpoch>()
}

#[must_use]
pub fn get_epoch_start_slot<P: Preset>(epoch: Epoch) -> Slot {
    epoch * P::SlotsPerEpoch::U64
}

#[must_use]
pub fn is_epoch_start<P: Preset>(slot: Slot) -> bool {
    slot.mod_typenum::<P::SlotsPerEpoch>() == 0
}

#[must_use]
pub const fn compute_activation_exit_epoch<P: Preset>(epoch: Epoch) -> Epoch {
    epoch + 1 + P::ACTIVATION_EXIT_DELAY
}

/// The fork version in force at `epoch`.
#[must_use]
pub fn fork_version(fork: &Fork, epoch: Epoch) -> Version {
    if epoch < fork.epoch {
        fork.previous_version
    } else {
        fork.current_version
    }
}

/// The 8-byte signature domain: the domain kind followed by the fork version
/// in force at `epoch`, both little-endian.
#[must_use]
pub fn get_domain(fork: &Fork, epoch: Epoch, domain_type: DomainType) -> Domain {
    compute_domain(domain_type, fork_version(fork, epoch))
}

#[must_use]
pub fn compute_domain(domain_type: DomainType, version: Version) -> Domain {
    let mut domain = Domain::zero();
    domain[..size_of::<DomainType>()].copy_from_slice(&domain_type.to_le_bytes());
    domain[size_of::<DomainType>()..].copy_from_slice(version.as_bytes());
    domain
}

/// The committee shuffle seed for `epoch`: the randao mix from
/// `MIN_SEED_LOOKAHEAD` epochs back, the active index root at `epoch`, and
/// the epoch itself, hashed together. Ring reads wrap; at genesis they land
/// on zeroed entries.
#[must_use]
pub fn generate_seed<P: Preset>(state: &BeaconState<P>, epoch: Epoch) -> H256 {
    let mix = *state
        .latest_randao_mixes
        .mod_index(epoch.wrapping_sub(P::MIN_SEED_LOOKAHEAD));
    let active_index_root = *state.latest_active_index_roots.mod_index(epoch);

    let mut preimage = [0; 96];
    preimage[..32].copy_from_slice(mix.as_bytes());
    preimage[32..64].copy_from_slice(active_index_root.as_bytes());
    preimage[64..96].copy_from_slice(epoch.hash_tree_root().as_bytes());
    hashing::hash(preimage)
}

#[must_use]
pub fn slot_start_time_millis<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    slot: Slot,
) -> UnixMillis {
    state.genesis_time * 1000 + (slot - GENESIS_SLOT) * config.slot_duration_millis()
}

/// The midpoint of a slot, when attestations are due.
#[must_use]
pub fn slot_middle_time_millis<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    slot: Slot,
) -> UnixMillis {
    slot_start_time_millis(config, state, slot) + config.slot_duration_millis() / 2
}

/// Whether `now` falls within the slot the state is at.
#[must_use]
pub fn is_current_slot<P: Preset>(
    config: &Config,
    state: &BeaconState<P>,
    now: UnixMillis,
) -> bool {
    let start = slot_start_time_millis(config, state, state.slot);
    let end = start + config.slot_duration_millis();
    start <= now && now < end
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use test_case::test_case;
    use types::preset::Minimal;

    use super::*;

    #[test_case(0, 0; "genesis slot")]
    #[test_case(7, 0; "last slot of the first epoch")]
    #[test_case(8, 1; "first slot of the second epoch")]
    #[test_case(19, 2; "mid third epoch")]
    fn slot_to_epoch_divides_by_slots_per_epoch(slot: Slot, epoch: Epoch) {
        assert_eq!(slot_to_epoch::<Minimal>(slot), epoch);
    }

    #[test]
    fn epoch_start_slot_inverts_slot_to_epoch() {
        for epoch in 0..5 {
            let slot = get_epoch_start_slot::<Minimal>(epoch);
            assert!(is_epoch_start::<Minimal>(slot));
            assert_eq!(slot_to_epoch::<Minimal>(slot), epoch);
        }
    }

    #[test]
    fn domain_concatenates_kind_and_version() {
        let fork = Fork {
            previous_version: Version::from(hex!("00000001")),
            current_version: Version::from(hex!("00000002")),
            epoch: 5,
        };

        let before = get_domain(&fork, 4, 3);
        let after = get_domain(&fork, 5, 3);

        assert_eq!(before.as_bytes(), hex!("03000000 00000001"));
        assert_eq!(after.as_bytes(), hex!("03000000 00000002"));
    }

    #[test]
    fn seeds_differ_across_epochs() {
        let state = BeaconState::<Minimal>::default();
        assert_ne!(
            generate_seed(&state, 0),
            generate_seed(&state, 1),
        );
    }

    #[test]
    fn current_slot_window_is_half_open() {
        let config = Config::minimal();
        let mut state = BeaconState::<Minimal>::default();
        state.genesis_time = 600;
        state.slot = 2;

        let start = 600_000 + 2 * 6000;

        assert!(!is_current_slot(&config, &state, start - 1));
        assert!(is_current_slot(&config, &state, start));
        assert!(is_current_slot(&config, &state, start + 5999));
        assert!(!is_current_slot(&config, &state, start + 6000));
    }
}
