use core::{fmt::Debug, hash::Hash, num::NonZeroU64};

use nonzero_ext::nonzero;
use typenum::{NonZero, Unsigned, U1024, U64, U8, U8192};

use crate::phase0::primitives::Gwei;

/// Compile-time configuration variables. Ring-buffer lengths are associated
/// types so state fields are sized by the type system; everything else is an
/// associated constant.
pub trait Preset: Copy + Eq + Ord + Hash + Default + Debug + Send + Sync + 'static {
    type SlotsPerEpoch: Unsigned + NonZero + Debug + Send + Sync;
    type ShardCount: Unsigned + NonZero + Debug + Send + Sync;
    type LatestBlockRootsLength: Unsigned + NonZero + Debug + Send + Sync;
    type LatestRandaoMixesLength: Unsigned + NonZero + Debug + Send + Sync;
    type LatestActiveIndexRootsLength: Unsigned + NonZero + Debug + Send + Sync;
    type LatestSlashedExitLength: Unsigned + NonZero + Debug + Send + Sync;

    // Misc
    const TARGET_COMMITTEE_SIZE: NonZeroU64 = nonzero!(128_u64);
    const SHUFFLE_ROUND_COUNT: u8 = 90;
    const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 4;

    // Deposits and balances
    const MIN_DEPOSIT_AMOUNT: Gwei = 1_000_000_000;
    const MAX_DEPOSIT_AMOUNT: Gwei = 32_000_000_000;
    const EJECTION_BALANCE: Gwei = 16_000_000_000;

    // Rewards and penalties
    const BASE_REWARD_QUOTIENT: NonZeroU64 = nonzero!(32_u64);
    const WHISTLEBLOWER_REWARD_QUOTIENT: NonZeroU64 = nonzero!(512_u64);
    const ATTESTATION_INCLUSION_REWARD_QUOTIENT: NonZeroU64 = nonzero!(8_u64);
    const INACTIVITY_PENALTY_QUOTIENT: NonZeroU64 = nonzero!(1_u64 << 24);
    const MIN_PENALTY_QUOTIENT: NonZeroU64 = nonzero!(32_u64);
    const MIN_EPOCHS_TO_INACTIVITY_PENALTY: u64 = 4;

    // Validator cycle
    const MIN_SEED_LOOKAHEAD: u64 = 1;
    const ACTIVATION_EXIT_DELAY: u64 = 4;
    const MIN_VALIDATOR_WITHDRAWABILITY_DELAY: u64 = 256;
    const MAX_BALANCE_CHURN_QUOTIENT: NonZeroU64 = nonzero!(32_u64);

    // Eth1
    const EPOCHS_PER_ETH1_VOTING_PERIOD: NonZeroU64 = nonzero!(16_u64);

    // Max operations per block
    const MAX_PROPOSER_SLASHINGS: usize = 16;
    const MAX_ATTESTER_SLASHINGS: usize = 1;
    const MAX_ATTESTATIONS: usize = 128;
    const MAX_DEPOSITS: usize = 16;
    const MAX_VOLUNTARY_EXITS: usize = 16;
    const MAX_TRANSFERS: usize = 16;
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Mainnet;

impl Preset for Mainnet {
    type SlotsPerEpoch = U64;
    type ShardCount = U1024;
    type LatestBlockRootsLength = U8192;
    type LatestRandaoMixesLength = U8192;
    type LatestActiveIndexRootsLength = U8192;
    type LatestSlashedExitLength = U8192;
}

/// A small preset for tests and simulations. Eight slots per epoch, eight
/// shards, short rings.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Minimal;

impl Preset for Minimal {
    type SlotsPerEpoch = U8;
    type ShardCount = U8;
    type LatestBlockRootsLength = U64;
    type LatestRandaoMixesLength = U64;
    type LatestActiveIndexRootsLength = U64;
    type LatestSlashedExitLength = U64;

    const TARGET_COMMITTEE_SIZE: NonZeroU64 = nonzero!(4_u64);
    const SHUFFLE_ROUND_COUNT: u8 = 10;
    const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 1;
    const ACTIVATION_EXIT_DELAY: u64 = 4;
    const MIN_VALIDATOR_WITHDRAWABILITY_DELAY: u64 = 16;
}
