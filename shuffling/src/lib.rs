//! The swap-or-not shuffle.
//!
//! Based on the "swap-or-not" construction; the whole-slice form applies
//! each round to every index at once, which is much faster than calling
//! [`shuffle_single`] per index and produces the same permutation.

use core::num::NonZeroU64;

use types::{phase0::primitives::H256, preset::Preset};

const BITS_PER_HASH: usize = H256::len_bytes() * 8;

/// Permutes `slice` in place with the permutation seeded by `seed`.
pub fn shuffle_slice<P: Preset, T>(slice: &mut [T], seed: H256) {
    let Some(length) = u64::try_from(slice.len()).ok().and_then(NonZeroU64::new) else {
        return;
    };

    for round in (0..P::SHUFFLE_ROUND_COUNT).rev() {
        let pivot = compute_pivot(seed, round, length);

        // Positions cluster into 256-bit windows; caching the last source
        // hash avoids recomputing it for every index.
        let mut cached_window = u64::MAX;
        let mut source = H256::zero();

        for index in 0..length.get() {
            let flip = (pivot + length.get() - index) % length;
            if index >= flip {
                continue;
            }

            let position = index.max(flip);
            let window = position / BITS_PER_HASH as u64;

            if window != cached_window {
                source = compute_source(seed, round, window);
                cached_window = window;
            }

            let byte = source[(position % BITS_PER_HASH as u64 / 8) as usize];
            let bit = byte >> (position % 8) & 1;

            if bit == 1 {
                slice.swap(
                    usize::try_from(index).expect("index is less than slice.len()"),
                    usize::try_from(flip).expect("flip is less than slice.len()"),
                );
            }
        }
    }
}

/// The position `index` maps to under the same permutation
/// [`shuffle_slice`] applies.
#[must_use]
pub fn shuffle_single<P: Preset>(mut index: u64, index_count: NonZeroU64, seed: H256) -> u64 {
    assert!(index < index_count.get());

    for round in 0..P::SHUFFLE_ROUND_COUNT {
        let pivot = compute_pivot(seed, round, index_count);
        let flip = (pivot + index_count.get() - index) % index_count;
        let position = index.max(flip);
        let source = compute_source(seed, round, position / BITS_PER_HASH as u64);
        let byte = source[(position % BITS_PER_HASH as u64 / 8) as usize];
        let bit = byte >> (position % 8) & 1;

        if bit == 1 {
            index = flip;
        }
    }

    index
}

fn compute_pivot(seed: H256, round: u8, index_count: NonZeroU64) -> u64 {
    let digest = hashing::hash_256_8(seed, round);
    let prefix = digest[..size_of::<u64>()]
        .try_into()
        .map(u64::from_le_bytes)
        .expect("slice has the same size as u64");
    prefix % index_count
}

fn compute_source(seed: H256, round: u8, position_window: u64) -> H256 {
    // Truncation matches the canonical shuffle's 4-byte window encoding.
    #[allow(clippy::cast_possible_truncation)]
    hashing::hash_256_8_32(seed, round, position_window as u32)
}

#[cfg(test)]
mod tests {
    use itertools::Itertools as _;
    use types::preset::Minimal;

    use super::*;

    #[test]
    fn shuffle_slice_is_a_permutation() {
        let seed = H256::repeat_byte(0x2a);
        let mut shuffled = (0_u64..100).collect_vec();

        shuffle_slice::<Minimal, _>(&mut shuffled, seed);

        assert_ne!(shuffled, (0_u64..100).collect_vec());

        let mut sorted = shuffled.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0_u64..100).collect_vec());
    }

    #[test]
    fn shuffle_single_agrees_with_shuffle_slice() {
        let seed = H256::repeat_byte(0x17);
        let count = 37_u64;

        let mut shuffled = (0..count).collect_vec();
        shuffle_slice::<Minimal, _>(&mut shuffled, seed);

        let index_count = NonZeroU64::new(count).expect("count is nonzero");

        for original in 0..count {
            let position = shuffle_single::<Minimal>(original, index_count, seed);
            assert_eq!(
                shuffled[usize::try_from(position).expect("position is less than count")],
                original,
            );
        }
    }

    #[test]
    fn different_seeds_give_different_permutations() {
        let mut first = (0_u64..64).collect_vec();
        let mut second = first.clone();

        shuffle_slice::<Minimal, _>(&mut first, H256::repeat_byte(1));
        shuffle_slice::<Minimal, _>(&mut second, H256::repeat_byte(2));

        assert_ne!(first, second);
    }

    #[test]
    fn empty_and_singleton_slices_are_fixed_points() {
        let seed = H256::zero();

        let mut empty: [u64; 0] = [];
        shuffle_slice::<Minimal, _>(&mut empty, seed);

        let mut singleton = [7_u64];
        shuffle_slice::<Minimal, _>(&mut singleton, seed);
        assert_eq!(singleton, [7]);
    }
}
