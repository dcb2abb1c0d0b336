use ethereum_types::H256;

pub const ZERO_CHUNK: H256 = H256::zero();
pub const BYTES_PER_CHUNK: usize = 32;

/// Merkle root of the given chunks, padded to the next power of two with zero
/// chunks. The root of no chunks is the zero chunk.
#[must_use]
pub fn merkleize(chunks: &[H256]) -> H256 {
    match chunks {
        [] => ZERO_CHUNK,
        [single] => *single,
        _ => {
            let padded_length = chunks.len().next_power_of_two();
            let mut layer = chunks.to_vec();
            layer.resize(padded_length, ZERO_CHUNK);

            while layer.len() > 1 {
                layer = layer
                    .chunks_exact(2)
                    .map(|pair| hashing::hash_pair(pair[0], pair[1]))
                    .collect();
            }

            layer[0]
        }
    }
}

/// Merkle root of a byte string split into 32-byte chunks, the last chunk
/// zero-padded on the right. Carries no length information; callers hashing
/// variable-length bytes mix the length in themselves.
#[must_use]
pub fn merkleize_bytes(bytes: impl AsRef<[u8]>) -> H256 {
    let chunks = bytes
        .as_ref()
        .chunks(BYTES_PER_CHUNK)
        .map(|chunk| {
            let mut padded = ZERO_CHUNK;
            padded[..chunk.len()].copy_from_slice(chunk);
            padded
        })
        .collect::<Vec<_>>();

    merkleize(&chunks)
}

/// `hash(root ‖ length)` with the length as a 32-byte little-endian suffix.
#[must_use]
pub fn mix_in_length(root: H256, length: usize) -> H256 {
    let mut suffix = ZERO_CHUNK;
    suffix[..size_of::<u64>()].copy_from_slice(&(length as u64).to_le_bytes());
    hashing::hash_pair(root, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merkleize_of_nothing_is_the_zero_chunk() {
        assert_eq!(merkleize(&[]), ZERO_CHUNK);
    }

    #[test]
    fn merkleize_of_one_chunk_is_the_chunk_itself() {
        let chunk = H256::repeat_byte(0x17);
        assert_eq!(merkleize(&[chunk]), chunk);
    }

    #[test]
    fn merkleize_pads_to_a_power_of_two() {
        let a = H256::repeat_byte(1);
        let b = H256::repeat_byte(2);
        let c = H256::repeat_byte(3);

        let expected = hashing::hash_pair(
            hashing::hash_pair(a, b),
            hashing::hash_pair(c, ZERO_CHUNK),
        );

        assert_eq!(merkleize(&[a, b, c]), expected);
    }

    #[test]
    fn merkleize_bytes_pads_the_last_chunk() {
        let bytes = [0xab; 48];

        let mut high = ZERO_CHUNK;
        high[..16].copy_from_slice(&[0xab; 16]);

        assert_eq!(
            merkleize_bytes(bytes),
            hashing::hash_pair(H256::repeat_byte(0xab), high),
        );
    }

    #[test]
    fn mix_in_length_appends_a_little_endian_suffix() {
        let root = H256::repeat_byte(7);

        let mut suffix = ZERO_CHUNK;
        suffix[0] = 19;

        assert_eq!(mix_in_length(root, 19), hashing::hash_pair(root, suffix));
    }
}
