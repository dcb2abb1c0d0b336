use core::fmt;

use ethereum_types::H256;

use crate::{
    error::{ReadError, WriteError},
    merkle::{merkleize_bytes, mix_in_length},
    porcelain::{Size, SszHash, SszRead, SszSize, SszWrite},
};

/// A byte-array bitfield. Bit `i` lives in byte `i / 8` at position
/// `1 << (i % 8)`. Aggregation and custody bitfields sized by committee are
/// `ceil(committee_size / 8)` bytes long.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Bitfield {
    bytes: Vec<u8>,
}

impl Bitfield {
    #[must_use]
    pub fn with_bit_count(bits: usize) -> Self {
        Self {
            bytes: vec![0; bits.div_ceil(8)],
        }
    }

    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn get_bit(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
    }

    pub fn set_bit(&mut self, index: usize, value: bool) {
        let byte = &mut self.bytes[index / 8];
        if value {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|byte| *byte == 0)
    }

    #[must_use]
    pub fn num_bytes(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn num_bits(&self) -> usize {
        self.bytes.len() * 8
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Bitfield {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("0x")?;
        for byte in &self.bytes {
            write!(formatter, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl SszSize for Bitfield {
    const SIZE: Size = Size::Variable;
}

impl SszWrite for Bitfield {
    fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        bytes.extend_from_slice(&self.bytes);
        Ok(())
    }
}

impl SszRead for Bitfield {
    fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }
}

impl SszHash for Bitfield {
    fn hash_tree_root(&self) -> H256 {
        mix_in_length(merkleize_bytes(&self.bytes), self.bytes.len())
    }
}
