use ethereum_types::{H160, H256, H32, H64};

use crate::{
    error::{ReadError, WriteError},
    merkle::{merkleize, mix_in_length, ZERO_CHUNK},
    porcelain::{Size, SszHash, SszRead, SszSize, SszWrite},
    shared::{write_element, SszReader},
};

// Fixed-width unsigned integers are encoded big-endian by their declared
// width and tree-hash to their little-endian form zero-padded to a chunk.
macro_rules! impl_for_uint {
    ($type:ty) => {
        impl SszSize for $type {
            const SIZE: Size = Size::Fixed {
                size: size_of::<$type>(),
            };
        }

        impl SszWrite for $type {
            fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
                bytes.extend_from_slice(&self.to_be_bytes());
                Ok(())
            }
        }

        impl SszRead for $type {
            fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
                let array = bytes.try_into().map_err(|_| ReadError::InputTooShort {
                    expected: size_of::<$type>(),
                    actual: bytes.len(),
                })?;
                Ok(Self::from_be_bytes(array))
            }
        }

        impl SszHash for $type {
            fn hash_tree_root(&self) -> H256 {
                let mut chunk = ZERO_CHUNK;
                chunk[..size_of::<$type>()].copy_from_slice(&self.to_le_bytes());
                chunk
            }
        }
    };
}

impl_for_uint!(u8);
impl_for_uint!(u16);
impl_for_uint!(u32);
impl_for_uint!(u64);

impl SszSize for bool {
    const SIZE: Size = Size::Fixed { size: 1 };
}

impl SszWrite for bool {
    fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        bytes.push(u8::from(*self));
        Ok(())
    }
}

impl SszRead for bool {
    fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            [byte] => Err(ReadError::InvalidBool { byte: *byte }),
            _ => Err(ReadError::InputTooShort {
                expected: 1,
                actual: bytes.len(),
            }),
        }
    }
}

impl SszHash for bool {
    fn hash_tree_root(&self) -> H256 {
        let mut chunk = ZERO_CHUNK;
        chunk.as_bytes_mut()[0] = u8::from(*self);
        chunk
    }
}

// Byte arrays of declared length are emitted raw and tree-hash as chunks
// padded on the right.
macro_rules! impl_for_fixed_bytes {
    ($type:ty) => {
        impl SszSize for $type {
            const SIZE: Size = Size::Fixed {
                size: <$type>::len_bytes(),
            };
        }

        impl SszWrite for $type {
            fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
                bytes.extend_from_slice(self.as_bytes());
                Ok(())
            }
        }

        impl SszRead for $type {
            fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
                if bytes.len() != <$type>::len_bytes() {
                    return Err(ReadError::InputTooShort {
                        expected: <$type>::len_bytes(),
                        actual: bytes.len(),
                    });
                }
                Ok(Self::from_slice(bytes))
            }
        }

        impl SszHash for $type {
            fn hash_tree_root(&self) -> H256 {
                let mut chunk = ZERO_CHUNK;
                chunk[..<$type>::len_bytes()].copy_from_slice(self.as_bytes());
                chunk
            }
        }
    };
}

impl_for_fixed_bytes!(H32);
impl_for_fixed_bytes!(H64);
impl_for_fixed_bytes!(H160);

impl SszSize for H256 {
    const SIZE: Size = Size::Fixed {
        size: H256::len_bytes(),
    };
}

impl SszWrite for H256 {
    fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        bytes.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl SszRead for H256 {
    fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        if bytes.len() != Self::len_bytes() {
            return Err(ReadError::InputTooShort {
                expected: Self::len_bytes(),
                actual: bytes.len(),
            });
        }
        Ok(Self::from_slice(bytes))
    }
}

impl SszHash for H256 {
    fn hash_tree_root(&self) -> H256 {
        *self
    }
}

// Lists encode as their elements back to back, each variable-size element
// carrying its own length prefix. The outer prefix is written by whatever
// contains the list.
impl<T: SszSize> SszSize for Vec<T> {
    const SIZE: Size = Size::Variable;
}

impl<T: SszWrite> SszWrite for Vec<T> {
    fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        for element in self {
            write_element(element, bytes)?;
        }
        Ok(())
    }
}

impl<T: SszRead> SszRead for Vec<T> {
    fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        let mut reader = SszReader::new(bytes);
        let mut elements = Self::new();

        while !reader.is_empty() {
            elements.push(reader.read_element()?);
        }

        Ok(elements)
    }
}

impl<T: SszHash> SszHash for Vec<T> {
    fn hash_tree_root(&self) -> H256 {
        let roots = self
            .iter()
            .map(SszHash::hash_tree_root)
            .collect::<Vec<_>>();
        mix_in_length(merkleize(&roots), self.len())
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use test_case::test_case;

    use super::*;

    #[test_case(0_u64, hex!("0000000000000000"); "zero")]
    #[test_case(1_u64, hex!("0000000000000001"); "one")]
    #[test_case(0x0102_0304_0506_0708_u64, hex!("0102030405060708"); "mixed bytes")]
    fn u64_encodes_big_endian(value: u64, expected: [u8; 8]) {
        assert_eq!(value.to_ssz().expect("write succeeds"), expected);
        assert_eq!(u64::from_ssz(&expected).expect("read succeeds"), value);
    }

    #[test]
    fn u64_hashes_little_endian_padded() {
        let root = 0x0102_u64.hash_tree_root();
        assert_eq!(&root[..3], &hex!("020100"));
        assert_eq!(root[3..], ZERO_CHUNK[3..]);
    }

    #[test]
    fn bool_rejects_invalid_bytes() {
        assert_eq!(bool::from_ssz(&[2]), Err(ReadError::InvalidBool { byte: 2 }));
    }

    #[test]
    fn vec_of_u64_has_no_per_element_prefixes() {
        let values = vec![1_u64, 2];
        assert_eq!(
            values.to_ssz().expect("write succeeds"),
            hex!("0000000000000001 0000000000000002"),
        );
        assert_eq!(
            Vec::<u64>::from_ssz(&hex!("0000000000000001 0000000000000002"))
                .expect("read succeeds"),
            values,
        );
    }

    #[test]
    fn vec_of_variable_elements_prefixes_each_element() {
        // An inner Vec<u64> is variable-size, so each element of the outer
        // list carries a 4-byte little-endian length prefix.
        let values = vec![vec![1_u64], vec![]];
        let encoded = values.to_ssz().expect("write succeeds");
        assert_eq!(encoded, hex!("08000000 0000000000000001 00000000"));
        assert_eq!(
            Vec::<Vec<u64>>::from_ssz(&encoded).expect("read succeeds"),
            values,
        );
    }

    #[test]
    fn vec_root_mixes_in_the_length() {
        let values = vec![5_u64];
        let expected = mix_in_length(merkleize(&[5_u64.hash_tree_root()]), 1);
        assert_eq!(values.hash_tree_root(), expected);
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert_eq!(
            u64::from_ssz(&hex!("0102")),
            Err(ReadError::InputTooShort {
                expected: 8,
                actual: 2,
            }),
        );
    }
}
