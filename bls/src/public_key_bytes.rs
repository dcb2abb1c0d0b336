use ethereum_types::H256;
use fixed_hash::construct_fixed_hash;
use ssz::{merkleize_bytes, ReadError, Size, SszHash, SszRead, SszSize, SszWrite, WriteError};

use crate::public_key::PublicKey;

construct_fixed_hash! {
    /// A compressed public key as it appears in containers. Decompression
    /// and subgroup checks are deferred to [`PublicKey`].
    pub struct PublicKeyBytes(48);
}

impl From<PublicKey> for PublicKeyBytes {
    fn from(public_key: PublicKey) -> Self {
        Self(public_key.as_raw().compress())
    }
}

impl SszSize for PublicKeyBytes {
    const SIZE: Size = Size::Fixed {
        size: Self::len_bytes(),
    };
}

impl SszWrite for PublicKeyBytes {
    fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        bytes.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl SszRead for PublicKeyBytes {
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

impl SszHash for PublicKeyBytes {
    fn hash_tree_root(&self) -> H256 {
        merkleize_bytes(self.as_bytes())
    }
}
