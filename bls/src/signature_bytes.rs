use ethereum_types::H256;
use fixed_hash::construct_fixed_hash;
use ssz::{merkleize_bytes, ReadError, Size, SszHash, SszRead, SszSize, SszWrite, WriteError};

use crate::signature::Signature;

construct_fixed_hash! {
    pub struct SignatureBytes(96);
}

impl SignatureBytes {
    /// The compressed point at infinity. This is what unsigned placeholders
    /// decompress from.
    #[must_use]
    pub fn empty() -> Self {
        let mut bytes = Self::zero();
        bytes.0[0] = 0xc0;
        bytes
    }
}

impl From<Signature> for SignatureBytes {
    fn from(signature: Signature) -> Self {
        Self(signature.as_raw().compress())
    }
}

impl SszSize for SignatureBytes {
    const SIZE: Size = Size::Fixed {
        size: Self::len_bytes(),
    };
}

impl SszWrite for SignatureBytes {
    fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        bytes.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl SszRead for SignatureBytes {
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

impl SszHash for SignatureBytes {
    fn hash_tree_root(&self) -> H256 {
        merkleize_bytes(self.as_bytes())
    }
}
