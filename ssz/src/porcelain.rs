use ethereum_types::H256;

use crate::error::{ReadError, WriteError};

/// Size of a type's encoding, known at compile time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Size {
    Fixed { size: usize },
    Variable,
}

impl Size {
    /// Sum of field sizes for a container. A single variable-size field makes
    /// the whole container variable-size.
    #[must_use]
    pub const fn fixed_sum(sizes: &[Size]) -> Size {
        let mut total = 0;
        let mut index = 0;

        while index < sizes.len() {
            match sizes[index] {
                Size::Fixed { size } => total += size,
                Size::Variable => return Size::Variable,
            }
            index += 1;
        }

        Size::Fixed { size: total }
    }

    #[must_use]
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Fixed { size } => Some(size),
            Self::Variable => None,
        }
    }
}

pub trait SszSize {
    const SIZE: Size;
}

pub trait SszWrite: SszSize {
    /// Appends the encoding of `self` without an outer length prefix.
    /// Prefixes for variable-size fields and list elements are the
    /// responsibility of the containing value.
    fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError>;

    fn to_ssz(&self) -> Result<Vec<u8>, WriteError> {
        let mut bytes = match Self::SIZE {
            Size::Fixed { size } => Vec::with_capacity(size),
            Size::Variable => Vec::new(),
        };
        self.write_ssz(&mut bytes)?;
        Ok(bytes)
    }
}

pub trait SszRead: SszSize + Sized {
    /// Decodes a value from exactly `bytes`, without an outer length prefix.
    fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError>;
}

pub trait SszHash {
    fn hash_tree_root(&self) -> H256;
}
