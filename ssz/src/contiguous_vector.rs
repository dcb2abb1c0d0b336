use core::marker::PhantomData;

use ethereum_types::H256;
use typenum::{NonZero, Unsigned};

use crate::{
    error::{ReadError, WriteError},
    merkle::merkleize,
    porcelain::{Size, SszHash, SszRead, SszSize, SszWrite},
    shared::SszReader,
};

/// A vector whose length is fixed at the type level. The ring buffers in the
/// beacon state are these, indexed modulo their length.
#[derive(Clone, Debug)]
pub struct ContiguousVector<T, N> {
    elements: Box<[T]>,
    phantom: PhantomData<N>,
}

impl<T: PartialEq, N> PartialEq for ContiguousVector<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl<T: Eq, N> Eq for ContiguousVector<T, N> {}

impl<T: Clone + Default, N: Unsigned> Default for ContiguousVector<T, N> {
    fn default() -> Self {
        Self {
            elements: vec![T::default(); N::USIZE].into_boxed_slice(),
            phantom: PhantomData,
        }
    }
}

impl<T, N: Unsigned + NonZero> ContiguousVector<T, N> {
    #[must_use]
    pub fn mod_index(&self, index: u64) -> &T {
        let wrapped = usize::try_from(index % N::U64)
            .expect("index taken modulo the vector length fits in usize");
        &self.elements[wrapped]
    }

    pub fn mod_index_mut(&mut self, index: u64) -> &mut T {
        let wrapped = usize::try_from(index % N::U64)
            .expect("index taken modulo the vector length fits in usize");
        &mut self.elements[wrapped]
    }

    pub fn iter(&self) -> core::slice::Iter<T> {
        self.elements.iter()
    }

    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.elements.fill(value);
    }
}

impl<'vector, T, N> IntoIterator for &'vector ContiguousVector<T, N> {
    type Item = &'vector T;
    type IntoIter = core::slice::Iter<'vector, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T: SszSize, N: Unsigned> SszSize for ContiguousVector<T, N> {
    const SIZE: Size = match T::SIZE {
        Size::Fixed { size } => Size::Fixed {
            size: size * N::USIZE,
        },
        // Rings of variable-size elements do not occur in the state;
        // treating them as variable keeps the impl total.
        Size::Variable => Size::Variable,
    };
}

impl<T: SszWrite, N: Unsigned> SszWrite for ContiguousVector<T, N> {
    fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        for element in &self.elements {
            crate::shared::write_element(element, bytes)?;
        }
        Ok(())
    }
}

impl<T: SszRead, N: Unsigned> SszRead for ContiguousVector<T, N> {
    fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        let mut reader = SszReader::new(bytes);
        let mut elements = Vec::with_capacity(N::USIZE);

        for _ in 0..N::USIZE {
            elements.push(reader.read_element()?);
        }

        reader.finish()?;

        Ok(Self {
            elements: elements.into_boxed_slice(),
            phantom: PhantomData,
        })
    }
}

impl<T: SszHash, N> SszHash for ContiguousVector<T, N> {
    fn hash_tree_root(&self) -> H256 {
        let roots = self
            .elements
            .iter()
            .map(SszHash::hash_tree_root)
            .collect::<Vec<_>>();
        merkleize(&roots)
    }
}
