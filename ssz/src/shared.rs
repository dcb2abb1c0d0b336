use crate::{
    error::{ReadError, WriteError},
    porcelain::{Size, SszRead, SszWrite},
};

pub const BYTES_PER_LENGTH_PREFIX: usize = size_of::<u32>();

/// Appends a field or list element, prefixing variable-size values with their
/// byte length as a little-endian `u32`.
pub fn write_element<T: SszWrite + ?Sized>(
    value: &T,
    bytes: &mut Vec<u8>,
) -> Result<(), WriteError> {
    match T::SIZE {
        Size::Fixed { .. } => value.write_ssz(bytes),
        Size::Variable => {
            let start = bytes.len();
            bytes.extend_from_slice(&[0; BYTES_PER_LENGTH_PREFIX]);
            value.write_ssz(bytes)?;

            let length = bytes.len() - start - BYTES_PER_LENGTH_PREFIX;
            let prefix =
                u32::try_from(length).map_err(|_| WriteError::PrefixOverflow { length })?;
            bytes[start..start + BYTES_PER_LENGTH_PREFIX].copy_from_slice(&prefix.to_le_bytes());

            Ok(())
        }
    }
}

/// Cursor over an encoded value. Containers and lists read their parts
/// through this and call [`SszReader::finish`] to reject trailing bytes.
pub struct SszReader<'bytes> {
    bytes: &'bytes [u8],
}

impl<'bytes> SszReader<'bytes> {
    #[must_use]
    pub const fn new(bytes: &'bytes [u8]) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn read_fixed(&mut self, size: usize) -> Result<&'bytes [u8], ReadError> {
        if self.bytes.len() < size {
            return Err(ReadError::InputTooShort {
                expected: size,
                actual: self.bytes.len(),
            });
        }

        let (taken, rest) = self.bytes.split_at(size);
        self.bytes = rest;
        Ok(taken)
    }

    pub fn read_prefix(&mut self) -> Result<usize, ReadError> {
        let prefix_bytes = self.read_fixed(BYTES_PER_LENGTH_PREFIX)?;
        let prefix = u32::from_le_bytes(
            prefix_bytes
                .try_into()
                .expect("read_fixed returns exactly BYTES_PER_LENGTH_PREFIX bytes"),
        ) as usize;

        if prefix > self.bytes.len() {
            return Err(ReadError::PrefixTooLong {
                prefix,
                remaining: self.bytes.len(),
            });
        }

        Ok(prefix)
    }

    /// Reads a field or list element, consuming the length prefix of
    /// variable-size values.
    pub fn read_element<T: SszRead>(&mut self) -> Result<T, ReadError> {
        match T::SIZE {
            Size::Fixed { size } => T::from_ssz(self.read_fixed(size)?),
            Size::Variable => {
                let length = self.read_prefix()?;
                T::from_ssz(self.read_fixed(length)?)
            }
        }
    }

    pub fn finish(self) -> Result<(), ReadError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(ReadError::TrailingBytes {
                actual: self.bytes.len(),
            })
        }
    }
}
