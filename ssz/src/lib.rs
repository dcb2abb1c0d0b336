pub use ethereum_types::H256;

pub use crate::{
    bitfield::Bitfield,
    contiguous_vector::ContiguousVector,
    error::{ReadError, WriteError},
    hc::Hc,
    merkle::{merkleize, merkleize_bytes, mix_in_length, ZERO_CHUNK},
    porcelain::{Size, SszHash, SszRead, SszSize, SszWrite},
    shared::{write_element, SszReader, BYTES_PER_LENGTH_PREFIX},
};

mod basic;
mod bitfield;
mod contiguous_vector;
mod error;
mod hc;
mod merkle;
mod porcelain;
mod shared;
