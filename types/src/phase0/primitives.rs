pub use ethereum_types::{H256, H32, H64};

pub type Slot = u64;
pub type Epoch = u64;
pub type Gwei = u64;
pub type ValidatorIndex = u64;
pub type ShardNumber = u64;
pub type DepositIndex = u64;
pub type UnixSeconds = u64;
pub type UnixMillis = u64;

/// A fork version as mixed into signature domains.
pub type Version = H32;

/// An 8-byte signature domain: the domain kind followed by the fork version,
/// both little-endian.
pub type Domain = H64;

/// The numeric value of a domain kind. Concrete values are part of the chain
/// spec ([`crate::config::Config`]).
pub type DomainType = u32;
