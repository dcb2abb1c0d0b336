use thiserror::Error;

use types::phase0::primitives::H256;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("storage has no justified block")]
    NoJustifiedHead,
    #[error("block {root:?} is not in storage")]
    MissingBlock { root: H256 },
    #[error("no state is stored for block {root:?}")]
    MissingState { root: H256 },
    #[error("cannot reorg to missing block {root:?}")]
    ReorgToMissingBlock { root: H256 },
}
