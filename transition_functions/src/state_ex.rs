use ssz::SszHash as _;
use types::{
    phase0::{beacon_state::BeaconState, primitives::H256},
    preset::Preset,
};

use crate::error::Error;

/// Which transition produced a state. Carried alongside the state to enforce
/// the legal ordering of transition applications.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransitionType {
    Unknown,
    Initial,
    Slot,
    Block,
    Epoch,
}

impl TransitionType {
    /// Whether a transition of kind `self` may be applied to a state
    /// produced by `previous`. Blocks only apply to freshly advanced slots;
    /// epoch processing closes out a slot or a block, never another epoch.
    pub fn ensure_can_follow(self, previous: Self) -> Result<(), Error> {
        let legal = match self {
            Self::Slot => matches!(
                previous,
                Self::Initial | Self::Slot | Self::Block | Self::Epoch,
            ),
            Self::Block => matches!(previous, Self::Slot),
            Self::Epoch => matches!(previous, Self::Slot | Self::Block),
            Self::Unknown | Self::Initial => false,
        };

        if legal {
            Ok(())
        } else {
            Err(Error::TransitionOrder {
                attempted: self,
                previous,
            })
        }
    }
}

/// A state together with the root of the block at its head and the
/// transition that produced it. All transitions consume and produce this.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BeaconStateEx<P: Preset> {
    pub state: BeaconState<P>,
    pub head_block_root: H256,
    pub transition: TransitionType,
}

impl<P: Preset> BeaconStateEx<P> {
    #[must_use]
    pub fn new(state: BeaconState<P>, head_block_root: H256, transition: TransitionType) -> Self {
        Self {
            state,
            head_block_root,
            transition,
        }
    }

    pub fn state_root(&self) -> H256 {
        self.state.hash_tree_root()
    }
}
