pub use crate::{
    error::Error,
    head::LmdGhostHeadFunction,
    store::{BeaconBlockStorage, BeaconTuple, BeaconTupleStorage, SlotBlocks},
};

mod error;
mod head;
mod store;
