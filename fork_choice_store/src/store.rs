use std::collections::{BTreeMap, HashMap};

use anyhow::{ensure, Result};

use ssz::{Hc, SszHash as _};
use transition_functions::BeaconStateEx;
use types::{
    phase0::{
        containers::BeaconBlock,
        primitives::{Slot, H256},
    },
    preset::Preset,
};

use crate::error::Error;

/// The per-slot entry of the secondary index: every block hash seen at the
/// slot, which of them (if any) is canonical, and the justified/finalized
/// marks the fork choice has placed at this slot.
#[derive(Clone, Default, Debug)]
pub struct SlotBlocks {
    block_hashes: Vec<H256>,
    canonical_index: Option<usize>,
    justified_hash: Option<H256>,
    finalized_hash: Option<H256>,
}

impl SlotBlocks {
    #[must_use]
    pub fn block_hashes(&self) -> &[H256] {
        &self.block_hashes
    }

    #[must_use]
    pub fn canonical_hash(&self) -> Option<H256> {
        self.canonical_index.map(|index| self.block_hashes[index])
    }

    fn set_canonical_hash(&mut self, hash: H256) {
        self.canonical_index = self.block_hashes.iter().position(|root| *root == hash);
    }
}

/// An append-only map from block root to block with a slot-indexed canonical
/// chain on top. The only mutation besides insertion is moving canonical and
/// justified/finalized marks.
#[derive(Default)]
pub struct BeaconBlockStorage {
    blocks: HashMap<H256, Hc<BeaconBlock>>,
    slot_index: BTreeMap<Slot, SlotBlocks>,
}

impl BeaconBlockStorage {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn get(&self, root: H256) -> Option<&Hc<BeaconBlock>> {
        self.blocks.get(&root)
    }

    #[must_use]
    pub fn get_max_slot(&self) -> Option<Slot> {
        self.slot_index.keys().next_back().copied()
    }

    #[must_use]
    pub fn get_slot_blocks(&self, slot: Slot) -> Vec<H256> {
        self.slot_index
            .get(&slot)
            .map(|slot_blocks| slot_blocks.block_hashes.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get_slot_canonical_block(&self, slot: Slot) -> Option<H256> {
        self.slot_index
            .get(&slot)
            .and_then(SlotBlocks::canonical_hash)
    }

    /// The canonical block at the highest slot carrying one. At least the
    /// genesis block is canonical once storage is nonempty.
    #[must_use]
    pub fn get_canonical_head(&self) -> Option<H256> {
        self.slot_index
            .values()
            .rev()
            .find_map(SlotBlocks::canonical_hash)
    }

    /// Inserts a block, keyed by its tree hash. Idempotent on duplicates.
    /// The first block ever inserted becomes canonical automatically.
    pub fn put(&mut self, block: BeaconBlock) -> Result<H256> {
        let root = block.hash_tree_root();

        if self.blocks.contains_key(&root) {
            return Ok(root);
        }

        let genesis_init = self.is_empty();
        let slot = block.slot;

        self.blocks.insert(root, Hc::with_root(block, root));
        self.slot_index
            .entry(slot)
            .or_default()
            .block_hashes
            .push(root);

        if genesis_init {
            self.reorg_to(root)?;
        }

        Ok(root)
    }

    /// Removes a non-canonical block. Removing a canonical block would tear
    /// a hole in the chain, which is an invariant breakage, not an error the
    /// caller could handle.
    pub fn remove(&mut self, root: H256) {
        let Some(block) = self.blocks.remove(&root) else {
            return;
        };

        let slot_blocks = self
            .slot_index
            .get_mut(&block.slot)
            .expect("every stored block has a slot index entry");

        let position = slot_blocks
            .block_hashes
            .iter()
            .position(|hash| *hash == root)
            .expect("every stored block is listed at its slot");

        assert!(
            slot_blocks.canonical_index != Some(position),
            "attempted to remove canonical block at slot {}: {root:?}",
            block.slot,
        );

        slot_blocks.block_hashes.remove(position);
        if let Some(canonical) = slot_blocks.canonical_index {
            if canonical > position {
                slot_blocks.canonical_index = Some(canonical - 1);
            }
        }
    }

    /// Moves the canonical marks onto the chain ending in `new_canonical`,
    /// walking ancestors until reaching a slot where the ancestor is already
    /// canonical.
    pub fn reorg_to(&mut self, new_canonical: H256) -> Result<()> {
        let Some(max_slot) = self.get_max_slot() else {
            return Ok(());
        };

        let mut target = new_canonical;

        for slot in (0..=max_slot).rev() {
            let Some(slot_blocks) = self.slot_index.get_mut(&slot) else {
                continue;
            };

            if slot_blocks.canonical_hash() == Some(target) {
                break;
            }

            slot_blocks.set_canonical_hash(target);

            if slot_blocks.canonical_hash() == Some(target) {
                target = self
                    .blocks
                    .get(&target)
                    .ok_or(Error::ReorgToMissingBlock { root: target })?
                    .parent_root;
            }
        }

        Ok(())
    }

    /// All stored blocks whose parent is `root`.
    #[must_use]
    pub fn get_children(&self, root: H256) -> Vec<Hc<BeaconBlock>> {
        self.blocks
            .values()
            .filter(|block| block.parent_root == root)
            .cloned()
            .collect()
    }

    /// Marks a block as justified at its slot.
    pub fn add_justified_hash(&mut self, root: H256) -> Result<()> {
        let block = self
            .blocks
            .get(&root)
            .ok_or(Error::MissingBlock { root })?;

        self.slot_index
            .get_mut(&block.slot)
            .expect("every stored block has a slot index entry")
            .justified_hash = Some(root);

        Ok(())
    }

    pub fn add_finalized_hash(&mut self, root: H256) -> Result<()> {
        let block = self
            .blocks
            .get(&root)
            .ok_or(Error::MissingBlock { root })?;

        self.slot_index
            .get_mut(&block.slot)
            .expect("every stored block has a slot index entry")
            .finalized_hash = Some(root);

        Ok(())
    }

    /// The justified hash at the highest slot carrying one.
    #[must_use]
    pub fn get_justified_head(&self) -> Option<H256> {
        self.slot_index
            .values()
            .rev()
            .find_map(|slot_blocks| slot_blocks.justified_hash)
    }

    #[must_use]
    pub fn get_finalized_head(&self) -> Option<H256> {
        self.slot_index
            .values()
            .rev()
            .find_map(|slot_blocks| slot_blocks.finalized_hash)
    }
}

/// A block together with the state that results from applying it.
#[derive(Clone)]
pub struct BeaconTuple<P: Preset> {
    pub block: BeaconBlock,
    pub state_ex: BeaconStateEx<P>,
}

/// Post-states by block root, alongside the block they belong to.
#[derive(Default)]
pub struct BeaconTupleStorage<P: Preset> {
    tuples: HashMap<H256, BeaconTuple<P>>,
}

impl<P: Preset> BeaconTupleStorage<P> {
    #[must_use]
    pub fn get(&self, root: H256) -> Option<&BeaconTuple<P>> {
        self.tuples.get(&root)
    }

    pub fn put(&mut self, root: H256, tuple: BeaconTuple<P>) {
        self.tuples.insert(root, tuple);
    }

    pub fn ensure_contains(&self, root: H256) -> Result<()> {
        ensure!(self.tuples.contains_key(&root), Error::MissingState { root });
        Ok(())
    }
}
