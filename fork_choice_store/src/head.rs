use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use typenum::Unsigned as _;

use bls::PublicKeyBytes;
use helper_functions::fork_choice::lmd_ghost;
use ssz::Hc;
use types::{
    phase0::{
        containers::{Attestation, BeaconBlock},
        primitives::Slot,
    },
    preset::Preset,
};

use crate::{
    error::Error,
    store::{BeaconBlockStorage, BeaconTupleStorage},
};

/// The head function: LMD-GHOST over storage, fed by a cache of each
/// validator's latest attestation.
///
/// The cache is mutated by [`add_attestation`] and read by [`get_head`]; the
/// two must not interleave, so the owner keeps this behind a lock.
///
/// [`add_attestation`]: Self::add_attestation
/// [`get_head`]: Self::get_head
#[derive(Default)]
pub struct LmdGhostHeadFunction {
    attestation_cache: HashMap<PublicKeyBytes, Attestation>,
    slot_cache: BTreeMap<Slot, HashSet<PublicKeyBytes>>,
}

impl LmdGhostHeadFunction {
    /// Records `attestation` as the latest message of each participant. An
    /// existing entry is only displaced by a strictly later slot; on a tie
    /// the first-seen attestation wins.
    pub fn add_attestation(
        &mut self,
        attestation: &Attestation,
        participants: impl IntoIterator<Item = PublicKeyBytes>,
    ) {
        let slot = attestation.data.slot;

        for pubkey in participants {
            match self.attestation_cache.get(&pubkey) {
                Some(existing) if existing.data.slot >= slot => continue,
                Some(existing) => {
                    let old_slot = existing.data.slot;
                    if let Some(pubkeys) = self.slot_cache.get_mut(&old_slot) {
                        pubkeys.remove(&pubkey);
                    }
                }
                None => {}
            }

            self.attestation_cache.insert(pubkey, attestation.clone());
            self.slot_cache.entry(slot).or_default().insert(pubkey);
        }
    }

    /// Drops every cached attestation at or before `slot`.
    pub fn purge_attestations(&mut self, slot: Slot) {
        let retained = self.slot_cache.split_off(&(slot + 1));

        for (_, pubkeys) in core::mem::replace(&mut self.slot_cache, retained) {
            for pubkey in pubkeys {
                self.attestation_cache.remove(&pubkey);
            }
        }
    }

    #[must_use]
    pub fn latest_attestation(&self, pubkey: &PublicKeyBytes) -> Option<&Attestation> {
        self.attestation_cache.get(pubkey)
    }

    /// Runs the fork choice from the justified block at the highest slot.
    /// When the new head has outrun the justified block by a full epoch, the
    /// head is promoted to justified and the old justified block to
    /// finalized.
    pub fn get_head<P: Preset>(
        &self,
        block_storage: &mut BeaconBlockStorage,
        tuple_storage: &BeaconTupleStorage<P>,
    ) -> Result<Hc<BeaconBlock>> {
        let justified_root = block_storage
            .get_justified_head()
            .ok_or(Error::NoJustifiedHead)?;

        let justified_tuple = tuple_storage.get(justified_root).ok_or(Error::MissingState {
            root: justified_root,
        })?;

        let head = lmd_ghost(
            &justified_tuple.block,
            &justified_tuple.state_ex.state,
            |root| block_storage.get(root).cloned(),
            |root| block_storage.get_children(root),
            |pubkey| self.latest_attestation(pubkey).cloned(),
        )?;

        if head.slot - justified_tuple.block.slot >= P::SlotsPerEpoch::U64 {
            block_storage.add_justified_hash(head.hash_tree_root())?;
            block_storage.add_finalized_hash(justified_root)?;
        }

        Ok(head)
    }
}
