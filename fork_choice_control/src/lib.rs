//! The observable-state processor.
//!
//! Owns block and tuple storage, the head function, and the operation pool.
//! Blocks and attestations come in, ticks drive the clock forward, and every
//! state-changing event publishes a fresh [`ObservableBeaconState`] to
//! subscribers.

use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc};

use clock::Tick;
use fork_choice_store::{
    BeaconBlockStorage, BeaconTuple, BeaconTupleStorage, Error as StoreError,
    LmdGhostHeadFunction,
};
use futures::{stream::Stream, StreamExt as _};
use helper_functions::{
    accessors,
    error::SignatureKind,
    misc, signing,
    verifier::{SingleVerifier, Verifier as _},
};
use operation_pools::{OperationPool, PendingOperations};
use ssz::SszHash as _;
use transition_functions::{
    slot_processing, state_transition, BeaconStateEx, StateRootPolicy,
};
use types::{
    config::Config,
    phase0::{
        containers::{Attestation, BeaconBlock},
        primitives::{Slot, H256},
    },
    preset::Preset,
};

/// The view handed to validators: the current head, the state advanced
/// through empty slots to the current wall-clock slot, and the operations
/// waiting for inclusion.
#[derive(Clone, Debug)]
pub struct ObservableBeaconState<P: Preset> {
    pub head: BeaconBlock,
    pub latest_slot_state: BeaconStateEx<P>,
    pub pending_operations: PendingOperations,
}

pub struct ObservableStateProcessor<P: Preset> {
    config: Config,
    block_storage: BeaconBlockStorage,
    tuple_storage: BeaconTupleStorage<P>,
    head_function: LmdGhostHeadFunction,
    pool: OperationPool,
    current_slot: Slot,
    state_tx: broadcast::Sender<Arc<ObservableBeaconState<P>>>,
}

const STATE_CHANNEL_CAPACITY: usize = 16;

impl<P: Preset> ObservableStateProcessor<P> {
    /// Seeds storage with the genesis tuple. The genesis block starts out
    /// canonical, justified, and finalized.
    pub fn new(config: Config, genesis_state_ex: BeaconStateEx<P>) -> Result<Self> {
        let genesis_block = genesis::genesis_block(&genesis_state_ex.state);
        Self::with_genesis_block(config, genesis_state_ex, genesis_block)
    }

    pub fn with_genesis_block(
        config: Config,
        genesis_state_ex: BeaconStateEx<P>,
        genesis_block: BeaconBlock,
    ) -> Result<Self> {
        let mut block_storage = BeaconBlockStorage::default();
        let mut tuple_storage = BeaconTupleStorage::default();

        let genesis_slot = genesis_state_ex.state.slot;
        let root = block_storage.put(genesis_block.clone())?;
        block_storage.add_justified_hash(root)?;
        block_storage.add_finalized_hash(root)?;

        tuple_storage.put(
            root,
            BeaconTuple {
                block: genesis_block,
                state_ex: genesis_state_ex,
            },
        );

        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            block_storage,
            tuple_storage,
            head_function: LmdGhostHeadFunction::default(),
            pool: OperationPool::default(),
            current_slot: genesis_slot,
            state_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ObservableBeaconState<P>>> {
        self.state_tx.subscribe()
    }

    /// Advances the wall clock. Start-of-slot ticks publish a new observable
    /// state built on the current head.
    pub fn on_tick(&mut self, tick: Tick) -> Result<()> {
        if !tick.is_start_of_slot() || tick.slot <= self.current_slot {
            return Ok(());
        }

        self.current_slot = tick.slot;
        self.pool.prune_old_attestations::<P>(tick.slot);
        self.publish()
    }

    /// Imports a block: full transition from the parent's post-state, then
    /// storage insertion, head re-evaluation, and publication. Invalid
    /// blocks are dropped without touching storage.
    pub fn on_block(&mut self, block: BeaconBlock) -> Result<()> {
        let parent_tuple = self
            .tuple_storage
            .get(block.parent_root)
            .ok_or(StoreError::MissingBlock {
                root: block.parent_root,
            })?;

        let mut state_ex = parent_tuple.state_ex.clone();

        state_transition(
            &self.config,
            &mut state_ex,
            &block,
            StateRootPolicy::Verify,
            SingleVerifier,
        )?;

        let root = self.block_storage.put(block.clone())?;
        self.pool.prune_included(&block.body);
        self.tuple_storage.put(
            root,
            BeaconTuple {
                block: block.clone(),
                state_ex,
            },
        );

        if block.slot > self.current_slot {
            self.current_slot = block.slot;
        }

        info!("imported block {root:?} at slot {}", block.slot);

        self.update_head()?;
        self.publish()
    }

    /// Records a verified attestation in the pool and the fork-choice cache.
    pub fn on_attestation(&mut self, attestation: Attestation) -> Result<()> {
        let head_root = self.canonical_head_root()?;
        let head_tuple = self
            .tuple_storage
            .get(head_root)
            .ok_or(StoreError::MissingState { root: head_root })?;
        let state = &head_tuple.state_ex.state;

        let participants = accessors::get_attestation_participants(
            state,
            &attestation.data,
            &attestation.aggregation_bitfield,
        )?;

        let pubkeys = participants
            .iter()
            .map(|index| accessors::validator(state, *index).map(|validator| validator.pubkey))
            .collect::<Result<Vec<_>>>()?;

        let domain = misc::get_domain(
            &state.fork,
            misc::slot_to_epoch::<P>(attestation.data.slot),
            self.config.domain_attestation,
        );

        SingleVerifier.verify_aggregate(
            signing::attestation_message(attestation.data, false),
            domain,
            attestation.aggregate_signature,
            pubkeys.iter().copied(),
            SignatureKind::Attestation,
        )?;

        self.head_function.add_attestation(&attestation, pubkeys);
        self.pool.add_attestation(attestation);

        self.update_head()?;
        self.publish()
    }

    fn update_head(&mut self) -> Result<()> {
        let head = self
            .head_function
            .get_head(&mut self.block_storage, &self.tuple_storage)?;
        let head_root = head.hash_tree_root();

        if self.block_storage.get_canonical_head() != Some(head_root) {
            debug!("reorg to {head_root:?} at slot {}", head.slot);
            self.block_storage.reorg_to(head_root)?;
        }

        Ok(())
    }

    fn canonical_head_root(&self) -> Result<H256> {
        self.block_storage
            .get_canonical_head()
            .ok_or_else(|| StoreError::NoJustifiedHead.into())
    }

    /// Builds the observable state on the current head and broadcasts it.
    fn publish(&mut self) -> Result<()> {
        let head_root = self.canonical_head_root()?;
        let head_tuple = self
            .tuple_storage
            .get(head_root)
            .ok_or(StoreError::MissingState { root: head_root })?;

        let head = head_tuple.block.clone();
        let mut state_ex = head_tuple.state_ex.clone();

        if state_ex.state.slot < self.current_slot {
            slot_processing::process_slots(&mut state_ex, self.current_slot)?;
        }

        debug_assert_eq!(state_ex.state.slot, self.current_slot);

        let observable = ObservableBeaconState {
            head,
            latest_slot_state: state_ex,
            pending_operations: self.pool.snapshot(),
        };

        // Nobody listening yet is fine.
        let _ = self.state_tx.send(Arc::new(observable));

        Ok(())
    }

    /// Drives the processor from a tick stream and block/attestation
    /// channels until all inputs are exhausted. Failed imports are logged
    /// and skipped; nothing at this layer retries.
    pub async fn run(
        mut self,
        mut ticks: impl Stream<Item = Result<Tick, clock::ClockError>> + Unpin,
        mut block_rx: mpsc::UnboundedReceiver<BeaconBlock>,
        mut attestation_rx: mpsc::UnboundedReceiver<Attestation>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                tick = ticks.next() => match tick {
                    Some(tick) => {
                        if let Err(error) = self.on_tick(tick?) {
                            warn!("tick processing failed: {error:?}");
                        }
                    }
                    None => break Ok(()),
                },
                block = block_rx.recv() => match block {
                    Some(block) => {
                        if let Err(error) = self.on_block(block) {
                            warn!("block rejected: {error:?}");
                        }
                    }
                    None => break Ok(()),
                },
                attestation = attestation_rx.recv() => match attestation {
                    Some(attestation) => {
                        if let Err(error) = self.on_attestation(attestation) {
                            warn!("attestation rejected: {error:?}");
                        }
                    }
                    None => break Ok(()),
                },
            }
        }
    }
}
