use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::Result;
use futures::{
    stream::{FuturesUnordered, StreamExt as _},
    FutureExt as _,
};
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc};

use bls::PublicKeyBytes;
use eth1::DepositContract;
use fork_choice_control::ObservableBeaconState;
use helper_functions::{accessors, misc};
use transition_functions::TransitionType;
use types::{
    config::Config,
    phase0::{
        beacon_state::BeaconState,
        consts::GENESIS_SLOT,
        containers::{Attestation, BeaconBlock},
        primitives::{Slot, UnixMillis, ValidatorIndex},
    },
    preset::Preset,
};

use crate::{attester, proposer, signer::Signer};

/// The streams a running service produces. The initialized stream ends once
/// every provided credential is bound to a registry index.
pub struct ValidatorStreams {
    pub blocks: mpsc::UnboundedReceiver<BeaconBlock>,
    pub attestations: mpsc::UnboundedReceiver<Attestation>,
    pub initialized: mpsc::UnboundedReceiver<(ValidatorIndex, PublicKeyBytes)>,
}

/// An attestation duty deferred to the midpoint of a slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ScheduledAttestation {
    pub validator_index: ValidatorIndex,
    pub fire_at: UnixMillis,
}

/// Runs any number of validators against the observable state stream.
///
/// All duty decisions happen on the task that calls [`on_state`] and
/// [`attest_scheduled`]; nothing here needs a lock.
///
/// [`on_state`]: Self::on_state
/// [`attest_scheduled`]: Self::attest_scheduled
pub struct MultiValidatorService<P: Preset> {
    config: Config,
    deposit_contract: Arc<dyn DepositContract>,
    uninitialized: HashMap<PublicKeyBytes, Arc<dyn Signer>>,
    initialized: HashMap<ValidatorIndex, Arc<dyn Signer>>,
    last_processed_slot: Slot,
    recent_state: Option<Arc<ObservableBeaconState<P>>>,
    block_tx: mpsc::UnboundedSender<BeaconBlock>,
    attestation_tx: mpsc::UnboundedSender<Attestation>,
    initialized_tx: Option<mpsc::UnboundedSender<(ValidatorIndex, PublicKeyBytes)>>,
}

impl<P: Preset> MultiValidatorService<P> {
    pub fn new(
        config: Config,
        signers: impl IntoIterator<Item = Arc<dyn Signer>>,
        deposit_contract: Arc<dyn DepositContract>,
    ) -> (Self, ValidatorStreams) {
        let (block_tx, blocks) = mpsc::unbounded_channel();
        let (attestation_tx, attestations) = mpsc::unbounded_channel();
        let (initialized_tx, initialized) = mpsc::unbounded_channel();

        let service = Self {
            config,
            deposit_contract,
            uninitialized: signers
                .into_iter()
                .map(|signer| (signer.public_key(), signer))
                .collect(),
            initialized: HashMap::new(),
            last_processed_slot: GENESIS_SLOT,
            recent_state: None,
            block_tx,
            attestation_tx,
            initialized_tx: Some(initialized_tx),
        };

        let streams = ValidatorStreams {
            blocks,
            attestations,
            initialized,
        };

        (service, streams)
    }

    #[must_use]
    pub fn recent_state(&self) -> Option<&Arc<ObservableBeaconState<P>>> {
        self.recent_state.as_ref()
    }

    #[must_use]
    pub fn initialized_indices(&self) -> Vec<ValidatorIndex> {
        self.initialized.keys().copied().collect()
    }

    /// Handles a state delivered from the outside. States not belonging to
    /// the current wall-clock slot are discarded. Returns the attestation
    /// duties to schedule for the slot's midpoint; duties for an already
    /// processed slot are not issued twice, which protects against
    /// double-signing across re-orgs.
    pub fn on_state(
        &mut self,
        observable_state: Arc<ObservableBeaconState<P>>,
        now: UnixMillis,
    ) -> Vec<ScheduledAttestation> {
        let state = &observable_state.latest_slot_state.state;

        if !misc::is_current_slot(&self.config, state, now) {
            debug!(
                "discarding state at slot {} outside the current slot",
                state.slot,
            );
            return Vec::new();
        }

        self.recent_state = Some(observable_state.clone());

        if observable_state.latest_slot_state.state.slot <= self.last_processed_slot {
            return Vec::new();
        }

        self.last_processed_slot = observable_state.latest_slot_state.state.slot;

        if !self.uninitialized.is_empty() {
            self.initialize_from(&observable_state.latest_slot_state.state);
        }

        self.run_tasks(&observable_state)
    }

    /// Binds provided credentials to their registry indices.
    fn initialize_from(&mut self, state: &BeaconState<P>) {
        let mut newly_bound = Vec::new();

        for (index, validator) in (0..).zip(&state.validator_registry) {
            if let Some(signer) = self.uninitialized.remove(&validator.pubkey) {
                self.initialized.insert(index, signer);
                newly_bound.push((index, validator.pubkey));
            }
        }

        if newly_bound.is_empty() {
            return;
        }

        info!(
            "initialized validators: {:?}",
            newly_bound.iter().map(|(index, _)| index).collect::<Vec<_>>(),
        );

        if let Some(initialized_tx) = &self.initialized_tx {
            for pair in newly_bound {
                let _ = initialized_tx.send(pair);
            }
        }

        // Dropping the sender completes the stream once everyone is bound.
        if self.uninitialized.is_empty() {
            self.initialized_tx = None;
        }
    }

    /// Proposes immediately when it is our turn and schedules attestations
    /// for the slot midpoint.
    fn run_tasks(&self, observable_state: &ObservableBeaconState<P>) -> Vec<ScheduledAttestation> {
        let state_ex = &observable_state.latest_slot_state;
        let state = &state_ex.state;

        // A block for this slot would already carry our proposal; only a
        // freshly advanced empty slot gets one. The genesis slot has no
        // proposer.
        if state_ex.transition == TransitionType::Slot && state.slot != GENESIS_SLOT {
            match accessors::get_beacon_proposer_index(state, state.slot) {
                Ok(proposer_index) => {
                    if let Some(signer) = self.initialized.get(&proposer_index) {
                        self.propose(proposer_index, observable_state, signer.as_ref());
                    }
                }
                Err(error) => warn!("proposer lookup failed: {error:?}"),
            }
        }

        let fire_at = misc::slot_middle_time_millis(&self.config, state, state.slot);

        match accessors::get_crosslink_committees_at_slot(state, state.slot) {
            Ok(committees) => committees
                .iter()
                .flat_map(|shard_committee| &shard_committee.committee)
                .filter(|index| self.initialized.contains_key(index))
                .map(|index| ScheduledAttestation {
                    validator_index: *index,
                    fire_at,
                })
                .collect(),
            Err(error) => {
                warn!("committee lookup failed: {error:?}");
                Vec::new()
            }
        }
    }

    fn propose(
        &self,
        proposer_index: ValidatorIndex,
        observable_state: &ObservableBeaconState<P>,
        signer: &dyn Signer,
    ) {
        match proposer::propose(
            &self.config,
            observable_state,
            self.deposit_contract.as_ref(),
            signer,
        ) {
            Ok(block) => {
                info!(
                    "validator {proposer_index}: proposed a block at slot {}",
                    block.slot,
                );
                let _ = self.block_tx.send(block);
            }
            Err(error) => error!("validator {proposer_index}: proposal failed: {error:?}"),
        }
    }

    /// Fires a scheduled attestation. The latest observable state is
    /// re-read and committee membership re-checked; a re-org since
    /// scheduling makes this a no-op.
    pub fn attest_scheduled(&self, validator_index: ValidatorIndex) {
        let Some(observable_state) = &self.recent_state else {
            return;
        };

        let Some(signer) = self.initialized.get(&validator_index) else {
            return;
        };

        let state = &observable_state.latest_slot_state.state;

        let committee = accessors::get_crosslink_committees_at_slot(state, state.slot)
            .ok()
            .and_then(|committees| {
                committees.into_iter().find(|shard_committee| {
                    shard_committee.committee.contains(&validator_index)
                })
            });

        let Some(shard_committee) = committee else {
            debug!(
                "validator {validator_index} is no longer in a committee at slot {}; \
                 skipping attestation",
                state.slot,
            );
            return;
        };

        match attester::attest(
            &self.config,
            validator_index,
            shard_committee.shard,
            observable_state,
            signer.as_ref(),
        ) {
            Ok(attestation) => {
                info!(
                    "validator {validator_index}: attested to head at slot {}",
                    state.slot,
                );
                let _ = self.attestation_tx.send(attestation);
            }
            Err(error) => error!("validator {validator_index}: attestation failed: {error:?}"),
        }
    }

    /// Consumes the observable state stream, proposing immediately and
    /// firing attestations at slot midpoints, until the stream closes.
    pub async fn run(
        mut self,
        mut state_rx: broadcast::Receiver<Arc<ObservableBeaconState<P>>>,
    ) -> Result<()> {
        let mut scheduled = FuturesUnordered::new();

        loop {
            tokio::select! {
                received = state_rx.recv() => match received {
                    Ok(observable_state) => {
                        let now = now_millis()?;

                        for duty in self.on_state(observable_state, now) {
                            let delay = duty.fire_at.saturating_sub(now);
                            scheduled.push(
                                tokio::time::sleep(Duration::from_millis(delay))
                                    .map(move |()| duty.validator_index),
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("fell {skipped} states behind the processor");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(validator_index) = scheduled.next(), if !scheduled.is_empty() => {
                    self.attest_scheduled(validator_index);
                }
            }
        }

        Ok(())
    }
}

fn now_millis() -> Result<UnixMillis> {
    Ok(SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_millis() as UnixMillis)
}

#[cfg(test)]
mod tests {
    use eth1::{ChainStart, InMemoryDepositContract};
    use transition_functions::{slot_processing, BeaconStateEx};
    use types::{phase0::containers::Eth1Data, preset::Minimal};

    use crate::signer::LocalSigner;

    use super::*;

    const GENESIS_TIME: u64 = 600;

    fn genesis_state_ex(config: &Config) -> BeaconStateEx<Minimal> {
        let chain_start = ChainStart {
            genesis_time: GENESIS_TIME,
            eth1_data: Eth1Data::default(),
            initial_deposits: interop::quick_start_deposits::<Minimal>(config, 8),
        };

        genesis::initial_state(config, &chain_start)
            .expect("the quick start deposits are valid")
    }

    fn observable_state_at(
        config: &Config,
        slot: Slot,
    ) -> Arc<fork_choice_control::ObservableBeaconState<Minimal>> {
        let mut state_ex = genesis_state_ex(config);
        let head = genesis::genesis_block(&state_ex.state);

        slot_processing::process_slots(&mut state_ex, slot)
            .expect("slot transitions are legal here");

        Arc::new(fork_choice_control::ObservableBeaconState {
            head,
            latest_slot_state: state_ex,
            pending_operations: Default::default(),
        })
    }

    fn slot_start(config: &Config, slot: Slot) -> UnixMillis {
        GENESIS_TIME * 1000 + slot * config.slot_duration_millis()
    }

    fn service_with_all_validators(
        config: &Config,
    ) -> (MultiValidatorService<Minimal>, ValidatorStreams) {
        let signers = (0..8).map(|index| {
            Arc::new(LocalSigner::new(interop::secret_key(index))) as Arc<dyn Signer>
        });

        MultiValidatorService::new(
            config.clone(),
            signers,
            Arc::new(InMemoryDepositContract::default()),
        )
    }

    #[test]
    fn a_stale_state_is_discarded() {
        let config = Config::minimal();
        let (mut service, _streams) = service_with_all_validators(&config);

        // The clock says slot 15; the state is at slot 0.
        let duties = service.on_state(observable_state_at(&config, 0), slot_start(&config, 15));

        assert!(duties.is_empty());
        assert!(service.recent_state().is_none());
    }

    #[test]
    fn a_current_state_runs_duties_once_per_slot() {
        let config = Config::minimal();
        let (mut service, mut streams) = service_with_all_validators(&config);

        let observable_state = observable_state_at(&config, 15);
        let now = slot_start(&config, 15);

        let duties = service.on_state(observable_state.clone(), now);

        assert!(service.recent_state().is_some());
        assert!(!duties.is_empty());

        // Every committee member at the slot is ours.
        let midpoint = now + config.slot_duration_millis() / 2;
        for duty in &duties {
            assert_eq!(duty.fire_at, midpoint);
        }

        // The proposer fired immediately.
        let block = streams.blocks.try_recv().expect("a block was proposed");
        assert_eq!(block.slot, 15);

        // Delivering the same slot again issues no duties and no block.
        let again = service.on_state(observable_state, now);
        assert!(again.is_empty());
        assert!(streams.blocks.try_recv().is_err());
    }

    #[test]
    fn initialization_binds_indices_and_completes_the_stream() {
        let config = Config::minimal();
        let (mut service, mut streams) = service_with_all_validators(&config);

        service.on_state(observable_state_at(&config, 3), slot_start(&config, 3));

        let mut initialized = Vec::new();
        while let Ok(pair) = streams.initialized.try_recv() {
            initialized.push(pair.0);
        }

        initialized.sort_unstable();
        assert_eq!(initialized, (0..8).collect::<Vec<_>>());

        // The sender side was dropped once everyone was bound.
        assert!(matches!(
            streams.initialized.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected),
        ));
    }

    #[test]
    fn a_scheduled_attestation_fires_against_the_recent_state() {
        let config = Config::minimal();
        let (mut service, mut streams) = service_with_all_validators(&config);

        let duties = service.on_state(observable_state_at(&config, 3), slot_start(&config, 3));
        let duty = duties.first().copied().expect("duties were scheduled");

        service.attest_scheduled(duty.validator_index);

        let attestation = streams
            .attestations
            .try_recv()
            .expect("the validator is still in its committee");

        assert_eq!(attestation.data.slot, 3);
        assert!(!attestation.aggregation_bitfield.is_zero());
    }

    #[test]
    fn an_uninitialized_validator_does_not_attest() {
        let config = Config::minimal();

        // Credentials that do not correspond to any registry entry.
        let stranger =
            Arc::new(LocalSigner::new(interop::secret_key(1000))) as Arc<dyn Signer>;
        let (mut service, mut streams) = MultiValidatorService::<Minimal>::new(
            config.clone(),
            [stranger],
            Arc::new(InMemoryDepositContract::default()),
        );

        let duties = service.on_state(observable_state_at(&config, 3), slot_start(&config, 3));

        assert!(duties.is_empty());
        service.attest_scheduled(0);
        assert!(streams.attestations.try_recv().is_err());
    }

    #[test]
    fn no_proposal_on_a_state_produced_by_a_block() {
        let config = Config::minimal();
        let (mut service, mut streams) = service_with_all_validators(&config);

        let mut observable_state = observable_state_at(&config, 7);
        Arc::get_mut(&mut observable_state)
            .expect("the state is not shared yet")
            .latest_slot_state
            .transition = TransitionType::Block;

        service.on_state(observable_state, slot_start(&config, 7));

        assert!(streams.blocks.try_recv().is_err());
    }
}
