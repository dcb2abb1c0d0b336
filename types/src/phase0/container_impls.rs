//! Hand-written canonical encoding schemas, one per container, in field
//! declaration order. The spec calls for an explicit per-type schema instead
//! of reflection; this module is that schema.

use bls::{PublicKeyBytes, SignatureBytes};
use ssz::{
    merkleize, write_element, Bitfield, ReadError, Size, SszHash, SszRead, SszReader, SszSize,
    SszWrite, WriteError,
};

use crate::{
    phase0::{
        beacon_state::BeaconState,
        containers::{
            Attestation, AttestationData, AttestationDataAndCustodyBit, AttesterSlashing,
            BeaconBlock, BeaconBlockBody, Crosslink, Deposit, DepositData, Eth1Data, Eth1DataVote,
            Fork, PendingAttestationRecord, Proposal, ProposerSlashing, SlashableAttestation,
            Transfer, ValidatorRecord, VoluntaryExit,
        },
        primitives::{DepositIndex, Epoch, Gwei, ShardNumber, Slot, ValidatorIndex, Version, H256},
    },
    preset::Preset,
};

macro_rules! impl_container {
    ($type:ident { $($field:ident: $field_type:ty),+ $(,)? }) => {
        impl SszSize for $type {
            const SIZE: Size = Size::fixed_sum(&[$(<$field_type as SszSize>::SIZE),+]);
        }

        impl SszWrite for $type {
            fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
                $(write_element(&self.$field, bytes)?;)+
                Ok(())
            }
        }

        impl SszRead for $type {
            fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
                let mut reader = SszReader::new(bytes);
                $(let $field = reader.read_element::<$field_type>()?;)+
                reader.finish()?;
                Ok(Self { $($field),+ })
            }
        }

        impl SszHash for $type {
            fn hash_tree_root(&self) -> H256 {
                merkleize(&[$(SszHash::hash_tree_root(&self.$field)),+])
            }
        }
    };
}

/// Tree hash of every field up to but excluding the trailing signature —
/// the message the signature covers.
macro_rules! impl_signed_root {
    ($type:ident { $($field:ident),+ $(,)? }) => {
        impl $type {
            #[must_use]
            pub fn signed_root(&self) -> H256 {
                merkleize(&[$(SszHash::hash_tree_root(&self.$field)),+])
            }
        }
    };
}

impl_container!(Fork {
    previous_version: Version,
    current_version: Version,
    epoch: Epoch,
});

impl_container!(Crosslink {
    epoch: Epoch,
    crosslink_data_root: H256,
});

impl_container!(Eth1Data {
    deposit_root: H256,
    block_hash: H256,
});

impl_container!(Eth1DataVote {
    eth1_data: Eth1Data,
    vote_count: u64,
});

impl_container!(AttestationData {
    slot: Slot,
    shard: ShardNumber,
    beacon_block_root: H256,
    epoch_boundary_root: H256,
    crosslink_data_root: H256,
    latest_crosslink: Crosslink,
    justified_epoch: Epoch,
    justified_block_root: H256,
});

impl_container!(AttestationDataAndCustodyBit {
    data: AttestationData,
    custody_bit: bool,
});

impl_container!(Attestation {
    data: AttestationData,
    aggregation_bitfield: Bitfield,
    custody_bitfield: Bitfield,
    aggregate_signature: SignatureBytes,
});

impl_container!(PendingAttestationRecord {
    aggregation_bitfield: Bitfield,
    data: AttestationData,
    custody_bitfield: Bitfield,
    slot_included: Slot,
});

impl_container!(Proposal {
    slot: Slot,
    shard: ShardNumber,
    block_root: H256,
    signature: SignatureBytes,
});

impl_signed_root!(Proposal { slot, shard, block_root });

impl_container!(ProposerSlashing {
    proposer_index: ValidatorIndex,
    proposal_1: Proposal,
    proposal_2: Proposal,
});

impl_container!(SlashableAttestation {
    validator_indices: Vec<ValidatorIndex>,
    data: AttestationData,
    custody_bitfield: Bitfield,
    aggregate_signature: SignatureBytes,
});

impl_container!(AttesterSlashing {
    slashable_attestation_1: SlashableAttestation,
    slashable_attestation_2: SlashableAttestation,
});

impl_container!(DepositData {
    pubkey: PublicKeyBytes,
    withdrawal_credentials: H256,
    amount: Gwei,
    proof_of_possession: SignatureBytes,
});

impl_signed_root!(DepositData {
    pubkey,
    withdrawal_credentials,
    amount,
});

impl_container!(Deposit {
    proof: Vec<H256>,
    index: DepositIndex,
    deposit_data: DepositData,
});

impl_container!(VoluntaryExit {
    epoch: Epoch,
    validator_index: ValidatorIndex,
    signature: SignatureBytes,
});

impl_signed_root!(VoluntaryExit { epoch, validator_index });

impl_container!(Transfer {
    sender: ValidatorIndex,
    recipient: ValidatorIndex,
    amount: Gwei,
    fee: Gwei,
    slot: Slot,
    pubkey: PublicKeyBytes,
    signature: SignatureBytes,
});

impl_signed_root!(Transfer {
    sender,
    recipient,
    amount,
    fee,
    slot,
    pubkey,
});

impl_container!(ValidatorRecord {
    pubkey: PublicKeyBytes,
    withdrawal_credentials: H256,
    activation_epoch: Epoch,
    exit_epoch: Epoch,
    withdrawable_epoch: Epoch,
    initiated_exit: bool,
    slashed: bool,
});

impl_container!(BeaconBlockBody {
    proposer_slashings: Vec<ProposerSlashing>,
    attester_slashings: Vec<AttesterSlashing>,
    attestations: Vec<Attestation>,
    deposits: Vec<Deposit>,
    voluntary_exits: Vec<VoluntaryExit>,
    transfers: Vec<Transfer>,
});

impl_container!(BeaconBlock {
    slot: Slot,
    parent_root: H256,
    state_root: H256,
    randao_reveal: SignatureBytes,
    eth1_data: Eth1Data,
    body: BeaconBlockBody,
    signature: SignatureBytes,
});

impl_signed_root!(BeaconBlock {
    slot,
    parent_root,
    state_root,
    randao_reveal,
    eth1_data,
    body,
});

impl<P: Preset> SszSize for BeaconState<P> {
    const SIZE: Size = Size::Variable;
}

impl<P: Preset> SszWrite for BeaconState<P> {
    fn write_ssz(&self, bytes: &mut Vec<u8>) -> Result<(), WriteError> {
        write_element(&self.slot, bytes)?;
        write_element(&self.genesis_time, bytes)?;
        write_element(&self.fork, bytes)?;
        write_element(&self.validator_registry, bytes)?;
        write_element(&self.validator_balances, bytes)?;
        write_element(&self.latest_randao_mixes, bytes)?;
        write_element(&self.latest_crosslinks, bytes)?;
        write_element(&self.latest_block_roots, bytes)?;
        write_element(&self.latest_active_index_roots, bytes)?;
        write_element(&self.latest_slashed_balances, bytes)?;
        write_element(&self.previous_justified_epoch, bytes)?;
        write_element(&self.justified_epoch, bytes)?;
        write_element(&self.finalized_epoch, bytes)?;
        write_element(&self.justification_bitfield, bytes)?;
        write_element(&self.latest_attestations, bytes)?;
        write_element(&self.latest_eth1_data, bytes)?;
        write_element(&self.eth1_data_votes, bytes)?;
        write_element(&self.deposit_index, bytes)?;
        Ok(())
    }
}

impl<P: Preset> SszRead for BeaconState<P> {
    fn from_ssz(bytes: &[u8]) -> Result<Self, ReadError> {
        let mut reader = SszReader::new(bytes);

        let state = Self {
            slot: reader.read_element()?,
            genesis_time: reader.read_element()?,
            fork: reader.read_element()?,
            validator_registry: reader.read_element()?,
            validator_balances: reader.read_element()?,
            latest_randao_mixes: reader.read_element()?,
            latest_crosslinks: reader.read_element()?,
            latest_block_roots: reader.read_element()?,
            latest_active_index_roots: reader.read_element()?,
            latest_slashed_balances: reader.read_element()?,
            previous_justified_epoch: reader.read_element()?,
            justified_epoch: reader.read_element()?,
            finalized_epoch: reader.read_element()?,
            justification_bitfield: reader.read_element()?,
            latest_attestations: reader.read_element()?,
            latest_eth1_data: reader.read_element()?,
            eth1_data_votes: reader.read_element()?,
            deposit_index: reader.read_element()?,
        };

        reader.finish()?;

        Ok(state)
    }
}

impl<P: Preset> SszHash for BeaconState<P> {
    fn hash_tree_root(&self) -> H256 {
        merkleize(&[
            self.slot.hash_tree_root(),
            self.genesis_time.hash_tree_root(),
            self.fork.hash_tree_root(),
            self.validator_registry.hash_tree_root(),
            self.validator_balances.hash_tree_root(),
            self.latest_randao_mixes.hash_tree_root(),
            self.latest_crosslinks.hash_tree_root(),
            self.latest_block_roots.hash_tree_root(),
            self.latest_active_index_roots.hash_tree_root(),
            self.latest_slashed_balances.hash_tree_root(),
            self.previous_justified_epoch.hash_tree_root(),
            self.justified_epoch.hash_tree_root(),
            self.finalized_epoch.hash_tree_root(),
            self.justification_bitfield.hash_tree_root(),
            self.latest_attestations.hash_tree_root(),
            self.latest_eth1_data.hash_tree_root(),
            self.eth1_data_votes.hash_tree_root(),
            self.deposit_index.hash_tree_root(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use crate::preset::Minimal;

    use super::*;

    fn sample_attestation_data() -> AttestationData {
        AttestationData {
            slot: 19,
            shard: 3,
            beacon_block_root: H256::repeat_byte(1),
            epoch_boundary_root: H256::repeat_byte(2),
            crosslink_data_root: H256::zero(),
            latest_crosslink: Crosslink {
                epoch: 2,
                crosslink_data_root: H256::zero(),
            },
            justified_epoch: 1,
            justified_block_root: H256::repeat_byte(3),
        }
    }

    fn sample_attestation() -> Attestation {
        Attestation {
            data: sample_attestation_data(),
            aggregation_bitfield: Bitfield::from_bytes(vec![0, 8, 0]),
            custody_bitfield: Bitfield::from_bytes(vec![0, 0, 0]),
            aggregate_signature: SignatureBytes::empty(),
        }
    }

    fn sample_block() -> BeaconBlock {
        BeaconBlock {
            slot: 20,
            parent_root: H256::repeat_byte(4),
            state_root: H256::repeat_byte(5),
            randao_reveal: SignatureBytes::empty(),
            eth1_data: Eth1Data {
                deposit_root: H256::repeat_byte(6),
                block_hash: H256::repeat_byte(7),
            },
            body: BeaconBlockBody {
                attestations: vec![sample_attestation()],
                deposits: vec![Deposit {
                    proof: vec![H256::repeat_byte(8); 32],
                    index: 9,
                    deposit_data: DepositData {
                        pubkey: PublicKeyBytes::repeat_byte(10),
                        withdrawal_credentials: H256::repeat_byte(11),
                        amount: 32_000_000_000,
                        proof_of_possession: SignatureBytes::empty(),
                    },
                }],
                ..BeaconBlockBody::default()
            },
            signature: SignatureBytes::empty(),
        }
    }

    #[test]
    fn attestation_data_has_a_fixed_size() {
        let expected = 8 + 8 + 32 + 32 + 32 + (8 + 32) + 8 + 32;

        assert_eq!(
            AttestationData::SIZE,
            Size::Fixed { size: expected },
        );
        assert_eq!(
            sample_attestation_data()
                .to_ssz()
                .expect("write succeeds")
                .len(),
            expected,
        );
    }

    #[test]
    fn attestation_round_trips() {
        let attestation = sample_attestation();
        let encoded = attestation.to_ssz().expect("write succeeds");

        assert_eq!(
            Attestation::from_ssz(&encoded).expect("read succeeds"),
            attestation,
        );
    }

    #[test]
    fn block_round_trips_and_rehashes_identically() {
        let block = sample_block();
        let encoded = block.to_ssz().expect("write succeeds");
        let decoded = BeaconBlock::from_ssz(&encoded).expect("read succeeds");

        assert_eq!(decoded, block);
        assert_eq!(decoded.hash_tree_root(), block.hash_tree_root());
    }

    #[test]
    fn signed_root_excludes_the_signature() {
        let mut block = sample_block();
        let root_before = block.signed_root();

        block.signature = SignatureBytes::repeat_byte(0xff);

        assert_eq!(block.signed_root(), root_before);
        assert_ne!(block.hash_tree_root(), root_before);
    }

    #[test]
    fn state_round_trips() {
        let mut state = BeaconState::<Minimal>::default();
        state.slot = 12;
        state.validator_registry.push(ValidatorRecord {
            pubkey: PublicKeyBytes::repeat_byte(1),
            withdrawal_credentials: H256::repeat_byte(2),
            activation_epoch: 0,
            exit_epoch: u64::MAX,
            withdrawable_epoch: u64::MAX,
            initiated_exit: false,
            slashed: false,
        });
        state.validator_balances.push(32_000_000_000);
        state.latest_attestations.push(PendingAttestationRecord {
            aggregation_bitfield: Bitfield::from_bytes(vec![1]),
            data: sample_attestation_data(),
            custody_bitfield: Bitfield::from_bytes(vec![0]),
            slot_included: 20,
        });

        let encoded = state.to_ssz().expect("write succeeds");
        let decoded = BeaconState::<Minimal>::from_ssz(&encoded).expect("read succeeds");

        assert_eq!(decoded, state);
        assert_eq!(decoded.hash_tree_root(), state.hash_tree_root());
    }

    #[test]
    fn truncating_the_state_encoding_fails_to_decode() {
        let state = BeaconState::<Minimal>::default();
        let encoded = state.to_ssz().expect("write succeeds");

        assert!(BeaconState::<Minimal>::from_ssz(&encoded[..encoded.len() - 1]).is_err());
    }
}
