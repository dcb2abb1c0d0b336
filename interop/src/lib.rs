//! Deterministic keypairs and deposits for tests and simulated networks.
//!
//! Key derivation follows the interop convention: the secret key for
//! validator `i` is the hash of `i`'s tree hash reduced modulo the curve
//! order.

use hex_literal::hex;
use num_bigint::BigUint;

use bls::{PublicKeyBytes, SecretKey, SecretKeyBytes};
use helper_functions::misc;
use ssz::SszHash as _;
use types::{
    config::Config,
    phase0::{
        consts::DEPOSIT_CONTRACT_TREE_DEPTH,
        containers::{Deposit, DepositData},
        primitives::{ValidatorIndex, H256},
    },
    preset::Preset,
};

const CURVE_ORDER: &[u8] =
    &hex!("73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001");

#[must_use]
pub fn secret_key(validator_index: ValidatorIndex) -> SecretKey {
    let index_hash = hashing::hash(validator_index.hash_tree_root());
    let curve_order = BigUint::from_bytes_be(CURVE_ORDER);
    let secret_key_uint = (BigUint::from_bytes_le(index_hash.as_bytes()) % curve_order).max(1_u8.into());
    let unpadded = secret_key_uint.to_bytes_be();

    let mut padded = SecretKeyBytes::default();
    padded.as_mut()[size_of::<SecretKeyBytes>() - unpadded.len()..]
        .copy_from_slice(unpadded.as_slice());

    padded
        .try_into()
        .expect("reduction modulo the curve order produces a valid secret key")
}

/// The conventional withdrawal credentials: a zero prefix byte followed by
/// the tail of the public key hash.
#[must_use]
pub fn withdrawal_credentials(pubkey: PublicKeyBytes) -> H256 {
    let mut credentials = hashing::hash(pubkey.as_bytes());
    credentials.as_bytes_mut()[0] = 0;
    credentials
}

#[must_use]
pub fn quick_start_deposit_data<P: Preset>(config: &Config, secret_key: &SecretKey) -> DepositData {
    let pubkey = PublicKeyBytes::from(secret_key.to_public_key());

    let mut deposit_data = DepositData {
        pubkey,
        withdrawal_credentials: withdrawal_credentials(pubkey),
        amount: P::MAX_DEPOSIT_AMOUNT,
        ..DepositData::default()
    };

    let domain = misc::compute_domain(config.domain_deposit, config.genesis_fork_version);
    deposit_data.proof_of_possession = secret_key
        .sign(deposit_data.signed_root(), domain)
        .into();

    deposit_data
}

/// `count` deterministic full deposits with contiguous indices starting at
/// zero.
#[must_use]
pub fn quick_start_deposits<P: Preset>(config: &Config, count: u64) -> Vec<Deposit> {
    (0..count)
        .map(|index| Deposit {
            proof: vec![H256::zero(); DEPOSIT_CONTRACT_TREE_DEPTH],
            index,
            deposit_data: quick_start_deposit_data::<P>(config, &secret_key(index)),
        })
        .collect()
}
