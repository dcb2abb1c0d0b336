//! The BLS12-381 signing and verification oracle.
//!
//! Container types carry [`PublicKeyBytes`] and [`SignatureBytes`]; points
//! are only decompressed when a signature is actually verified. The 8-byte
//! domain separating signatures across duties and forks is appended to the
//! 32-byte message before hashing to the curve.

pub use crate::{
    error::Error,
    public_key::PublicKey,
    public_key_bytes::PublicKeyBytes,
    secret_key::SecretKey,
    secret_key_bytes::SecretKeyBytes,
    signature::Signature,
    signature_bytes::SignatureBytes,
};

pub type AggregatePublicKey = PublicKey;
pub type AggregateSignature = Signature;
pub type AggregateSignatureBytes = SignatureBytes;

mod error;
mod public_key;
mod public_key_bytes;
mod secret_key;
mod secret_key_bytes;
mod signature;
mod signature_bytes;

pub(crate) const DOMAIN_SEPARATION_TAG: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

pub(crate) fn message_with_domain(
    message: ethereum_types::H256,
    domain: ethereum_types::H64,
) -> [u8; 40] {
    let mut bytes = [0; 40];
    bytes[..32].copy_from_slice(message.as_bytes());
    bytes[32..].copy_from_slice(domain.as_bytes());
    bytes
}
