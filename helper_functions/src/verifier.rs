use anyhow::{ensure, Result};

use bls::{PublicKey, PublicKeyBytes, Signature, SignatureBytes};
use types::phase0::primitives::{Domain, H256};

use crate::error::{Error, SignatureKind};

/// The seam through which all signature checks go. Production code uses
/// [`SingleVerifier`]; tests and trusted replays use [`NullVerifier`].
/// Disabling verification is a matter of composition, not configuration.
pub trait Verifier {
    const IS_NULL: bool = false;

    fn verify_singular(
        &mut self,
        message: H256,
        domain: Domain,
        signature: SignatureBytes,
        public_key: PublicKeyBytes,
        kind: SignatureKind,
    ) -> Result<()>;

    fn verify_aggregate(
        &mut self,
        message: H256,
        domain: Domain,
        signature: SignatureBytes,
        public_keys: impl IntoIterator<Item = PublicKeyBytes>,
        kind: SignatureKind,
    ) -> Result<()>;
}

pub struct SingleVerifier;

impl Verifier for SingleVerifier {
    fn verify_singular(
        &mut self,
        message: H256,
        domain: Domain,
        signature: SignatureBytes,
        public_key: PublicKeyBytes,
        kind: SignatureKind,
    ) -> Result<()> {
        let public_key =
            PublicKey::try_from(public_key).map_err(|_| Error::SignatureInvalid(kind))?;
        let signature =
            Signature::try_from(signature).map_err(|_| Error::SignatureInvalid(kind))?;

        ensure!(
            signature.verify(message, domain, &public_key),
            Error::SignatureInvalid(kind),
        );

        Ok(())
    }

    fn verify_aggregate(
        &mut self,
        message: H256,
        domain: Domain,
        signature: SignatureBytes,
        public_keys: impl IntoIterator<Item = PublicKeyBytes>,
        kind: SignatureKind,
    ) -> Result<()> {
        let public_keys = public_keys
            .into_iter()
            .map(|bytes| PublicKey::try_from(bytes).map_err(|_| Error::SignatureInvalid(kind)))
            .collect::<Result<Vec<_>, _>>()?;

        // Participants all sign the same message, so the aggregate
        // signature verifies against their aggregate public key.
        let aggregate_public_key = PublicKey::aggregate_nonempty(public_keys)
            .map_err(|_| Error::SignatureInvalid(kind))?;
        let signature =
            Signature::try_from(signature).map_err(|_| Error::SignatureInvalid(kind))?;

        ensure!(
            signature.verify(message, domain, &aggregate_public_key),
            Error::SignatureInvalid(kind),
        );

        Ok(())
    }
}

pub struct NullVerifier;

impl Verifier for NullVerifier {
    const IS_NULL: bool = true;

    fn verify_singular(
        &mut self,
        _message: H256,
        _domain: Domain,
        _signature: SignatureBytes,
        _public_key: PublicKeyBytes,
        _kind: SignatureKind,
    ) -> Result<()> {
        Ok(())
    }

    fn verify_aggregate(
        &mut self,
        _message: H256,
        _domain: Domain,
        _signature: SignatureBytes,
        _public_keys: impl IntoIterator<Item = PublicKeyBytes>,
        _kind: SignatureKind,
    ) -> Result<()> {
        Ok(())
    }
}

impl<V: Verifier> Verifier for &mut V {
    const IS_NULL: bool = V::IS_NULL;

    fn verify_singular(
        &mut self,
        message: H256,
        domain: Domain,
        signature: SignatureBytes,
        public_key: PublicKeyBytes,
        kind: SignatureKind,
    ) -> Result<()> {
        (*self).verify_singular(message, domain, signature, public_key, kind)
    }

    fn verify_aggregate(
        &mut self,
        message: H256,
        domain: Domain,
        signature: SignatureBytes,
        public_keys: impl IntoIterator<Item = PublicKeyBytes>,
        kind: SignatureKind,
    ) -> Result<()> {
        (*self).verify_aggregate(message, domain, signature, public_keys, kind)
    }
}
