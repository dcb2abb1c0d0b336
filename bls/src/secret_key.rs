use core::fmt;

use blst::min_pk::SecretKey as RawSecretKey;
use ethereum_types::{H256, H64};

use crate::{
    error::Error, message_with_domain, public_key::PublicKey, secret_key_bytes::SecretKeyBytes,
    signature::Signature, DOMAIN_SEPARATION_TAG,
};

#[derive(Clone)]
pub struct SecretKey(RawSecretKey);

impl TryFrom<SecretKeyBytes> for SecretKey {
    type Error = Error;

    fn try_from(secret_key_bytes: SecretKeyBytes) -> Result<Self, Self::Error> {
        RawSecretKey::from_bytes(secret_key_bytes.as_ref())
            .map(Self)
            .map_err(|_| Error::InvalidSecretKey)
    }
}

impl SecretKey {
    #[must_use]
    pub fn to_bytes(&self) -> SecretKeyBytes {
        SecretKeyBytes {
            bytes: self.0.to_bytes(),
        }
    }

    #[must_use]
    pub fn to_public_key(&self) -> PublicKey {
        self.0.sk_to_pk().into()
    }

    #[must_use]
    pub fn sign(&self, message: H256, domain: H64) -> Signature {
        self.0
            .sign(&message_with_domain(message, domain), DOMAIN_SEPARATION_TAG, &[])
            .into()
    }
}

// Like `SecretKeyBytes`, never reveal the key material.
impl fmt::Debug for SecretKey {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("[REDACTED]")
    }
}
