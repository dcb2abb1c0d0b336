use bls::{PublicKeyBytes, SecretKey, SignatureBytes};
use types::phase0::primitives::{Domain, H256};

/// The signing oracle validators hold their keys behind. Remote signers
/// would implement this; the in-process one wraps a secret key directly.
pub trait Signer: Send + Sync {
    fn public_key(&self) -> PublicKeyBytes;

    fn sign(&self, message: H256, domain: Domain) -> SignatureBytes;
}

pub struct LocalSigner {
    secret_key: SecretKey,
    public_key: PublicKeyBytes,
}

impl LocalSigner {
    #[must_use]
    pub fn new(secret_key: SecretKey) -> Self {
        let public_key = secret_key.to_public_key().into();
        Self {
            secret_key,
            public_key,
        }
    }
}

impl Signer for LocalSigner {
    fn public_key(&self) -> PublicKeyBytes {
        self.public_key
    }

    fn sign(&self, message: H256, domain: Domain) -> SignatureBytes {
        self.secret_key.sign(message, domain).into()
    }
}
