use blst::{
    min_pk::{AggregateSignature as RawAggregateSignature, Signature as RawSignature},
    BLST_ERROR,
};
use derive_more::From;
use ethereum_types::{H256, H64};

use crate::{
    error::Error, message_with_domain, public_key::PublicKey, signature_bytes::SignatureBytes,
    DOMAIN_SEPARATION_TAG,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, From)]
pub struct Signature(RawSignature);

impl Default for Signature {
    fn default() -> Self {
        SignatureBytes::empty()
            .try_into()
            .expect("the compressed point at infinity is a valid signature encoding")
    }
}

impl TryFrom<SignatureBytes> for Signature {
    type Error = Error;

    fn try_from(bytes: SignatureBytes) -> Result<Self, Self::Error> {
        RawSignature::uncompress(bytes.as_bytes())
            .map(Self)
            .map_err(|_| Error::InvalidSignature)
    }
}

impl Signature {
    #[must_use]
    pub fn verify(&self, message: H256, domain: H64, public_key: &PublicKey) -> bool {
        let result = self.0.verify(
            true,
            &message_with_domain(message, domain),
            DOMAIN_SEPARATION_TAG,
            &[],
            public_key.as_raw(),
            false,
        );

        result == BLST_ERROR::BLST_SUCCESS
    }

    #[must_use]
    pub fn aggregate(mut self, other: Self) -> Self {
        self.aggregate_in_place(other);
        self
    }

    pub fn aggregate_in_place(&mut self, other: Self) {
        let mut self_aggregate = RawAggregateSignature::from_signature(&self.0);
        let other_aggregate = RawAggregateSignature::from_signature(&other.0);
        self_aggregate.add_aggregate(&other_aggregate);
        self.0 = self_aggregate.to_signature();
    }

    pub(crate) const fn as_raw(&self) -> &RawSignature {
        &self.0
    }
}
