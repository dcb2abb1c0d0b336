pub use crate::{
    attester::attest,
    error::Error,
    proposer::propose,
    service::{MultiValidatorService, ScheduledAttestation, ValidatorStreams},
    signer::{LocalSigner, Signer},
};

mod attester;
mod error;
mod proposer;
mod service;
mod signer;
