use core::num::NonZeroU64;
use std::borrow::Cow;

use hex_literal::hex;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};

use crate::phase0::primitives::{DomainType, UnixMillis, Version, H32};

/// Configuration variables customizable at runtime: the chain spec.
///
/// Domain tag values are part of the chain spec rather than the protocol
/// constants; every network agrees on its own numbering.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,

    // Genesis
    pub genesis_fork_version: Version,

    // Time parameters
    pub seconds_per_slot: NonZeroU64,

    // Signature domains
    pub domain_deposit: DomainType,
    pub domain_attestation: DomainType,
    pub domain_proposal: DomainType,
    pub domain_exit: DomainType,
    pub domain_randao: DomainType,
    pub domain_transfer: DomainType,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_name: Cow::Borrowed("default"),
            genesis_fork_version: H32(hex!("00000000")),
            seconds_per_slot: nonzero!(6_u64),
            domain_deposit: 0,
            domain_attestation: 1,
            domain_proposal: 2,
            domain_exit: 3,
            domain_randao: 4,
            domain_transfer: 5,
        }
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            config_name: Cow::Borrowed("mainnet"),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self {
            config_name: Cow::Borrowed("minimal"),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn slot_duration_millis(&self) -> UnixMillis {
        self.seconds_per_slot.get() * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_tags_are_distinct() {
        let config = Config::mainnet();
        let domains = [
            config.domain_deposit,
            config.domain_attestation,
            config.domain_proposal,
            config.domain_exit,
            config.domain_randao,
            config.domain_transfer,
        ];

        for (left, domain) in domains.iter().enumerate() {
            for other in &domains[left + 1..] {
                assert_ne!(domain, other);
            }
        }
    }

    #[test]
    fn config_deserializes_from_screaming_snake_case() {
        let yaml = "CONFIG_NAME: test\nSECONDS_PER_SLOT: 12\n";
        let config: Config = serde_yaml::from_str(yaml).expect("the yaml above is valid");

        assert_eq!(config.config_name, "test");
        assert_eq!(config.seconds_per_slot.get(), 12);
        // Unlisted variables keep their defaults.
        assert_eq!(config.domain_proposal, 2);
    }
}
