//! The deposit-contract oracle as the consensus core sees it.
//!
//! The real observer of the proof-of-work chain lives elsewhere; the core
//! only consumes this interface, and tests feed it an in-memory
//! implementation.

use types::phase0::{
    containers::{Deposit, Eth1Data},
    primitives::{UnixSeconds, H256},
};

/// The event that bootstraps the chain: a genesis time, the eth1 data the
/// genesis state points at, and the deposits collected so far.
#[derive(Clone, Debug)]
pub struct ChainStart {
    pub genesis_time: UnixSeconds,
    pub eth1_data: Eth1Data,
    pub initial_deposits: Vec<Deposit>,
}

/// A deposit along with the eth1 data snapshot it was included under.
#[derive(Clone, Debug)]
pub struct DepositInfo {
    pub deposit: Deposit,
    pub eth1_data: Eth1Data,
}

pub trait DepositContract: Send + Sync {
    /// `None` until the contract has collected enough deposits to launch.
    fn chain_start(&self) -> Option<ChainStart>;

    /// Deposits made after `after` (exclusive) up to `up_to` (inclusive), at
    /// most `max` of them, in deposit index order.
    fn peek_deposits(&self, max: usize, after: Eth1Data, up_to: Eth1Data) -> Vec<DepositInfo>;

    fn has_deposit_root(&self, block_hash: H256, deposit_root: H256) -> bool;

    fn latest_eth1_data(&self) -> Option<Eth1Data>;
}

/// An oracle over a fixed list of deposits.
#[derive(Default)]
pub struct InMemoryDepositContract {
    chain_start: Option<ChainStart>,
    deposits: Vec<DepositInfo>,
}

impl InMemoryDepositContract {
    #[must_use]
    pub fn new(chain_start: ChainStart, deposits: Vec<DepositInfo>) -> Self {
        Self {
            chain_start: Some(chain_start),
            deposits,
        }
    }

    pub fn push_deposit(&mut self, deposit: DepositInfo) {
        self.deposits.push(deposit);
    }
}

impl DepositContract for InMemoryDepositContract {
    fn chain_start(&self) -> Option<ChainStart> {
        self.chain_start.clone()
    }

    fn peek_deposits(&self, max: usize, after: Eth1Data, up_to: Eth1Data) -> Vec<DepositInfo> {
        let start = self
            .deposits
            .iter()
            .rposition(|info| info.eth1_data == after)
            .map_or(0, |position| position + 1);

        let end = self
            .deposits
            .iter()
            .rposition(|info| info.eth1_data == up_to)
            .map_or(self.deposits.len(), |position| position + 1);

        self.deposits
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .take(max)
            .cloned()
            .collect()
    }

    fn has_deposit_root(&self, block_hash: H256, deposit_root: H256) -> bool {
        self.deposits.iter().any(|info| {
            info.eth1_data.block_hash == block_hash && info.eth1_data.deposit_root == deposit_root
        })
    }

    fn latest_eth1_data(&self) -> Option<Eth1Data> {
        self.deposits
            .last()
            .map(|info| info.eth1_data)
            .or_else(|| self.chain_start.as_ref().map(|start| start.eth1_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(index: u64, eth1_fill: u8) -> DepositInfo {
        DepositInfo {
            deposit: Deposit {
                index,
                ..Deposit::default()
            },
            eth1_data: Eth1Data {
                deposit_root: H256::repeat_byte(eth1_fill),
                block_hash: H256::repeat_byte(eth1_fill),
            },
        }
    }

    fn contract() -> InMemoryDepositContract {
        let chain_start = ChainStart {
            genesis_time: 600,
            eth1_data: Eth1Data::default(),
            initial_deposits: Vec::new(),
        };

        InMemoryDepositContract::new(
            chain_start,
            vec![info(0, 1), info(1, 2), info(2, 3)],
        )
    }

    #[test]
    fn peek_excludes_the_lower_bound_and_includes_the_upper() {
        let contract = contract();

        let deposits = contract.peek_deposits(
            10,
            info(0, 1).eth1_data,
            info(2, 3).eth1_data,
        );

        let indices = deposits
            .iter()
            .map(|info| info.deposit.index)
            .collect::<Vec<_>>();

        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn peek_respects_the_maximum() {
        let contract = contract();

        let deposits =
            contract.peek_deposits(1, Eth1Data::default(), info(2, 3).eth1_data);

        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].deposit.index, 0);
    }

    #[test]
    fn latest_eth1_data_tracks_the_last_deposit() {
        let contract = contract();

        assert_eq!(
            contract.latest_eth1_data(),
            Some(info(2, 3).eth1_data),
        );
    }
}
