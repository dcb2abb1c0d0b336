use anyhow::Result;

use bls::PublicKeyBytes;
use ssz::Hc;
use types::{
    phase0::{
        beacon_state::BeaconState,
        containers::{Attestation, BeaconBlock},
        primitives::{Gwei, Slot, H256},
    },
    preset::Preset,
};

use crate::{accessors, misc};

/// The LMD-GHOST rule: starting from `start_block`, repeatedly descend into
/// the child supported by the greatest total effective balance of validators
/// whose latest attestation points into that child's subtree. Ties go to the
/// lexicographically greatest block root.
///
/// The block DAG is reached only through the closures; nothing here assumes
/// a particular storage layout. Blocks travel in [`Hc`] wrappers so their
/// roots, which the descent keeps comparing, are hashed once each.
pub fn lmd_ghost<P: Preset>(
    start_block: &BeaconBlock,
    start_state: &BeaconState<P>,
    get_block: impl Fn(H256) -> Option<Hc<BeaconBlock>>,
    get_children: impl Fn(H256) -> Vec<Hc<BeaconBlock>>,
    get_latest_attestation: impl Fn(&PublicKeyBytes) -> Option<Attestation>,
) -> Result<Hc<BeaconBlock>> {
    let epoch = misc::slot_to_epoch::<P>(start_state.slot);
    let active_validators =
        accessors::get_active_validator_indices(&start_state.validator_registry, epoch);

    let mut attestation_targets = Vec::with_capacity(active_validators.len());

    for validator_index in active_validators {
        let pubkey = accessors::validator(start_state, validator_index)?.pubkey;

        if let Some(attestation) = get_latest_attestation(&pubkey) {
            let weight = accessors::get_effective_balance(start_state, validator_index)?;
            attestation_targets.push((attestation.data.beacon_block_root, weight));
        }
    }

    let mut head = Hc::new(start_block.clone());

    loop {
        let children = get_children(head.hash_tree_root());

        let Some(best) = children
            .into_iter()
            .map(|child| {
                let root = child.hash_tree_root();
                let weight = subtree_weight(&attestation_targets, &get_block, root, child.slot);
                (weight, root, child)
            })
            .max_by(|(weight_1, root_1, _), (weight_2, root_2, _)| {
                weight_1.cmp(weight_2).then(root_1.cmp(root_2))
            })
        else {
            return Ok(head);
        };

        head = best.2;
    }
}

fn subtree_weight(
    attestation_targets: &[(H256, Gwei)],
    get_block: impl Fn(H256) -> Option<Hc<BeaconBlock>>,
    root: H256,
    slot: Slot,
) -> Gwei {
    attestation_targets
        .iter()
        .filter(|(target, _)| get_ancestor(&get_block, *target, slot) == Some(root))
        .map(|(_, weight)| weight)
        .sum()
}

/// The ancestor of the block at `root` at exactly `slot`, resolved by
/// walking parent roots. `None` when the chain skips or never reaches the
/// slot, or when a block is missing from storage.
fn get_ancestor(
    get_block: impl Fn(H256) -> Option<Hc<BeaconBlock>>,
    root: H256,
    slot: Slot,
) -> Option<H256> {
    let mut current_root = root;
    let mut current = get_block(current_root)?;

    loop {
        if current.slot == slot {
            return Some(current_root);
        }

        if current.slot < slot {
            return None;
        }

        current_root = current.parent_root;
        current = get_block(current_root)?;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ssz::SszHash as _;
    use types::phase0::consts::FAR_FUTURE_EPOCH;
    use types::phase0::containers::{AttestationData, ValidatorRecord};
    use types::preset::Minimal;

    use super::*;

    struct Tree {
        blocks: HashMap<H256, BeaconBlock>,
    }

    impl Tree {
        fn new(blocks: impl IntoIterator<Item = BeaconBlock>) -> Self {
            Self {
                blocks: blocks
                    .into_iter()
                    .map(|block| (block.hash_tree_root(), block))
                    .collect(),
            }
        }

        fn get(&self, root: H256) -> Option<Hc<BeaconBlock>> {
            self.blocks
                .get(&root)
                .cloned()
                .map(|block| Hc::with_root(block, root))
        }

        fn children(&self, root: H256) -> Vec<Hc<BeaconBlock>> {
            self.blocks
                .values()
                .filter(|block| block.parent_root == root)
                .cloned()
                .map(Hc::new)
                .collect()
        }
    }

    fn block(slot: Slot, parent_root: H256, state_root_fill: u8) -> BeaconBlock {
        BeaconBlock {
            slot,
            parent_root,
            state_root: H256::repeat_byte(state_root_fill),
            ..BeaconBlock::default()
        }
    }

    fn state_with_validators(count: u8) -> BeaconState<Minimal> {
        let mut state = BeaconState::default();
        for fill in 0..count {
            state.validator_registry.push(ValidatorRecord {
                pubkey: PublicKeyBytes::repeat_byte(fill + 1),
                activation_epoch: 0,
                exit_epoch: FAR_FUTURE_EPOCH,
                withdrawable_epoch: FAR_FUTURE_EPOCH,
                ..ValidatorRecord::default()
            });
            state.validator_balances.push(32_000_000_000);
        }
        state
    }

    fn attestation_for(root: H256) -> Attestation {
        Attestation {
            data: AttestationData {
                beacon_block_root: root,
                ..AttestationData::default()
            },
            ..Attestation::default()
        }
    }

    #[test]
    fn descends_into_the_heavier_subtree() {
        let genesis = block(0, H256::zero(), 1);
        let genesis_root = genesis.hash_tree_root();
        let child_a = block(1, genesis_root, 2);
        let child_b = block(1, genesis_root, 3);
        let grandchild_b = block(2, child_b.hash_tree_root(), 4);

        let tree = Tree::new([
            genesis.clone(),
            child_a.clone(),
            child_b.clone(),
            grandchild_b.clone(),
        ]);

        let state = state_with_validators(3);

        // Two validators vote into B's subtree, one votes for A.
        let votes = HashMap::from([
            (PublicKeyBytes::repeat_byte(1), child_a.hash_tree_root()),
            (PublicKeyBytes::repeat_byte(2), child_b.hash_tree_root()),
            (PublicKeyBytes::repeat_byte(3), grandchild_b.hash_tree_root()),
        ]);

        let head = lmd_ghost(
            &genesis,
            &state,
            |root| tree.get(root),
            |root| tree.children(root),
            |pubkey| votes.get(pubkey).copied().map(attestation_for),
        )
        .expect("all referenced blocks are in the tree");

        assert_eq!(head.as_value(), &grandchild_b);
    }

    #[test]
    fn ties_break_on_the_greater_block_root() {
        let genesis = block(0, H256::zero(), 1);
        let genesis_root = genesis.hash_tree_root();
        let child_a = block(1, genesis_root, 2);
        let child_b = block(1, genesis_root, 3);

        let tree = Tree::new([genesis.clone(), child_a.clone(), child_b.clone()]);
        let state = state_with_validators(2);

        let head = lmd_ghost(
            &genesis,
            &state,
            |root| tree.get(root),
            |root| tree.children(root),
            |_| None,
        )
        .expect("all referenced blocks are in the tree");

        let expected = if child_a.hash_tree_root() > child_b.hash_tree_root() {
            child_a
        } else {
            child_b
        };

        assert_eq!(head.as_value(), &expected);
    }

    #[test]
    fn a_leaf_start_block_is_its_own_head() {
        let genesis = block(0, H256::zero(), 1);
        let tree = Tree::new([genesis.clone()]);
        let state = state_with_validators(1);

        let head = lmd_ghost(
            &genesis,
            &state,
            |root| tree.get(root),
            |root| tree.children(root),
            |_| None,
        )
        .expect("the tree contains the start block");

        assert_eq!(head.as_value(), &genesis);
    }
}
