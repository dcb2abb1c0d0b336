use core::ops::Deref;
use std::sync::OnceLock;

use ethereum_types::H256;

use crate::porcelain::SszHash;

/// A value paired with a lazily computed tree hash. States are expensive to
/// hash, so the chain layers wrap them in this. The cache can only be filled,
/// never invalidated; mutation goes through [`Hc::into_value`], which drops
/// the cache along with the wrapper.
#[derive(Debug)]
pub struct Hc<T> {
    value: T,
    root: OnceLock<H256>,
}

impl<T> Hc<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value,
            root: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn with_root(value: T, root: H256) -> Self {
        let cell = OnceLock::new();
        cell.set(root)
            .expect("the cell was created empty on the previous line");

        Self { value, root: cell }
    }

    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }

    #[must_use]
    pub const fn as_value(&self) -> &T {
        &self.value
    }
}

impl<T: SszHash> Hc<T> {
    pub fn hash_tree_root(&self) -> H256 {
        *self.root.get_or_init(|| self.value.hash_tree_root())
    }
}

impl<T> From<T> for Hc<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Deref for Hc<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Clone> Clone for Hc<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            root: self.root.clone(),
        }
    }
}

impl<T: PartialEq> PartialEq for Hc<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for Hc<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_root_matches_direct_hash() {
        let value = 42_u64;
        let wrapped = Hc::new(value);

        assert_eq!(wrapped.hash_tree_root(), value.hash_tree_root());
        // The second call hits the cache.
        assert_eq!(wrapped.hash_tree_root(), value.hash_tree_root());
    }

    #[test]
    fn preset_root_wins_over_computation() {
        let root = H256::repeat_byte(9);
        let wrapped = Hc::with_root(42_u64, root);

        assert_eq!(wrapped.hash_tree_root(), root);
    }
}
