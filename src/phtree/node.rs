use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use super::bits::{hc_address, highest_difference, mask_above, mask_at_and_below, same_prefix};

/// A slot of a node: a stored entry or a sub-node.
#[derive(Debug, Clone)]
pub(crate) enum Child<T> {
    Entry { key: Box<[u64]>, value: T },
    Node(Box<PhNode<T>>),
}

/// A trie node splitting its keys on one bit of every dimension.
///
/// All keys below the node agree on every bit above `bit`; those bits are
/// kept in `prefix`, which also carries the infix shared with the parent.
/// Children are addressed by the hypercube address of their keys at `bit`.
#[derive(Debug, Clone)]
pub(crate) struct PhNode<T> {
    pub(crate) bit: u32,
    pub(crate) prefix: Box<[u64]>,
    pub(crate) children: BTreeMap<u64, Child<T>>,
}

/// What happened to a slot during removal.
pub(crate) struct Removed<T> {
    pub(crate) value: T,
    pub(crate) nodes_freed: usize,
}

impl<T> PhNode<T> {
    pub(crate) fn new(bit: u32, key: &[u64]) -> Self {
        let mask = mask_above(bit);
        Self { bit, prefix: key.iter().map(|k| k & mask).collect(), children: BTreeMap::new() }
    }

    /// Smallest and largest key in the region of the node, per dimension.
    pub(crate) fn region(&self) -> (Vec<u64>, Vec<u64>) {
        let low = mask_at_and_below(self.bit);
        (self.prefix.to_vec(), self.prefix.iter().map(|p| p | low).collect())
    }

    pub(crate) fn get(&self, key: &[u64]) -> Option<&T> {
        match self.children.get(&hc_address(key, self.bit))? {
            Child::Entry { key: stored, value } => (**stored == *key).then_some(value),
            Child::Node(sub) => same_prefix(key, &sub.prefix, sub.bit).then(|| sub.get(key)).flatten(),
        }
    }

    pub(crate) fn get_mut(&mut self, key: &[u64]) -> Option<&mut T> {
        match self.children.get_mut(&hc_address(key, self.bit))? {
            Child::Entry { key: stored, value } => (**stored == *key).then_some(value),
            Child::Node(sub) => {
                if same_prefix(key, &sub.prefix, sub.bit) {
                    sub.get_mut(key)
                } else {
                    None
                }
            }
        }
    }

    /// Stores `value` under `key`, returning the replaced value and the
    /// number of nodes created.
    pub(crate) fn put(&mut self, key: &[u64], value: T) -> (Option<T>, usize) {
        let hc = hc_address(key, self.bit);
        let Some(slot) = self.children.get_mut(&hc) else {
            let _ = self.children.insert(hc, Child::Entry { key: key.into(), value });
            return (None, 0);
        };

        let diverging = match slot {
            Child::Entry { key: stored, value: old } => match highest_difference(stored, key) {
                None => return (Some(std::mem::replace(old, value)), 0),
                Some(bit) => bit,
            },
            Child::Node(sub) => {
                if same_prefix(key, &sub.prefix, sub.bit) {
                    return sub.put(key, value);
                }
                // the key leaves the sub-node inside its infix
                highest_difference(&sub.prefix, key).map_or(sub.bit, |bit| bit.max(sub.bit + 1))
            }
        };

        debug_assert!(diverging < self.bit, "keys below a node share its prefix");
        let mut split = PhNode::new(diverging, key);
        let existing = self.children.remove(&hc).map(|child| {
            let at = match &child {
                Child::Entry { key, .. } => hc_address(key, diverging),
                Child::Node(sub) => hc_address(&sub.prefix, diverging),
            };
            (at, child)
        });
        if let Some((at, child)) = existing {
            let _ = split.children.insert(at, child);
        }
        let _ = split.children.insert(hc_address(key, diverging), Child::Entry { key: key.into(), value });
        let _ = self.children.insert(hc, Child::Node(Box::new(split)));
        (None, 1)
    }

    /// Removes `key`; a sub-node left with a single child is replaced by
    /// that child.
    pub(crate) fn remove(&mut self, key: &[u64]) -> Option<Removed<T>> {
        let Entry::Occupied(mut slot) = self.children.entry(hc_address(key, self.bit)) else {
            return None;
        };
        let mut removed = match slot.get_mut() {
            Child::Entry { key: stored, .. } => {
                if **stored != *key {
                    return None;
                }
                let Child::Entry { value, .. } = slot.remove() else {
                    return None;
                };
                return Some(Removed { value, nodes_freed: 0 });
            }
            Child::Node(sub) => {
                if !same_prefix(key, &sub.prefix, sub.bit) {
                    return None;
                }
                sub.remove(key)?
            }
        };

        if let Child::Node(sub) = slot.get_mut() {
            if sub.children.len() == 1 {
                if let Some((_, only)) = sub.children.pop_first() {
                    let _ = slot.insert(only);
                    removed.nodes_freed += 1;
                }
            }
        }
        Some(removed)
    }

    pub(crate) fn count_nodes(&self) -> usize {
        1 + self
            .children
            .values()
            .map(|child| match child {
                Child::Entry { .. } => 0,
                Child::Node(sub) => sub.count_nodes(),
            })
            .sum::<usize>()
    }
}
