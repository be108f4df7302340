//! Ordered registry of active participants.
//!
//! Node ids are handed out from a monotonically increasing counter and new
//! nodes are always linked after the tail, so id order *is* list order. That
//! lets a cursor survive removals: removing other nodes never shifts an id,
//! and a cursor whose own node was removed can still resume from the first
//! live id after it ([`Registry::successor`]).

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

use solana_program::pubkey::Pubkey;

use crate::error::PoolError;

pub type NodeId = u64;

/// Id meaning "not in the registry" / "no cursor".
pub const NO_NODE: NodeId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    nodes: BTreeMap<NodeId, Pubkey>,
    index: HashMap<Pubkey, NodeId>,
    last_id: NodeId,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            index: HashMap::new(),
            last_id: NO_NODE,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Link `participant` after the tail and return its new node id.
    pub fn append(&mut self, participant: Pubkey) -> Result<NodeId, PoolError> {
        if self.index.contains_key(&participant) {
            return Err(PoolError::AlreadyRegistered);
        }
        let id = self.last_id.checked_add(1).ok_or(PoolError::Overflow)?;
        self.last_id = id;
        self.nodes.insert(id, participant);
        self.index.insert(participant, id);
        Ok(id)
    }

    /// Splice `node` out of the list.
    pub fn remove(&mut self, node: NodeId) -> Result<Pubkey, PoolError> {
        let participant = self.nodes.remove(&node).ok_or(PoolError::NodeNotFound)?;
        self.index.remove(&participant);
        Ok(participant)
    }

    /// Put `participant` back at `node`, an id this registry handed out
    /// earlier. Used to undo a removal without losing the list position.
    pub fn reinsert(&mut self, node: NodeId, participant: Pubkey) -> Result<(), PoolError> {
        if node == NO_NODE || node > self.last_id {
            return Err(PoolError::NodeNotFound);
        }
        if self.nodes.contains_key(&node) || self.index.contains_key(&participant) {
            return Err(PoolError::AlreadyRegistered);
        }
        self.nodes.insert(node, participant);
        self.index.insert(participant, node);
        Ok(())
    }

    pub fn get(&self, node: NodeId) -> Option<&Pubkey> {
        self.nodes.get(&node)
    }

    pub fn node_of(&self, participant: &Pubkey) -> Option<NodeId> {
        self.index.get(participant).copied()
    }

    pub fn contains(&self, participant: &Pubkey) -> bool {
        self.index.contains_key(participant)
    }

    pub fn head(&self) -> Option<NodeId> {
        self.nodes.keys().next().copied()
    }

    pub fn tail(&self) -> Option<NodeId> {
        self.nodes.keys().next_back().copied()
    }

    /// Node linked after `node`, `Ok(None)` at the end of the list.
    ///
    /// Fails with `NodeNotFound` if `node` is not (or no longer) in the list.
    pub fn next(&self, node: NodeId) -> Result<Option<NodeId>, PoolError> {
        if !self.nodes.contains_key(&node) {
            return Err(PoolError::NodeNotFound);
        }
        Ok(self.successor(node))
    }

    /// First live node after position `node`, whether or not `node` itself is
    /// still linked. This is how a resumed walk steps over a gap.
    pub fn successor(&self, node: NodeId) -> Option<NodeId> {
        self.nodes
            .range((Excluded(node), Unbounded))
            .next()
            .map(|(id, _)| *id)
    }

    /// Participants in list order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Pubkey)> {
        self.nodes.iter().map(|(id, p)| (*id, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    fn registry_of(n: u8) -> Registry {
        let mut r = Registry::new();
        for i in 1..=n {
            r.append(key(i)).unwrap();
        }
        r
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let mut r = Registry::new();
        assert_eq!(r.append(key(1)).unwrap(), 1);
        assert_eq!(r.append(key(2)).unwrap(), 2);
        assert_eq!(r.head(), Some(1));
        assert_eq!(r.tail(), Some(2));
    }

    #[test]
    fn test_append_duplicate_rejected() {
        let mut r = registry_of(1);
        assert_eq!(r.append(key(1)), Err(PoolError::AlreadyRegistered));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut r = registry_of(3);
        r.remove(3).unwrap();
        assert_eq!(r.append(key(9)).unwrap(), 4);
    }

    #[test]
    fn test_remove_middle_relinks() {
        let mut r = registry_of(3);
        assert_eq!(r.remove(2).unwrap(), key(2));
        assert_eq!(r.next(1).unwrap(), Some(3));
        assert!(!r.contains(&key(2)));
        assert_eq!(r.node_of(&key(3)), Some(3));
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut r = registry_of(3);
        r.remove(1).unwrap();
        r.remove(3).unwrap();
        assert_eq!(r.head(), Some(2));
        assert_eq!(r.tail(), Some(2));
        assert_eq!(r.next(2).unwrap(), None);
    }

    #[test]
    fn test_remove_missing_node() {
        let mut r = registry_of(1);
        assert_eq!(r.remove(7), Err(PoolError::NodeNotFound));
    }

    #[test]
    fn test_next_on_removed_node_fails() {
        let mut r = registry_of(3);
        r.remove(2).unwrap();
        assert_eq!(r.next(2), Err(PoolError::NodeNotFound));
    }

    #[test]
    fn test_successor_steps_over_gap() {
        let mut r = registry_of(4);
        r.remove(2).unwrap();
        r.remove(3).unwrap();
        assert_eq!(r.successor(2), Some(4));
        assert_eq!(r.successor(4), None);
    }

    #[test]
    fn test_cursor_survives_other_removals() {
        let mut r = registry_of(5);
        let cursor = 3;
        r.remove(1).unwrap();
        r.remove(5).unwrap();
        assert_eq!(r.get(cursor), Some(&key(3)));
        assert_eq!(r.next(cursor).unwrap(), Some(4));
    }

    #[test]
    fn test_iter_in_insertion_order() {
        let mut r = registry_of(3);
        r.remove(1).unwrap();
        r.append(key(1)).unwrap();
        let order: Vec<Pubkey> = r.iter().map(|(_, p)| *p).collect();
        assert_eq!(order, vec![key(2), key(3), key(1)]);
    }

    #[test]
    fn test_reinsert_restores_position() {
        let mut r = registry_of(3);
        r.remove(2).unwrap();
        r.reinsert(2, key(2)).unwrap();
        let order: Vec<Pubkey> = r.iter().map(|(_, p)| *p).collect();
        assert_eq!(order, vec![key(1), key(2), key(3)]);
        assert_eq!(r.reinsert(2, key(9)), Err(PoolError::AlreadyRegistered));
        assert_eq!(r.reinsert(7, key(9)), Err(PoolError::NodeNotFound));
    }

    #[test]
    fn test_empty_registry() {
        let r = Registry::new();
        assert!(r.is_empty());
        assert_eq!(r.head(), None);
        assert_eq!(r.tail(), None);
    }
}
