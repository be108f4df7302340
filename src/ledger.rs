//! Per-participant ledger.
//!
//! Invariants kept by every method here:
//! - `sum(join_queue.amount) == locked`
//! - `sum(leave_queue.amount) == unstaking`
//! - resolved leave entries (those with an unstake height) form a prefix of
//!   the leave queue
//!
//! The pool keeps `sum(delegations) == balance + locked` by pairing every
//! ledger change with the matching delegation change.

use std::collections::VecDeque;

use solana_program::pubkey::Pubkey;

use crate::delegation::{self, Delegation};
use crate::error::PoolError;
use crate::math;
use crate::registry::{NodeId, NO_NODE};

/// Anti-spam bound on each of the join and leave queues.
pub const MAX_QUEUE_LEN: usize = 10;

/// A join contribution waiting for its unlock height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinEntry {
    pub amount: u64,
    pub unlock_height: u64,
}

/// A leave request. `unstake_height` is `None` until the request is resolved
/// by an epoch distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveEntry {
    pub amount: u64,
    pub unstake_height: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participant {
    pub(crate) balance: u64,
    pub(crate) locked: u64,
    pub(crate) unstaking: u64,
    pub(crate) join_queue: VecDeque<JoinEntry>,
    pub(crate) leave_queue: VecDeque<LeaveEntry>,
    pub(crate) delegations: Vec<Delegation>,
    pub(crate) registry_node: NodeId,
}

impl Participant {
    /// Settled pool-share balance (principal + rewards, excluding locked joins).
    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn locked(&self) -> u64 {
        self.locked
    }

    pub fn unstaking(&self) -> u64 {
        self.unstaking
    }

    /// Balance plus locked joins. The delegation vector must add up to this.
    pub fn holding(&self) -> u64 {
        self.balance.saturating_add(self.locked)
    }

    pub fn join_queue(&self) -> &VecDeque<JoinEntry> {
        &self.join_queue
    }

    pub fn leave_queue(&self) -> &VecDeque<LeaveEntry> {
        &self.leave_queue
    }

    pub fn delegations(&self) -> &[Delegation] {
        &self.delegations
    }

    pub fn delegation_to(&self, validator: &Pubkey) -> u64 {
        self.delegations
            .iter()
            .find(|d| d.validator == *validator)
            .map(|d| d.amount)
            .unwrap_or(0)
    }

    pub fn registry_node(&self) -> NodeId {
        self.registry_node
    }

    pub fn is_registered(&self) -> bool {
        self.registry_node != NO_NODE
    }

    /// Sum of leave requests not yet stamped with an unstake height.
    pub fn pending_leave(&self) -> u64 {
        self.leave_queue
            .iter()
            .filter(|e| e.unstake_height.is_none())
            .map(|e| e.amount)
            .sum()
    }

    /// Balance that may still be transferred or requested for leave.
    pub fn available(&self) -> u64 {
        self.balance.saturating_sub(self.pending_leave())
    }

    /// Whether the participant no longer needs to be visited by the epoch walk.
    pub fn below_holding_threshold(&self, min_holding: u64) -> bool {
        self.join_queue.is_empty() && self.pending_leave() == 0 && self.balance < min_holding
    }

    /// Queue a join of `amount` (unlocking at `unlock_height`) delegated as
    /// `pairs`. The caller has checked that `pairs` sums to `amount`.
    pub fn join(&mut self, amount: u64, unlock_height: u64, pairs: &[Delegation]) -> Result<(), PoolError> {
        if self.join_queue.len() >= MAX_QUEUE_LEN {
            return Err(PoolError::SpamLimitExceeded);
        }
        let locked = self.locked.checked_add(amount).ok_or(PoolError::Overflow)?;
        let mut vector = self.delegations.clone();
        for d in pairs {
            delegation::merge_into(&mut vector, d.validator, d.amount)?;
        }

        self.join_queue.push_back(JoinEntry { amount, unlock_height });
        self.locked = locked;
        self.delegations = vector;
        Ok(())
    }

    /// Only unresolved requests count towards the queue cap; resolved ones
    /// wait for `claim` without blocking new requests.
    pub fn request_leave(&mut self, amount: u64) -> Result<(), PoolError> {
        let unresolved = self
            .leave_queue
            .iter()
            .filter(|e| e.unstake_height.is_none())
            .count();
        if unresolved >= MAX_QUEUE_LEN {
            return Err(PoolError::SpamLimitExceeded);
        }
        if amount > self.available() {
            return Err(PoolError::InsufficientBalance);
        }
        let unstaking = self.unstaking.checked_add(amount).ok_or(PoolError::Overflow)?;

        self.leave_queue.push_back(LeaveEntry { amount, unstake_height: None });
        self.unstaking = unstaking;
        Ok(())
    }

    /// Stamp every unresolved leave request with
    /// `current_height + unstake_period + margin` and return their sum.
    pub fn leave(&mut self, current_height: u64, unstake_period: u64, margin: u64) -> Result<u64, PoolError> {
        let unstake_height = current_height
            .checked_add(unstake_period)
            .and_then(|h| h.checked_add(margin))
            .ok_or(PoolError::Overflow)?;

        let mut resolved = 0u64;
        for entry in self.leave_queue.iter_mut().filter(|e| e.unstake_height.is_none()) {
            entry.unstake_height = Some(unstake_height);
            resolved += entry.amount;
        }
        Ok(resolved)
    }

    /// Pop every join whose unlock height is at or before `epoch_boundary`.
    /// Stops at the first entry still locked.
    pub fn unlock(&mut self, epoch_boundary: u64) -> u64 {
        let mut unlocked = 0;
        while let Some(entry) = self.join_queue.front() {
            if entry.unlock_height > epoch_boundary {
                break;
            }
            self.locked -= entry.amount;
            unlocked += entry.amount;
            self.join_queue.pop_front();
        }
        unlocked
    }

    /// What [`Participant::claim`] would pay at `current_height`.
    pub fn claimable(&self, current_height: u64) -> u64 {
        self.leave_queue
            .iter()
            .take_while(|e| matches!(e.unstake_height, Some(h) if h <= current_height))
            .map(|e| e.amount)
            .sum()
    }

    /// Pop every resolved leave whose unstake height has passed.
    pub fn claim(&mut self, current_height: u64) -> u64 {
        let mut claimed = 0;
        while let Some(entry) = self.leave_queue.front() {
            match entry.unstake_height {
                Some(h) if h <= current_height => {
                    self.unstaking -= entry.amount;
                    claimed += entry.amount;
                    self.leave_queue.pop_front();
                }
                _ => break,
            }
        }
        claimed
    }

    fn weights(&self) -> Vec<u64> {
        self.delegations.iter().map(|d| d.amount).collect()
    }

    /// Grow every delegation entry pro-rata by a total of `amount` and return
    /// the per-validator increments (for mirroring into the pool map).
    pub fn distribute_delegations(&mut self, amount: u64) -> Result<Vec<Delegation>, PoolError> {
        if amount == 0 {
            return Ok(Vec::new());
        }
        let shares = math::split_growth(amount, &self.weights()).ok_or(PoolError::InvariantViolation)?;
        let mut deltas = Vec::with_capacity(shares.len());
        let mut vector = self.delegations.clone();
        for (entry, share) in vector.iter_mut().zip(shares) {
            if share == 0 {
                continue;
            }
            entry.amount = entry.amount.checked_add(share).ok_or(PoolError::Overflow)?;
            deltas.push(Delegation::new(entry.validator, share));
        }
        self.delegations = vector;
        Ok(deltas)
    }

    /// Shrink the delegation vector pro-rata by a total of `amount`, dropping
    /// entries that reach zero. Returns the per-validator decrements.
    pub fn withdraw_delegations(&mut self, amount: u64) -> Result<Vec<Delegation>, PoolError> {
        if amount == 0 {
            return Ok(Vec::new());
        }
        let shares = math::split_capped(amount, &self.weights()).ok_or(PoolError::InvariantViolation)?;
        let mut deltas = Vec::with_capacity(shares.len());
        for (entry, share) in self.delegations.iter_mut().zip(shares) {
            if share == 0 {
                continue;
            }
            entry.amount -= share;
            deltas.push(Delegation::new(entry.validator, share));
        }
        self.delegations.retain(|d| d.amount > 0);
        Ok(deltas)
    }

    /// Merge per-validator amounts into the vector (transfer recipient side).
    pub fn receive_delegations(&mut self, deltas: &[Delegation]) -> Result<(), PoolError> {
        let mut vector = self.delegations.clone();
        for d in deltas {
            delegation::merge_into(&mut vector, d.validator, d.amount)?;
        }
        self.delegations = vector;
        Ok(())
    }

    /// Swap in a whole new delegation vector, returning the old one.
    pub fn replace_delegations(&mut self, vector: Vec<Delegation>) -> Vec<Delegation> {
        std::mem::replace(&mut self.delegations, vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    fn joined(amount: u64, unlock: u64) -> Participant {
        let mut p = Participant::default();
        p.join(amount, unlock, &[Delegation::new(key(1), amount)]).unwrap();
        p
    }

    #[test]
    fn test_join_locks_and_delegates() {
        let p = joined(10, 100);
        assert_eq!(p.locked(), 10);
        assert_eq!(p.balance(), 0);
        assert_eq!(p.join_queue().len(), 1);
        assert_eq!(p.delegation_to(&key(1)), 10);
    }

    #[test]
    fn test_join_spam_limit() {
        let mut p = Participant::default();
        for _ in 0..MAX_QUEUE_LEN {
            p.join(1, 100, &[Delegation::new(key(1), 1)]).unwrap();
        }
        assert_eq!(
            p.join(1, 100, &[Delegation::new(key(1), 1)]),
            Err(PoolError::SpamLimitExceeded)
        );
        assert_eq!(p.locked(), MAX_QUEUE_LEN as u64);
        assert_eq!(p.delegation_to(&key(1)), MAX_QUEUE_LEN as u64);
    }

    #[test]
    fn test_unlock_respects_height() {
        let mut p = joined(10, 100);
        p.join(5, 200, &[Delegation::new(key(1), 5)]).unwrap();

        assert_eq!(p.unlock(99), 0);
        assert_eq!(p.unlock(100), 10);
        assert_eq!(p.locked(), 5);
        // Idempotent within the same boundary
        assert_eq!(p.unlock(100), 0);
        assert_eq!(p.unlock(250), 5);
        assert_eq!(p.locked(), 0);
        assert!(p.join_queue().is_empty());
    }

    #[test]
    fn test_request_leave_needs_available_balance() {
        let mut p = joined(10, 100);
        // Locked funds cannot leave
        assert_eq!(p.request_leave(1), Err(PoolError::InsufficientBalance));

        p.balance += p.unlock(100);
        p.request_leave(6).unwrap();
        assert_eq!(p.available(), 4);
        assert_eq!(p.request_leave(5), Err(PoolError::InsufficientBalance));
        p.request_leave(4).unwrap();
        assert_eq!(p.unstaking(), 10);
        assert_eq!(p.pending_leave(), 10);
    }

    #[test]
    fn test_leave_spam_limit() {
        let mut p = Participant { balance: 100, ..Default::default() };
        for _ in 0..MAX_QUEUE_LEN {
            p.request_leave(1).unwrap();
        }
        assert_eq!(p.request_leave(1), Err(PoolError::SpamLimitExceeded));
    }

    #[test]
    fn test_resolved_leaves_do_not_count_towards_cap() {
        let mut p = Participant { balance: 100, ..Default::default() };
        for _ in 0..MAX_QUEUE_LEN {
            p.request_leave(1).unwrap();
        }
        p.leave(1_000, 50, 0).unwrap();
        p.request_leave(1).unwrap();
        assert_eq!(p.leave_queue().len(), MAX_QUEUE_LEN + 1);
        assert_eq!(p.pending_leave(), 1);
    }

    #[test]
    fn test_leave_stamps_only_unresolved() {
        let mut p = Participant { balance: 100, ..Default::default() };
        p.request_leave(10).unwrap();
        assert_eq!(p.leave(1_000, 50, 5).unwrap(), 10);
        p.request_leave(20).unwrap();
        assert_eq!(p.leave(2_000, 50, 5).unwrap(), 20);
        assert_eq!(p.leave(3_000, 50, 5).unwrap(), 0);

        let heights: Vec<Option<u64>> = p.leave_queue().iter().map(|e| e.unstake_height).collect();
        assert_eq!(heights, vec![Some(1_055), Some(2_055)]);
    }

    #[test]
    fn test_claim_after_unstake_height() {
        let mut p = Participant { balance: 100, ..Default::default() };
        p.request_leave(10).unwrap();
        p.leave(1_000, 50, 0).unwrap();
        p.request_leave(7).unwrap();

        assert_eq!(p.claimable(1_049), 0);
        assert_eq!(p.claim(1_049), 0);
        assert_eq!(p.claimable(1_050), 10);
        assert_eq!(p.claim(1_050), 10);
        assert_eq!(p.unstaking(), 7);
        // Unresolved entry is never claimable
        assert_eq!(p.claim(u64::MAX), 0);
    }

    #[test]
    fn test_distribute_delegations_exact() {
        let mut p = Participant::default();
        p.join(10, 0, &[Delegation::new(key(1), 4), Delegation::new(key(2), 6)]).unwrap();
        let deltas = p.distribute_delegations(7).unwrap();
        assert_eq!(deltas.iter().map(|d| d.amount).sum::<u64>(), 7);
        assert_eq!(p.delegation_to(&key(1)) + p.delegation_to(&key(2)), 17);
    }

    #[test]
    fn test_withdraw_delegations_drops_empty_entries() {
        let mut p = Participant::default();
        p.join(10, 0, &[Delegation::new(key(1), 1), Delegation::new(key(2), 9)]).unwrap();
        let deltas = p.withdraw_delegations(10).unwrap();
        assert_eq!(deltas.len(), 2);
        assert!(p.delegations().is_empty());
    }

    #[test]
    fn test_withdraw_more_than_vector_fails() {
        let mut p = joined(10, 0);
        assert_eq!(p.withdraw_delegations(11), Err(PoolError::InvariantViolation));
        assert_eq!(p.delegation_to(&key(1)), 10);
    }

    #[test]
    fn test_receive_merges_into_vector() {
        let mut p = joined(10, 0);
        p.receive_delegations(&[Delegation::new(key(1), 3), Delegation::new(key(2), 2)]).unwrap();
        assert_eq!(p.delegation_to(&key(1)), 13);
        assert_eq!(p.delegation_to(&key(2)), 2);
    }

    #[test]
    fn test_below_holding_threshold() {
        let mut p = Participant { balance: 5, ..Default::default() };
        assert!(p.below_holding_threshold(10));
        assert!(!p.below_holding_threshold(5));
        p.request_leave(1).unwrap();
        assert!(!p.below_holding_threshold(10));
    }
}
