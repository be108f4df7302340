//! The pool aggregate: participant ledgers, registry, delegation map and the
//! fixed-size header, together with every user-facing operation.
//!
//! Every operation validates first, talks to the stake engine second and only
//! then commits, so a failed operation leaves the pool untouched.

use std::collections::HashMap;

use solana_program::{msg, pubkey::Pubkey};

use crate::delegation::{self, Delegation, DelegationMap};
use crate::error::PoolError;
use crate::event::PoolEvent;
use crate::ledger::{Participant, MAX_QUEUE_LEN};
use crate::registry::{Registry, NO_NODE};
use crate::stake_engine::{engine_call, StakeEngine};
use crate::state::{DistributionPhase, PoolConfig, PoolHeader};

/// Observer run after a transfer has been committed.
///
/// The hook sees the post-transfer pool. Returning an error undoes the
/// transfer and makes it fail with `TransferRejected`.
pub trait TransferHook {
    fn on_transfer(
        &mut self,
        pool: &Pool,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
        data: &[u8],
    ) -> Result<(), PoolError>;
}

/// Snapshot of the pool-wide totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolTotals {
    pub total_supply: u64,
    pub total_staked: u64,
    pub total_delegated: u64,
    pub pending_rewards: u64,
    pub undistributed_rewards: u64,
    pub holders: usize,
}

#[derive(Debug, Clone)]
pub struct Pool {
    pub(crate) header: PoolHeader,
    pub(crate) registry: Registry,
    pub(crate) delegation_map: DelegationMap,
    pub(crate) participants: HashMap<Pubkey, Participant>,
}

impl Pool {
    /// Create a pool in the engine's current epoch.
    pub fn new(config: PoolConfig, engine: &impl StakeEngine) -> Result<Self, PoolError> {
        if config.iteration_limit == 0 {
            return Err(PoolError::InvalidConfig);
        }
        let epoch = engine_call("epoch_info", engine.epoch_info())?;
        msg!(
            "Pool created: owner={} epoch_start={}",
            config.owner,
            epoch.epoch_start_height
        );
        Ok(Self {
            header: PoolHeader::new(&config, epoch.epoch_start_height),
            registry: Registry::new(),
            delegation_map: DelegationMap::new(),
            participants: HashMap::new(),
        })
    }

    // ── Queries ──

    pub fn header(&self) -> &PoolHeader {
        &self.header
    }

    pub fn participant(&self, key: &Pubkey) -> Option<&Participant> {
        self.participants.get(key)
    }

    /// Registered participants in registry order.
    pub fn holders(&self) -> Vec<Pubkey> {
        self.registry.iter().map(|(_, key)| *key).collect()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn delegations(&self) -> &DelegationMap {
        &self.delegation_map
    }

    pub fn totals(&self) -> PoolTotals {
        PoolTotals {
            total_supply: self.header.total_supply,
            total_staked: self.header.total_staked,
            total_delegated: self.delegation_map.total(),
            pending_rewards: self.header.pending_rewards,
            undistributed_rewards: self.header.undistributed_rewards,
            holders: self.registry.len(),
        }
    }

    pub fn owner(&self) -> Pubkey {
        self.header.owner_pubkey()
    }

    pub fn iteration_limit(&self) -> u64 {
        self.header.iteration_limit
    }

    pub fn min_holding(&self) -> u64 {
        self.header.min_holding
    }

    pub fn pool_cap(&self) -> u64 {
        self.header.pool_cap
    }

    pub fn phase(&self) -> Result<DistributionPhase, PoolError> {
        self.header.phase()
    }

    pub fn is_paused(&self) -> bool {
        self.header.is_paused()
    }

    fn ensure_not_paused(&self) -> Result<(), PoolError> {
        if self.header.is_paused() {
            return Err(PoolError::Paused);
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), PoolError> {
        if self.header.phase()? != DistributionPhase::Idle {
            return Err(PoolError::DistributionInProgress);
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: &Pubkey) -> Result<(), PoolError> {
        if *caller != self.header.owner_pubkey() {
            msg!("Unauthorized: {} is not the pool owner", caller);
            return Err(PoolError::Unauthorized);
        }
        Ok(())
    }

    // ── Join ──

    /// Deposit `amount` for `participant`, staking and delegating it now.
    ///
    /// `delegations` is an explicit validator split that must sum to `amount`;
    /// `None` follows the pool's current delegation (or the default validator
    /// while the pool has none).
    pub fn join(
        &mut self,
        engine: &mut impl StakeEngine,
        participant: &Pubkey,
        amount: u64,
        delegations: Option<&[Delegation]>,
    ) -> Result<PoolEvent, PoolError> {
        self.ensure_not_paused()?;
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if amount < self.header.min_holding {
            return Err(PoolError::BelowMinimumJoin);
        }
        if !self.header.within_cap(amount) {
            msg!(
                "Join of {} exceeds pool cap {} (staked {})",
                amount,
                self.header.pool_cap,
                self.header.total_staked
            );
            return Err(PoolError::PoolCapExceeded);
        }
        let queued = self
            .participants
            .get(participant)
            .map(|p| p.join_queue.len())
            .unwrap_or(0);
        if queued >= MAX_QUEUE_LEN {
            return Err(PoolError::SpamLimitExceeded);
        }

        let pairs = match delegations {
            Some(request) => {
                let pairs = delegation::normalize(request)?;
                if delegation::sum(&pairs)? != amount {
                    return Err(PoolError::DelegationSumMismatch);
                }
                let recognized = engine_call("validators", engine.validators())?;
                self.delegation_map.check_validators(&pairs, &recognized)?;
                pairs
            }
            None => match self.delegation_map.proportional_split(amount)? {
                Some(split) => split,
                None => vec![Delegation::new(self.header.default_validator_pubkey(), amount)],
            },
        };

        let epoch = engine_call("epoch_info", engine.epoch_info())?;
        let unlock_height = epoch.join_unlock_height().ok_or(PoolError::Overflow)?;

        let mut ledger = self.participants.get(participant).cloned().unwrap_or_default();
        ledger.join(amount, unlock_height, &pairs)?;
        let mut map = self.delegation_map.clone();
        map.add_all(&pairs)?;
        let total_staked = self
            .header
            .total_staked
            .checked_add(amount)
            .ok_or(PoolError::Overflow)?;

        // Mid-walk the map carries rewards the engine has not seen yet, so the
        // engine's own delegation is the base for the new list.
        let engine_list = if self.header.phase()? == DistributionPhase::Idle {
            map.rebuild_delegation_list().0
        } else {
            let mut list = engine_call("delegation", engine.delegation())?.delegations;
            for d in &pairs {
                delegation::merge_into(&mut list, d.validator, d.amount)?;
            }
            list
        };
        engine_call("set_staked_amount", engine.set_staked_amount(total_staked))?;
        engine_call("set_delegation", engine.set_delegation(&engine_list))?;

        if !ledger.is_registered() {
            ledger.registry_node = self.registry.append(*participant)?;
        }
        self.participants.insert(*participant, ledger);
        self.delegation_map = map;
        self.header.total_staked = total_staked;

        Ok(PoolEvent::Joined {
            participant: *participant,
            amount,
            unlock_height,
            delegations: pairs,
        })
    }

    // ── Leave / claim ──

    /// Queue a withdrawal of `amount`. The next epoch distribution resolves it.
    pub fn request_leave(&mut self, participant: &Pubkey, amount: u64) -> Result<PoolEvent, PoolError> {
        self.ensure_not_paused()?;
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let mut ledger = self
            .participants
            .get(participant)
            .cloned()
            .ok_or(PoolError::InsufficientBalance)?;
        ledger.request_leave(amount)?;

        if !ledger.is_registered() {
            ledger.registry_node = self.registry.append(*participant)?;
        }
        self.participants.insert(*participant, ledger);

        Ok(PoolEvent::LeaveRequested {
            participant: *participant,
            amount,
        })
    }

    /// Pay out every matured withdrawal.
    pub fn claim(&mut self, engine: &mut impl StakeEngine, participant: &Pubkey) -> Result<PoolEvent, PoolError> {
        let height = engine_call("epoch_info", engine.epoch_info())?.current_height;
        let amount = self
            .participants
            .get(participant)
            .map(|p| p.claimable(height))
            .unwrap_or(0);

        if amount > 0 {
            engine_call("send", engine.send(participant, amount))?;
            if let Some(ledger) = self.participants.get_mut(participant) {
                ledger.claim(height);
            }
        }

        Ok(PoolEvent::Claimed {
            participant: *participant,
            amount,
        })
    }

    // ── Transfer ──

    /// Move `amount` of settled balance, with its delegation, from `from` to
    /// `to`.
    pub fn transfer(
        &mut self,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
        data: &[u8],
        hook: Option<&mut dyn TransferHook>,
    ) -> Result<PoolEvent, PoolError> {
        self.ensure_idle()?;
        self.ensure_not_paused()?;
        if *to == Pubkey::default() {
            return Err(PoolError::InvalidRecipient);
        }
        let event = PoolEvent::Transferred {
            from: *from,
            to: *to,
            amount,
        };
        let available = self.participants.get(from).map(|p| p.available()).unwrap_or(0);
        if amount > available {
            return Err(PoolError::InsufficientBalance);
        }
        if amount == 0 || from == to {
            return Ok(event);
        }

        let sender_before = self
            .participants
            .get(from)
            .cloned()
            .ok_or(PoolError::InsufficientBalance)?;
        let recipient_before = self.participants.get(to).cloned();

        let mut sender = sender_before.clone();
        let moved = sender.withdraw_delegations(amount)?;
        sender.balance -= amount;

        let mut recipient = recipient_before.clone().unwrap_or_default();
        recipient.receive_delegations(&moved)?;
        recipient.balance = recipient.balance.checked_add(amount).ok_or(PoolError::Overflow)?;

        let min_holding = self.header.min_holding;
        let appended = if !recipient.is_registered() && recipient.balance >= min_holding {
            let node = self.registry.append(*to)?;
            recipient.registry_node = node;
            Some(node)
        } else {
            None
        };
        let removed = if sender.is_registered() && sender.below_holding_threshold(min_holding) {
            let node = sender.registry_node;
            self.registry.remove(node)?;
            sender.registry_node = NO_NODE;
            Some(node)
        } else {
            None
        };

        self.participants.insert(*from, sender);
        self.participants.insert(*to, recipient);

        if let Some(hook) = hook {
            if let Err(e) = hook.on_transfer(self, from, to, amount, data) {
                msg!("Transfer {} -> {} rejected by hook: {}", from, to, e);
                if let Some(node) = appended {
                    self.registry.remove(node)?;
                }
                if let Some(node) = removed {
                    self.registry.reinsert(node, *from)?;
                }
                self.participants.insert(*from, sender_before);
                match recipient_before {
                    Some(previous) => {
                        self.participants.insert(*to, previous);
                    }
                    None => {
                        self.participants.remove(to);
                    }
                }
                return Err(PoolError::TransferRejected);
            }
        }

        Ok(event)
    }

    // ── Vote ──

    /// Replace the participant's whole delegation with `delegations`, which
    /// must add up to the participant's balance plus locked joins.
    pub fn vote(
        &mut self,
        engine: &mut impl StakeEngine,
        participant: &Pubkey,
        delegations: &[Delegation],
    ) -> Result<PoolEvent, PoolError> {
        self.ensure_idle()?;
        self.ensure_not_paused()?;
        let ledger = self
            .participants
            .get(participant)
            .ok_or(PoolError::InsufficientBalance)?;

        let pairs = delegation::normalize(delegations)?;
        if delegation::sum(&pairs)? != ledger.holding() {
            return Err(PoolError::DelegationSumMismatch);
        }
        let recognized = engine_call("validators", engine.validators())?;
        self.delegation_map.check_validators(&pairs, &recognized)?;

        let mut map = self.delegation_map.clone();
        map.sub_all(ledger.delegations())?;
        map.add_all(&pairs)?;
        let (list, _) = map.rebuild_delegation_list();
        engine_call("set_delegation", engine.set_delegation(&list))?;

        if let Some(ledger) = self.participants.get_mut(participant) {
            ledger.replace_delegations(pairs.clone());
        }
        self.delegation_map = map;

        Ok(PoolEvent::Voted {
            participant: *participant,
            delegations: pairs,
        })
    }

    // ── Owner configuration ──

    /// Change any subset of the policy knobs. Owner only.
    pub fn update_config(
        &mut self,
        caller: &Pubkey,
        iteration_limit: Option<u64>,
        min_holding: Option<u64>,
        pool_cap: Option<u64>,
    ) -> Result<PoolEvent, PoolError> {
        self.ensure_owner(caller)?;
        if iteration_limit == Some(0) {
            return Err(PoolError::InvalidConfig);
        }
        // The walk decides reward eligibility and registry removal from it
        if min_holding.is_some() {
            self.ensure_idle()?;
        }
        if let Some(limit) = iteration_limit {
            self.header.iteration_limit = limit;
        }
        if let Some(min) = min_holding {
            self.header.min_holding = min;
        }
        if let Some(cap) = pool_cap {
            self.header.pool_cap = cap;
        }
        Ok(PoolEvent::ConfigUpdated {
            iteration_limit: self.header.iteration_limit,
            min_holding: self.header.min_holding,
            pool_cap: self.header.pool_cap,
        })
    }

    pub fn set_iteration_limit(&mut self, caller: &Pubkey, limit: u64) -> Result<PoolEvent, PoolError> {
        self.update_config(caller, Some(limit), None, None)
    }

    pub fn set_min_holding(&mut self, caller: &Pubkey, min_holding: u64) -> Result<PoolEvent, PoolError> {
        self.update_config(caller, None, Some(min_holding), None)
    }

    pub fn set_pool_cap(&mut self, caller: &Pubkey, cap: u64) -> Result<PoolEvent, PoolError> {
        self.update_config(caller, None, None, Some(cap))
    }

    pub fn set_paused(&mut self, caller: &Pubkey, paused: bool) -> Result<PoolEvent, PoolError> {
        self.ensure_owner(caller)?;
        self.header.paused = paused as u8;
        Ok(PoolEvent::PauseChanged { paused })
    }

    // ── Invariants ──

    /// Verify the ledger, registry and delegation invariants.
    ///
    /// Supply and stake conservation are only checked while idle. Mid-walk the
    /// header totals catch up with the participants at finalization.
    pub fn check_invariants(&self) -> Result<(), PoolError> {
        if self.header.is_initialized != 1 {
            msg!("Invariant: pool header is not initialized");
            return Err(PoolError::InvariantViolation);
        }
        let mut supply: u64 = 0;
        let mut per_validator = DelegationMap::new();

        for (key, p) in &self.participants {
            let locked: u64 = p.join_queue.iter().map(|e| e.amount).sum();
            let unstaking: u64 = p.leave_queue.iter().map(|e| e.amount).sum();
            if locked != p.locked || unstaking != p.unstaking {
                msg!("Invariant: queue totals of {} out of sync", key);
                return Err(PoolError::InvariantViolation);
            }
            if p.leave_queue
                .iter()
                .skip_while(|e| e.unstake_height.is_some())
                .any(|e| e.unstake_height.is_some())
            {
                msg!("Invariant: resolved leaves of {} are not a prefix", key);
                return Err(PoolError::InvariantViolation);
            }
            if delegation::sum(&p.delegations)? != p.holding() {
                msg!("Invariant: delegation vector of {} != balance + locked", key);
                return Err(PoolError::InvariantViolation);
            }
            let node = self.registry.node_of(key).unwrap_or(NO_NODE);
            if node != p.registry_node {
                msg!("Invariant: registry node of {} out of sync", key);
                return Err(PoolError::InvariantViolation);
            }
            supply = supply.checked_add(p.balance).ok_or(PoolError::Overflow)?;
            per_validator.add_all(&p.delegations)?;
        }

        if self.registry.iter().any(|(_, key)| !self.participants.contains_key(key)) {
            return Err(PoolError::InvariantViolation);
        }
        if per_validator != self.delegation_map {
            msg!("Invariant: delegation map != sum of participant vectors");
            return Err(PoolError::InvariantViolation);
        }
        if self.header.phase()? == DistributionPhase::Idle
            && (supply != self.header.total_supply || self.delegation_map.total() != self.header.total_staked)
        {
            msg!(
                "Invariant: supply {} / {} staked {} / {}",
                supply,
                self.header.total_supply,
                self.delegation_map.total(),
                self.header.total_staked
            );
            return Err(PoolError::InvariantViolation);
        }
        Ok(())
    }

    /// Compare the pool's books with what the stake engine reports.
    ///
    /// Only meaningful while idle: a walk or a failed finalization leaves the
    /// engine on the previous epoch's stake until finalization succeeds.
    pub fn check_engine(&self, engine: &impl StakeEngine) -> Result<(), PoolError> {
        if self.header.phase()? != DistributionPhase::Idle {
            return Err(PoolError::DistributionInProgress);
        }
        let staked = engine_call("staked_amount", engine.staked_amount())?;
        let delegated = engine_call("delegation", engine.delegation())?.total_delegated;
        if staked != self.header.total_staked || delegated != self.delegation_map.total() {
            msg!(
                "Invariant: engine staked {} delegated {} / pool staked {} delegated {}",
                staked,
                delegated,
                self.header.total_staked,
                self.delegation_map.total()
            );
            return Err(PoolError::InvariantViolation);
        }
        Ok(())
    }
}
