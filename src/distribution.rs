//! Epoch reward distribution.
//!
//! `Idle -> ClaimingRewards -> Walking -> Finalizing -> Idle`
//!
//! Each `distribute` call processes at most `iteration_limit` participants.
//! The walk position is a registry node id, so it survives registry changes
//! made between calls. The pool totals in the header are only updated by the
//! finalizing step, which is why reward shares are computed against the
//! pre-walk `total_supply` for every participant.

use solana_program::msg;

use crate::error::PoolError;
use crate::math;
use crate::pool::Pool;
use crate::registry::{NodeId, NO_NODE};
use crate::stake_engine::{engine_call, StakeEngine};
use crate::state::DistributionPhase;

/// Outcome of one `distribute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DistributionReport {
    /// Epoch start height being distributed for
    pub epoch_start: u64,
    /// Participants settled by this call
    pub processed: u64,
    /// Whether this call finalized the epoch
    pub completed: bool,
    /// Reward credited to participants over the whole walk (set on completion)
    pub rewards: u64,
    /// Joins unlocked over the whole walk (set on completion)
    pub unlocked: u64,
    /// Leave requests resolved over the whole walk (set on completion)
    pub unstaked: u64,
}

impl Pool {
    /// Run one bounded batch of the epoch distribution.
    ///
    /// Starts a new distribution when idle, otherwise continues the one in
    /// progress. Fails with `AlreadyDistributedThisEpoch` once the current
    /// epoch has been fully distributed.
    pub fn distribute(&mut self, engine: &mut impl StakeEngine) -> Result<DistributionReport, PoolError> {
        match self.header.phase()? {
            DistributionPhase::Idle => {
                self.begin_distribution(engine)?;
                self.walk(engine)
            }
            DistributionPhase::ClaimingRewards => {
                self.claim_rewards(engine)?;
                self.walk(engine)
            }
            DistributionPhase::Walking => self.walk(engine),
            DistributionPhase::Finalizing => {
                msg!("Distribute: retrying finalization");
                self.finalize(engine, 0)
            }
        }
    }

    fn begin_distribution(&mut self, engine: &mut impl StakeEngine) -> Result<(), PoolError> {
        let epoch = engine_call("epoch_info", engine.epoch_info())?;
        if self.header.last_distributed_epoch_start >= epoch.epoch_start_height {
            return Err(PoolError::AlreadyDistributedThisEpoch);
        }
        if self.registry.is_empty() {
            return Err(PoolError::EmptyPool);
        }

        self.header.distribution_epoch_start = epoch.epoch_start_height;
        self.header.set_phase(DistributionPhase::ClaimingRewards);
        if let Err(e) = self.claim_rewards(engine) {
            self.header.set_phase(DistributionPhase::Idle);
            return Err(e);
        }
        Ok(())
    }

    /// Claim this epoch's reward and point the cursor at the registry head.
    fn claim_rewards(&mut self, engine: &mut impl StakeEngine) -> Result<(), PoolError> {
        let estimate = engine_call("claimable_reward", engine.claimable_reward())?;
        if estimate > 0 {
            engine_call("claim_reward", engine.claim_reward())?;
        }
        let pending = estimate
            .checked_add(self.header.undistributed_rewards)
            .ok_or(PoolError::Overflow)?;

        self.header.pending_rewards = pending;
        self.header.undistributed_rewards = 0;
        self.header.distributed_rewards = 0;
        self.header.new_unlocked_total = 0;
        self.header.total_unstaked_in_epoch = 0;
        self.header.distribution_cursor = self.registry.head().unwrap_or(NO_NODE);
        self.header.set_phase(DistributionPhase::Walking);

        msg!(
            "Distribute: epoch_start={} pending_rewards={} holders={}",
            self.header.distribution_epoch_start,
            pending,
            self.registry.len()
        );
        Ok(())
    }

    /// Node the walk continues from: the cursor itself if still registered,
    /// else the first live node after it.
    fn resume_point(&self) -> Option<NodeId> {
        let cursor = self.header.distribution_cursor;
        if cursor == NO_NODE {
            return None;
        }
        if self.registry.get(cursor).is_some() {
            Some(cursor)
        } else {
            self.registry.successor(cursor)
        }
    }

    fn walk(&mut self, engine: &mut impl StakeEngine) -> Result<DistributionReport, PoolError> {
        let height = engine_call("epoch_info", engine.epoch_info())?.current_height;
        let unstake_period = engine_call("unstake_lock_period", engine.unstake_lock_period())?;

        let limit = self.header.iteration_limit;
        let mut processed = 0u64;
        let mut next = self.resume_point();
        while processed < limit {
            let Some(node) = next else { break };
            self.settle(node, height, unstake_period)?;
            next = self.registry.successor(node);
            processed += 1;
        }

        match next {
            Some(node) => {
                self.header.distribution_cursor = node;
                msg!("Distribute: processed={} resume_at={}", processed, node);
                Ok(DistributionReport {
                    epoch_start: self.header.distribution_epoch_start,
                    processed,
                    ..DistributionReport::default()
                })
            }
            None => {
                self.header.distribution_cursor = NO_NODE;
                self.header.set_phase(DistributionPhase::Finalizing);
                self.finalize(engine, processed)
            }
        }
    }

    /// Settle one participant for the epoch: reward, unlock, resolve leaves.
    fn settle(&mut self, node: NodeId, height: u64, unstake_period: u64) -> Result<(), PoolError> {
        let key = *self.registry.get(node).ok_or(PoolError::NodeNotFound)?;
        let mut ledger = self
            .participants
            .get(&key)
            .cloned()
            .ok_or(PoolError::InvariantViolation)?;

        let header = &self.header;
        let pre_reward_balance = ledger.balance;
        let reward = if pre_reward_balance >= header.min_holding && header.total_supply > 0 {
            let share = math::reward_share(header.pending_rewards, pre_reward_balance, header.total_supply)
                .ok_or(PoolError::Overflow)?;
            share.min(header.pending_rewards.saturating_sub(header.distributed_rewards))
        } else {
            0
        };

        let grown = ledger.distribute_delegations(reward)?;
        let unlocked = ledger.unlock(header.distribution_epoch_start);
        let resolved = ledger.leave(height, unstake_period, header.unstake_margin)?;
        let shrunk = ledger.withdraw_delegations(resolved)?;
        ledger.balance = pre_reward_balance
            .checked_add(reward)
            .and_then(|b| b.checked_add(unlocked))
            .and_then(|b| b.checked_sub(resolved))
            .ok_or(PoolError::InvariantViolation)?;

        let distributed = header
            .distributed_rewards
            .checked_add(reward)
            .ok_or(PoolError::Overflow)?;
        let new_unlocked = header
            .new_unlocked_total
            .checked_add(unlocked)
            .ok_or(PoolError::Overflow)?;
        let unstaked = header
            .total_unstaked_in_epoch
            .checked_add(resolved)
            .ok_or(PoolError::Overflow)?;

        let mut map = self.delegation_map.clone();
        map.add_all(&grown)?;
        map.sub_all(&shrunk)?;

        if ledger.below_holding_threshold(header.min_holding) {
            self.registry.remove(node)?;
            ledger.registry_node = NO_NODE;
        }

        self.delegation_map = map;
        self.participants.insert(key, ledger);
        self.header.distributed_rewards = distributed;
        self.header.new_unlocked_total = new_unlocked;
        self.header.total_unstaked_in_epoch = unstaked;
        Ok(())
    }

    /// Re-stake and re-delegate the walk's result, then roll the totals.
    ///
    /// On engine failure the phase stays `Finalizing` so the next call retries
    /// only this step.
    fn finalize(&mut self, engine: &mut impl StakeEngine, processed: u64) -> Result<DistributionReport, PoolError> {
        let header = self.header;
        let restake = header
            .total_staked
            .checked_add(header.distributed_rewards)
            .and_then(|v| v.checked_sub(header.total_unstaked_in_epoch))
            .ok_or(PoolError::InvariantViolation)?;
        let (list, delegated) = self.delegation_map.rebuild_delegation_list();
        if delegated != restake {
            msg!("Finalize: delegation map {} != restake value {}", delegated, restake);
            return Err(PoolError::InvariantViolation);
        }
        let total_supply = header
            .total_supply
            .checked_add(header.distributed_rewards)
            .and_then(|v| v.checked_add(header.new_unlocked_total))
            .and_then(|v| v.checked_sub(header.total_unstaked_in_epoch))
            .ok_or(PoolError::InvariantViolation)?;
        let undistributed = header
            .pending_rewards
            .checked_sub(header.distributed_rewards)
            .ok_or(PoolError::InvariantViolation)?;

        // Order follows the engine's delegated <= staked rule: a growing stake
        // is raised before delegating, a shrinking one is undelegated first.
        if restake >= header.total_staked {
            engine_call("set_staked_amount", engine.set_staked_amount(restake))?;
            engine_call("set_delegation", engine.set_delegation(&list))?;
        } else {
            engine_call("set_delegation", engine.set_delegation(&list))?;
            engine_call("set_staked_amount", engine.set_staked_amount(restake))?;
        }

        let report = DistributionReport {
            epoch_start: header.distribution_epoch_start,
            processed,
            completed: true,
            rewards: header.distributed_rewards,
            unlocked: header.new_unlocked_total,
            unstaked: header.total_unstaked_in_epoch,
        };

        self.header.total_staked = restake;
        self.header.total_supply = total_supply;
        self.header.undistributed_rewards = undistributed;
        self.header.last_distributed_epoch_start = header.distribution_epoch_start;
        self.header.reset_epoch_accumulators();
        self.header.set_phase(DistributionPhase::Idle);

        msg!(
            "Distribute: finalized epoch_start={} total_supply={} total_staked={} carried={}",
            report.epoch_start,
            total_supply,
            restake,
            undistributed
        );
        Ok(report)
    }
}
