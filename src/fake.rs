//! Deterministic in-memory stake engine for tests and simulations.

use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::delegation::{self, Delegation};
use crate::stake_engine::{DelegationInfo, EpochInfo, StakeEngine};

/// Engine calls that [`FakeStakeEngine::fail_on`] can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    EpochInfo,
    StakedAmount,
    SetStakedAmount,
    Delegation,
    SetDelegation,
    UnstakeLockPeriod,
    ClaimableReward,
    ClaimReward,
    Validators,
    Send,
}

#[derive(Debug, Clone)]
pub struct FakeStakeEngine {
    pub epoch: EpochInfo,
    pub staked: u64,
    pub delegations: Vec<Delegation>,
    pub unstake_period: u64,
    pub claimable: u64,
    /// Rewards claimed so far
    pub claimed: u64,
    pub validators: Vec<Pubkey>,
    /// Every payout made through `send`
    pub sent: Vec<(Pubkey, u64)>,
    failing: Option<EngineCall>,
}

impl FakeStakeEngine {
    /// Engine at height 0, in the epoch `[0, epoch_length)`.
    pub fn new(epoch_length: u64, validators: Vec<Pubkey>) -> Self {
        Self {
            epoch: EpochInfo {
                current_height: 0,
                epoch_start_height: 0,
                next_epoch_start_height: epoch_length,
            },
            staked: 0,
            delegations: Vec::new(),
            unstake_period: epoch_length,
            claimable: 0,
            claimed: 0,
            validators,
            sent: Vec::new(),
            failing: None,
        }
    }

    /// Move to the first height of the next epoch.
    pub fn advance_epoch(&mut self) {
        let length = self.epoch.epoch_length();
        self.epoch.epoch_start_height = self.epoch.next_epoch_start_height;
        self.epoch.next_epoch_start_height += length;
        self.epoch.current_height = self.epoch.epoch_start_height;
    }

    /// Jump to `height`, rolling the epoch bounds to the epoch containing it.
    pub fn set_height(&mut self, height: u64) {
        let length = self.epoch.epoch_length().max(1);
        let start = height - height % length;
        self.epoch = EpochInfo {
            current_height: height,
            epoch_start_height: start,
            next_epoch_start_height: start + length,
        };
    }

    /// Network reward earned by the pool's stake, claimable at the next claim.
    pub fn accrue_reward(&mut self, amount: u64) {
        self.claimable += amount;
    }

    /// Make every subsequent call of `call` fail until [`Self::clear_failure`].
    pub fn fail_on(&mut self, call: EngineCall) {
        self.failing = Some(call);
    }

    pub fn clear_failure(&mut self) {
        self.failing = None;
    }

    pub fn total_delegated(&self) -> u64 {
        self.delegations.iter().map(|d| d.amount).sum()
    }

    pub fn delegated_to(&self, validator: &Pubkey) -> u64 {
        self.delegations
            .iter()
            .filter(|d| d.validator == *validator)
            .map(|d| d.amount)
            .sum()
    }

    pub fn total_sent(&self) -> u64 {
        self.sent.iter().map(|(_, amount)| amount).sum()
    }

    fn check(&self, call: EngineCall) -> Result<(), ProgramError> {
        if self.failing == Some(call) {
            msg!("FakeStakeEngine: injected failure on {:?}", call);
            return Err(ProgramError::Custom(u32::MAX));
        }
        Ok(())
    }
}

impl StakeEngine for FakeStakeEngine {
    fn epoch_info(&self) -> Result<EpochInfo, ProgramError> {
        self.check(EngineCall::EpochInfo)?;
        Ok(self.epoch)
    }

    fn staked_amount(&self) -> Result<u64, ProgramError> {
        self.check(EngineCall::StakedAmount)?;
        Ok(self.staked)
    }

    fn set_staked_amount(&mut self, amount: u64) -> Result<(), ProgramError> {
        self.check(EngineCall::SetStakedAmount)?;
        if amount < self.total_delegated() {
            return Err(ProgramError::InvalidArgument);
        }
        self.staked = amount;
        Ok(())
    }

    fn delegation(&self) -> Result<DelegationInfo, ProgramError> {
        self.check(EngineCall::Delegation)?;
        Ok(DelegationInfo {
            total_delegated: self.total_delegated(),
            delegations: self.delegations.clone(),
        })
    }

    fn set_delegation(&mut self, delegations: &[Delegation]) -> Result<(), ProgramError> {
        self.check(EngineCall::SetDelegation)?;
        let total = delegation::sum(delegations).map_err(|_| ProgramError::ArithmeticOverflow)?;
        if total > self.staked {
            return Err(ProgramError::InsufficientFunds);
        }
        if delegations.iter().any(|d| !self.validators.contains(&d.validator)) {
            return Err(ProgramError::InvalidArgument);
        }
        self.delegations = delegations.to_vec();
        Ok(())
    }

    fn unstake_lock_period(&self) -> Result<u64, ProgramError> {
        self.check(EngineCall::UnstakeLockPeriod)?;
        Ok(self.unstake_period)
    }

    fn claimable_reward(&self) -> Result<u64, ProgramError> {
        self.check(EngineCall::ClaimableReward)?;
        Ok(self.claimable)
    }

    fn claim_reward(&mut self) -> Result<(), ProgramError> {
        self.check(EngineCall::ClaimReward)?;
        self.claimed += self.claimable;
        self.claimable = 0;
        Ok(())
    }

    fn validators(&self) -> Result<Vec<Pubkey>, ProgramError> {
        self.check(EngineCall::Validators)?;
        Ok(self.validators.clone())
    }

    fn send(&mut self, to: &Pubkey, amount: u64) -> Result<(), ProgramError> {
        self.check(EngineCall::Send)?;
        self.sent.push((*to, amount));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    #[test]
    fn test_delegation_cannot_exceed_stake() {
        let mut engine = FakeStakeEngine::new(100, vec![key(1)]);
        engine.set_staked_amount(10).unwrap();
        assert!(engine.set_delegation(&[Delegation::new(key(1), 11)]).is_err());
        engine.set_delegation(&[Delegation::new(key(1), 10)]).unwrap();
        // Unstaking below the delegated total is refused
        assert!(engine.set_staked_amount(9).is_err());
    }

    #[test]
    fn test_unknown_validator_rejected() {
        let mut engine = FakeStakeEngine::new(100, vec![key(1)]);
        engine.set_staked_amount(10).unwrap();
        assert!(engine.set_delegation(&[Delegation::new(key(2), 1)]).is_err());
    }

    #[test]
    fn test_epoch_navigation() {
        let mut engine = FakeStakeEngine::new(100, vec![]);
        engine.advance_epoch();
        assert_eq!(engine.epoch.epoch_start_height, 100);
        assert_eq!(engine.epoch.next_epoch_start_height, 200);
        engine.set_height(457);
        assert_eq!(engine.epoch.epoch_start_height, 400);
        assert_eq!(engine.epoch.next_epoch_start_height, 500);
        assert_eq!(engine.epoch.current_height, 457);
    }

    #[test]
    fn test_injected_failure() {
        let mut engine = FakeStakeEngine::new(100, vec![]);
        engine.fail_on(EngineCall::ClaimReward);
        assert!(engine.claim_reward().is_err());
        assert!(engine.claimable_reward().is_ok());
        engine.clear_failure();
        assert!(engine.claim_reward().is_ok());
    }

    #[test]
    fn test_claim_reward_moves_claimable() {
        let mut engine = FakeStakeEngine::new(100, vec![]);
        engine.accrue_reward(7);
        engine.claim_reward().unwrap();
        assert_eq!(engine.claimable, 0);
        assert_eq!(engine.claimed, 7);
    }
}
