//! Interface to the network's native staking machinery.
//!
//! The pool never stakes, delegates or claims on its own: every such action is
//! a call through [`StakeEngine`]. On-chain this is [`crate::cpi::CpiStakeEngine`];
//! tests and simulations use [`crate::fake::FakeStakeEngine`].

use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::delegation::Delegation;
use crate::error::PoolError;

/// Block-height view of the current epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EpochInfo {
    pub current_height: u64,
    pub epoch_start_height: u64,
    pub next_epoch_start_height: u64,
}

impl EpochInfo {
    pub fn epoch_length(&self) -> u64 {
        self.next_epoch_start_height
            .saturating_sub(self.epoch_start_height)
    }

    /// Height at which a join made now becomes spendable: one full epoch after
    /// the next epoch boundary.
    pub fn join_unlock_height(&self) -> Option<u64> {
        self.next_epoch_start_height.checked_add(self.epoch_length())
    }
}

/// The engine's view of this pool's delegation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DelegationInfo {
    pub total_delegated: u64,
    pub delegations: Vec<Delegation>,
}

/// Native stake engine, as seen from the pool account.
///
/// All calls are synchronous. Any `Err` is fatal to the pool operation that
/// made it; the pool never retries.
pub trait StakeEngine {
    fn epoch_info(&self) -> Result<EpochInfo, ProgramError>;

    fn staked_amount(&self) -> Result<u64, ProgramError>;

    fn set_staked_amount(&mut self, amount: u64) -> Result<(), ProgramError>;

    fn delegation(&self) -> Result<DelegationInfo, ProgramError>;

    fn set_delegation(&mut self, delegations: &[Delegation]) -> Result<(), ProgramError>;

    /// Heights between an unstake request and the funds becoming liquid.
    fn unstake_lock_period(&self) -> Result<u64, ProgramError>;

    /// Reward currently claimable by the pool.
    fn claimable_reward(&self) -> Result<u64, ProgramError>;

    fn claim_reward(&mut self) -> Result<(), ProgramError>;

    /// Validators currently recognized by the network.
    fn validators(&self) -> Result<Vec<Pubkey>, ProgramError>;

    /// Pay liquid native coin from the pool account to `to`.
    fn send(&mut self, to: &Pubkey, amount: u64) -> Result<(), ProgramError>;
}

/// Log a failed engine call and turn it into `ExternalEngineFailure`.
pub(crate) fn engine_call<T>(call: &str, result: Result<T, ProgramError>) -> Result<T, PoolError> {
    result.map_err(|e| {
        msg!("Stake engine call {} failed: {:?}", call, e);
        PoolError::ExternalEngineFailure
    })
}
