use bytemuck::{Pod, Zeroable};
use solana_program::pubkey::Pubkey;

use crate::error::PoolError;

/// Base units in one whole native coin.
pub const UNITS_PER_COIN: u64 = 1_000_000_000;

/// Participants processed per `distribute` call unless the owner changes it.
pub const DEFAULT_ITERATION_LIMIT: u64 = 500;

/// Minimum holding to earn rewards (and minimum join amount).
pub const DEFAULT_MIN_HOLDING: u64 = 10 * UNITS_PER_COIN;

/// Heights added on top of the engine's unstake lock period when stamping a
/// resolved leave request.
pub const DEFAULT_UNSTAKE_MARGIN: u64 = 300;

/// Progress of the current epoch distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DistributionPhase {
    Idle = 0,
    ClaimingRewards = 1,
    Walking = 2,
    Finalizing = 3,
}

impl DistributionPhase {
    pub fn from_u8(value: u8) -> Result<Self, PoolError> {
        match value {
            0 => Ok(Self::Idle),
            1 => Ok(Self::ClaimingRewards),
            2 => Ok(Self::Walking),
            3 => Ok(Self::Finalizing),
            _ => Err(PoolError::InvariantViolation),
        }
    }
}

/// Creation-time parameters of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Only key allowed to pause the pool or change policy knobs
    pub owner: Pubkey,
    /// Validator that receives a default join while the pool has no delegation
    pub default_validator: Pubkey,
    pub iteration_limit: u64,
    pub min_holding: u64,
    /// Maximum total stake (0 = uncapped)
    pub pool_cap: u64,
    pub unstake_margin: u64,
}

impl PoolConfig {
    pub fn new(owner: Pubkey, default_validator: Pubkey) -> Self {
        Self {
            owner,
            default_validator,
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            min_holding: DEFAULT_MIN_HOLDING,
            pool_cap: 0,
            unstake_margin: DEFAULT_UNSTAKE_MARGIN,
        }
    }
}

/// Fixed-size pool-wide state: totals, distribution progress and policy.
///
/// The variable-size parts of a pool (participant ledgers, registry,
/// delegation map) live in [`crate::pool::Pool`] next to this header.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct PoolHeader {
    /// Whether the pool is initialized (1 = yes, 0 = no)
    pub is_initialized: u8,

    /// [`DistributionPhase`] as u8
    pub phase: u8,

    /// 1 while the owner has paused user operations
    pub paused: u8,

    /// Padding for alignment
    pub _padding: [u8; 5],

    /// Pool owner
    pub owner: [u8; 32],

    /// Fallback validator for the very first default join
    pub default_validator: [u8; 32],

    /// Sum of every participant's settled balance
    pub total_supply: u64,

    /// Stake reported to the engine; equals the delegation map total
    pub total_staked: u64,

    /// Reward being distributed by the current walk
    pub pending_rewards: u64,

    /// Part of `pending_rewards` already credited to participants
    pub distributed_rewards: u64,

    /// Floor dust of the last walk, added to the next epoch's rewards
    pub undistributed_rewards: u64,

    /// Joins unlocked by the current walk
    pub new_unlocked_total: u64,

    /// Leave requests resolved by the current walk
    pub total_unstaked_in_epoch: u64,

    /// Registry node the walk resumes from (0 = none)
    pub distribution_cursor: u64,

    /// Epoch start height the current walk distributes for
    pub distribution_epoch_start: u64,

    /// Epoch start height of the last completed distribution
    pub last_distributed_epoch_start: u64,

    /// Max participants processed per distribute call
    pub iteration_limit: u64,

    /// Minimum settled balance to receive rewards and stay registered
    pub min_holding: u64,

    /// Maximum total stake (0 = uncapped)
    pub pool_cap: u64,

    /// Safety margin added to the unstake lock period
    pub unstake_margin: u64,

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of PoolHeader in bytes
pub const POOL_HEADER_SIZE: usize = core::mem::size_of::<PoolHeader>();

impl PoolHeader {
    /// Fresh header for a pool created during the epoch starting at
    /// `epoch_start`. The first distribution is possible one epoch later.
    pub fn new(config: &PoolConfig, epoch_start: u64) -> Self {
        let mut header = Self::zeroed();
        header.is_initialized = 1;
        header.phase = DistributionPhase::Idle as u8;
        header.owner = config.owner.to_bytes();
        header.default_validator = config.default_validator.to_bytes();
        header.last_distributed_epoch_start = epoch_start;
        header.iteration_limit = config.iteration_limit;
        header.min_holding = config.min_holding;
        header.pool_cap = config.pool_cap;
        header.unstake_margin = config.unstake_margin;
        header
    }

    pub fn owner_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.owner)
    }

    pub fn default_validator_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.default_validator)
    }

    pub fn phase(&self) -> Result<DistributionPhase, PoolError> {
        DistributionPhase::from_u8(self.phase)
    }

    pub fn set_phase(&mut self, phase: DistributionPhase) {
        self.phase = phase as u8;
    }

    pub fn is_paused(&self) -> bool {
        self.paused != 0
    }

    /// Whether `total_staked + amount` stays within the cap.
    pub fn within_cap(&self, amount: u64) -> bool {
        if self.pool_cap == 0 {
            return true;
        }
        match self.total_staked.checked_add(amount) {
            Some(total) => total <= self.pool_cap,
            None => false,
        }
    }

    /// Clear the per-epoch accumulators after a finalized walk.
    pub fn reset_epoch_accumulators(&mut self) {
        self.pending_rewards = 0;
        self.distributed_rewards = 0;
        self.new_unlocked_total = 0;
        self.total_unstaked_in_epoch = 0;
        self.distribution_cursor = 0;
    }
}
