use core::fmt;

use solana_program::program_error::ProgramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PoolError {
    /// Amount exceeds the participant's available balance
    InsufficientBalance = 0,
    /// Join or leave queue already holds the maximum number of entries
    SpamLimitExceeded = 1,
    /// Validator is not recognized by the stake engine
    InvalidValidator = 2,
    /// Explicit delegation does not sum to the required amount
    DelegationSumMismatch = 3,
    /// Rewards were already distributed for the current epoch
    AlreadyDistributedThisEpoch = 4,
    /// Pool registry is empty, nothing to distribute to
    EmptyPool = 5,
    /// Join would push total stake above the pool cap
    PoolCapExceeded = 6,
    /// Unauthorized: caller is not the owner
    Unauthorized = 7,
    /// Stake engine call failed or returned an unexpected shape
    ExternalEngineFailure = 8,
    /// Zero amount
    ZeroAmount = 9,
    /// Join amount below the minimum holding
    BelowMinimumJoin = 10,
    /// Operation not allowed while an epoch distribution is running
    DistributionInProgress = 11,
    /// Pool is paused
    Paused = 12,
    /// Transfer to the zero address
    InvalidRecipient = 13,
    /// Configuration value out of range
    InvalidConfig = 14,
    /// Arithmetic overflow
    Overflow = 15,
    /// Registry node was removed or never existed
    NodeNotFound = 16,
    /// Participant is already in the registry
    AlreadyRegistered = 17,
    /// Instruction data could not be decoded
    InvalidInstructionData = 18,
    /// Transfer hook refused the transfer
    TransferRejected = 19,
    /// Ledger totals disagree with pool totals
    InvariantViolation = 20,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::InsufficientBalance => "insufficient balance",
            Self::SpamLimitExceeded => "too many pending requests (spam limit)",
            Self::InvalidValidator => "validator is not recognized",
            Self::DelegationSumMismatch => "delegation amounts do not match the expected total",
            Self::AlreadyDistributedThisEpoch => "rewards already distributed this epoch",
            Self::EmptyPool => "pool has no participants",
            Self::PoolCapExceeded => "pool cap exceeded",
            Self::Unauthorized => "caller is not the pool owner",
            Self::ExternalEngineFailure => "stake engine call failed",
            Self::ZeroAmount => "amount must be greater than zero",
            Self::BelowMinimumJoin => "join amount is below the minimum holding",
            Self::DistributionInProgress => "epoch distribution in progress",
            Self::Paused => "pool is paused",
            Self::InvalidRecipient => "recipient is the zero address",
            Self::InvalidConfig => "invalid configuration value",
            Self::Overflow => "arithmetic overflow",
            Self::NodeNotFound => "registry node not found",
            Self::AlreadyRegistered => "participant already registered",
            Self::InvalidInstructionData => "invalid instruction data",
            Self::TransferRejected => "transfer rejected by recipient hook",
            Self::InvariantViolation => "pool invariant violated",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for PoolError {}

impl From<PoolError> for ProgramError {
    fn from(e: PoolError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
