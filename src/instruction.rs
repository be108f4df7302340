use solana_program::pubkey::Pubkey;

use crate::delegation::Delegation;
use crate::error::PoolError;

/// Most (validator, amount) pairs accepted in one join or vote.
pub const MAX_DELEGATIONS_PER_REQUEST: usize = 100;

/// Instructions for the liquid staking pool.
///
/// The caller of every instruction is the participant it acts for (or the
/// owner, for the configuration instructions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolInstruction {
    /// Deposit native coin into the pool. Staked and delegated immediately,
    /// spendable one full epoch after the next epoch boundary.
    ///
    /// Data: amount(8) + has_delegations(1) [+ delegation list]
    Join {
        amount: u64,
        delegations: Option<Vec<Delegation>>,
    },

    /// Queue a withdrawal of settled balance.
    ///
    /// Data: amount(8)
    RequestLeave { amount: u64 },

    /// Pay out every withdrawal whose unstake height has passed.
    Claim,

    /// Move settled balance (and its delegation) to another participant.
    /// `data` is handed to the transfer hook untouched.
    ///
    /// Data: to(32) + amount(8) + data_len(2) + data
    Transfer {
        to: Pubkey,
        amount: u64,
        data: Vec<u8>,
    },

    /// Replace the caller's delegation.
    ///
    /// Data: delegation list
    Vote { delegations: Vec<Delegation> },

    /// Run one bounded batch of the epoch distribution. Permissionless.
    Distribute,

    /// Owner updates policy knobs.
    ///
    /// Data: 3 * (flag(1) + value(8)) for iteration_limit, min_holding, pool_cap
    UpdateConfig {
        iteration_limit: Option<u64>,
        min_holding: Option<u64>,
        pool_cap: Option<u64>,
    },

    /// Owner pauses or unpauses user operations.
    ///
    /// Data: paused(1)
    SetPaused { paused: bool },
}

/// Cursor over instruction data; every read fails with
/// `InvalidInstructionData` when the input is too short.
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], PoolError> {
        if self.data.len() < len {
            return Err(PoolError::InvalidInstructionData);
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, PoolError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, PoolError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u64(&mut self) -> Result<u64, PoolError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn pubkey(&mut self) -> Result<Pubkey, PoolError> {
        Pubkey::try_from(self.take(32)?).map_err(|_| PoolError::InvalidInstructionData)
    }

    fn flag(&mut self) -> Result<bool, PoolError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(PoolError::InvalidInstructionData),
        }
    }

    fn optional_u64(&mut self) -> Result<Option<u64>, PoolError> {
        let present = self.flag()?;
        let value = self.u64()?;
        Ok(present.then_some(value))
    }

    /// count(1) + count * (validator(32) + amount(8))
    fn delegations(&mut self) -> Result<Vec<Delegation>, PoolError> {
        let count = self.u8()? as usize;
        if count > MAX_DELEGATIONS_PER_REQUEST {
            return Err(PoolError::InvalidInstructionData);
        }
        let mut list = Vec::with_capacity(count);
        for _ in 0..count {
            let validator = self.pubkey()?;
            let amount = self.u64()?;
            list.push(Delegation::new(validator, amount));
        }
        Ok(list)
    }
}

impl PoolInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, PoolError> {
        let (&tag, rest) = input
            .split_first()
            .ok_or(PoolError::InvalidInstructionData)?;
        let mut r = Reader { data: rest };

        match tag {
            0 => {
                let amount = r.u64()?;
                let delegations = if r.flag()? { Some(r.delegations()?) } else { None };
                Ok(Self::Join { amount, delegations })
            }
            1 => Ok(Self::RequestLeave { amount: r.u64()? }),
            2 => Ok(Self::Claim),
            3 => {
                let to = r.pubkey()?;
                let amount = r.u64()?;
                let len = r.u16()? as usize;
                let data = r.take(len)?.to_vec();
                Ok(Self::Transfer { to, amount, data })
            }
            4 => Ok(Self::Vote {
                delegations: r.delegations()?,
            }),
            5 => Ok(Self::Distribute),
            6 => Ok(Self::UpdateConfig {
                iteration_limit: r.optional_u64()?,
                min_holding: r.optional_u64()?,
                pool_cap: r.optional_u64()?,
            }),
            7 => Ok(Self::SetPaused { paused: r.flag()? }),
            _ => Err(PoolError::InvalidInstructionData),
        }
    }
}
