//! CPI adapter for the native stake program.
//!
//! We construct raw instruction data manually since we don't depend on the
//! stake program's crate. Queries are answered through the callee's return
//! data; every call is signed by the pool authority PDA.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{get_return_data, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::delegation::Delegation;
use crate::stake_engine::{DelegationInfo, EpochInfo, StakeEngine};

// ═══════════════════════════════════════════════════════════════
// Stake program instruction tags
// ═══════════════════════════════════════════════════════════════

pub const TAG_GET_EPOCH_INFO: u8 = 0;
pub const TAG_GET_STAKE: u8 = 1;
pub const TAG_SET_STAKE: u8 = 2;
pub const TAG_GET_DELEGATION: u8 = 3;
pub const TAG_SET_DELEGATION: u8 = 4;
pub const TAG_ESTIMATE_UNSTAKE_LOCK_PERIOD: u8 = 5;
pub const TAG_QUERY_CLAIMABLE_REWARD: u8 = 6;
pub const TAG_CLAIM_REWARD: u8 = 7;
pub const TAG_LIST_VALIDATORS: u8 = 8;
pub const TAG_SEND: u8 = 9;

// ═══════════════════════════════════════════════════════════════
// Instruction data builders
// ═══════════════════════════════════════════════════════════════

/// Data: tag(1)
pub fn build_query_data(tag: u8) -> Vec<u8> {
    vec![tag]
}

/// Data: tag(1) + amount(8)
pub fn build_set_stake_data(amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(9);
    data.push(TAG_SET_STAKE);
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

/// Data: tag(1) + count(4) + count * (validator(32) + amount(8))
pub fn build_set_delegation_data(delegations: &[Delegation]) -> Vec<u8> {
    let mut data = Vec::with_capacity(5 + delegations.len() * 40);
    data.push(TAG_SET_DELEGATION);
    data.extend_from_slice(&(delegations.len() as u32).to_le_bytes());
    for d in delegations {
        data.extend_from_slice(d.validator.as_ref());
        data.extend_from_slice(&d.amount.to_le_bytes());
    }
    data
}

/// Data: tag(1) + recipient(32) + amount(8)
pub fn build_send_data(to: &Pubkey, amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(41);
    data.push(TAG_SEND);
    data.extend_from_slice(to.as_ref());
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

// ═══════════════════════════════════════════════════════════════
// Return data decoders
// ═══════════════════════════════════════════════════════════════

fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_pubkey(data: &[u8], offset: usize) -> Option<Pubkey> {
    let bytes: [u8; 32] = data.get(offset..offset + 32)?.try_into().ok()?;
    Some(Pubkey::new_from_array(bytes))
}

/// current_height(8) + epoch_start_height(8) + next_epoch_start_height(8)
pub fn decode_epoch_info(data: &[u8]) -> Option<EpochInfo> {
    Some(EpochInfo {
        current_height: read_u64(data, 0)?,
        epoch_start_height: read_u64(data, 8)?,
        next_epoch_start_height: read_u64(data, 16)?,
    })
}

pub fn decode_amount(data: &[u8]) -> Option<u64> {
    read_u64(data, 0)
}

/// total_delegated(8) + count(4) + count * (validator(32) + amount(8))
pub fn decode_delegation_info(data: &[u8]) -> Option<DelegationInfo> {
    let total_delegated = read_u64(data, 0)?;
    let count = read_u32(data, 8)? as usize;
    let mut delegations = Vec::new();
    for i in 0..count {
        let offset = 12 + i * 40;
        delegations.push(Delegation::new(read_pubkey(data, offset)?, read_u64(data, offset + 32)?));
    }
    Some(DelegationInfo {
        total_delegated,
        delegations,
    })
}

/// count(4) + count * validator(32)
pub fn decode_validators(data: &[u8]) -> Option<Vec<Pubkey>> {
    let count = read_u32(data, 0)? as usize;
    (0..count).map(|i| read_pubkey(data, 4 + i * 32)).collect()
}

// ═══════════════════════════════════════════════════════════════
// Engine adapter
// ═══════════════════════════════════════════════════════════════

/// [`StakeEngine`] backed by CPIs into the native stake program.
///
/// Accounts for every call: `[pool_authority(signer, w), stake_program]`,
/// plus the recipient for `send`, looked up in `remaining`.
pub struct CpiStakeEngine<'a, 'b> {
    stake_program: &'b AccountInfo<'a>,
    pool_authority: &'b AccountInfo<'a>,
    remaining: &'b [AccountInfo<'a>],
    signer_seeds: &'b [&'b [u8]],
}

impl<'a, 'b> CpiStakeEngine<'a, 'b> {
    pub fn new(
        stake_program: &'b AccountInfo<'a>,
        pool_authority: &'b AccountInfo<'a>,
        remaining: &'b [AccountInfo<'a>],
        signer_seeds: &'b [&'b [u8]],
    ) -> Self {
        Self {
            stake_program,
            pool_authority,
            remaining,
            signer_seeds,
        }
    }

    fn invoke(&self, data: Vec<u8>, extra: Option<&AccountInfo<'a>>) -> ProgramResult {
        let mut accounts = vec![AccountMeta::new(*self.pool_authority.key, true)];
        let mut infos = vec![self.pool_authority.clone()];
        if let Some(account) = extra {
            accounts.push(AccountMeta::new(*account.key, false));
            infos.push(account.clone());
        }
        let ix = Instruction {
            program_id: *self.stake_program.key,
            accounts,
            data,
        };
        infos.push(self.stake_program.clone());
        invoke_signed(&ix, &infos, &[self.signer_seeds])
    }

    /// Invoke a query and read back the stake program's return data.
    fn query(&self, tag: u8) -> Result<Vec<u8>, ProgramError> {
        self.invoke(build_query_data(tag), None)?;
        match get_return_data() {
            Some((program_id, data)) if program_id == *self.stake_program.key => Ok(data),
            _ => {
                msg!("Stake program returned no data for tag {}", tag);
                Err(ProgramError::InvalidAccountData)
            }
        }
    }
}

impl StakeEngine for CpiStakeEngine<'_, '_> {
    fn epoch_info(&self) -> Result<EpochInfo, ProgramError> {
        decode_epoch_info(&self.query(TAG_GET_EPOCH_INFO)?).ok_or(ProgramError::InvalidAccountData)
    }

    fn staked_amount(&self) -> Result<u64, ProgramError> {
        decode_amount(&self.query(TAG_GET_STAKE)?).ok_or(ProgramError::InvalidAccountData)
    }

    fn set_staked_amount(&mut self, amount: u64) -> Result<(), ProgramError> {
        self.invoke(build_set_stake_data(amount), None)
    }

    fn delegation(&self) -> Result<DelegationInfo, ProgramError> {
        decode_delegation_info(&self.query(TAG_GET_DELEGATION)?).ok_or(ProgramError::InvalidAccountData)
    }

    fn set_delegation(&mut self, delegations: &[Delegation]) -> Result<(), ProgramError> {
        self.invoke(build_set_delegation_data(delegations), None)
    }

    fn unstake_lock_period(&self) -> Result<u64, ProgramError> {
        decode_amount(&self.query(TAG_ESTIMATE_UNSTAKE_LOCK_PERIOD)?).ok_or(ProgramError::InvalidAccountData)
    }

    fn claimable_reward(&self) -> Result<u64, ProgramError> {
        decode_amount(&self.query(TAG_QUERY_CLAIMABLE_REWARD)?).ok_or(ProgramError::InvalidAccountData)
    }

    fn claim_reward(&mut self) -> Result<(), ProgramError> {
        self.invoke(build_query_data(TAG_CLAIM_REWARD), None)
    }

    fn validators(&self) -> Result<Vec<Pubkey>, ProgramError> {
        decode_validators(&self.query(TAG_LIST_VALIDATORS)?).ok_or(ProgramError::InvalidAccountData)
    }

    fn send(&mut self, to: &Pubkey, amount: u64) -> Result<(), ProgramError> {
        let recipient = self
            .remaining
            .iter()
            .find(|a| a.key == to)
            .ok_or(ProgramError::NotEnoughAccountKeys)?;
        self.invoke(build_send_data(to, amount), Some(recipient))
    }
}
