//! Domain events emitted by successful pool operations.

use solana_program::{msg, pubkey::Pubkey};

use crate::delegation::Delegation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    Joined {
        participant: Pubkey,
        amount: u64,
        unlock_height: u64,
        delegations: Vec<Delegation>,
    },
    LeaveRequested {
        participant: Pubkey,
        amount: u64,
    },
    Claimed {
        participant: Pubkey,
        amount: u64,
    },
    Transferred {
        from: Pubkey,
        to: Pubkey,
        amount: u64,
    },
    Voted {
        participant: Pubkey,
        delegations: Vec<Delegation>,
    },
    /// One `distribute` call. `completed` is set on the call that finalized
    /// the epoch; the totals are only meaningful then.
    Distributed {
        epoch_start: u64,
        processed: u64,
        completed: bool,
        rewards: u64,
        unlocked: u64,
        unstaked: u64,
    },
    ConfigUpdated {
        iteration_limit: u64,
        min_holding: u64,
        pool_cap: u64,
    },
    PauseChanged {
        paused: bool,
    },
}

impl PoolEvent {
    /// Write the event to the program log.
    pub fn log(&self) {
        match self {
            Self::Joined {
                participant,
                amount,
                unlock_height,
                delegations,
            } => {
                msg!(
                    "Joined: {} amount={} unlock_height={} validators={}",
                    participant,
                    amount,
                    unlock_height,
                    delegations.len()
                );
            }
            Self::LeaveRequested { participant, amount } => {
                msg!("LeaveRequested: {} amount={}", participant, amount);
            }
            Self::Claimed { participant, amount } => {
                msg!("Claimed: {} amount={}", participant, amount);
            }
            Self::Transferred { from, to, amount } => {
                msg!("Transferred: {} -> {} amount={}", from, to, amount);
            }
            Self::Voted {
                participant,
                delegations,
            } => {
                msg!("Voted: {} validators={}", participant, delegations.len());
            }
            Self::Distributed {
                epoch_start,
                processed,
                completed,
                rewards,
                unlocked,
                unstaked,
            } => {
                msg!(
                    "Distributed: epoch_start={} processed={} completed={} rewards={} unlocked={} unstaked={}",
                    epoch_start,
                    processed,
                    completed,
                    rewards,
                    unlocked,
                    unstaked
                );
            }
            Self::ConfigUpdated {
                iteration_limit,
                min_holding,
                pool_cap,
            } => {
                msg!(
                    "ConfigUpdated: iteration_limit={} min_holding={} pool_cap={}",
                    iteration_limit,
                    min_holding,
                    pool_cap
                );
            }
            Self::PauseChanged { paused } => {
                msg!("PauseChanged: paused={}", paused);
            }
        }
    }
}
