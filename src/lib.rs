//! Liquid Staking Pool
//!
//! Accounting engine for a pool that stakes a network's native coin on behalf
//! of its participants and hands out a fungible pool-share balance in return.
//!
//! Architecture:
//! - Participants join with native coin; the pool stakes and delegates it
//!   through the native stake engine right away ([`stake_engine::StakeEngine`])
//! - Each participant carries its own delegation vector; the pool-wide
//!   [`delegation::DelegationMap`] is always the sum of those vectors
//! - Once per epoch a bounded, resumable walk over the participant
//!   [`registry::Registry`] claims the network reward, credits it pro-rata,
//!   unlocks matured joins and resolves leave requests ([`distribution`])
//! - Withdrawals are claimable after the engine's unstake lock period
//! - The native stake program is reached through CPI ([`cpi::CpiStakeEngine`]);
//!   tests and simulations use [`fake::FakeStakeEngine`]
//!
//! Instructions:
//!   0 - Join:          Deposit, stake and delegate (explicit or pro-rata split)
//!   1 - RequestLeave:  Queue a withdrawal, resolved by the next distribution
//!   2 - Claim:         Pay out withdrawals past their unstake height
//!   3 - Transfer:      Move settled balance and its delegation to another key
//!   4 - Vote:          Replace the caller's delegation vector
//!   5 - Distribute:    One bounded batch of the epoch reward distribution
//!   6 - UpdateConfig:  Owner sets iteration limit, min holding, pool cap
//!   7 - SetPaused:     Owner pauses or unpauses user operations

pub mod cpi;
pub mod delegation;
pub mod distribution;
pub mod error;
pub mod event;
pub mod fake;
pub mod instruction;
pub mod ledger;
pub mod math;
pub mod pool;
pub mod processor;
pub mod registry;
pub mod stake_engine;
pub mod state;
