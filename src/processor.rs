use solana_program::{msg, pubkey::Pubkey};

use crate::error::PoolError;
use crate::event::PoolEvent;
use crate::instruction::PoolInstruction;
use crate::pool::{Pool, TransferHook};
use crate::stake_engine::StakeEngine;

/// Decode `instruction_data`, run it against `pool` on behalf of `caller` and
/// return the emitted event. The event is also written to the program log.
pub fn process(
    pool: &mut Pool,
    engine: &mut impl StakeEngine,
    caller: &Pubkey,
    instruction_data: &[u8],
    hook: Option<&mut dyn TransferHook>,
) -> Result<PoolEvent, PoolError> {
    let instruction = PoolInstruction::unpack(instruction_data)?;

    let result = match instruction {
        PoolInstruction::Join { amount, delegations } => {
            msg!("Instruction: Join");
            pool.join(engine, caller, amount, delegations.as_deref())
        }
        PoolInstruction::RequestLeave { amount } => {
            msg!("Instruction: RequestLeave");
            pool.request_leave(caller, amount)
        }
        PoolInstruction::Claim => {
            msg!("Instruction: Claim");
            pool.claim(engine, caller)
        }
        PoolInstruction::Transfer { to, amount, data } => {
            msg!("Instruction: Transfer");
            pool.transfer(caller, &to, amount, &data, hook)
        }
        PoolInstruction::Vote { delegations } => {
            msg!("Instruction: Vote");
            pool.vote(engine, caller, &delegations)
        }
        PoolInstruction::Distribute => {
            msg!("Instruction: Distribute");
            process_distribute(pool, engine)
        }
        PoolInstruction::UpdateConfig {
            iteration_limit,
            min_holding,
            pool_cap,
        } => {
            msg!("Instruction: UpdateConfig");
            pool.update_config(caller, iteration_limit, min_holding, pool_cap)
        }
        PoolInstruction::SetPaused { paused } => {
            msg!("Instruction: SetPaused");
            pool.set_paused(caller, paused)
        }
    };

    match &result {
        Ok(event) => event.log(),
        Err(e) => msg!("Error: {}", e),
    }
    result
}

fn process_distribute(pool: &mut Pool, engine: &mut impl StakeEngine) -> Result<PoolEvent, PoolError> {
    let report = pool.distribute(engine)?;
    Ok(PoolEvent::Distributed {
        epoch_start: report.epoch_start,
        processed: report.processed,
        completed: report.completed,
        rewards: report.rewards,
        unlocked: report.unlocked,
        unstaked: report.unstaked,
    })
}
