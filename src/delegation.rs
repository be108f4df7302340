//! Pool-wide validator delegation allocator.
//!
//! [`DelegationMap`] is the single source of truth for what the pool reports
//! to the stake engine as its delegation. Whenever no operation is in flight,
//! `map.total() == total_staked == sum of every participant's vector`.

use std::collections::BTreeMap;

use solana_program::pubkey::Pubkey;

use crate::error::PoolError;
use crate::math;

/// One (validator, amount) pair, used for participant vectors, requests and
/// the list handed to the stake engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delegation {
    pub validator: Pubkey,
    pub amount: u64,
}

impl Delegation {
    pub fn new(validator: Pubkey, amount: u64) -> Self {
        Self { validator, amount }
    }
}

/// Sum of a delegation list.
pub fn sum(list: &[Delegation]) -> Result<u64, PoolError> {
    list.iter()
        .try_fold(0u64, |acc, d| acc.checked_add(d.amount))
        .ok_or(PoolError::Overflow)
}

/// Add `amount` to `validator` in `list`, appending a new entry if the
/// validator is not there yet. Zero amounts are ignored.
pub fn merge_into(list: &mut Vec<Delegation>, validator: Pubkey, amount: u64) -> Result<(), PoolError> {
    if amount == 0 {
        return Ok(());
    }
    match list.iter_mut().find(|d| d.validator == validator) {
        Some(entry) => {
            entry.amount = entry.amount.checked_add(amount).ok_or(PoolError::Overflow)?;
        }
        None => list.push(Delegation::new(validator, amount)),
    }
    Ok(())
}

/// Collapse a caller-supplied request: duplicate validators are merged and
/// zero entries dropped, first-seen order kept.
pub fn normalize(request: &[Delegation]) -> Result<Vec<Delegation>, PoolError> {
    let mut out = Vec::with_capacity(request.len());
    for d in request {
        merge_into(&mut out, d.validator, d.amount)?;
    }
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegationMap {
    amounts: BTreeMap<Pubkey, u64>,
    total: u64,
}

impl DelegationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, validator: &Pubkey) -> u64 {
        self.amounts.get(validator).copied().unwrap_or(0)
    }

    pub fn contains(&self, validator: &Pubkey) -> bool {
        self.amounts.contains_key(validator)
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pubkey, &u64)> {
        self.amounts.iter()
    }

    /// Merge `amount` into the entry for `validator`, creating it if needed.
    pub fn add_single_delegation(&mut self, validator: Pubkey, amount: u64) -> Result<(), PoolError> {
        if amount == 0 {
            return Ok(());
        }
        let total = self.total.checked_add(amount).ok_or(PoolError::Overflow)?;
        let entry = self.amounts.entry(validator).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(PoolError::Overflow)?;
        self.total = total;
        Ok(())
    }

    /// Take `amount` away from `validator`; the entry is dropped once it hits
    /// zero so the key set stays bounded by live delegations.
    pub fn sub_single_delegation(&mut self, validator: &Pubkey, amount: u64) -> Result<(), PoolError> {
        if amount == 0 {
            return Ok(());
        }
        let current = self.get(validator);
        let left = current.checked_sub(amount).ok_or(PoolError::InvariantViolation)?;
        if left == 0 {
            self.amounts.remove(validator);
        } else {
            self.amounts.insert(*validator, left);
        }
        self.total -= amount;
        Ok(())
    }

    pub fn add_all(&mut self, deltas: &[Delegation]) -> Result<(), PoolError> {
        for d in deltas {
            self.add_single_delegation(d.validator, d.amount)?;
        }
        Ok(())
    }

    pub fn sub_all(&mut self, deltas: &[Delegation]) -> Result<(), PoolError> {
        for d in deltas {
            self.sub_single_delegation(&d.validator, d.amount)?;
        }
        Ok(())
    }

    /// Flatten into the list the stake engine's `set_delegation` expects,
    /// together with its sum.
    pub fn rebuild_delegation_list(&self) -> (Vec<Delegation>, u64) {
        let list = self
            .amounts
            .iter()
            .map(|(validator, amount)| Delegation::new(*validator, *amount))
            .collect();
        (list, self.total)
    }

    /// Split `amount` across the current delegation, pro-rata to each entry.
    /// `None` when the map is empty.
    pub fn proportional_split(&self, amount: u64) -> Result<Option<Vec<Delegation>>, PoolError> {
        if self.amounts.is_empty() {
            return Ok(None);
        }
        let weights: Vec<u64> = self.amounts.values().copied().collect();
        let shares = math::split_growth(amount, &weights).ok_or(PoolError::Overflow)?;
        let split = self
            .amounts
            .keys()
            .zip(shares)
            .filter(|(_, share)| *share > 0)
            .map(|(validator, share)| Delegation::new(*validator, share))
            .collect();
        Ok(Some(split))
    }

    /// Reject request entries naming a validator that is new to the pool and
    /// not in `recognized`. Validators already in the map were accepted before.
    pub fn check_validators(&self, request: &[Delegation], recognized: &[Pubkey]) -> Result<(), PoolError> {
        for d in request {
            if !self.contains(&d.validator) && !recognized.contains(&d.validator) {
                return Err(PoolError::InvalidValidator);
            }
        }
        Ok(())
    }
}
