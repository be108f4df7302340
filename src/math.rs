//! Pure basis-point math, kept free of account types for Kani.
//!
//! No Solana/Pubkey dependencies. Just arithmetic.
//! Every split rounds DOWN first, so a pro-rata share can never exceed the
//! exact rational share. The split helpers then hand out the floor remainder
//! deterministically so that the parts always add back up to the input.

/// One whole expressed in basis points.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Share of `part` in `base`, in basis points: `floor(part * 10_000 / base)`.
///
/// # Returns
/// * `Some(bps)` - rounds DOWN
/// * `None` - `base == 0` or the result does not fit in u64
pub fn calc_bps(part: u64, base: u64) -> Option<u64> {
    if base == 0 {
        return None;
    }
    let bps = (part as u128)
        .checked_mul(BPS_DENOMINATOR as u128)?
        .checked_div(base as u128)?;
    u64::try_from(bps).ok()
}

/// Apply a basis-point ratio: `floor(value * bps / 10_000)`.
///
/// # Returns
/// * `Some(amount)` - rounds DOWN
/// * `None` - result does not fit in u64
pub fn apply_bps(value: u64, bps: u64) -> Option<u64> {
    let amount = (value as u128)
        .checked_mul(bps as u128)?
        .checked_div(BPS_DENOMINATOR as u128)?;
    u64::try_from(amount).ok()
}

/// Reward owed to a holder of `balance` out of `total_supply`.
///
/// `applyBPS(pending, calcBPS(balance, total_supply))`. Returns `None` when
/// `total_supply == 0`; callers skip the reward instead of asking.
pub fn reward_share(pending: u64, balance: u64, total_supply: u64) -> Option<u64> {
    apply_bps(pending, calc_bps(balance, total_supply)?)
}

fn weight_sum(weights: &[u64]) -> Option<u64> {
    weights.iter().try_fold(0u64, |acc, w| acc.checked_add(*w))
}

fn floor_shares(amount: u64, weights: &[u64], base: u64) -> Option<Vec<u64>> {
    weights
        .iter()
        .map(|w| apply_bps(amount, calc_bps(*w, base)?))
        .collect()
}

/// Split `amount` pro-rata over `weights`, never giving a slot more than its
/// weight.
///
/// Used when value leaves a delegation vector (leave resolution, transfer
/// out). Each slot first gets its basis-point floor share; the remainder is
/// then assigned in order to slots that still have room.
///
/// # Returns
/// * `Some(shares)` - `shares.len() == weights.len()`, `sum(shares) == amount`,
///   `shares[i] <= weights[i]`
/// * `None` - `amount > sum(weights)` or overflow
pub fn split_capped(amount: u64, weights: &[u64]) -> Option<Vec<u64>> {
    let base = weight_sum(weights)?;
    if amount > base {
        return None;
    }
    if amount == 0 {
        return Some(vec![0; weights.len()]);
    }

    let mut shares = floor_shares(amount, weights, base)?;
    let assigned = weight_sum(&shares)?;
    let mut remainder = amount.checked_sub(assigned)?;

    for (share, weight) in shares.iter_mut().zip(weights) {
        if remainder == 0 {
            break;
        }
        let room = weight.saturating_sub(*share);
        let take = room.min(remainder);
        *share += take;
        remainder -= take;
    }

    if remainder == 0 {
        Some(shares)
    } else {
        None
    }
}

/// Split `amount` pro-rata over `weights` with no upper bound per slot.
///
/// Used when value is added to a delegation vector (reward distribution).
/// The floor remainder goes to the heaviest slot (first one on ties).
///
/// # Returns
/// * `Some(shares)` - `sum(shares) == amount`
/// * `None` - `sum(weights) == 0` or overflow
pub fn split_growth(amount: u64, weights: &[u64]) -> Option<Vec<u64>> {
    let base = weight_sum(weights)?;
    if base == 0 {
        return None;
    }

    let mut shares = floor_shares(amount, weights, base)?;
    let assigned = weight_sum(&shares)?;
    let remainder = amount.checked_sub(assigned)?;

    if remainder > 0 {
        let mut heaviest = 0;
        for (i, w) in weights.iter().enumerate() {
            if *w > weights[heaviest] {
                heaviest = i;
            }
        }
        shares[heaviest] = shares[heaviest].checked_add(remainder)?;
    }
    Some(shares)
}


// ═══════════════════════════════════════════════════════════════
// Kani Formal Verification
// ═══════════════════════════════════════════════════════════════
//
// Production-type (u64/u128) proofs live in tests/kani.rs; the u32/u64
// mirrors for CBMC tractability live in kani-proofs/src/lib.rs.
