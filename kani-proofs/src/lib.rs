//! Kani formal verification for liquid-stake-pool basis-point math.
//!
//! ZERO dependencies. Pure Rust. CBMC-friendly.
//!
//! Functions use u32 inputs / u64 intermediates. The production code uses
//! u64/u128, but the properties checked here (floor bounds, no
//! over-allocation, exact splits, monotonicity) are scale-invariant.
//! u32 keeps SAT formulas tractable for CBMC.
//!
//! Run all:   cargo kani --lib
//! Run one:   cargo kani --harness proof_two_holders_no_over_allocation

// ═══════════════════════════════════════════════════════════════
// Basis-point math (u32/u64 mirror of src/math.rs)
// ═══════════════════════════════════════════════════════════════

pub const BPS_DENOMINATOR: u32 = 10_000;

/// floor(part * 10_000 / base)
pub fn calc_bps(part: u32, base: u32) -> Option<u32> {
    if base == 0 {
        return None;
    }
    let bps = (part as u64)
        .checked_mul(BPS_DENOMINATOR as u64)?
        .checked_div(base as u64)?;
    u32::try_from(bps).ok()
}

/// floor(value * bps / 10_000)
pub fn apply_bps(value: u32, bps: u32) -> Option<u32> {
    let amount = (value as u64)
        .checked_mul(bps as u64)?
        .checked_div(BPS_DENOMINATOR as u64)?;
    u32::try_from(amount).ok()
}

pub fn reward_share(pending: u32, balance: u32, total_supply: u32) -> Option<u32> {
    apply_bps(pending, calc_bps(balance, total_supply)?)
}

/// Two-slot capped split: floor shares, remainder filled in order up to each
/// weight.
pub fn split_capped2(amount: u32, w0: u32, w1: u32) -> Option<(u32, u32)> {
    let base = w0.checked_add(w1)?;
    if amount > base {
        return None;
    }
    if amount == 0 {
        return Some((0, 0));
    }
    let mut s0 = apply_bps(amount, calc_bps(w0, base)?)?;
    let mut s1 = apply_bps(amount, calc_bps(w1, base)?)?;
    let mut rem = amount - s0 - s1;
    let take0 = (w0 - s0).min(rem);
    s0 += take0;
    rem -= take0;
    let take1 = (w1 - s1).min(rem);
    s1 += take1;
    rem -= take1;
    if rem == 0 {
        Some((s0, s1))
    } else {
        None
    }
}

/// Two-slot growth split: floor shares, remainder to the heavier slot.
pub fn split_growth2(amount: u32, w0: u32, w1: u32) -> Option<(u32, u32)> {
    let base = w0.checked_add(w1)?;
    if base == 0 {
        return None;
    }
    let s0 = apply_bps(amount, calc_bps(w0, base)?)?;
    let s1 = apply_bps(amount, calc_bps(w1, base)?)?;
    let rem = amount - s0 - s1;
    if w1 > w0 {
        Some((s0, s1 + rem))
    } else {
        Some((s0 + rem, s1))
    }
}

// ═══════════════════════════════════════════════════════════════
// KANI PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod proofs {
    use super::*;

    // ── 1. Floor bounds ──

    #[kani::proof]
    fn proof_calc_bps_whole() {
        let b: u32 = kani::any();
        kani::assume(b > 0);
        assert_eq!(calc_bps(b, b), Some(BPS_DENOMINATOR));
    }

    #[kani::proof]
    fn proof_calc_bps_bounded() {
        let part: u32 = kani::any();
        let base: u32 = kani::any();
        kani::assume(base > 0 && part <= base);
        assert!(calc_bps(part, base).unwrap() <= BPS_DENOMINATOR);
    }

    #[kani::proof]
    fn proof_apply_bps_bounded() {
        let value: u32 = kani::any();
        let bps: u32 = kani::any();
        kani::assume(bps <= BPS_DENOMINATOR);
        assert!(apply_bps(value, bps).unwrap() <= value);
    }

    // ── 2. No over-allocation ──

    #[kani::proof]
    fn proof_two_holders_no_over_allocation() {
        let pending: u32 = kani::any();
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        kani::assume(a > 0 && b > 0);
        kani::assume(a <= 1_000_000 && b <= 1_000_000);

        let supply = a + b;
        let ra = reward_share(pending, a, supply).unwrap();
        let rb = reward_share(pending, b, supply).unwrap();
        assert!((ra as u64) + (rb as u64) <= pending as u64);
    }

    #[kani::proof]
    fn proof_reward_share_never_exceeds_exact() {
        let pending: u32 = kani::any();
        let balance: u32 = kani::any();
        let supply: u32 = kani::any();
        kani::assume(supply > 0 && balance <= supply);

        let r = reward_share(pending, balance, supply).unwrap();
        assert!((r as u64) * (supply as u64) <= (pending as u64) * (balance as u64));
    }

    // ── 3. Monotonicity ──

    #[kani::proof]
    fn proof_reward_share_monotonic() {
        let pending: u32 = kani::any();
        let supply: u32 = kani::any();
        let lo: u32 = kani::any();
        let hi: u32 = kani::any();
        kani::assume(supply > 0 && lo <= hi && hi <= supply);

        let r_lo = reward_share(pending, lo, supply).unwrap();
        let r_hi = reward_share(pending, hi, supply).unwrap();
        assert!(r_lo <= r_hi);
    }

    // ── 4. Exact splits ──

    #[kani::proof]
    fn proof_split_capped_exact() {
        let w0: u32 = kani::any();
        let w1: u32 = kani::any();
        let amount: u32 = kani::any();
        kani::assume(w0 <= 100_000 && w1 <= 100_000);
        kani::assume(amount <= w0 + w1);

        let (s0, s1) = split_capped2(amount, w0, w1).unwrap();
        assert_eq!(s0 + s1, amount);
        assert!(s0 <= w0 && s1 <= w1);
    }

    #[kani::proof]
    fn proof_split_growth_exact() {
        let w0: u32 = kani::any();
        let w1: u32 = kani::any();
        let amount: u32 = kani::any();
        kani::assume(w0 <= 100_000 && w1 <= 100_000 && w0 + w1 > 0);
        kani::assume(amount <= 100_000);

        let (s0, s1) = split_growth2(amount, w0, w1).unwrap();
        assert_eq!(s0 + s1, amount);
    }

    // ── 5. Arithmetic safety ──

    #[kani::proof]
    fn proof_no_panic() {
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        let c: u32 = kani::any();
        let _ = calc_bps(a, b);
        let _ = apply_bps(a, b);
        let _ = reward_share(a, b, c);
        let _ = split_growth2(a, b, c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_matches_known_values() {
        assert_eq!(calc_bps(1, 3), Some(3_333));
        assert_eq!(apply_bps(7, 3_333), Some(2));
        assert_eq!(split_capped2(5, 4, 6), Some((2, 3)));
        assert_eq!(split_growth2(10, 1, 2), Some((3, 7)));
        assert_eq!(split_growth2(1, 5, 5), Some((1, 0)));
    }
}
