//! CPI tag and payload verification tests.
//!
//! The stake program decodes by tag byte, so a tag mismatch means calling
//! the wrong instruction. Payload layouts are checked byte for byte.
//!
//!   Tag 0: GetEpochInfo
//!   Tag 1: GetStake
//!   Tag 2: SetStake
//!   Tag 3: GetDelegation
//!   Tag 4: SetDelegation
//!   Tag 5: EstimateUnstakeLockPeriod
//!   Tag 6: QueryClaimableReward
//!   Tag 7: ClaimReward
//!   Tag 8: ListValidators
//!   Tag 9: Send

use liquid_stake_pool::cpi::*;
use liquid_stake_pool::delegation::Delegation;
use liquid_stake_pool::stake_engine::EpochInfo;
use solana_program::pubkey::Pubkey;

fn key(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

#[test]
fn test_tags_are_distinct() {
    let mut tags = vec![
        TAG_GET_EPOCH_INFO,
        TAG_GET_STAKE,
        TAG_SET_STAKE,
        TAG_GET_DELEGATION,
        TAG_SET_DELEGATION,
        TAG_ESTIMATE_UNSTAKE_LOCK_PERIOD,
        TAG_QUERY_CLAIMABLE_REWARD,
        TAG_CLAIM_REWARD,
        TAG_LIST_VALIDATORS,
        TAG_SEND,
    ];
    for (i, tag) in tags.iter().enumerate() {
        assert_eq!(*tag as usize, i);
    }
    tags.dedup();
    assert_eq!(tags.len(), 10);
}

#[test]
fn test_query_data_is_tag_only() {
    assert_eq!(build_query_data(TAG_GET_EPOCH_INFO), vec![0]);
    assert_eq!(build_query_data(TAG_CLAIM_REWARD), vec![7]);
}

#[test]
fn test_set_stake_layout() {
    let data = build_set_stake_data(0x0102_0304_0506_0708);
    assert_eq!(data.len(), 9);
    assert_eq!(data[0], 2);
    assert_eq!(&data[1..9], &0x0102_0304_0506_0708u64.to_le_bytes());
}

#[test]
fn test_set_delegation_layout() {
    let list = [Delegation::new(key(1), 4), Delegation::new(key(2), 6)];
    let data = build_set_delegation_data(&list);
    assert_eq!(data[0], 4);
    assert_eq!(&data[1..5], &2u32.to_le_bytes());
    assert_eq!(data.len(), 5 + 2 * 40);
    assert_eq!(&data[5..37], key(1).as_ref());
    assert_eq!(&data[37..45], &4u64.to_le_bytes());
    assert_eq!(&data[45..77], key(2).as_ref());
    assert_eq!(&data[77..85], &6u64.to_le_bytes());
}

#[test]
fn test_set_delegation_empty_list() {
    assert_eq!(build_set_delegation_data(&[]), vec![4, 0, 0, 0, 0]);
}

#[test]
fn test_send_layout() {
    let data = build_send_data(&key(9), 77);
    assert_eq!(data.len(), 41);
    assert_eq!(data[0], 9);
    assert_eq!(&data[1..33], key(9).as_ref());
    assert_eq!(&data[33..41], &77u64.to_le_bytes());
}

// ── Return data decoding ──

#[test]
fn test_decode_epoch_info() {
    let mut data = Vec::new();
    data.extend_from_slice(&150u64.to_le_bytes());
    data.extend_from_slice(&100u64.to_le_bytes());
    data.extend_from_slice(&200u64.to_le_bytes());
    assert_eq!(
        decode_epoch_info(&data),
        Some(EpochInfo {
            current_height: 150,
            epoch_start_height: 100,
            next_epoch_start_height: 200,
        })
    );
    assert_eq!(decode_epoch_info(&data[..23]), None);
}

#[test]
fn test_decode_amount() {
    assert_eq!(decode_amount(&42u64.to_le_bytes()), Some(42));
    assert_eq!(decode_amount(&[1, 2, 3]), None);
}

#[test]
fn test_decode_delegation_info() {
    let mut data = Vec::new();
    data.extend_from_slice(&10u64.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(key(5).as_ref());
    data.extend_from_slice(&10u64.to_le_bytes());
    let info = decode_delegation_info(&data).unwrap();
    assert_eq!(info.total_delegated, 10);
    assert_eq!(info.delegations, vec![Delegation::new(key(5), 10)]);

    // Count claims more entries than present
    data[8] = 2;
    assert_eq!(decode_delegation_info(&data), None);
}

#[test]
fn test_decode_validators() {
    let mut data = 2u32.to_le_bytes().to_vec();
    data.extend_from_slice(key(1).as_ref());
    data.extend_from_slice(key(2).as_ref());
    assert_eq!(decode_validators(&data), Some(vec![key(1), key(2)]));
    assert_eq!(decode_validators(&data[..40]), None);
}
