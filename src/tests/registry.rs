use proptest::prelude::*;

use crate::message::PortIdentity;
use crate::registry::{
    DelayReqEntry, DelayReqState, EntryKey, Occupancy, Outstanding, OutstandingList, SyncEntry,
    FollowUpAction,
};
use crate::timestamp::PtpTimestamp;

fn key(clock: u64, seq: u16) -> EntryKey {
    EntryKey {
        source_port_identity: PortIdentity::new(clock, 1),
        sequence_id: seq,
    }
}

fn fill_entry(list: &mut OutstandingList<DelayReqEntry, DelayReqState>, index: usize, k: EntryKey) {
    let entry = &mut list.slot_mut(index).entry;
    entry.source_port_identity = k.source_port_identity;
    entry.sequence_id = k.sequence_id;
}

// ===== Allocation and lookup =====

#[test]
fn test_allocate_up_to_capacity() {
    let mut list: OutstandingList<DelayReqEntry, DelayReqState> = OutstandingList::new(3, 4);
    for seq in 0..3 {
        let index = list.allocate(DelayReqState::AwaitingResponse).unwrap();
        fill_entry(&mut list, index, key(0xA, seq));
    }
    assert_eq!(list.occupied(), 3);
    // table full: the caller must drop the triggering message
    assert!(list.allocate(DelayReqState::AwaitingResponse).is_none());
    assert_eq!(list.occupied(), 3);
}

#[test]
fn test_find_matches_key_only_while_occupied() {
    let mut list: OutstandingList<DelayReqEntry, DelayReqState> = OutstandingList::new(4, 4);
    let index = list.allocate(DelayReqState::AwaitingResponse).unwrap();
    fill_entry(&mut list, index, key(0xB, 7));
    assert_eq!(list.find(&key(0xB, 7)), Some(index));
    assert_eq!(list.find(&key(0xB, 8)), None);
    assert_eq!(list.find(&key(0xC, 7)), None);
    list.release(index);
    assert_eq!(list.find(&key(0xB, 7)), None);
}

#[test]
fn test_release_then_reallocate_resets_fields() {
    let mut list: OutstandingList<DelayReqEntry, DelayReqState> = OutstandingList::new(1, 4);
    let index = list.allocate(DelayReqState::AwaitingResponse).unwrap();
    {
        let entry = &mut list.slot_mut(index).entry;
        entry.source_port_identity = PortIdentity::new(0xD, 2);
        entry.sequence_id = 99;
        entry.origin_port = 3;
        entry.rx_time = PtpTimestamp::new(5, 5);
        entry.tx_time = vec![Some(PtpTimestamp::new(6, 6))];
        entry.saved_resp.extend_from_slice(&[1, 2, 3]);
    }
    list.release(index);
    let again = list.allocate(DelayReqState::AwaitingResponse).unwrap();
    assert_eq!(again, index);
    let entry = &list.slot(again).entry;
    // no field carries over into the reused slot
    assert_eq!(
        entry.key(),
        EntryKey {
            source_port_identity: PortIdentity::default(),
            sequence_id: 0,
        }
    );
    assert_eq!(entry.origin_port, 0);
    assert_eq!(entry.rx_time, PtpTimestamp::ZERO);
    assert_eq!(entry.tx_time, vec![None]);
    assert!(entry.saved_resp.is_empty());
}

#[test]
fn test_allocate_resets_age() {
    let mut list: OutstandingList<SyncEntry, FollowUpAction> = OutstandingList::new(2, 2);
    let index = list.allocate(FollowUpAction::Create).unwrap();
    list.age_tick();
    list.age_tick();
    assert_eq!(list.slot(index).age, 2);
    list.release(index);
    let again = list.allocate(FollowUpAction::AwaitTransmit).unwrap();
    assert_eq!(list.slot(again).age, 0);
}

// ===== Aging =====

#[test]
fn test_age_tick_frees_after_threshold() {
    let mut list: OutstandingList<SyncEntry, FollowUpAction> = OutstandingList::new(2, 2);
    let index = list.allocate(FollowUpAction::AwaitTransmit).unwrap();
    assert_eq!(list.age_tick(), 0);
    assert_eq!(list.age_tick(), 0);
    assert!(list.slot(index).occupancy.is_occupied());
    // third tick exceeds max_age = 2
    assert_eq!(list.age_tick(), 1);
    assert!(!list.slot(index).occupancy.is_occupied());
}

#[test]
fn test_age_tick_skips_free_slots() {
    let mut list: OutstandingList<SyncEntry, FollowUpAction> = OutstandingList::new(4, 1);
    let a = list.allocate(FollowUpAction::Create).unwrap();
    list.release(a);
    assert_eq!(list.age_tick(), 0);
    assert_eq!(list.slot(a).age, 0);
}

#[test]
fn test_occupancy_state_transition() {
    let mut list: OutstandingList<SyncEntry, FollowUpAction> = OutstandingList::new(1, 2);
    let index = list.allocate(FollowUpAction::AwaitTransmit).unwrap();
    list.slot_mut(index).occupancy = Occupancy::Occupied(FollowUpAction::AwaitTransmitReady);
    assert_eq!(
        list.slot(index).occupancy,
        Occupancy::Occupied(FollowUpAction::AwaitTransmitReady)
    );
}

// ===== Properties =====

proptest! {
    // Arbitrary interleavings of allocate/release/age never grow the
    // table or corrupt the occupancy accounting.
    #[test]
    fn prop_capacity_never_exceeded(ops in prop::collection::vec(0u8..3, 1..64)) {
        let mut list: OutstandingList<DelayReqEntry, DelayReqState> = OutstandingList::new(4, 3);
        let mut live: Vec<usize> = Vec::new();
        for op in ops {
            match op {
                0 => {
                    if let Some(index) = list.allocate(DelayReqState::AwaitingResponse) {
                        prop_assert!(!live.contains(&index));
                        live.push(index);
                    } else {
                        prop_assert_eq!(live.len(), 4);
                    }
                }
                1 => {
                    if let Some(index) = live.pop() {
                        list.release(index);
                    }
                }
                _ => {
                    let freed = list.age_tick();
                    if freed > 0 {
                        // aged-out slots are no longer occupied
                        live.retain(|&i| list.slot(i).occupancy.is_occupied());
                    }
                }
            }
            prop_assert_eq!(list.occupied(), live.len());
            prop_assert!(list.occupied() <= list.capacity());
        }
    }
}
