use std::sync::Arc;

use super::common::*;
use crate::workflows::admissions::domain::{ApplicationId, SeatId, StudentId};
use crate::workflows::admissions::ledger::{roll_number, Claimant, LedgerError, SeatLedger};
use crate::workflows::admissions::memory::InMemoryAdmissionStore;

fn ledger() -> SeatLedger<InMemoryAdmissionStore> {
    SeatLedger::new(Arc::new(InMemoryAdmissionStore::new()))
}

fn claimant(n: u32) -> Claimant {
    Claimant {
        student_id: StudentId(format!("stu-{n}")),
        application_id: ApplicationId(format!("app-ledger-{n}")),
    }
}

#[test]
fn roll_numbers_embed_pool_and_padded_ordinal() {
    assert_eq!(roll_number(&pool(), 7), "college-a-GNM-2025-26-007");
}

#[test]
fn claims_take_the_lowest_free_ordinal() {
    let ledger = ledger();
    ledger.set_capacity(&pool(), 3).expect("capacity set");

    let first = ledger
        .try_claim(&pool(), &claimant(1))
        .expect("claim runs")
        .expect("seat free");
    let second = ledger
        .try_claim(&pool(), &claimant(2))
        .expect("claim runs")
        .expect("seat free");
    assert_eq!((first.ordinal, second.ordinal), (1, 2));

    ledger.release(&first.id).expect("release");
    let third = ledger
        .try_claim(&pool(), &claimant(3))
        .expect("claim runs")
        .expect("seat free");
    assert_eq!(third.ordinal, 1);
    assert_eq!(
        third.occupant.map(|occupant| occupant.roll_number),
        Some("college-a-GNM-2025-26-001".to_string())
    );
}

#[test]
fn exhausted_pool_yields_none() {
    let ledger = ledger();
    ledger.set_capacity(&pool(), 1).expect("capacity set");
    ledger
        .try_claim(&pool(), &claimant(1))
        .expect("claim runs")
        .expect("seat free");

    let claim = ledger.try_claim(&pool(), &claimant(2)).expect("claim runs");

    assert!(claim.is_none());
    let status = ledger.pool_status(&pool()).expect("status");
    assert_eq!((status.total, status.occupied, status.free()), (1, 1, 0));
}

#[test]
fn unconfigured_pool_is_empty() {
    let ledger = ledger();
    let status = ledger.pool_status(&pool()).expect("status");
    assert_eq!((status.total, status.occupied), (0, 0));
    assert!(ledger
        .try_claim(&pool(), &claimant(1))
        .expect("claim runs")
        .is_none());
}

#[test]
fn student_cannot_hold_two_seats_in_one_pool() {
    let ledger = ledger();
    ledger.set_capacity(&pool(), 2).expect("capacity set");
    ledger
        .try_claim(&pool(), &claimant(1))
        .expect("claim runs")
        .expect("seat free");

    let mut again = claimant(1);
    again.application_id = ApplicationId("app-ledger-second".to_string());
    let err = ledger
        .try_claim(&pool(), &again)
        .expect_err("second seat refused");

    assert!(matches!(err, LedgerError::StudentAlreadySeated { .. }));
    assert_eq!(ledger.pool_status(&pool()).expect("status").occupied, 1);
}

#[test]
fn shrinking_drops_free_seats_from_the_top() {
    let ledger = ledger();
    ledger.set_capacity(&pool(), 4).expect("capacity set");
    let held = ledger
        .try_claim(&pool(), &claimant(1))
        .expect("claim runs")
        .expect("seat free");

    let status = ledger.set_capacity(&pool(), 2).expect("shrink");
    assert_eq!((status.total, status.occupied), (2, 1));

    let next = ledger
        .try_claim(&pool(), &claimant(2))
        .expect("claim runs")
        .expect("one free seat left");
    assert_eq!((held.ordinal, next.ordinal), (1, 2));
}

#[test]
fn shrinking_below_occupied_fails_and_changes_nothing() {
    let ledger = ledger();
    ledger.set_capacity(&pool(), 3).expect("capacity set");
    for n in 1..=2 {
        ledger
            .try_claim(&pool(), &claimant(n))
            .expect("claim runs")
            .expect("seat free");
    }

    let err = ledger
        .set_capacity(&pool(), 1)
        .expect_err("cannot drop occupied seats");

    assert!(matches!(
        err,
        LedgerError::CapacityViolation {
            requested: 1,
            occupied: 2,
            ..
        }
    ));
    let status = ledger.pool_status(&pool()).expect("status");
    assert_eq!((status.total, status.occupied), (3, 2));
}

#[test]
fn growing_appends_after_the_highest_ordinal() {
    let ledger = ledger();
    ledger.set_capacity(&pool(), 1).expect("capacity set");
    ledger.set_capacity(&pool(), 3).expect("grow");

    let ordinals: Vec<u32> = (1..=3)
        .map(|n| {
            ledger
                .try_claim(&pool(), &claimant(n))
                .expect("claim runs")
                .expect("seat free")
                .ordinal
        })
        .collect();
    assert_eq!(ordinals, vec![1, 2, 3]);
}

#[test]
fn releasing_a_free_seat_is_a_no_op() {
    let ledger = ledger();
    ledger.set_capacity(&pool(), 1).expect("capacity set");
    let seat = ledger
        .try_claim(&pool(), &claimant(1))
        .expect("claim runs")
        .expect("seat free");

    ledger.release(&seat.id).expect("first release");
    let again = ledger.release(&seat.id).expect("second release");

    assert!(!again.is_occupied());
    assert_eq!(ledger.pool_status(&pool()).expect("status").occupied, 0);
}

#[test]
fn releasing_an_unknown_seat_is_reported() {
    let err = ledger()
        .release(&SeatId("seat-missing".to_string()))
        .expect_err("unknown seat");
    assert!(matches!(err, LedgerError::SeatNotFound(_)));
}

#[test]
fn capacity_above_the_pool_limit_is_refused() {
    let ledger = ledger().with_max_pool_seats(10);
    ledger.set_capacity(&pool(), 1).expect("capacity set");

    for requested in [11, u32::MAX] {
        let err = ledger
            .set_capacity(&pool(), requested)
            .expect_err("over the limit");
        assert!(matches!(
            err,
            LedgerError::CapacityLimit { limit: 10, .. }
        ));
    }

    let status = ledger.set_capacity(&pool(), 10).expect("at the limit");
    assert_eq!(status.total, 10);
}
