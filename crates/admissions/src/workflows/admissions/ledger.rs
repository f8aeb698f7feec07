use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, PoolKey, SeatId, StudentId};
use super::store::{AdmissionStore, RepositoryError, StoreTransaction};

/// One admission slot in a (college, course, academic year) pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub pool: PoolKey,
    /// 1-based position within the pool; drives claim order and roll numbers.
    pub ordinal: u32,
    pub occupant: Option<SeatOccupant>,
}

impl Seat {
    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}

/// Binding between a seat and the student holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatOccupant {
    pub student_id: StudentId,
    pub application_id: ApplicationId,
    pub roll_number: String,
    pub allocated_at: DateTime<Utc>,
}

/// Who a claim is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    pub student_id: StudentId,
    pub application_id: ApplicationId,
}

/// Derived capacity view for one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub pool: PoolKey,
    pub total: u32,
    pub occupied: u32,
}

impl PoolStatus {
    pub fn free(&self) -> u32 {
        self.total.saturating_sub(self.occupied)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("student {student_id} already holds a seat in pool {pool}")]
    StudentAlreadySeated { student_id: StudentId, pool: PoolKey },
    #[error("cannot resize pool {pool} to {requested} seats while {occupied} are occupied")]
    CapacityViolation {
        pool: PoolKey,
        requested: u32,
        occupied: u32,
    },
    #[error("pool {pool} cannot hold {requested} seats (limit {limit})")]
    CapacityLimit {
        pool: PoolKey,
        requested: u32,
        limit: u32,
    },
    #[error("seat {0} not found")]
    SeatNotFound(SeatId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Seat count a pool may grow to unless the ledger is configured otherwise.
pub const DEFAULT_MAX_POOL_SEATS: u32 = 5_000;

static SEAT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_seat_id() -> SeatId {
    let id = SEAT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SeatId(format!("seat-{id:06}"))
}

/// Roll numbers are sequential within a pool: `<college>-<COURSE>-<year>-<ordinal>`.
pub fn roll_number(pool: &PoolKey, ordinal: u32) -> String {
    format!(
        "{}-{}-{}-{ordinal:03}",
        pool.college_id, pool.course, pool.academic_year
    )
}

/// Claim the lowest-ordinal free seat of `pool` inside an open unit of work.
///
/// Returns `Ok(None)` when the pool is exhausted. The read and the occupancy flip share the
/// caller's transaction, so two claims racing for the last seat cannot both see it free.
pub(crate) fn claim_in(
    tx: &mut dyn StoreTransaction,
    pool: &PoolKey,
    claimant: &Claimant,
    at: DateTime<Utc>,
) -> Result<Option<Seat>, LedgerError> {
    let seats = tx.seats_in_pool(pool)?;

    let already_seated = seats.iter().any(|seat| {
        seat.occupant
            .as_ref()
            .is_some_and(|occupant| occupant.student_id == claimant.student_id)
    });
    if already_seated {
        return Err(LedgerError::StudentAlreadySeated {
            student_id: claimant.student_id.clone(),
            pool: pool.clone(),
        });
    }

    let Some(mut seat) = seats.into_iter().find(|seat| !seat.is_occupied()) else {
        return Ok(None);
    };

    seat.occupant = Some(SeatOccupant {
        student_id: claimant.student_id.clone(),
        application_id: claimant.application_id.clone(),
        roll_number: roll_number(pool, seat.ordinal),
        allocated_at: at,
    });
    tx.put_seat(seat.clone())?;
    Ok(Some(seat))
}

/// Free a seat inside an open unit of work. Releasing a free seat is a no-op.
pub(crate) fn release_in(
    tx: &mut dyn StoreTransaction,
    seat_id: &SeatId,
) -> Result<Seat, LedgerError> {
    let mut seat = tx
        .seat(seat_id)?
        .ok_or_else(|| LedgerError::SeatNotFound(seat_id.clone()))?;

    if seat.occupant.take().is_some() {
        tx.put_seat(seat.clone())?;
    }
    Ok(seat)
}

pub(crate) fn status_in(
    tx: &mut dyn StoreTransaction,
    pool: &PoolKey,
) -> Result<PoolStatus, LedgerError> {
    let seats = tx.seats_in_pool(pool)?;
    Ok(summarize(pool, &seats))
}

/// Grow the pool with new free seats or shrink it by dropping free seats from the top.
///
/// `total` above `limit` is refused before any seat is touched.
pub(crate) fn set_capacity_in(
    tx: &mut dyn StoreTransaction,
    pool: &PoolKey,
    total: u32,
    limit: u32,
) -> Result<PoolStatus, LedgerError> {
    let over_limit = || LedgerError::CapacityLimit {
        pool: pool.clone(),
        requested: total,
        limit,
    };
    if total > limit {
        return Err(over_limit());
    }

    let seats = tx.seats_in_pool(pool)?;
    let current = summarize(pool, &seats);

    if total < current.occupied {
        return Err(LedgerError::CapacityViolation {
            pool: pool.clone(),
            requested: total,
            occupied: current.occupied,
        });
    }

    if total > current.total {
        let next_ordinal = seats
            .last()
            .map_or(Some(1), |seat| seat.ordinal.checked_add(1))
            .ok_or_else(over_limit)?;
        let end = next_ordinal
            .checked_add(total - current.total)
            .ok_or_else(over_limit)?;
        for ordinal in next_ordinal..end {
            tx.put_seat(Seat {
                id: next_seat_id(),
                pool: pool.clone(),
                ordinal,
                occupant: None,
            })?;
        }
    } else {
        let surplus = (current.total - total) as usize;
        let removable: Vec<SeatId> = seats
            .iter()
            .rev()
            .filter(|seat| !seat.is_occupied())
            .take(surplus)
            .map(|seat| seat.id.clone())
            .collect();
        for id in &removable {
            tx.remove_seat(id)?;
        }
    }

    status_in(tx, pool)
}

fn summarize(pool: &PoolKey, seats: &[Seat]) -> PoolStatus {
    PoolStatus {
        pool: pool.clone(),
        total: seats.len() as u32,
        occupied: seats.iter().filter(|seat| seat.is_occupied()).count() as u32,
    }
}

/// Single source of truth for seat capacity, backed by the admission store.
pub struct SeatLedger<S> {
    store: Arc<S>,
    max_pool_seats: u32,
}

impl<S> Clone for SeatLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_pool_seats: self.max_pool_seats,
        }
    }
}

impl<S> SeatLedger<S>
where
    S: AdmissionStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_pool_seats: DEFAULT_MAX_POOL_SEATS,
        }
    }

    pub fn with_max_pool_seats(mut self, max_pool_seats: u32) -> Self {
        self.max_pool_seats = max_pool_seats;
        self
    }

    /// Atomically claim one free seat, or `None` when the pool is full.
    pub fn try_claim(
        &self,
        pool: &PoolKey,
        claimant: &Claimant,
    ) -> Result<Option<Seat>, LedgerError> {
        let at = Utc::now();
        self.store.atomically(|tx| claim_in(tx, pool, claimant, at))
    }

    pub fn release(&self, seat_id: &SeatId) -> Result<Seat, LedgerError> {
        self.store.atomically(|tx| release_in(tx, seat_id))
    }

    pub fn pool_status(&self, pool: &PoolKey) -> Result<PoolStatus, LedgerError> {
        self.store.atomically(|tx| status_in(tx, pool))
    }

    /// Resize a pool. Shrinking below the occupied count or growing past the configured limit
    /// fails and changes nothing.
    pub fn set_capacity(&self, pool: &PoolKey, total: u32) -> Result<PoolStatus, LedgerError> {
        let limit = self.max_pool_seats;
        self.store.atomically(|tx| set_capacity_in(tx, pool, total, limit))
    }
}
