use chrono::{DateTime, Utc};

use super::domain::SeatAssignment;
use super::ledger::{self, Claimant, Seat};
use super::service::AdmissionError;
use super::store::{ApplicationRecord, StoreTransaction};

/// Binds seat claims and releases to application status changes.
///
/// Both operations run inside the caller's unit of work; the caller writes the status history in
/// that same unit, so a failed claim leaves neither a seat nor a history entry behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationCoordinator;

impl AllocationCoordinator {
    /// Claim a seat in the application's pool and return the resulting assignment.
    pub(crate) fn claim_for(
        &self,
        tx: &mut dyn StoreTransaction,
        record: &ApplicationRecord,
        at: DateTime<Utc>,
    ) -> Result<SeatAssignment, AdmissionError> {
        let pool = record.pool();
        let claimant = Claimant {
            student_id: record.student_id.clone(),
            application_id: record.id.clone(),
        };

        let Some(seat) = ledger::claim_in(tx, &pool, &claimant, at)? else {
            return Err(AdmissionError::SeatsExhausted { pool });
        };

        let roll_number = seat
            .occupant
            .as_ref()
            .map(|occupant| occupant.roll_number.clone())
            .unwrap_or_else(|| ledger::roll_number(&pool, seat.ordinal));

        Ok(SeatAssignment {
            seat_id: seat.id,
            roll_number,
        })
    }

    /// Free the seat held by an admitted application.
    pub(crate) fn release_for(
        &self,
        tx: &mut dyn StoreTransaction,
        record: &ApplicationRecord,
    ) -> Result<Seat, AdmissionError> {
        let assignment = record
            .seat
            .as_ref()
            .ok_or_else(|| AdmissionError::NotAdmitted(record.id.clone()))?;
        Ok(ledger::release_in(tx, &assignment.seat_id)?)
    }
}
