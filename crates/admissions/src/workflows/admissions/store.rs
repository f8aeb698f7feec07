use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    AcademicYear, ActorId, ApplicationDocument, ApplicationId, ApplicationStatus, CollegeId,
    CourseType, NewApplication, PoolKey, SeatAssignment, SeatId, StatusChange, StudentId,
};
use super::ledger::Seat;

/// Stored application. Status and history are only written through the lifecycle module so the
/// current status always mirrors the last history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub student_id: StudentId,
    pub college_id: CollegeId,
    pub course: CourseType,
    pub academic_year: AcademicYear,
    status: ApplicationStatus,
    history: Vec<StatusChange>,
    pub documents: Vec<ApplicationDocument>,
    pub seat: Option<SeatAssignment>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    /// Fresh application in `Draft`, with the creation recorded as the first history entry.
    pub fn draft(
        id: ApplicationId,
        intake: NewApplication,
        created_by: ActorId,
        at: DateTime<Utc>,
    ) -> Self {
        let NewApplication {
            student_id,
            college_id,
            course,
            academic_year,
        } = intake;

        Self {
            id,
            student_id,
            college_id,
            course,
            academic_year,
            status: ApplicationStatus::Draft,
            history: vec![StatusChange {
                status: ApplicationStatus::Draft,
                at,
                actor: created_by.clone(),
                comment: None,
            }],
            documents: Vec::new(),
            seat: None,
            created_by,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// Optimistic concurrency token: the number of history entries written so far.
    pub fn version(&self) -> u64 {
        self.history.len() as u64
    }

    pub fn pool(&self) -> PoolKey {
        PoolKey::new(
            self.college_id.clone(),
            self.course,
            self.academic_year.clone(),
        )
    }

    pub(crate) fn push_status(&mut self, change: StatusChange) {
        self.status = change.status;
        self.updated_at = change.at;
        self.history.push(change);
    }

    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id.clone(),
            student_id: self.student_id.clone(),
            college_id: self.college_id.clone(),
            course: self.course.label(),
            academic_year: self.academic_year.clone(),
            status: self.status.label(),
            version: self.version(),
            roll_number: self.seat.as_ref().map(|seat| seat.roll_number.clone()),
            history: self.history.clone(),
            documents: self.documents.clone(),
        }
    }
}

/// Public representation returned by the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub college_id: CollegeId,
    pub course: &'static str,
    pub academic_year: AcademicYear,
    pub status: &'static str,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    pub history: Vec<StatusChange>,
    pub documents: Vec<ApplicationDocument>,
}

/// Reads and staged writes available inside one unit of work.
///
/// Nothing written through a transaction is visible to other callers until the enclosing
/// [`AdmissionStore::atomically`] call returns `Ok`.
pub trait StoreTransaction {
    fn application(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn insert_application(&mut self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    fn update_application(&mut self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    /// All seats of a pool ordered by ordinal.
    fn seats_in_pool(&self, pool: &PoolKey) -> Result<Vec<Seat>, RepositoryError>;
    fn seat(&self, id: &SeatId) -> Result<Option<Seat>, RepositoryError>;
    fn put_seat(&mut self, seat: Seat) -> Result<(), RepositoryError>;
    fn remove_seat(&mut self, id: &SeatId) -> Result<(), RepositoryError>;
}

/// Storage abstraction for applications and seats.
///
/// Implementations must run `work` with serializable-equivalent isolation: two units of work
/// touching the same rows behave as if one ran entirely before the other, and a unit of work
/// whose closure returns `Err` leaves no trace. `work` may run more than once when a competing
/// commit invalidated what it read, so it must not have side effects outside the transaction.
pub trait AdmissionStore: Send + Sync {
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<RepositoryError>;

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.atomically(|tx| tx.application(id))
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
