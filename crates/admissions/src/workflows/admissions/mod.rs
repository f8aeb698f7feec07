//! Admission application lifecycle and seat allocation.
//!
//! Applications move `DRAFT -> SUBMITTED -> VERIFIED -> APPROVED -> ADMITTED`. Reaching
//! `ADMITTED` claims exactly one seat from the application's (college, course, year) pool in the
//! same unit of work that writes the status history, so a pool can never be over-allocated.

pub mod allocation;
pub mod audit;
pub mod documents;
pub mod domain;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod policy;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use audit::{ActivityAction, ActivityEvent, AuditError, AuditSink, MemoryAuditLog};
pub use documents::DocumentGate;
pub use domain::{
    AcademicYear, Actor, ActorId, ApplicationDocument, ApplicationId, ApplicationStatus,
    CollegeId, CourseType, DocumentId, DocumentReview, DocumentStatus, DocumentType,
    DocumentUpload, NewApplication, PoolKey, Role, SeatAssignment, SeatId, StatusChange,
    StudentId,
};
pub use ledger::{Claimant, LedgerError, PoolStatus, Seat, SeatLedger, SeatOccupant};
pub use lifecycle::{StateMachine, Transition, TransitionError, LEGAL_TRANSITIONS};
pub use memory::InMemoryAdmissionStore;
pub use policy::{AccessDenied, AccessPolicy, PolicyAction};
pub use router::admission_router;
pub use service::{
    Admission, AdmissionError, AdmissionService, TransitionOutcome, TransitionRequest,
};
pub use store::{
    AdmissionStore, ApplicationRecord, ApplicationView, RepositoryError, StoreTransaction,
};
