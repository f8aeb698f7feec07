use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::allocation::AllocationCoordinator;
use super::audit::{ActivityAction, ActivityEvent, AuditSink};
use super::documents::{self, DocumentGate};
use super::domain::{
    Actor, ApplicationDocument, ApplicationId, ApplicationStatus, DocumentId, DocumentReview,
    DocumentType, DocumentUpload, NewApplication, PoolKey, SeatAssignment, SeatId, StudentId,
};
use super::ledger::{LedgerError, PoolStatus, Seat, SeatLedger};
use super::lifecycle::{StateMachine, Transition, TransitionError};
use super::policy::{AccessDenied, AccessPolicy, PolicyAction};
use super::store::{AdmissionStore, ApplicationRecord, RepositoryError, StoreTransaction};
use crate::config::AdmissionsConfig;

/// Service composing the access policy, state machine, seat ledger, and audit trail.
pub struct AdmissionService<S, A> {
    store: Arc<S>,
    audit: Arc<A>,
    ledger: SeatLedger<S>,
    policy: AccessPolicy,
    gate: DocumentGate,
    coordinator: AllocationCoordinator,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// Caller request to move an application to another status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub to: ApplicationStatus,
    /// Version the caller last observed; a mismatch fails with `ConcurrencyConflict`.
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl TransitionRequest {
    pub fn to(status: ApplicationStatus) -> Self {
        Self {
            to: status,
            expected_version: None,
            comment: None,
        }
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Committed result of a transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub application: ApplicationRecord,
    pub transition: Transition,
    /// Present when the transition claimed a seat.
    pub seat: Option<SeatAssignment>,
}

/// Successful seat allocation.
#[derive(Debug, Clone)]
pub struct Admission {
    pub application: ApplicationRecord,
    pub seat_id: SeatId,
    pub roll_number: String,
}

impl<S, A> AdmissionService<S, A>
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    pub fn new(store: Arc<S>, audit: Arc<A>, config: &AdmissionsConfig) -> Self {
        let gate = DocumentGate::new(config.required_documents.iter().copied());
        Self::with_policy(store, audit, AccessPolicy::default(), gate)
            .with_max_pool_seats(config.max_pool_seats)
    }

    pub fn with_policy(
        store: Arc<S>,
        audit: Arc<A>,
        policy: AccessPolicy,
        gate: DocumentGate,
    ) -> Self {
        let ledger = SeatLedger::new(Arc::clone(&store));
        Self {
            store,
            audit,
            ledger,
            policy,
            gate,
            coordinator: AllocationCoordinator,
        }
    }

    /// Cap the seat count any single pool may be configured with.
    pub fn with_max_pool_seats(mut self, max_pool_seats: u32) -> Self {
        self.ledger = self.ledger.with_max_pool_seats(max_pool_seats);
        self
    }

    /// Create a new application in `Draft`.
    pub fn create_application(
        &self,
        actor: &Actor,
        intake: NewApplication,
    ) -> Result<ApplicationRecord, AdmissionError> {
        self.policy.authorize(actor, PolicyAction::CreateApplication, &intake.college_id)?;

        let now = Utc::now();
        let record = ApplicationRecord::draft(next_application_id(), intake, actor.id.clone(), now);
        self.store.atomically(|tx| tx.insert_application(record.clone()))?;

        info!(
            application_id = %record.id,
            pool = %record.pool(),
            actor = %actor.id,
            "application created"
        );
        self.publish(
            ActivityEvent::new(
                ActivityAction::ApplicationCreate,
                &actor.id,
                &record.college_id,
                record.id.0.clone(),
                now,
            )
            .detail("status", ApplicationStatus::Draft.label()),
        );

        Ok(record)
    }

    /// Fetch an application the actor is allowed to see.
    pub fn get(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, AdmissionError> {
        let record = self
            .store
            .fetch(application_id)?
            .ok_or_else(|| AdmissionError::application_not_found(application_id))?;
        self.policy
            .authorize_application_read(actor, &record.college_id, &record.student_id)?;
        Ok(record)
    }

    /// Apply a status transition. `Approved -> Admitted` claims a seat in the same unit of work.
    pub fn transition(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, AdmissionError> {
        let now = Utc::now();
        let result = self.store.atomically::<_, AdmissionError, _>(|tx| {
            let mut record = load(tx, application_id)?;
            let from = record.status();

            self.policy.authorize(
                actor,
                PolicyAction::Transition(Transition::new(from, request.to)),
                &record.college_id,
            )?;
            check_version(&record, request.expected_version)?;
            let transition = StateMachine::validate(from, request.to)?;

            if transition.is_verification() && self.gate.is_enabled() {
                let missing = self.gate.missing(&record);
                if !missing.is_empty() {
                    return Err(AdmissionError::DocumentsIncomplete {
                        application_id: record.id.clone(),
                        missing,
                    });
                }
            }

            let seat = if transition.is_admission() {
                Some(self.coordinator.claim_for(tx, &record, now)?)
            } else {
                None
            };
            if seat.is_some() {
                record.seat = seat.clone();
            }

            let comment = request.comment.clone();
            StateMachine::apply(&mut record, transition.to, &actor.id, now, comment)?;
            tx.update_application(record.clone())?;

            Ok(TransitionOutcome {
                application: record,
                transition,
                seat,
            })
        });

        match &result {
            Ok(outcome) => self.record_transition(actor, outcome, now),
            Err(error) => self.record_rejection(actor, application_id, request.to, error, now),
        }
        result
    }

    /// Move an approved application to `Admitted`, returning the claimed roll number.
    pub fn allocate(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        expected_version: Option<u64>,
    ) -> Result<Admission, AdmissionError> {
        let request = TransitionRequest {
            to: ApplicationStatus::Admitted,
            expected_version,
            comment: None,
        };
        let outcome = self.transition(actor, application_id, request)?;
        let seat = outcome
            .seat
            .ok_or_else(|| AdmissionError::NotAdmitted(application_id.clone()))?;

        Ok(Admission {
            application: outcome.application,
            seat_id: seat.seat_id,
            roll_number: seat.roll_number,
        })
    }

    /// Admin-only reverse path: free the seat and move the application back to `Approved`.
    pub fn revoke_admission(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        expected_version: Option<u64>,
        comment: Option<String>,
    ) -> Result<TransitionOutcome, AdmissionError> {
        let now = Utc::now();
        let result = self.store.atomically::<_, AdmissionError, _>(|tx| {
            let mut record = load(tx, application_id)?;
            self.policy
                .authorize(actor, PolicyAction::RevokeAdmission, &record.college_id)?;
            check_version(&record, expected_version)?;
            if record.status() != ApplicationStatus::Admitted {
                return Err(AdmissionError::NotAdmitted(record.id.clone()));
            }

            let released = self.coordinator.release_for(tx, &record)?;
            let previous = record.seat.take();
            let transition = StateMachine::revoke(&mut record, &actor.id, now, comment.clone())?;
            tx.update_application(record.clone())?;

            Ok((
                TransitionOutcome {
                    application: record,
                    transition,
                    seat: previous,
                },
                released,
            ))
        });

        match result {
            Ok((outcome, released)) => {
                self.record_release(actor, &outcome, &released, now);
                Ok(outcome)
            }
            Err(error) => {
                warn!(
                    application_id = %application_id,
                    actor = %actor.id,
                    kind = error.kind(),
                    %error,
                    "admission revocation rejected"
                );
                Err(error)
            }
        }
    }

    /// Attach a document to an application that has not been admitted yet.
    pub fn attach_document(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        upload: DocumentUpload,
    ) -> Result<ApplicationDocument, AdmissionError> {
        let now = Utc::now();
        let (document, record) = self.store.atomically::<_, AdmissionError, _>(|tx| {
            let mut record = load(tx, application_id)?;
            self.policy
                .authorize(actor, PolicyAction::ManageDocuments, &record.college_id)?;
            ensure_documents_open(&record)?;

            let document = documents::uploaded(upload.clone(), &actor.id, now);
            record.documents.push(document.clone());
            record.updated_at = now;
            tx.update_application(record.clone())?;
            Ok((document, record))
        })?;

        self.publish(
            ActivityEvent::new(
                ActivityAction::DocumentUpload,
                &actor.id,
                &record.college_id,
                record.id.0.clone(),
                now,
            )
            .detail("document_id", document.id.0.clone())
            .detail("document_type", document.document_type.label()),
        );
        Ok(document)
    }

    /// Record a reviewer verdict on an attached document.
    pub fn review_document(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        document_id: &DocumentId,
        review: DocumentReview,
    ) -> Result<ApplicationDocument, AdmissionError> {
        let now = Utc::now();
        let (document, record) = self.store.atomically::<_, AdmissionError, _>(|tx| {
            let mut record = load(tx, application_id)?;
            self.policy
                .authorize(actor, PolicyAction::ManageDocuments, &record.college_id)?;
            ensure_documents_open(&record)?;

            let document = record
                .documents
                .iter_mut()
                .find(|document| &document.id == document_id)
                .ok_or_else(|| AdmissionError::NotFound {
                    entity: "document",
                    id: document_id.0.clone(),
                })?;
            documents::apply_review(document, review.clone());
            let document = document.clone();

            record.updated_at = now;
            tx.update_application(record.clone())?;
            Ok((document, record))
        })?;

        self.publish(
            ActivityEvent::new(
                ActivityAction::DocumentReview,
                &actor.id,
                &record.college_id,
                record.id.0.clone(),
                now,
            )
            .detail("document_id", document.id.0.clone())
            .detail("status", document.status.label())
            .detail("flagged", document.flagged.to_string()),
        );
        Ok(document)
    }

    /// Resize a seat pool. Shrinking below the occupied count fails with `CapacityViolation`.
    pub fn configure_capacity(
        &self,
        actor: &Actor,
        pool: &PoolKey,
        total: u32,
    ) -> Result<PoolStatus, AdmissionError> {
        self.policy.authorize(actor, PolicyAction::ConfigureSeats, &pool.college_id)?;

        match self.ledger.set_capacity(pool, total) {
            Ok(status) => {
                info!(
                    pool = %pool,
                    total = status.total,
                    occupied = status.occupied,
                    actor = %actor.id,
                    "seat capacity updated"
                );
                self.publish(
                    ActivityEvent::new(
                        ActivityAction::SeatCapacityUpdate,
                        &actor.id,
                        &pool.college_id,
                        pool.to_string(),
                        Utc::now(),
                    )
                    .detail("total", status.total.to_string())
                    .detail("occupied", status.occupied.to_string()),
                );
                Ok(status)
            }
            Err(error) => {
                let error = AdmissionError::from(error);
                warn!(
                    pool = %pool,
                    requested = total,
                    kind = error.kind(),
                    %error,
                    "seat capacity change rejected"
                );
                Err(error)
            }
        }
    }

    pub fn pool_status(&self, actor: &Actor, pool: &PoolKey) -> Result<PoolStatus, AdmissionError> {
        self.policy.authorize_read(actor, &pool.college_id)?;
        Ok(self.ledger.pool_status(pool)?)
    }

    fn record_transition(&self, actor: &Actor, outcome: &TransitionOutcome, at: DateTime<Utc>) {
        let record = &outcome.application;
        let transition = outcome.transition;
        info!(
            application_id = %record.id,
            from = %transition.from,
            to = %transition.to,
            actor = %actor.id,
            version = record.version(),
            "application status changed"
        );

        self.publish(
            ActivityEvent::new(
                ActivityAction::ApplicationStatusChange,
                &actor.id,
                &record.college_id,
                record.id.0.clone(),
                at,
            )
            .statuses(transition.from, transition.to),
        );

        if let Some(seat) = &outcome.seat {
            info!(
                application_id = %record.id,
                pool = %record.pool(),
                seat_id = %seat.seat_id,
                roll_number = %seat.roll_number,
                "seat allocated"
            );
            self.publish(
                ActivityEvent::new(
                    ActivityAction::SeatAllocate,
                    &actor.id,
                    &record.college_id,
                    record.id.0.clone(),
                    at,
                )
                .statuses(transition.from, transition.to)
                .detail("seat_id", seat.seat_id.0.clone())
                .detail("roll_number", seat.roll_number.clone()),
            );
        }
    }

    fn record_rejection(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        requested: ApplicationStatus,
        error: &AdmissionError,
        at: DateTime<Utc>,
    ) {
        warn!(
            application_id = %application_id,
            to = %requested,
            actor = %actor.id,
            kind = error.kind(),
            %error,
            "transition rejected"
        );

        if let AdmissionError::SeatsExhausted { pool } = error {
            self.publish(
                ActivityEvent::new(
                    ActivityAction::SeatAllocationFailed,
                    &actor.id,
                    &pool.college_id,
                    application_id.0.clone(),
                    at,
                )
                .statuses(ApplicationStatus::Approved, ApplicationStatus::Approved)
                .detail("pool", pool.to_string())
                .detail("reason", error.kind()),
            );
        }
    }

    fn record_release(
        &self,
        actor: &Actor,
        outcome: &TransitionOutcome,
        released: &Seat,
        at: DateTime<Utc>,
    ) {
        let record = &outcome.application;
        info!(
            application_id = %record.id,
            seat_id = %released.id,
            actor = %actor.id,
            "admission revoked and seat released"
        );

        let mut event = ActivityEvent::new(
            ActivityAction::SeatRelease,
            &actor.id,
            &record.college_id,
            record.id.0.clone(),
            at,
        )
        .statuses(outcome.transition.from, outcome.transition.to)
        .detail("seat_id", released.id.0.clone());
        if let Some(previous) = &outcome.seat {
            event = event.detail("roll_number", previous.roll_number.clone());
        }
        self.publish(event);

        self.publish(
            ActivityEvent::new(
                ActivityAction::ApplicationStatusChange,
                &actor.id,
                &record.college_id,
                record.id.0.clone(),
                at,
            )
            .statuses(outcome.transition.from, outcome.transition.to),
        );
    }

    // Audit delivery happens after commit; a failing sink must not undo committed state.
    fn publish(&self, event: ActivityEvent) {
        let action = event.action.label();
        if let Err(error) = self.audit.record(event) {
            warn!(action, %error, "audit event dropped");
        }
    }
}

fn load(
    tx: &dyn StoreTransaction,
    application_id: &ApplicationId,
) -> Result<ApplicationRecord, AdmissionError> {
    tx.application(application_id)?
        .ok_or_else(|| AdmissionError::application_not_found(application_id))
}

fn check_version(record: &ApplicationRecord, expected: Option<u64>) -> Result<(), AdmissionError> {
    match expected {
        Some(expected) if expected != record.version() => {
            Err(AdmissionError::ConcurrencyConflict {
                application_id: record.id.clone(),
                expected,
                actual: record.version(),
            })
        }
        _ => Ok(()),
    }
}

fn ensure_documents_open(record: &ApplicationRecord) -> Result<(), AdmissionError> {
    if record.status() == ApplicationStatus::Admitted {
        return Err(AdmissionError::DocumentsLocked {
            application_id: record.id.clone(),
            status: record.status(),
        });
    }
    Ok(())
}

fn labels(types: &[DocumentType]) -> String {
    types
        .iter()
        .map(|document_type| document_type.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error raised by the admission service. Every failure leaves stored state untouched.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error(transparent)]
    Unauthorized(#[from] AccessDenied),
    #[error("no free seat left in pool {pool}")]
    SeatsExhausted { pool: PoolKey },
    #[error("cannot resize pool {pool} to {requested} seats while {occupied} are occupied")]
    CapacityViolation {
        pool: PoolKey,
        requested: u32,
        occupied: u32,
    },
    #[error("pool {pool} cannot hold {requested} seats (limit {limit})")]
    CapacityLimitExceeded {
        pool: PoolKey,
        requested: u32,
        limit: u32,
    },
    #[error(
        "application {application_id} changed concurrently (expected version {expected}, found {actual}); re-read and retry"
    )]
    ConcurrencyConflict {
        application_id: ApplicationId,
        expected: u64,
        actual: u64,
    },
    #[error("student {student_id} already holds a seat in pool {pool}")]
    StudentAlreadySeated { student_id: StudentId, pool: PoolKey },
    #[error("application {application_id} is missing cleared documents: {}", labels(.missing))]
    DocumentsIncomplete {
        application_id: ApplicationId,
        missing: Vec<DocumentType>,
    },
    #[error("documents of application {application_id} are locked once {status}")]
    DocumentsLocked {
        application_id: ApplicationId,
        status: ApplicationStatus,
    },
    #[error("application {0} is not admitted")]
    NotAdmitted(ApplicationId),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AdmissionError {
    /// Stable error kind name shared with other components.
    pub fn kind(&self) -> &'static str {
        match self {
            AdmissionError::InvalidTransition(_) => "InvalidTransition",
            AdmissionError::Unauthorized(_) => "Unauthorized",
            AdmissionError::SeatsExhausted { .. } => "SeatsExhausted",
            AdmissionError::CapacityViolation { .. } => "CapacityViolation",
            AdmissionError::CapacityLimitExceeded { .. } => "CapacityLimitExceeded",
            AdmissionError::ConcurrencyConflict { .. } => "ConcurrencyConflict",
            AdmissionError::StudentAlreadySeated { .. } => "StudentAlreadySeated",
            AdmissionError::DocumentsIncomplete { .. } => "DocumentsIncomplete",
            AdmissionError::DocumentsLocked { .. } => "DocumentsLocked",
            AdmissionError::NotAdmitted(_) => "NotAdmitted",
            AdmissionError::NotFound { .. } => "NotFound",
            AdmissionError::Repository(RepositoryError::NotFound) => "NotFound",
            AdmissionError::Repository(RepositoryError::Conflict) => "Conflict",
            AdmissionError::Repository(RepositoryError::Unavailable(_)) => "Unavailable",
        }
    }

    fn application_not_found(application_id: &ApplicationId) -> Self {
        AdmissionError::NotFound {
            entity: "application",
            id: application_id.0.clone(),
        }
    }
}

impl From<LedgerError> for AdmissionError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::StudentAlreadySeated { student_id, pool } => {
                AdmissionError::StudentAlreadySeated { student_id, pool }
            }
            LedgerError::CapacityViolation {
                pool,
                requested,
                occupied,
            } => AdmissionError::CapacityViolation {
                pool,
                requested,
                occupied,
            },
            LedgerError::CapacityLimit {
                pool,
                requested,
                limit,
            } => AdmissionError::CapacityLimitExceeded {
                pool,
                requested,
                limit,
            },
            LedgerError::SeatNotFound(seat_id) => AdmissionError::NotFound {
                entity: "seat",
                id: seat_id.0,
            },
            LedgerError::Repository(error) => AdmissionError::Repository(error),
        }
    }
}
