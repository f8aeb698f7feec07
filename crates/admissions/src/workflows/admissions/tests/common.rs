use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::config::AdmissionsConfig;
use crate::workflows::admissions::audit::{ActivityEvent, AuditError, AuditSink, MemoryAuditLog};
use crate::workflows::admissions::domain::{
    AcademicYear, Actor, ApplicationStatus, CollegeId, CourseType, DocumentType, NewApplication,
    PoolKey, Role, StudentId,
};
use crate::workflows::admissions::memory::InMemoryAdmissionStore;
use crate::workflows::admissions::service::{AdmissionService, TransitionRequest};
use crate::workflows::admissions::store::{
    AdmissionStore, ApplicationRecord, RepositoryError, StoreTransaction,
};
use crate::workflows::admissions::{admission_router, ApplicationId};

pub(super) type MemoryService = AdmissionService<InMemoryAdmissionStore, MemoryAuditLog>;

pub(super) const YEAR: &str = "2025-26";

pub(super) fn college() -> CollegeId {
    CollegeId("college-a".to_string())
}

pub(super) fn other_college() -> CollegeId {
    CollegeId("college-b".to_string())
}

pub(super) fn pool() -> PoolKey {
    PoolKey::new(college(), CourseType::Gnm, AcademicYear(YEAR.to_string()))
}

pub(super) fn admin() -> Actor {
    Actor::new("admin-1", Role::Admin)
}

pub(super) fn college_staff() -> Actor {
    Actor::new("staff-1", Role::College).with_college(college())
}

pub(super) fn foreign_staff() -> Actor {
    Actor::new("staff-9", Role::College).with_college(other_college())
}

pub(super) fn agent() -> Actor {
    Actor::new("agent-1", Role::Agent).with_college(college())
}

pub(super) fn student() -> Actor {
    Actor::new("stu-portal", Role::Student).with_college(college())
}

pub(super) fn intake(student: &str) -> NewApplication {
    NewApplication {
        student_id: StudentId(student.to_string()),
        college_id: college(),
        course: CourseType::Gnm,
        academic_year: AcademicYear(YEAR.to_string()),
    }
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryAdmissionStore>,
    Arc<MemoryAuditLog>,
) {
    build_service_requiring(Vec::new())
}

pub(super) fn build_service_requiring(
    required_documents: Vec<DocumentType>,
) -> (
    MemoryService,
    Arc<InMemoryAdmissionStore>,
    Arc<MemoryAuditLog>,
) {
    let store = Arc::new(InMemoryAdmissionStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let config = AdmissionsConfig {
        required_documents,
        ..AdmissionsConfig::default()
    };
    let service = AdmissionService::new(store.clone(), audit.clone(), &config);
    (service, store, audit)
}

pub(super) fn seed_pool(service: &MemoryService, seats: u32) {
    service
        .configure_capacity(&admin(), &pool(), seats)
        .expect("pool seeded");
}

/// Drive a fresh application as admin up to `status` (never past `Approved` without a seat).
pub(super) fn application_in<S, A>(
    service: &AdmissionService<S, A>,
    student: &str,
    status: ApplicationStatus,
) -> ApplicationRecord
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    let mut record = service
        .create_application(&admin(), intake(student))
        .expect("application created");

    let path = [
        ApplicationStatus::Submitted,
        ApplicationStatus::Verified,
        ApplicationStatus::Approved,
        ApplicationStatus::Admitted,
    ];
    for next in path {
        if record.status() == status {
            break;
        }
        record = service
            .transition(&admin(), &record.id, TransitionRequest::to(next))
            .expect("forward transition")
            .application;
    }
    assert_eq!(record.status(), status);
    record
}

pub(super) fn stored(store: &InMemoryAdmissionStore, id: &ApplicationId) -> ApplicationRecord {
    store
        .fetch(id)
        .expect("store readable")
        .expect("application stored")
}

pub(super) fn router_with(service: MemoryService) -> axum::Router {
    admission_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Audit sink whose transport is always down.
#[derive(Default)]
pub(super) struct OfflineAudit;

impl AuditSink for OfflineAudit {
    fn record(&self, _event: ActivityEvent) -> Result<(), AuditError> {
        Err(AuditError::Transport("collector offline".to_string()))
    }
}

/// Store that cannot open a unit of work.
pub(super) struct UnavailableStore;

impl AdmissionStore for UnavailableStore {
    fn atomically<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(E::from(RepositoryError::Unavailable(
            "database offline".to_string(),
        )))
    }
}
