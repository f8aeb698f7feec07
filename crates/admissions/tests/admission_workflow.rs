//! End-to-end admission scenarios through the public service facade and HTTP router.

mod common {
    use std::sync::Arc;

    use admissions::config::AdmissionsConfig;
    use admissions::workflows::admissions::{
        AcademicYear, Actor, AdmissionService, ApplicationRecord, ApplicationStatus, CollegeId,
        CourseType, DocumentType, InMemoryAdmissionStore, MemoryAuditLog, NewApplication, PoolKey,
        Role, StudentId, TransitionRequest,
    };

    pub(super) type Service = AdmissionService<InMemoryAdmissionStore, MemoryAuditLog>;

    pub(super) fn registrar() -> Actor {
        Actor::new("registrar", Role::College).with_college(CollegeId("st-marys".to_string()))
    }

    pub(super) fn admin() -> Actor {
        Actor::new("ops-admin", Role::Admin)
    }

    pub(super) fn pool() -> PoolKey {
        PoolKey::new(
            CollegeId("st-marys".to_string()),
            CourseType::Anm,
            AcademicYear("2026".to_string()),
        )
    }

    pub(super) fn service(required: Vec<DocumentType>) -> (Service, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::new());
        let config = AdmissionsConfig {
            required_documents: required,
            ..AdmissionsConfig::default()
        };
        let service = AdmissionService::new(
            Arc::new(InMemoryAdmissionStore::new()),
            audit.clone(),
            &config,
        );
        (service, audit)
    }

    pub(super) fn approved(service: &Service, student: &str) -> ApplicationRecord {
        let mut record = service
            .create_application(
                &registrar(),
                NewApplication {
                    student_id: StudentId(student.to_string()),
                    college_id: CollegeId("st-marys".to_string()),
                    course: CourseType::Anm,
                    academic_year: AcademicYear("2026".to_string()),
                },
            )
            .expect("created");
        for status in [
            ApplicationStatus::Submitted,
            ApplicationStatus::Verified,
            ApplicationStatus::Approved,
        ] {
            record = service
                .transition(&registrar(), &record.id, TransitionRequest::to(status))
                .expect("forward")
                .application;
        }
        record
    }
}

use std::sync::Arc;

use admissions::workflows::admissions::{
    admission_router, ActivityAction, AdmissionError, ApplicationStatus, DocumentReview,
    DocumentStatus, DocumentType, DocumentUpload, NewApplication, StudentId, TransitionRequest,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::Value;
use tower::ServiceExt;

#[test]
fn last_seat_goes_to_exactly_one_contender() {
    let (service, audit) = service(Vec::new());
    service
        .configure_capacity(&admin(), &pool(), 1)
        .expect("pool seeded");
    let contenders: Vec<_> = (0..8)
        .map(|n| approved(&service, &format!("student-{n}")))
        .collect();

    let outcomes: Vec<_> = std::thread::scope(|scope| {
        contenders
            .iter()
            .map(|record| {
                let service = &service;
                scope.spawn(move || service.allocate(&registrar(), &record.id, None))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect()
    });

    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| matches!(err, AdmissionError::SeatsExhausted { .. })));
    assert_eq!(audit.count(ActivityAction::SeatAllocate), 1);
    assert_eq!(audit.count(ActivityAction::SeatAllocationFailed), 7);

    let status = service.pool_status(&registrar(), &pool()).expect("status");
    assert_eq!(status.free(), 0);
}

#[test]
fn documents_gate_verification_until_reviewed() {
    let (service, _) = service(vec![DocumentType::Marksheet10And2]);
    let record = service
        .create_application(
            &registrar(),
            NewApplication {
                student_id: StudentId("student-docs".to_string()),
                college_id: pool().college_id,
                course: pool().course,
                academic_year: pool().academic_year,
            },
        )
        .expect("created");
    service
        .transition(&registrar(), &record.id, TransitionRequest::to(ApplicationStatus::Submitted))
        .expect("submitted");

    let blocked = service
        .transition(&registrar(), &record.id, TransitionRequest::to(ApplicationStatus::Verified))
        .expect_err("marksheet missing");
    assert_eq!(blocked.kind(), "DocumentsIncomplete");

    let document = service
        .attach_document(
            &registrar(),
            &record.id,
            DocumentUpload {
                document_type: DocumentType::Marksheet10And2,
                file_name: "marks.pdf".to_string(),
                storage_key: "st-marys/student-docs/marks.pdf".to_string(),
            },
        )
        .expect("attached");
    service
        .review_document(
            &registrar(),
            &record.id,
            &document.id,
            DocumentReview {
                status: DocumentStatus::Verified,
                flagged: false,
                flag_reason: None,
            },
        )
        .expect("reviewed");

    let verified = service
        .transition(&registrar(), &record.id, TransitionRequest::to(ApplicationStatus::Verified))
        .expect("gate passes");
    assert_eq!(verified.application.status(), ApplicationStatus::Verified);
}

#[tokio::test]
async fn router_serves_application_reads_with_history() {
    let (service, _) = service(Vec::new());
    let record = approved(&service, "student-http");
    let router = admission_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::get(format!("/api/v1/applications/{}", record.id))
                .header("x-actor-id", "registrar")
                .header("x-actor-role", "college")
                .header("x-college-id", "st-marys")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(payload["status"], "APPROVED");
    assert_eq!(payload["version"], 4);
    assert_eq!(payload["history"].as_array().map(Vec::len), Some(4));
}
