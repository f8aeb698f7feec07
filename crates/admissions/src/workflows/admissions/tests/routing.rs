use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::config::AdmissionsConfig;
use crate::workflows::admissions::audit::MemoryAuditLog;
use crate::workflows::admissions::domain::{Actor, ApplicationStatus};
use crate::workflows::admissions::router::{
    self, SessionActor, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, COLLEGE_ID_HEADER,
};
use crate::workflows::admissions::service::AdmissionService;

fn request(method: Method, uri: &str, actor: &Actor, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(ACTOR_ID_HEADER, actor.id.0.as_str())
        .header(ACTOR_ROLE_HEADER, actor.role.label());
    if let Some(college_id) = &actor.college_id {
        builder = builder.header(COLLEGE_ID_HEADER, college_id.0.as_str());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn pool_uri() -> String {
    format!("/api/v1/seat-pools/college-a/gnm/{YEAR}")
}

#[tokio::test]
async fn create_route_returns_draft_view() {
    let (service, _, _) = build_service();
    let router = router_with(service);

    let response = router
        .oneshot(request(
            Method::POST,
            "/api/v1/applications",
            &college_staff(),
            Some(json!({
                "student_id": "stu-1",
                "college_id": "college-a",
                "course": "GNM",
                "academic_year": YEAR,
            })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "DRAFT");
    assert_eq!(payload["version"], 1);
    assert_eq!(payload["course"], "GNM");
    assert!(payload.get("roll_number").is_none());
}

#[tokio::test]
async fn missing_identity_headers_are_unauthenticated() {
    let (service, _, _) = build_service();
    let router = router_with(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/applications/app-000001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "Unauthenticated");
}

#[tokio::test]
async fn unknown_role_header_is_unauthenticated() {
    let (service, _, _) = build_service();
    let router = router_with(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/applications/app-000001")
                .header(ACTOR_ID_HEADER, "someone")
                .header(ACTOR_ROLE_HEADER, "REGISTRAR")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn transition_route_admits_and_returns_roll_number() {
    let (service, _, _) = build_service();
    seed_pool(&service, 1);
    let record = application_in(&service, "stu-1", ApplicationStatus::Approved);
    let router = router_with(service);

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/applications/{}/transitions", record.id),
            &college_staff(),
            Some(json!({ "to": "ADMITTED", "expected_version": record.version() })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["transition"]["from"], "APPROVED");
    assert_eq!(payload["transition"]["to"], "ADMITTED");
    assert_eq!(payload["roll_number"], "college-a-GNM-2025-26-001");
    assert_eq!(payload["application"]["status"], "ADMITTED");
}

#[tokio::test]
async fn error_kinds_map_to_status_codes() {
    let (service, _, _) = build_service();
    let draft = application_in(&service, "stu-1", ApplicationStatus::Draft);
    let approved = application_in(&service, "stu-2", ApplicationStatus::Approved);
    let router = router_with(service);

    let cases = [
        (
            draft.id.0.clone(),
            admin(),
            json!({ "to": "APPROVED" }),
            StatusCode::UNPROCESSABLE_ENTITY,
            "InvalidTransition",
        ),
        (
            draft.id.0.clone(),
            student(),
            json!({ "to": "SUBMITTED" }),
            StatusCode::FORBIDDEN,
            "Unauthorized",
        ),
        (
            draft.id.0.clone(),
            admin(),
            json!({ "to": "SUBMITTED", "expected_version": 9 }),
            StatusCode::CONFLICT,
            "ConcurrencyConflict",
        ),
        (
            approved.id.0.clone(),
            admin(),
            json!({ "to": "ADMITTED" }),
            StatusCode::CONFLICT,
            "SeatsExhausted",
        ),
        (
            "app-missing".to_string(),
            admin(),
            json!({ "to": "SUBMITTED" }),
            StatusCode::NOT_FOUND,
            "NotFound",
        ),
    ];

    for (id, actor, body, status, kind) in cases {
        let response = router
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/api/v1/applications/{id}/transitions"),
                &actor,
                Some(body),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), status, "{kind}");
        let payload = read_json_body(response).await;
        assert_eq!(payload["error"], kind);
        assert!(payload["message"].as_str().is_some_and(|m| !m.is_empty()));
    }
}

#[tokio::test]
async fn seat_pool_routes_configure_and_report_capacity() {
    let (service, _, _) = build_service();
    let router = router_with(service);

    let response = router
        .clone()
        .oneshot(request(
            Method::PUT,
            &pool_uri(),
            &college_staff(),
            Some(json!({ "total": 4 })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(request(Method::GET, &pool_uri(), &agent(), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["course"], "GNM");
    assert_eq!(payload["total"], 4);
    assert_eq!(payload["free"], 4);
}

#[tokio::test]
async fn oversized_capacity_request_is_unprocessable() {
    let (service, _, _) = build_service();
    seed_pool(&service, 1);
    let router = router_with(service);

    let response = router
        .oneshot(request(
            Method::PUT,
            &pool_uri(),
            &admin(),
            Some(json!({ "total": u32::MAX })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "CapacityLimitExceeded");
}

#[tokio::test]
async fn unknown_course_in_pool_path_is_rejected() {
    let (service, _, _) = build_service();
    let router = router_with(service);

    let response = router
        .oneshot(request(
            Method::GET,
            &format!("/api/v1/seat-pools/college-a/bsc/{YEAR}"),
            &admin(),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn document_routes_attach_and_review() {
    let (service, _, _) = build_service();
    let record = application_in(&service, "stu-1", ApplicationStatus::Submitted);
    let router = router_with(service);

    let response = router
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/applications/{}/documents", record.id),
            &college_staff(),
            Some(json!({
                "document_type": "MARKSHEET_10_2",
                "file_name": "marks.pdf",
                "storage_key": "uploads/marks.pdf",
            })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let document = read_json_body(response).await;
    assert_eq!(document["status"], "UPLOADED");
    let document_id = document["id"].as_str().expect("document id").to_string();

    let response = router
        .oneshot(request(
            Method::PUT,
            &format!("/api/v1/applications/{}/documents/{document_id}", record.id),
            &college_staff(),
            Some(json!({ "status": "VERIFIED" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let reviewed = read_json_body(response).await;
    assert_eq!(reviewed["status"], "VERIFIED");
    assert_eq!(reviewed["flagged"], false);
}

#[tokio::test]
async fn revocation_route_is_admin_only() {
    let (service, _, _) = build_service();
    seed_pool(&service, 1);
    let record = application_in(&service, "stu-1", ApplicationStatus::Admitted);
    let router = router_with(service);
    let uri = format!("/api/v1/applications/{}/revocation", record.id);

    let response = router
        .clone()
        .oneshot(request(Method::POST, &uri, &college_staff(), Some(json!({}))))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(request(
            Method::POST,
            &uri,
            &admin(),
            Some(json!({ "comment": "fee not paid" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["application"]["status"], "APPROVED");
    assert_eq!(payload["roll_number"], "college-a-GNM-2025-26-001");
}

#[tokio::test]
async fn application_handler_reports_unavailable_store() {
    let service = Arc::new(AdmissionService::new(
        Arc::new(UnavailableStore),
        Arc::new(MemoryAuditLog::new()),
        &AdmissionsConfig::default(),
    ));

    let response = router::application_handler::<UnavailableStore, MemoryAuditLog>(
        State(service),
        SessionActor(admin()),
        Path("app-000001".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "Unavailable");
}
