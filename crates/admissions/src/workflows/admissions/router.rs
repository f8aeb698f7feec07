use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::audit::AuditSink;
use super::domain::{
    AcademicYear, Actor, ActorId, ApplicationId, CollegeId, CourseType, DocumentId,
    DocumentReview, DocumentUpload, NewApplication, PoolKey, Role,
};
use super::ledger::PoolStatus;
use super::lifecycle::Transition;
use super::service::{AdmissionError, AdmissionService, TransitionOutcome, TransitionRequest};
use super::store::{AdmissionStore, ApplicationView, RepositoryError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const COLLEGE_ID_HEADER: &str = "x-college-id";

/// Router builder exposing the admission lifecycle over HTTP.
pub fn admission_router<S, A>(service: Arc<AdmissionService<S, A>>) -> Router
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(create_handler::<S, A>))
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<S, A>),
        )
        .route(
            "/api/v1/applications/:application_id/transitions",
            post(transition_handler::<S, A>),
        )
        .route(
            "/api/v1/applications/:application_id/revocation",
            post(revocation_handler::<S, A>),
        )
        .route(
            "/api/v1/applications/:application_id/documents",
            post(attach_document_handler::<S, A>),
        )
        .route(
            "/api/v1/applications/:application_id/documents/:document_id",
            put(review_document_handler::<S, A>),
        )
        .route(
            "/api/v1/seat-pools/:college_id/:course/:academic_year",
            get(pool_status_handler::<S, A>).put(capacity_handler::<S, A>),
        )
        .with_state(service)
}

/// Caller identity forwarded by the session layer in trusted headers.
#[derive(Debug, Clone)]
pub struct SessionActor(pub Actor);

#[async_trait]
impl<St> FromRequestParts<St> for SessionActor
where
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
            .map(SessionActor)
            .map_err(|message| {
                let payload = json!({ "error": "Unauthenticated", "message": message });
                (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
            })
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, String> {
    let header = |name: &str| -> Result<Option<String>, String> {
        headers
            .get(name)
            .map(|value| {
                value
                    .to_str()
                    .map(|value| value.trim().to_string())
                    .map_err(|_| format!("{name} header is not valid text"))
            })
            .transpose()
    };

    let id = header(ACTOR_ID_HEADER)?
        .filter(|value| !value.is_empty())
        .ok_or_else(|| format!("missing {ACTOR_ID_HEADER} header"))?;
    let role = header(ACTOR_ROLE_HEADER)?
        .ok_or_else(|| format!("missing {ACTOR_ROLE_HEADER} header"))?
        .parse::<Role>()
        .map_err(|err| err.to_string())?;
    let college_id = header(COLLEGE_ID_HEADER)?
        .filter(|value| !value.is_empty())
        .map(CollegeId);

    Ok(Actor {
        id: ActorId(id),
        role,
        college_id,
    })
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub application: ApplicationView,
    pub transition: Transition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            application: outcome.application.view(),
            transition: outcome.transition,
            roll_number: outcome.seat.map(|seat| seat.roll_number),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RevocationRequest {
    #[serde(default)]
    pub expected_version: Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CapacityRequest {
    pub total: u32,
}

#[derive(Debug, Serialize)]
pub struct PoolStatusView {
    pub college_id: CollegeId,
    pub course: &'static str,
    pub academic_year: AcademicYear,
    pub total: u32,
    pub occupied: u32,
    pub free: u32,
}

impl From<PoolStatus> for PoolStatusView {
    fn from(status: PoolStatus) -> Self {
        let free = status.free();
        Self {
            college_id: status.pool.college_id,
            course: status.pool.course.label(),
            academic_year: status.pool.academic_year,
            total: status.total,
            occupied: status.occupied,
            free,
        }
    }
}

pub(crate) async fn create_handler<S, A>(
    State(service): State<Arc<AdmissionService<S, A>>>,
    SessionActor(actor): SessionActor,
    Json(intake): Json<NewApplication>,
) -> Response
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    match service.create_application(&actor, intake) {
        Ok(record) => (StatusCode::CREATED, Json(record.view())).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn application_handler<S, A>(
    State(service): State<Arc<AdmissionService<S, A>>>,
    SessionActor(actor): SessionActor,
    Path(application_id): Path<String>,
) -> Response
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    match service.get(&actor, &ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record.view())).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn transition_handler<S, A>(
    State(service): State<Arc<AdmissionService<S, A>>>,
    SessionActor(actor): SessionActor,
    Path(application_id): Path<String>,
    Json(request): Json<TransitionRequest>,
) -> Response
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    match service.transition(&actor, &ApplicationId(application_id), request) {
        Ok(outcome) => (StatusCode::OK, Json(TransitionResponse::from(outcome))).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn revocation_handler<S, A>(
    State(service): State<Arc<AdmissionService<S, A>>>,
    SessionActor(actor): SessionActor,
    Path(application_id): Path<String>,
    Json(request): Json<RevocationRequest>,
) -> Response
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    let RevocationRequest {
        expected_version,
        comment,
    } = request;
    match service.revoke_admission(
        &actor,
        &ApplicationId(application_id),
        expected_version,
        comment,
    ) {
        Ok(outcome) => (StatusCode::OK, Json(TransitionResponse::from(outcome))).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn attach_document_handler<S, A>(
    State(service): State<Arc<AdmissionService<S, A>>>,
    SessionActor(actor): SessionActor,
    Path(application_id): Path<String>,
    Json(upload): Json<DocumentUpload>,
) -> Response
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    match service.attach_document(&actor, &ApplicationId(application_id), upload) {
        Ok(document) => (StatusCode::CREATED, Json(document)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn review_document_handler<S, A>(
    State(service): State<Arc<AdmissionService<S, A>>>,
    SessionActor(actor): SessionActor,
    Path((application_id, document_id)): Path<(String, String)>,
    Json(review): Json<DocumentReview>,
) -> Response
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    match service.review_document(
        &actor,
        &ApplicationId(application_id),
        &DocumentId(document_id),
        review,
    ) {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn pool_status_handler<S, A>(
    State(service): State<Arc<AdmissionService<S, A>>>,
    SessionActor(actor): SessionActor,
    Path(segments): Path<(String, String, String)>,
) -> Response
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    let pool = match pool_from_path(segments) {
        Ok(pool) => pool,
        Err(response) => return response,
    };
    match service.pool_status(&actor, &pool) {
        Ok(status) => (StatusCode::OK, Json(PoolStatusView::from(status))).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn capacity_handler<S, A>(
    State(service): State<Arc<AdmissionService<S, A>>>,
    SessionActor(actor): SessionActor,
    Path(segments): Path<(String, String, String)>,
    Json(request): Json<CapacityRequest>,
) -> Response
where
    S: AdmissionStore + 'static,
    A: AuditSink + 'static,
{
    let pool = match pool_from_path(segments) {
        Ok(pool) => pool,
        Err(response) => return response,
    };
    match service.configure_capacity(&actor, &pool, request.total) {
        Ok(status) => (StatusCode::OK, Json(PoolStatusView::from(status))).into_response(),
        Err(error) => error.into_response(),
    }
}

fn pool_from_path(
    (college_id, course, academic_year): (String, String, String),
) -> Result<PoolKey, Response> {
    let course = course.parse::<CourseType>().map_err(|err| {
        let payload = json!({ "error": "InvalidRequest", "message": err.to_string() });
        (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
    })?;
    Ok(PoolKey::new(
        CollegeId(college_id),
        course,
        AcademicYear(academic_year),
    ))
}

impl AdmissionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AdmissionError::NotFound { .. } | AdmissionError::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            AdmissionError::InvalidTransition(_)
            | AdmissionError::DocumentsIncomplete { .. }
            | AdmissionError::CapacityLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AdmissionError::SeatsExhausted { .. }
            | AdmissionError::CapacityViolation { .. }
            | AdmissionError::ConcurrencyConflict { .. }
            | AdmissionError::StudentAlreadySeated { .. }
            | AdmissionError::DocumentsLocked { .. }
            | AdmissionError::NotAdmitted(_)
            | AdmissionError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            AdmissionError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        let payload = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (self.status_code(), Json(payload)).into_response()
    }
}
