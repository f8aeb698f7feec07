use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for admission applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

/// Identifier of the student an application belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

/// Identifier of the college owning applications and seat pools.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollegeId(pub String);

/// Session-derived identity of whoever performs an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

macro_rules! display_inner {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )*
    };
}

display_inner!(ApplicationId, StudentId, CollegeId, ActorId, SeatId, DocumentId);

/// Courses a college can admit into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CourseType {
    Gnm,
    Anm,
}

impl CourseType {
    pub const fn label(self) -> &'static str {
        match self {
            CourseType::Gnm => "GNM",
            CourseType::Anm => "ANM",
        }
    }
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CourseType {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GNM" => Ok(CourseType::Gnm),
            "ANM" => Ok(CourseType::Anm),
            _ => Err(UnknownValue::new("course type", value)),
        }
    }
}

/// Academic session label such as `2025-26`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcademicYear(pub String);

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The (college, course, academic year) triple identifying one seat pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolKey {
    pub college_id: CollegeId,
    pub course: CourseType,
    pub academic_year: AcademicYear,
}

impl PoolKey {
    pub fn new(college_id: CollegeId, course: CourseType, academic_year: AcademicYear) -> Self {
        Self {
            college_id,
            course,
            academic_year,
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.college_id, self.course, self.academic_year)
    }
}

/// Lifecycle status of an admission application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    Verified,
    Approved,
    Admitted,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::Verified,
        ApplicationStatus::Approved,
        ApplicationStatus::Admitted,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "DRAFT",
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::Verified => "VERIFIED",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Admitted => "ADMITTED",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownValue::new("application status", value))
    }
}

/// Portal roles, from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Student,
    Agent,
    College,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Agent => "AGENT",
            Role::College => "COLLEGE",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "AGENT" => Ok(Role::Agent),
            "COLLEGE" => Ok(Role::College),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownValue::new("role", value)),
        }
    }
}

/// Authenticated caller, supplied by the session layer on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college_id: Option<CollegeId>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: ActorId(id.into()),
            role,
            college_id: None,
        }
    }

    pub fn with_college(mut self, college_id: CollegeId) -> Self {
        self.college_id = Some(college_id);
        self
    }
}

/// One entry of an application's append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub at: DateTime<Utc>,
    pub actor: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Seat bound to an admitted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub seat_id: SeatId,
    pub roll_number: String,
}

/// Document categories collected during admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Aadhaar,
    #[serde(rename = "MARKSHEET_10_2")]
    Marksheet10And2,
    TransferCertificate,
    Photo,
    Other,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::Aadhaar => "AADHAAR",
            DocumentType::Marksheet10And2 => "MARKSHEET_10_2",
            DocumentType::TransferCertificate => "TRANSFER_CERTIFICATE",
            DocumentType::Photo => "PHOTO",
            DocumentType::Other => "OTHER",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentType {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AADHAAR" => Ok(DocumentType::Aadhaar),
            "MARKSHEET_10_2" => Ok(DocumentType::Marksheet10And2),
            "TRANSFER_CERTIFICATE" => Ok(DocumentType::TransferCertificate),
            "PHOTO" => Ok(DocumentType::Photo),
            "OTHER" => Ok(DocumentType::Other),
            _ => Err(UnknownValue::new("document type", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Pending,
    Uploaded,
    Verified,
    Rejected,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Uploaded => "UPLOADED",
            DocumentStatus::Verified => "VERIFIED",
            DocumentStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Document attached to an application. Storage lives elsewhere; only the key is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub id: DocumentId,
    pub document_type: DocumentType,
    pub file_name: String,
    pub storage_key: String,
    pub status: DocumentStatus,
    pub flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_reason: Option<String>,
    pub uploaded_by: ActorId,
    pub uploaded_at: DateTime<Utc>,
}

impl ApplicationDocument {
    /// Verified and not held for manual review.
    pub fn is_cleared(&self) -> bool {
        self.status == DocumentStatus::Verified && !self.flagged
    }
}

/// Intake payload for a new application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub student_id: StudentId,
    pub college_id: CollegeId,
    pub course: CourseType,
    pub academic_year: AcademicYear,
}

impl NewApplication {
    pub fn pool(&self) -> PoolKey {
        PoolKey::new(
            self.college_id.clone(),
            self.course,
            self.academic_year.clone(),
        )
    }
}

/// Upload metadata for a document attached to an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub file_name: String,
    pub storage_key: String,
}

/// Reviewer verdict for an attached document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReview {
    pub status: DocumentStatus,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_reason: Option<String>,
}

/// Parse failure for the enumerations above.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
