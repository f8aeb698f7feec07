use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::domain::{ActorId, ApplicationStatus, CollegeId};

/// Activity kinds written to the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityAction {
    #[serde(rename = "application.create")]
    ApplicationCreate,
    #[serde(rename = "application.status_change")]
    ApplicationStatusChange,
    #[serde(rename = "seat.allocate")]
    SeatAllocate,
    #[serde(rename = "seat.allocation_failed")]
    SeatAllocationFailed,
    #[serde(rename = "seat.release")]
    SeatRelease,
    #[serde(rename = "seat.capacity_update")]
    SeatCapacityUpdate,
    #[serde(rename = "document.upload")]
    DocumentUpload,
    #[serde(rename = "document.review")]
    DocumentReview,
}

impl ActivityAction {
    pub const fn label(self) -> &'static str {
        match self {
            ActivityAction::ApplicationCreate => "application.create",
            ActivityAction::ApplicationStatusChange => "application.status_change",
            ActivityAction::SeatAllocate => "seat.allocate",
            ActivityAction::SeatAllocationFailed => "seat.allocation_failed",
            ActivityAction::SeatRelease => "seat.release",
            ActivityAction::SeatCapacityUpdate => "seat.capacity_update",
            ActivityAction::DocumentUpload => "document.upload",
            ActivityAction::DocumentReview => "document.review",
        }
    }
}

/// Immutable activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub action: ActivityAction,
    pub actor: ActorId,
    pub college_id: CollegeId,
    /// Application id, seat id, or pool label depending on the action.
    pub entity: String,
    pub before: Option<ApplicationStatus>,
    pub after: Option<ApplicationStatus>,
    pub at: DateTime<Utc>,
    pub details: BTreeMap<String, String>,
}

impl ActivityEvent {
    pub fn new(
        action: ActivityAction,
        actor: &ActorId,
        college_id: &CollegeId,
        entity: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            actor: actor.clone(),
            college_id: college_id.clone(),
            entity: entity.into(),
            before: None,
            after: None,
            at,
            details: BTreeMap::new(),
        }
    }

    pub fn statuses(mut self, before: ApplicationStatus, after: ApplicationStatus) -> Self {
        self.before = Some(before);
        self.after = Some(after);
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Write-only sink for activity events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: ActivityEvent) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}

/// In-memory audit trail for tests and the demo service.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: RwLock<Vec<ActivityEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.read().clone()
    }

    pub fn count(&self, action: ActivityAction) -> usize {
        self.events
            .read()
            .iter()
            .filter(|event| event.action == action)
            .count()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: ActivityEvent) -> Result<(), AuditError> {
        self.events.write().push(event);
        Ok(())
    }
}
