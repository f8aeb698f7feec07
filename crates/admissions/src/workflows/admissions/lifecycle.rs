//! Application status state machine.
//!
//! ```text
//! Draft      -> Submitted
//! Submitted  -> Verified | Draft
//! Verified   -> Approved
//! Approved   -> Admitted
//! ```
//!
//! `Admitted` is terminal for ordinary requests. The only way back out is an admission
//! revocation, which is a separate, seat-releasing operation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ActorId, ApplicationStatus, StatusChange};
use super::store::ApplicationRecord;

use ApplicationStatus::{Admitted, Approved, Draft, Submitted, Verified};

/// A requested move from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
}

impl Transition {
    pub const fn new(from: ApplicationStatus, to: ApplicationStatus) -> Self {
        Self { from, to }
    }

    /// Whether committing this transition requires a seat claim.
    pub fn is_admission(self) -> bool {
        self == ADMISSION
    }

    /// Whether the document gate applies.
    pub fn is_verification(self) -> bool {
        self == Transition::new(Submitted, Verified)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

pub const ADMISSION: Transition = Transition::new(Approved, Admitted);

/// Reverse of [`ADMISSION`], only reachable through admission revocation.
pub const REVOCATION: Transition = Transition::new(Admitted, Approved);

pub const LEGAL_TRANSITIONS: [Transition; 5] = [
    Transition::new(Draft, Submitted),
    Transition::new(Submitted, Verified),
    Transition::new(Submitted, Draft),
    Transition::new(Verified, Approved),
    ADMISSION,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

/// Statuses reachable from `from` with a single ordinary transition.
pub fn legal_targets(from: ApplicationStatus) -> impl Iterator<Item = ApplicationStatus> {
    LEGAL_TRANSITIONS
        .into_iter()
        .filter(move |transition| transition.from == from)
        .map(|transition| transition.to)
}

pub struct StateMachine;

impl StateMachine {
    pub fn validate(
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<Transition, TransitionError> {
        let requested = Transition::new(from, to);
        if LEGAL_TRANSITIONS.contains(&requested) {
            Ok(requested)
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// Validate against the record's current status and append the history entry.
    ///
    /// The record is untouched when the transition is illegal.
    pub fn apply(
        record: &mut ApplicationRecord,
        to: ApplicationStatus,
        actor: &ActorId,
        at: DateTime<Utc>,
        comment: Option<String>,
    ) -> Result<Transition, TransitionError> {
        let transition = Self::validate(record.status(), to)?;
        record.push_status(StatusChange {
            status: transition.to,
            at,
            actor: actor.clone(),
            comment,
        });
        Ok(transition)
    }

    pub(crate) fn revoke(
        record: &mut ApplicationRecord,
        actor: &ActorId,
        at: DateTime<Utc>,
        comment: Option<String>,
    ) -> Result<Transition, TransitionError> {
        if record.status() != REVOCATION.from {
            return Err(TransitionError::InvalidTransition {
                from: record.status(),
                to: REVOCATION.to,
            });
        }
        record.push_status(StatusChange {
            status: REVOCATION.to,
            at,
            actor: actor.clone(),
            comment,
        });
        Ok(REVOCATION)
    }
}
