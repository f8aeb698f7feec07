use std::fmt;

use super::domain::{Actor, ActorId, CollegeId, Role, StudentId};
use super::lifecycle::{Transition, LEGAL_TRANSITIONS};

/// Write operations subject to role checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Transition(Transition),
    CreateApplication,
    ManageDocuments,
    ConfigureSeats,
    RevokeAdmission,
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyAction::Transition(transition) => write!(f, "move {transition}"),
            PolicyAction::CreateApplication => f.write_str("create applications"),
            PolicyAction::ManageDocuments => f.write_str("manage documents"),
            PolicyAction::ConfigureSeats => f.write_str("configure seat capacity"),
            PolicyAction::RevokeAdmission => f.write_str("revoke admissions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("{role} may not {action}")]
    Role { role: Role, action: PolicyAction },
    #[error("actor {actor} may not {action} for college {college_id}")]
    ForeignCollege {
        actor: ActorId,
        college_id: CollegeId,
        action: PolicyAction,
    },
    #[error("actor {actor} may not read records of college {college_id}")]
    ForeignRead {
        actor: ActorId,
        college_id: CollegeId,
    },
    #[error("actor {actor} may not read the application of student {student_id}")]
    OtherStudent {
        actor: ActorId,
        student_id: StudentId,
    },
}

/// Role allow-list plus college scoping. Only admins act across colleges; every other role
/// must carry the college it acts on.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    college_transitions: Vec<Transition>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            college_transitions: LEGAL_TRANSITIONS.to_vec(),
        }
    }
}

impl AccessPolicy {
    pub fn permits(&self, role: Role, action: PolicyAction) -> bool {
        match (role, action) {
            (Role::Admin, _) => true,
            (Role::Student, _) => false,
            (Role::Agent, PolicyAction::CreateApplication) => true,
            (Role::Agent, _) => false,
            (Role::College, PolicyAction::Transition(transition)) => {
                self.college_transitions.contains(&transition)
            }
            (Role::College, PolicyAction::RevokeAdmission) => false,
            (Role::College, _) => true,
        }
    }

    /// Check a write against the role table and then against the actor's college.
    pub fn authorize(
        &self,
        actor: &Actor,
        action: PolicyAction,
        college_id: &CollegeId,
    ) -> Result<(), AccessDenied> {
        if !self.permits(actor.role, action) {
            return Err(AccessDenied::Role {
                role: actor.role,
                action,
            });
        }

        if self.in_scope(actor, college_id) {
            Ok(())
        } else {
            Err(AccessDenied::ForeignCollege {
                actor: actor.id.clone(),
                college_id: college_id.clone(),
                action,
            })
        }
    }

    pub fn authorize_read(&self, actor: &Actor, college_id: &CollegeId) -> Result<(), AccessDenied> {
        if self.in_scope(actor, college_id) {
            Ok(())
        } else {
            Err(AccessDenied::ForeignRead {
                actor: actor.id.clone(),
                college_id: college_id.clone(),
            })
        }
    }

    /// Read check for one application: college scope, and students see only their own.
    pub fn authorize_application_read(
        &self,
        actor: &Actor,
        college_id: &CollegeId,
        student_id: &StudentId,
    ) -> Result<(), AccessDenied> {
        self.authorize_read(actor, college_id)?;
        if actor.role == Role::Student && actor.id.0 != student_id.0 {
            return Err(AccessDenied::OtherStudent {
                actor: actor.id.clone(),
                student_id: student_id.clone(),
            });
        }
        Ok(())
    }

    fn in_scope(&self, actor: &Actor, college_id: &CollegeId) -> bool {
        actor.role == Role::Admin || actor.college_id.as_ref() == Some(college_id)
    }
}
