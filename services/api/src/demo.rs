use crate::infra::TracingAuditSink;
use admissions::config::AdmissionsConfig;
use admissions::error::AppError;
use admissions::workflows::admissions::{
    AcademicYear, ActivityAction, Actor, AdmissionError, AdmissionService, ApplicationId,
    ApplicationRecord, ApplicationStatus, CollegeId, CourseType, InMemoryAdmissionStore,
    NewApplication, PoolKey, Role, StudentId, TransitionRequest,
};
use clap::Args;
use std::any::Any;
use std::sync::Arc;
use std::thread::ScopedJoinHandle;

type DemoService = AdmissionService<InMemoryAdmissionStore, TracingAuditSink>;

const DEMO_COLLEGE: &str = "st-annes-nursing";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Seats configured in the demo pool
    #[arg(long, default_value_t = 2)]
    pub(crate) seats: u32,
    /// Approved applications racing for those seats
    #[arg(long, default_value_t = 5)]
    pub(crate) contenders: usize,
    /// Academic year of the demo pool
    #[arg(long, default_value = "2025-26")]
    pub(crate) year: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        seats,
        contenders,
        year,
    } = args;

    let college = CollegeId(DEMO_COLLEGE.to_string());
    let pool = PoolKey::new(college.clone(), CourseType::Gnm, AcademicYear(year));
    let admin = Actor::new("admin-ops", Role::Admin);
    let registrar = Actor::new("registrar", Role::College).with_college(college.clone());
    let agent = Actor::new("field-agent", Role::Agent).with_college(college.clone());

    let audit = Arc::new(TracingAuditSink::retaining());
    let service: DemoService = AdmissionService::new(
        Arc::new(InMemoryAdmissionStore::new()),
        audit.clone(),
        &AdmissionsConfig::default(),
    );

    println!("Admission cycle demo");
    let status = service.configure_capacity(&registrar, &pool, seats)?;
    println!("- Pool {} configured with {} seats", pool, status.total);

    println!("\nIntake");
    let mut approved = Vec::with_capacity(contenders);
    for n in 1..=contenders {
        let record = service.create_application(
            &agent,
            NewApplication {
                student_id: StudentId(format!("student-{n:02}")),
                college_id: college.clone(),
                course: pool.course,
                academic_year: pool.academic_year.clone(),
            },
        )?;
        let record = if n == 1 {
            walk_with_revert(&service, &registrar, record)?
        } else {
            walk_to_approved(&service, &registrar, record)?
        };
        println!(
            "- {} ({}) approved after {} status changes",
            record.id,
            record.student_id,
            record.version()
        );
        approved.push(record);
    }

    if let Some(first) = approved.first() {
        match service.transition(
            &admin,
            &first.id,
            TransitionRequest::to(ApplicationStatus::Verified),
        ) {
            Ok(_) => println!("  Unexpected: approved application moved back to VERIFIED"),
            Err(err) => println!("  Rejected {} -> VERIFIED: {} ({})", first.id, err.kind(), err),
        }
    }

    println!(
        "\nSeat race: {} contenders for {} seats",
        approved.len(),
        seats
    );
    type RaceResult = (ApplicationId, Result<String, AdmissionError>);
    let results: Vec<RaceResult> = std::thread::scope(|scope| {
        let handles = approved
            .iter()
            .map(|record| {
                let service = &service;
                let registrar = &registrar;
                scope.spawn(move || {
                    let outcome = service
                        .allocate(registrar, &record.id, None)
                        .map(|admission| admission.roll_number);
                    (record.id.clone(), outcome)
                })
            })
            .collect();
        join_all(handles)
    })?;

    let mut winners = Vec::new();
    let mut waiting = Vec::new();
    for (application_id, outcome) in results {
        match outcome {
            Ok(roll_number) => {
                println!("  - {application_id}: ADMITTED as {roll_number}");
                winners.push(application_id);
            }
            Err(err) => {
                println!("  - {application_id}: {}", err.kind());
                waiting.push(application_id);
            }
        }
    }

    if let (Some(revoked), Some(next)) = (winners.first(), waiting.first()) {
        println!("\nRevocation");
        let outcome = service.revoke_admission(
            &admin,
            revoked,
            None,
            Some("fee deadline missed".to_string()),
        )?;
        println!(
            "- {} back to {}, seat released",
            revoked,
            outcome.application.status()
        );
        let admission = service.allocate(&registrar, next, None)?;
        println!("- {} admitted as {}", next, admission.roll_number);
    }

    let status = service.pool_status(&registrar, &pool)?;
    println!(
        "\nPool {}: {} total | {} occupied | {} free",
        pool,
        status.total,
        status.occupied,
        status.free()
    );
    println!(
        "Audit trail: {} events | {} allocations | {} failed allocations | {} releases",
        audit.events().len(),
        audit.count(ActivityAction::SeatAllocate),
        audit.count(ActivityAction::SeatAllocationFailed),
        audit.count(ActivityAction::SeatRelease)
    );

    Ok(())
}

// Every handle is joined before the first panic is reported.
fn join_all<T>(handles: Vec<ScopedJoinHandle<'_, T>>) -> Result<Vec<T>, AppError> {
    let joined: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();
    joined
        .into_iter()
        .map(|result| result.map_err(|payload| AppError::Worker(panic_message(payload.as_ref()))))
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn walk_to_approved(
    service: &DemoService,
    actor: &Actor,
    mut record: ApplicationRecord,
) -> Result<ApplicationRecord, AdmissionError> {
    for status in [
        ApplicationStatus::Submitted,
        ApplicationStatus::Verified,
        ApplicationStatus::Approved,
    ] {
        let request = TransitionRequest::to(status).expecting(record.version());
        record = service.transition(actor, &record.id, request)?.application;
    }
    Ok(record)
}

// Send the first application back to the applicant once before it goes through.
fn walk_with_revert(
    service: &DemoService,
    actor: &Actor,
    record: ApplicationRecord,
) -> Result<ApplicationRecord, AdmissionError> {
    let submitted = service
        .transition(
            actor,
            &record.id,
            TransitionRequest::to(ApplicationStatus::Submitted),
        )?
        .application;
    let returned = service
        .transition(
            actor,
            &submitted.id,
            TransitionRequest::to(ApplicationStatus::Draft).with_comment("marksheet illegible"),
        )?
        .application;
    println!(
        "- {} returned to {} for corrections",
        returned.id,
        returned.status()
    );
    walk_to_approved(service, actor, returned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panicked_contender_fails_the_race_instead_of_vanishing() {
        let joined = std::thread::scope(|scope| {
            let handles = vec![
                scope.spawn(|| 1),
                scope.spawn(|| -> i32 { panic!("contender crashed") }),
            ];
            join_all(handles)
        });

        match joined {
            Err(AppError::Worker(message)) => assert_eq!(message, "contender crashed"),
            other => panic!("expected worker failure, got {other:?}"),
        }
    }

    #[test]
    fn all_contenders_are_reported_when_none_panic() {
        let joined = std::thread::scope(|scope| {
            let handles = (0..4).map(|n| scope.spawn(move || n * 2)).collect();
            join_all(handles)
        })
        .expect("no panics");

        assert_eq!(joined, vec![0, 2, 4, 6]);
    }
}
