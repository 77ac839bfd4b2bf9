use crate::infra::{morning_of, TracingAuditSink, TracingNotificationSink};
use chrono::{NaiveDate, Utc};
use clap::Args;
use hotel_onboarding::config::AppConfig;
use hotel_onboarding::error::AppError;
use hotel_onboarding::workflows::onboarding::{
    DeadlineMonitor, DocumentType, DocumentUpload, EmployeeI9Projection, EmployeeId, FixedClock,
    InMemoryOnboardingRepository, ManagerAssignmentScheduler, ManagerId, ManagerProfile,
    NewSession, OnboardingError, OnboardingSession, Phase, PropertyId, RandomTokenGenerator,
    SessionLifecycleManager, StepPayload, UserId,
};
use std::sync::Arc;

const DEMO_PROPERTY: &str = "hotel-harbor";
const DEMO_EMPLOYEE: &str = "emp-demo";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Employee start date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start_date: Option<NaiveDate>,
    /// Verify identity with a driver's license and Social Security card instead of a passport.
    #[arg(long)]
    pub(crate) list_b_and_c: bool,
    /// Finish with an HR rejection carrying this reason instead of an approval.
    #[arg(long)]
    pub(crate) reject: Option<String>,
}

type Sessions = SessionLifecycleManager<InMemoryOnboardingRepository, TracingNotificationSink>;

pub(crate) fn run_demo(args: DemoArgs, config: &AppConfig) -> Result<(), AppError> {
    let DemoArgs {
        start_date,
        list_b_and_c,
        reject,
    } = args;

    let start_date = start_date.unwrap_or_else(|| Utc::now().date_naive());
    let clock = Arc::new(FixedClock::new(morning_of(start_date)));
    let property = PropertyId::new(DEMO_PROPERTY);
    let repository = Arc::new(seed_repository(&property, start_date)?);
    let notifications = Arc::new(TracingNotificationSink::default());
    let deadlines = config.onboarding.deadline_engine();

    let sessions = SessionLifecycleManager::new(
        repository.clone(),
        notifications.clone(),
        clock.clone(),
        Arc::new(RandomTokenGenerator),
    )
    .with_audit(Arc::new(TracingAuditSink))
    .with_deadline_engine(deadlines)
    .with_expiry_warning_days(config.onboarding.expiry_warning_days);
    let scheduler = ManagerAssignmentScheduler::new(
        repository.clone(),
        notifications.clone(),
        clock.clone(),
    )
    .with_deadline_engine(deadlines);

    println!("Hotel onboarding demo");
    let employee_id = EmployeeId::new(DEMO_EMPLOYEE);
    let session = sessions.create_session(NewSession {
        employee_id: employee_id.clone(),
        property_id: property.clone(),
        application_id: None,
        manager_id: None,
        ttl: config.onboarding.session_ttl(),
    })?;
    println!(
        "- Session {} opened for {} (token {}…, expires {})",
        session.id,
        session.employee_id,
        &session.token[..6.min(session.token.len())],
        session.expires_at
    );

    let assignment =
        scheduler.auto_assign(&property, &employee_id, config.onboarding.assignment_method)?;
    sessions.assign_manager(&session.id, &assignment.manager_id)?;
    println!(
        "- Section 2 verifier: {} ({})",
        assignment.manager_id, assignment.method
    );

    let session = walk_phase(&sessions, &session, Phase::Employee)?;
    println!(
        "- Employee phase complete -> {} at step {}",
        session.status, session.current_step
    );

    for upload in demo_documents(start_date, list_b_and_c) {
        let document = sessions.submit_document(&session.id, upload)?;
        println!(
            "  Uploaded {} (List {})",
            document.document_type,
            document.document_list().label()
        );
    }
    let review = sessions.section2_review(&session.id)?;
    println!(
        "  Section 2 review: {} violation(s), {} expiring soon",
        review.violations.len(),
        review.warnings.len()
    );

    let session = walk_phase(&sessions, &session, Phase::Manager)?;
    println!(
        "- Manager phase complete -> {} at step {}",
        session.status, session.current_step
    );

    let hr = UserId::new("hr-demo");
    let session = match reject {
        Some(reason) => sessions.reject(&session.id, &hr, &reason)?,
        None => sessions.approve(&session.id, &hr)?,
    };
    println!("- HR decision: {}", session.status);
    if let Some(reason) = &session.rejection_reason {
        println!("  Reason: {reason}");
    }

    let monitor = DeadlineMonitor::new(repository, notifications.clone(), clock)
        .with_deadline_engine(deadlines);
    println!("\nOpen I-9 deadlines at {DEMO_PROPERTY}");
    let pending = monitor.pending_deadlines(Some(&property), true)?;
    if pending.is_empty() {
        println!("  none");
    }
    for entry in pending {
        println!(
            "  - {}: Section 1 {} ({}), Section 2 {} ({})",
            entry.employee_id,
            entry.section1.status.label(),
            entry.section1.deadline,
            entry.section2.status.label(),
            entry.section2.deadline
        );
    }
    println!("\n{} notification(s) delivered", notifications.delivered());

    Ok(())
}

fn seed_repository(
    property: &PropertyId,
    start_date: NaiveDate,
) -> Result<InMemoryOnboardingRepository, AppError> {
    let repository = InMemoryOnboardingRepository::new();
    for (id, name) in [("mgr-ana", "Ana Ruiz"), ("mgr-ben", "Ben Okafor")] {
        repository
            .insert_manager(ManagerProfile {
                id: ManagerId::new(id),
                property_id: property.clone(),
                display_name: name.to_string(),
                active: true,
            })
            .map_err(OnboardingError::from)?;
    }

    // One colleague already waiting on Ana so the least-workload pick is visible.
    let mut colleague = EmployeeI9Projection::new(
        EmployeeId::new("emp-colleague"),
        property.clone(),
        Some(start_date),
    );
    colleague.i9_assigned_manager_id = Some(ManagerId::new("mgr-ana"));
    repository
        .insert_employee(colleague)
        .map_err(OnboardingError::from)?;
    repository
        .insert_employee(EmployeeI9Projection::new(
            EmployeeId::new(DEMO_EMPLOYEE),
            property.clone(),
            Some(start_date),
        ))
        .map_err(OnboardingError::from)?;

    Ok(repository)
}

fn walk_phase(
    sessions: &Sessions,
    session: &OnboardingSession,
    phase: Phase,
) -> Result<OnboardingSession, AppError> {
    let mut current = session.clone();
    for step in phase.steps() {
        let payload = StepPayload {
            form_data: Some(serde_json::json!({ "completed": step.key() })),
            signature_data: None,
        };
        current = sessions.advance_step(&session.id, *step, payload)?;
    }
    Ok(current)
}

fn demo_documents(start_date: NaiveDate, list_b_and_c: bool) -> Vec<DocumentUpload> {
    let expires = start_date + chrono::Duration::days(4 * 365);
    if list_b_and_c {
        return vec![
            DocumentUpload {
                document_type: DocumentType::DriversLicense,
                document_number: Some("D4821-7730".to_string()),
                issuing_authority: Some("State DMV".to_string()),
                issue_date: None,
                expiration_date: Some(expires),
            },
            DocumentUpload {
                document_type: DocumentType::SocialSecurityCard,
                document_number: Some("123-45-6789".to_string()),
                issuing_authority: Some("Social Security Administration".to_string()),
                issue_date: None,
                expiration_date: None,
            },
        ];
    }

    vec![DocumentUpload {
        document_type: DocumentType::UsPassport,
        document_number: Some("P1234567".to_string()),
        issuing_authority: Some("U.S. Department of State".to_string()),
        issue_date: None,
        expiration_date: Some(expires),
    }]
}
