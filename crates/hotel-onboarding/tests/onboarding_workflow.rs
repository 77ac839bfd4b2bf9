use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use hotel_onboarding::workflows::onboarding::{
    AssignmentMethod, ComplianceCode, DeadlineMonitor, DeadlineStatus, DocumentType,
    DocumentUpload, EmployeeId, FixedClock, ManagerAssignmentScheduler, NewSession, Notification,
    NotificationError, NotificationKind, NotificationSink, OnboardingError, OnboardingRepository,
    Phase, PropertyId, RandomTokenGenerator, SessionLifecycleManager, SessionStatus, StepPayload,
    UserId,
};
use hotel_onboarding::workflows::roster::{RosterImporter, RosterSnapshot};

const EMPLOYEES: &str = "Employee ID,Property ID,Start Date,Assigned Manager,Section 1 Completed At,Section 2 Completed At\n\
emp-1001,hotel-riverside,2025-03-03,,,\n\
emp-0950,hotel-riverside,2025-02-24,mgr-lena,2025-02-24T14:00:00Z,\n\
emp-0900,hotel-riverside,2025-02-17,mgr-lena,2025-02-17T10:00:00Z,2025-02-19T16:00:00Z\n";
const MANAGERS: &str = "Manager ID,Property ID,Name,Active\n\
mgr-lena,hotel-riverside,Lena Park,yes\n\
mgr-omar,hotel-riverside,Omar Haddad,\n\
mgr-ivy,hotel-riverside,Ivy Chen,no\n";

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<Notification>>,
}

impl Outbox {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("outbox poisoned").clone()
    }
}

impl NotificationSink for Outbox {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent.lock().expect("outbox poisoned").push(notification);
        Ok(())
    }
}

fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn roster() -> RosterSnapshot {
    RosterSnapshot {
        employees: RosterImporter::employees_from_reader(EMPLOYEES.as_bytes())
            .expect("employee roster parses"),
        managers: RosterImporter::managers_from_reader(MANAGERS.as_bytes())
            .expect("manager roster parses"),
    }
}

#[test]
fn new_hire_moves_from_roster_to_hr_approval() {
    let repository = Arc::new(roster().into_repository().expect("roster loads"));
    let outbox = Arc::new(Outbox::default());
    let clock = Arc::new(FixedClock::new(at("2025-03-03T08:30:00Z")));
    let property = PropertyId::new("hotel-riverside");
    let employee = EmployeeId::new("emp-1001");

    let scheduler =
        ManagerAssignmentScheduler::new(repository.clone(), outbox.clone(), clock.clone());
    let assignment = scheduler
        .auto_assign(&property, &employee, AssignmentMethod::LeastWorkload)
        .expect("a manager is active");
    // Lena still owns the open Section 2 of emp-0950; Ivy is inactive.
    assert_eq!(assignment.manager_id.as_str(), "mgr-omar");

    let sessions = SessionLifecycleManager::new(
        repository.clone(),
        outbox.clone(),
        clock.clone(),
        Arc::new(RandomTokenGenerator),
    );
    let session = sessions
        .create_session(NewSession {
            employee_id: employee.clone(),
            property_id: property.clone(),
            application_id: None,
            manager_id: None,
            ttl: Duration::hours(72),
        })
        .expect("session opens");
    assert_eq!(
        sessions
            .get_by_token(&session.token)
            .expect("token resolves")
            .id,
        session.id
    );

    for step in Phase::Employee.steps() {
        sessions
            .advance_step(&session.id, *step, StepPayload::default())
            .expect("employee step accepted");
    }
    let handed_off = sessions.get_by_id(&session.id).expect("session readable");
    assert_eq!(handed_off.status, SessionStatus::ManagerReview);
    assert_eq!(handed_off.manager_id, Some(assignment.manager_id.clone()));

    clock.advance(Duration::days(1));
    sessions
        .submit_document(
            &session.id,
            DocumentUpload {
                document_type: DocumentType::DriversLicense,
                document_number: Some("IA-448812".to_string()),
                issuing_authority: Some("Iowa DOT".to_string()),
                issue_date: Some(day(2021, 6, 1)),
                expiration_date: Some(day(2025, 3, 20)),
            },
        )
        .expect("license stored");

    let mut last = None;
    for step in Phase::Manager.steps() {
        last = Some(sessions.advance_step(&session.id, *step, StepPayload::default()));
    }
    match last {
        Some(Err(OnboardingError::ComplianceViolation(codes))) => {
            assert_eq!(codes, vec![ComplianceCode::MissingListC])
        }
        other => panic!("expected a missing List C document, got {other:?}"),
    }

    sessions
        .submit_document(
            &session.id,
            DocumentUpload {
                document_type: DocumentType::SocialSecurityCard,
                document_number: Some("078-05-1120".to_string()),
                issuing_authority: None,
                issue_date: None,
                expiration_date: None,
            },
        )
        .expect("card stored");
    let review = sessions.section2_review(&session.id).expect("review runs");
    assert!(review.passed());
    assert_eq!(review.warnings.len(), 1, "license expires within 30 days");

    let in_hr = sessions
        .complete_manager_phase(&session.id)
        .expect("documents pass");
    assert_eq!(in_hr.status, SessionStatus::HrApproval);

    let approved = sessions
        .approve(&session.id, &UserId::new("hr-dana"))
        .expect("approved");
    assert_eq!(approved.status, SessionStatus::Approved);

    let record = repository
        .employee(&employee)
        .expect("repository available")
        .expect("employee present");
    assert_eq!(record.onboarding_status, SessionStatus::Approved);
    assert_eq!(record.i9_section1_deadline, Some(day(2025, 3, 3)));
    assert_eq!(record.i9_section2_deadline, Some(day(2025, 3, 6)));
    assert_eq!(record.i9_section2_completed_at, Some(at("2025-03-04T08:30:00Z")));

    let kinds: Vec<NotificationKind> = outbox.sent().iter().map(|sent| sent.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::ManagerAssignment,
            NotificationKind::OnboardingApproved
        ]
    );
}

#[test]
fn sweep_reports_roster_deadlines() {
    let repository = Arc::new(roster().into_repository().expect("roster loads"));
    let outbox = Arc::new(Outbox::default());
    let clock = Arc::new(FixedClock::new(at("2025-02-27T11:00:00Z")));
    let monitor = DeadlineMonitor::new(repository, outbox.clone(), clock);

    let pending = monitor
        .pending_deadlines(None, true)
        .expect("pending deadlines");
    let ids: Vec<&str> = pending
        .iter()
        .map(|entry| entry.employee_id.as_str())
        .collect();
    assert_eq!(ids, vec!["emp-0950", "emp-1001"]);
    assert_eq!(pending[0].section2.deadline, day(2025, 2, 27));
    assert_eq!(pending[0].section2.status, DeadlineStatus::DueToday);
    assert_eq!(pending[1].most_urgent(), DeadlineStatus::OnTrack);

    let report = monitor.scan_and_notify().expect("sweep runs");
    assert_eq!(report.manager_notifications, 1);
    assert_eq!(outbox.sent()[0].recipient, UserId::new("mgr-lena"));
}
