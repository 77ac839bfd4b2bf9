use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

use super::common::*;
use crate::workflows::onboarding::assignment::{AssignmentMethod, ManagerAssignmentScheduler};
use crate::workflows::onboarding::clock::FixedClock;
use crate::workflows::onboarding::domain::{
    EmployeeI9Projection, EmployeeId, ManagerId, ManagerProfile, PropertyId, UserId,
};
use crate::workflows::onboarding::error::OnboardingError;
use crate::workflows::onboarding::memory::InMemoryOnboardingRepository;
use crate::workflows::onboarding::repository::{
    NotificationKind, NotificationPriority, OnboardingRepository,
};

type Scheduler = ManagerAssignmentScheduler<InMemoryOnboardingRepository, RecordingNotifications>;

fn scheduler(
    repository: &Arc<InMemoryOnboardingRepository>,
    notifications: &Arc<RecordingNotifications>,
) -> Scheduler {
    ManagerAssignmentScheduler::new(
        repository.clone(),
        notifications.clone(),
        Arc::new(FixedClock::new(monday_morning())),
    )
}

fn seed_workload(repository: &InMemoryOnboardingRepository, manager: &ManagerId, count: usize) {
    for index in 0..count {
        let mut employee = EmployeeI9Projection::new(
            EmployeeId::new(format!("busy-{manager}-{index}")),
            property(),
            Some(date(2025, 1, 2)),
        );
        employee.i9_assigned_manager_id = Some(manager.clone());
        repository
            .insert_employee(employee)
            .expect("busy employee seeded");
    }
}

fn assigned_manager(repository: &InMemoryOnboardingRepository, id: &EmployeeId) -> Option<ManagerId> {
    repository
        .employee(id)
        .expect("repository available")
        .expect("employee present")
        .i9_assigned_manager_id
}

#[test]
fn least_workload_picks_the_strict_minimum() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    let m1 = seed_manager(&repository, "mgr-1");
    let m2 = seed_manager(&repository, "mgr-2");
    let m3 = seed_manager(&repository, "mgr-3");
    seed_workload(&repository, &m1, 2);
    seed_workload(&repository, &m3, 1);
    let scheduler = scheduler(&repository, &notifications);

    let first = seed_employee(&repository, "emp-200", Some(date(2025, 1, 6)));
    let assignment = scheduler
        .auto_assign(&property(), &first, AssignmentMethod::LeastWorkload)
        .expect("manager available");
    assert_eq!(assignment.manager_id, m2);
    assert!(assignment.newly_assigned);
    assert_eq!(assigned_manager(&repository, &first), Some(m2.clone()));

    // mgr-2 and mgr-3 now both hold one open assignment; list order breaks the tie.
    let second = seed_employee(&repository, "emp-201", Some(date(2025, 1, 6)));
    let assignment = scheduler
        .auto_assign(&property(), &second, AssignmentMethod::LeastWorkload)
        .expect("manager available");
    assert_eq!(assignment.manager_id, m2);

    let third = seed_employee(&repository, "emp-202", Some(date(2025, 1, 6)));
    let assignment = scheduler
        .auto_assign(&property(), &third, AssignmentMethod::LeastWorkload)
        .expect("manager available");
    assert_eq!(assignment.manager_id, m3);
}

#[test]
fn completed_section2_no_longer_counts_as_workload() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    let m1 = seed_manager(&repository, "mgr-1");
    let m2 = seed_manager(&repository, "mgr-2");
    seed_workload(&repository, &m2, 1);

    let mut finished = EmployeeI9Projection::new(EmployeeId::new("done-1"), property(), None);
    finished.i9_assigned_manager_id = Some(m1.clone());
    finished.i9_section2_completed_at = Some(monday_morning());
    repository.insert_employee(finished).expect("seeded");

    let employee = seed_employee(&repository, "emp-203", None);
    let assignment = scheduler(&repository, &notifications)
        .auto_assign(&property(), &employee, AssignmentMethod::LeastWorkload)
        .expect("manager available");
    assert_eq!(assignment.manager_id, m1);
}

#[test]
fn round_robin_rotates_and_wraps() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    let managers = [
        seed_manager(&repository, "mgr-1"),
        seed_manager(&repository, "mgr-2"),
        seed_manager(&repository, "mgr-3"),
    ];
    let scheduler = scheduler(&repository, &notifications);

    let picks: Vec<ManagerId> = (0..4)
        .map(|index| {
            let employee = seed_employee(&repository, &format!("emp-21{index}"), None);
            scheduler
                .auto_assign(&property(), &employee, AssignmentMethod::RoundRobin)
                .expect("manager available")
                .manager_id
        })
        .collect();

    assert_eq!(
        picks,
        vec![
            managers[0].clone(),
            managers[1].clone(),
            managers[2].clone(),
            managers[0].clone(),
        ]
    );
}

#[test]
fn round_robin_restarts_when_last_manager_left() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    let first = seed_manager(&repository, "mgr-1");
    seed_manager(&repository, "mgr-2");
    seed_workload(&repository, &ManagerId::new("mgr-gone"), 1);

    let employee = seed_employee(&repository, "emp-220", None);
    let assignment = scheduler(&repository, &notifications)
        .auto_assign(&property(), &employee, AssignmentMethod::RoundRobin)
        .expect("manager available");
    assert_eq!(assignment.manager_id, first);
}

#[test]
fn no_active_manager_is_reported() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    repository
        .insert_manager(ManagerProfile {
            id: ManagerId::new("mgr-away"),
            property_id: property(),
            display_name: "On leave".to_string(),
            active: false,
        })
        .expect("manager seeded");
    let employee = seed_employee(&repository, "emp-230", None);

    match scheduler(&repository, &notifications).auto_assign(
        &property(),
        &employee,
        AssignmentMethod::LeastWorkload,
    ) {
        Err(OnboardingError::NoManagerAvailable { property_id }) => {
            assert_eq!(property_id, property())
        }
        other => panic!("expected no manager, got {other:?}"),
    }
    assert_eq!(assigned_manager(&repository, &employee), None);
    assert!(notifications.events().is_empty());
}

#[test]
fn assignment_notifies_the_manager() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    let manager = seed_manager(&repository, "mgr-1");
    let employee = seed_employee(&repository, "emp-240", Some(date(2025, 1, 6)));

    scheduler(&repository, &notifications)
        .auto_assign(&property(), &employee, AssignmentMethod::LeastWorkload)
        .expect("manager available");

    let events = notifications.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.recipient, UserId::from(&manager));
    assert_eq!(event.kind, NotificationKind::ManagerAssignment);
    assert_eq!(event.priority, NotificationPriority::High);
    assert_eq!(
        event.metadata.get("section2_deadline").map(String::as_str),
        Some("2025-01-09")
    );
    assert_eq!(
        event.metadata.get("method").map(String::as_str),
        Some("least_workload")
    );

    let stored = repository
        .employee(&employee)
        .expect("repository available")
        .expect("employee present");
    assert_eq!(stored.i9_manager_assigned_at, Some(monday_morning()));
}

#[test]
fn existing_assignment_is_kept_without_renotifying() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    seed_manager(&repository, "mgr-1");
    seed_manager(&repository, "mgr-2");
    let scheduler = scheduler(&repository, &notifications);
    let employee = seed_employee(&repository, "emp-250", None);

    let first = scheduler
        .auto_assign(&property(), &employee, AssignmentMethod::RoundRobin)
        .expect("manager available");
    let again = scheduler
        .auto_assign(&property(), &employee, AssignmentMethod::RoundRobin)
        .expect("manager available");

    assert_eq!(again.manager_id, first.manager_id);
    assert!(!again.newly_assigned);
    assert_eq!(notifications.events().len(), 1);
}

#[test]
fn assignment_to_inactive_manager_is_replaced() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    let active = seed_manager(&repository, "mgr-1");
    let mut employee = EmployeeI9Projection::new(EmployeeId::new("emp-260"), property(), None);
    employee.i9_assigned_manager_id = Some(ManagerId::new("mgr-retired"));
    repository.insert_employee(employee).expect("seeded");

    let assignment = scheduler(&repository, &notifications)
        .auto_assign(
            &property(),
            &EmployeeId::new("emp-260"),
            AssignmentMethod::LeastWorkload,
        )
        .expect("manager available");
    assert_eq!(assignment.manager_id, active);
    assert!(assignment.newly_assigned);
}

#[test]
fn assignment_preconditions() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    seed_manager(&repository, "mgr-1");
    let scheduler = scheduler(&repository, &notifications);

    match scheduler.auto_assign(
        &property(),
        &EmployeeId::new("ghost"),
        AssignmentMethod::LeastWorkload,
    ) {
        Err(OnboardingError::NotFound { entity, .. }) => assert_eq!(entity, "employee"),
        other => panic!("expected missing employee, got {other:?}"),
    }

    let employee = seed_employee(&repository, "emp-270", None);
    match scheduler.auto_assign(
        &PropertyId::new("hotel-airport"),
        &employee,
        AssignmentMethod::LeastWorkload,
    ) {
        Err(OnboardingError::InvalidInput(_)) => {}
        other => panic!("expected property mismatch, got {other:?}"),
    }

    let mut verified = EmployeeI9Projection::new(EmployeeId::new("emp-271"), property(), None);
    verified.i9_section2_completed_at = Some(monday_morning());
    repository.insert_employee(verified).expect("seeded");
    match scheduler.auto_assign(
        &property(),
        &EmployeeId::new("emp-271"),
        AssignmentMethod::LeastWorkload,
    ) {
        Err(OnboardingError::InvalidTransition(_)) => {}
        other => panic!("expected completed section 2 to refuse, got {other:?}"),
    }
}

#[test]
fn concurrent_assignments_spread_across_managers() {
    let repository = Arc::new(InMemoryOnboardingRepository::new());
    let notifications = Arc::new(RecordingNotifications::default());
    seed_manager(&repository, "mgr-1");
    seed_manager(&repository, "mgr-2");
    let employees: Vec<EmployeeId> = (0..6)
        .map(|index| seed_employee(&repository, &format!("emp-28{index}"), None))
        .collect();
    let scheduler = scheduler(&repository, &notifications);
    let barrier = Barrier::new(employees.len());

    let picks: Vec<ManagerId> = thread::scope(|scope| {
        let handles: Vec<_> = employees
            .iter()
            .map(|employee| {
                let scheduler = &scheduler;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    scheduler
                        .auto_assign(&property(), employee, AssignmentMethod::LeastWorkload)
                        .expect("manager available")
                        .manager_id
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("assignment thread"))
            .collect()
    });

    let mut per_manager: HashMap<ManagerId, usize> = HashMap::new();
    for manager in picks {
        *per_manager.entry(manager).or_default() += 1;
    }
    assert_eq!(per_manager.get(&ManagerId::new("mgr-1")), Some(&3));
    assert_eq!(per_manager.get(&ManagerId::new("mgr-2")), Some(&3));
}

#[test]
fn assignment_method_parses_config_spellings() {
    assert_eq!(
        "least_workload".parse::<AssignmentMethod>().expect("known"),
        AssignmentMethod::LeastWorkload
    );
    assert_eq!(
        " Round-Robin ".parse::<AssignmentMethod>().expect("known"),
        AssignmentMethod::RoundRobin
    );
    assert!("random".parse::<AssignmentMethod>().is_err());
    assert_eq!(AssignmentMethod::default(), AssignmentMethod::LeastWorkload);
}
