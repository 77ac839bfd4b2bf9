//! Hotel employee onboarding: the employee, manager and HR workflow gated by federal I-9
//! document rules and deadlines.
//!
//! Components receive their collaborators explicitly. The repository, clock, token source,
//! notification sink and optional audit sink are traits so the request layer can plug in its
//! own storage and delivery.

pub mod assignment;
pub mod clock;
pub mod deadlines;
pub mod documents;
pub mod domain;
pub mod error;
pub mod memory;
pub mod repository;
pub mod scan;
pub mod session;

#[cfg(test)]
mod tests;

pub use assignment::{AssignmentMethod, ManagerAssignment, ManagerAssignmentScheduler};
pub use clock::{Clock, FixedClock, RandomTokenGenerator, SystemClock, TokenGenerator};
pub use deadlines::{
    add_business_days, deadline_instant, DeadlineAssessment, DeadlineClassification,
    DeadlineEngine, DeadlineStatus, I9Section, SectionCompliance, SectionDeadlines,
    MAX_APPROACHING_WINDOW_HOURS,
};
pub use documents::{
    classify, review_section2, validate_combination, validate_document_combination,
    validate_document_number, validate_expiration, AcceptedCombination, CombinationCheck,
    ComplianceCode, DocumentError, DocumentList, DocumentType, DocumentUpload, ExpirationStatus,
    I9Document, Section2Review, VerificationStatus, MAX_EXPIRY_WARNING_DAYS,
};
pub use domain::{
    ApplicationId, DocumentId, EmployeeI9Projection, EmployeeId, ManagerId, ManagerProfile,
    OnboardingSession, OnboardingStep, Phase, PropertyId, SessionId, SessionStatus, StepPayload,
    StepSubmission, UserId,
};
pub use error::OnboardingError;
pub use memory::InMemoryOnboardingRepository;
pub use repository::{
    AuditAction, AuditEntry, AuditError, AuditSink, Notification, NotificationError,
    NotificationKind, NotificationPriority, NotificationSink, OnboardingRepository,
    RepositoryError,
};
pub use scan::{DeadlineMonitor, NotificationFailure, PendingDeadline, ScanReport};
pub use session::{NewSession, SessionLifecycleManager};
