use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::OnboardingError;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier of an onboarding session.
    SessionId
);
identifier!(
    /// Identifier of an employee record owned by the surrounding application.
    EmployeeId
);
identifier!(
    /// Identifier of a manager eligible for Section 2 verification work.
    ManagerId
);
identifier!(PropertyId);
identifier!(ApplicationId);
identifier!(DocumentId);
identifier!(
    /// Recipient or actor identity used for notifications and audit entries.
    UserId
);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl From<&EmployeeId> for UserId {
    fn from(value: &EmployeeId) -> Self {
        Self(value.0.clone())
    }
}

impl From<&ManagerId> for UserId {
    fn from(value: &ManagerId) -> Self {
        Self(value.0.clone())
    }
}

/// Coarse workflow stage; each phase owns a fixed, ordered step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Employee,
    Manager,
    Hr,
}

const EMPLOYEE_STEPS: [OnboardingStep; 13] = [
    OnboardingStep::Welcome,
    OnboardingStep::PersonalInfo,
    OnboardingStep::EmergencyContacts,
    OnboardingStep::I9Section1,
    OnboardingStep::W4Form,
    OnboardingStep::DirectDeposit,
    OnboardingStep::HealthInsurance,
    OnboardingStep::CompanyPolicies,
    OnboardingStep::TraffickingAwareness,
    OnboardingStep::WeaponsPolicy,
    OnboardingStep::BackgroundCheck,
    OnboardingStep::DocumentUpload,
    OnboardingStep::EmployeeSignature,
];

const MANAGER_STEPS: [OnboardingStep; 3] = [
    OnboardingStep::ManagerReview,
    OnboardingStep::I9Section2,
    OnboardingStep::ManagerSignature,
];

const HR_STEPS: [OnboardingStep; 3] = [
    OnboardingStep::HrReview,
    OnboardingStep::ComplianceCheck,
    OnboardingStep::HrApproval,
];

impl Phase {
    pub const fn ordered() -> [Self; 3] {
        [Self::Employee, Self::Manager, Self::Hr]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Manager => "manager",
            Self::Hr => "hr",
        }
    }

    pub fn steps(self) -> &'static [OnboardingStep] {
        match self {
            Self::Employee => &EMPLOYEE_STEPS,
            Self::Manager => &MANAGER_STEPS,
            Self::Hr => &HR_STEPS,
        }
    }

    pub fn first_step(self) -> OnboardingStep {
        self.steps()[0]
    }

    pub fn last_step(self) -> OnboardingStep {
        self.steps()[self.steps().len() - 1]
    }

    pub fn position(self, step: OnboardingStep) -> Option<usize> {
        self.steps().iter().position(|candidate| *candidate == step)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every screen of the onboarding packet, grouped by the phase that completes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Welcome,
    PersonalInfo,
    EmergencyContacts,
    I9Section1,
    W4Form,
    DirectDeposit,
    HealthInsurance,
    CompanyPolicies,
    TraffickingAwareness,
    WeaponsPolicy,
    BackgroundCheck,
    DocumentUpload,
    EmployeeSignature,
    ManagerReview,
    I9Section2,
    ManagerSignature,
    HrReview,
    ComplianceCheck,
    HrApproval,
}

impl OnboardingStep {
    pub const fn phase(self) -> Phase {
        match self {
            Self::Welcome
            | Self::PersonalInfo
            | Self::EmergencyContacts
            | Self::I9Section1
            | Self::W4Form
            | Self::DirectDeposit
            | Self::HealthInsurance
            | Self::CompanyPolicies
            | Self::TraffickingAwareness
            | Self::WeaponsPolicy
            | Self::BackgroundCheck
            | Self::DocumentUpload
            | Self::EmployeeSignature => Phase::Employee,
            Self::ManagerReview | Self::I9Section2 | Self::ManagerSignature => Phase::Manager,
            Self::HrReview | Self::ComplianceCheck | Self::HrApproval => Phase::Hr,
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::PersonalInfo => "personal_info",
            Self::EmergencyContacts => "emergency_contacts",
            Self::I9Section1 => "i9_section1",
            Self::W4Form => "w4_form",
            Self::DirectDeposit => "direct_deposit",
            Self::HealthInsurance => "health_insurance",
            Self::CompanyPolicies => "company_policies",
            Self::TraffickingAwareness => "trafficking_awareness",
            Self::WeaponsPolicy => "weapons_policy",
            Self::BackgroundCheck => "background_check",
            Self::DocumentUpload => "document_upload",
            Self::EmployeeSignature => "employee_signature",
            Self::ManagerReview => "manager_review",
            Self::I9Section2 => "i9_section2",
            Self::ManagerSignature => "manager_signature",
            Self::HrReview => "hr_review",
            Self::ComplianceCheck => "compliance_check",
            Self::HrApproval => "hr_approval",
        }
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for OnboardingStep {
    type Err = OnboardingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Phase::ordered()
            .iter()
            .flat_map(|phase| phase.steps().iter().copied())
            .find(|step| step.key() == normalized)
            .ok_or_else(|| OnboardingError::InvalidInput(format!("unknown step '{value}'")))
    }
}

/// Session status. `Expired` is absorbing and reachable from every active status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    ManagerReview,
    HrApproval,
    Approved,
    Rejected,
    Expired,
}

impl SessionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::ManagerReview => "manager_review",
            Self::HrApproval => "hr_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Approved and rejected sessions accept no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::NotStarted | Self::InProgress | Self::ManagerReview | Self::HrApproval
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One employee's journey through the onboarding packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingSession {
    pub id: SessionId,
    pub employee_id: EmployeeId,
    pub application_id: Option<ApplicationId>,
    pub property_id: PropertyId,
    pub manager_id: Option<ManagerId>,
    #[serde(skip_serializing)]
    pub token: String,
    pub status: SessionStatus,
    pub phase: Phase,
    pub current_step: OnboardingStep,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<UserId>,
    pub rejection_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl OnboardingSession {
    /// True when the session is still active but its token lifetime has elapsed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && now > self.expires_at
    }
}

/// The slice of the employee record the onboarding core reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeI9Projection {
    pub id: EmployeeId,
    pub property_id: PropertyId,
    pub start_date: Option<NaiveDate>,
    pub onboarding_status: SessionStatus,
    pub i9_section1_completed_at: Option<DateTime<Utc>>,
    pub i9_section2_completed_at: Option<DateTime<Utc>>,
    pub i9_section1_deadline: Option<NaiveDate>,
    pub i9_section2_deadline: Option<NaiveDate>,
    pub i9_assigned_manager_id: Option<ManagerId>,
    pub i9_manager_assigned_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl EmployeeI9Projection {
    pub fn new(id: EmployeeId, property_id: PropertyId, start_date: Option<NaiveDate>) -> Self {
        Self {
            id,
            property_id,
            start_date,
            onboarding_status: SessionStatus::NotStarted,
            i9_section1_completed_at: None,
            i9_section2_completed_at: None,
            i9_section1_deadline: None,
            i9_section2_deadline: None,
            i9_assigned_manager_id: None,
            i9_manager_assigned_at: None,
            version: 0,
        }
    }

    pub fn has_pending_i9(&self) -> bool {
        self.i9_section1_completed_at.is_none() || self.i9_section2_completed_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerProfile {
    pub id: ManagerId,
    pub property_id: PropertyId,
    pub display_name: String,
    pub active: bool,
}

/// Opaque form and signature payloads captured alongside a step. The core never inspects them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    pub form_data: Option<serde_json::Value>,
    pub signature_data: Option<serde_json::Value>,
}

impl StepPayload {
    pub fn is_empty(&self) -> bool {
        self.form_data.is_none() && self.signature_data.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSubmission {
    pub session_id: SessionId,
    pub step: OnboardingStep,
    pub payload: StepPayload,
    pub submitted_at: DateTime<Utc>,
}
