//! Form I-9 document rules: USCIS List A/B/C classification, acceptable combinations,
//! expiration checks, and document number formats.
//!
//! Everything here is a pure function of its inputs. Callers supply `today`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::domain::{DocumentId, EmployeeId};

/// Documents expiring within this many days raise a non-fatal warning.
pub const EXPIRY_WARNING_DAYS: i64 = 30;
pub const MAX_EXPIRY_WARNING_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentList {
    /// Establishes both identity and employment authorization.
    A,
    /// Establishes identity only.
    B,
    /// Establishes employment authorization only.
    C,
}

impl DocumentList {
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "List A",
            Self::B => "List B",
            Self::C => "List C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    UsPassport,
    UsPassportCard,
    PermanentResidentCard,
    EmploymentAuthorizationCard,
    ForeignPassportWithI551,
    ForeignPassportWithI94,
    DriversLicense,
    StateIdCard,
    SchoolIdCard,
    VoterRegistrationCard,
    MilitaryCard,
    MilitaryDependentCard,
    MerchantMarinerCard,
    CanadianDriversLicense,
    SocialSecurityCard,
    BirthCertificate,
    CertificationOfBirthAbroad,
    NativeAmericanTribalDocument,
    UsCitizenIdCard,
    ResidentCitizenIdCard,
    DhsEmploymentAuthorization,
}

/// Row of the fixed classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentRule {
    pub list: DocumentList,
    pub requires_expiration: bool,
    pub number_pattern: Option<&'static str>,
}

const PASSPORT_NUMBER: &str = r"^[A-Z0-9]{6,9}$";
const USCIS_NUMBER: &str = r"^[A-Z]{3}[0-9]{10}$";
const LICENSE_NUMBER: &str = r"^[A-Z0-9-]{4,20}$";
const SSN_NUMBER: &str = r"^[0-9]{3}-?[0-9]{2}-?[0-9]{4}$";

impl DocumentType {
    pub const ALL: [DocumentType; 21] = [
        Self::UsPassport,
        Self::UsPassportCard,
        Self::PermanentResidentCard,
        Self::EmploymentAuthorizationCard,
        Self::ForeignPassportWithI551,
        Self::ForeignPassportWithI94,
        Self::DriversLicense,
        Self::StateIdCard,
        Self::SchoolIdCard,
        Self::VoterRegistrationCard,
        Self::MilitaryCard,
        Self::MilitaryDependentCard,
        Self::MerchantMarinerCard,
        Self::CanadianDriversLicense,
        Self::SocialSecurityCard,
        Self::BirthCertificate,
        Self::CertificationOfBirthAbroad,
        Self::NativeAmericanTribalDocument,
        Self::UsCitizenIdCard,
        Self::ResidentCitizenIdCard,
        Self::DhsEmploymentAuthorization,
    ];

    pub const fn rule(self) -> DocumentRule {
        let (list, requires_expiration, number_pattern) = match self {
            Self::UsPassport | Self::UsPassportCard => (DocumentList::A, true, Some(PASSPORT_NUMBER)),
            Self::PermanentResidentCard | Self::EmploymentAuthorizationCard => {
                (DocumentList::A, true, Some(USCIS_NUMBER))
            }
            Self::ForeignPassportWithI551 | Self::ForeignPassportWithI94 => {
                (DocumentList::A, true, Some(PASSPORT_NUMBER))
            }
            Self::DriversLicense | Self::StateIdCard => (DocumentList::B, true, Some(LICENSE_NUMBER)),
            Self::CanadianDriversLicense => (DocumentList::B, true, Some(LICENSE_NUMBER)),
            Self::SchoolIdCard
            | Self::VoterRegistrationCard
            | Self::MilitaryCard
            | Self::MilitaryDependentCard
            | Self::MerchantMarinerCard => (DocumentList::B, false, None),
            Self::SocialSecurityCard => (DocumentList::C, false, Some(SSN_NUMBER)),
            Self::BirthCertificate
            | Self::CertificationOfBirthAbroad
            | Self::NativeAmericanTribalDocument
            | Self::UsCitizenIdCard
            | Self::ResidentCitizenIdCard
            | Self::DhsEmploymentAuthorization => (DocumentList::C, false, None),
        };

        DocumentRule {
            list,
            requires_expiration,
            number_pattern,
        }
    }

    pub const fn list(self) -> DocumentList {
        self.rule().list
    }

    pub const fn requires_expiration(self) -> bool {
        self.rule().requires_expiration
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::UsPassport => "us_passport",
            Self::UsPassportCard => "us_passport_card",
            Self::PermanentResidentCard => "permanent_resident_card",
            Self::EmploymentAuthorizationCard => "employment_authorization_card",
            Self::ForeignPassportWithI551 => "foreign_passport_with_i551",
            Self::ForeignPassportWithI94 => "foreign_passport_with_i94",
            Self::DriversLicense => "drivers_license",
            Self::StateIdCard => "state_id_card",
            Self::SchoolIdCard => "school_id_card",
            Self::VoterRegistrationCard => "voter_registration_card",
            Self::MilitaryCard => "military_card",
            Self::MilitaryDependentCard => "military_dependent_card",
            Self::MerchantMarinerCard => "merchant_mariner_card",
            Self::CanadianDriversLicense => "canadian_drivers_license",
            Self::SocialSecurityCard => "social_security_card",
            Self::BirthCertificate => "birth_certificate",
            Self::CertificationOfBirthAbroad => "certification_of_birth_abroad",
            Self::NativeAmericanTribalDocument => "native_american_tribal_document",
            Self::UsCitizenIdCard => "us_citizen_id_card",
            Self::ResidentCitizenIdCard => "resident_citizen_id_card",
            Self::DhsEmploymentAuthorization => "dhs_employment_authorization",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DocumentType {
    type Err = DocumentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let alias = match normalized.as_str() {
            "passport" => Some(Self::UsPassport),
            "ssn_card" | "ssn" => Some(Self::SocialSecurityCard),
            "green_card" => Some(Self::PermanentResidentCard),
            "ead" => Some(Self::EmploymentAuthorizationCard),
            "state_id" => Some(Self::StateIdCard),
            _ => None,
        };

        alias
            .or_else(|| {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.key() == normalized)
            })
            .ok_or_else(|| DocumentError::UnknownDocumentType(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("unknown I-9 document type '{0}'")]
    UnknownDocumentType(String),
}

/// Resolve a raw document type name to its USCIS list.
pub fn classify(document_type: &str) -> Result<DocumentList, DocumentError> {
    document_type.parse::<DocumentType>().map(DocumentType::list)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Uploaded,
    Verified,
    Rejected,
    Expired,
}

/// A submitted identity or work-authorization document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I9Document {
    pub id: DocumentId,
    pub employee_id: EmployeeId,
    pub document_type: DocumentType,
    pub document_number: Option<String>,
    pub issuing_authority: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub verification_status: VerificationStatus,
    pub uploaded_at: DateTime<Utc>,
}

impl I9Document {
    /// Always derived from the document type.
    pub fn document_list(&self) -> DocumentList {
        self.document_type.list()
    }
}

/// Caller-supplied fields of a new document; the list and status are never accepted from input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub document_number: Option<String>,
    pub issuing_authority: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
}

/// Structured violation codes so a caller can render every problem at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ComplianceCode {
    NoDocuments,
    MultipleListA { count: usize },
    ListAWithListBOrC,
    MultipleListB { count: usize },
    MultipleListC { count: usize },
    MissingListB,
    MissingListC,
    MissingExpirationDate { document_type: DocumentType },
    DocumentExpired { document_type: DocumentType, expired_on: NaiveDate },
    VerificationExpired { document_type: DocumentType },
    InvalidDocumentNumber { document_type: DocumentType },
}

impl ComplianceCode {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoDocuments => "no_documents",
            Self::MultipleListA { .. } => "multiple_list_a",
            Self::ListAWithListBOrC => "list_a_with_list_b_or_c",
            Self::MultipleListB { .. } => "multiple_list_b",
            Self::MultipleListC { .. } => "multiple_list_c",
            Self::MissingListB => "missing_list_b",
            Self::MissingListC => "missing_list_c",
            Self::MissingExpirationDate { .. } => "missing_expiration_date",
            Self::DocumentExpired { .. } => "document_expired",
            Self::VerificationExpired { .. } => "verification_expired",
            Self::InvalidDocumentNumber { .. } => "invalid_document_number",
        }
    }
}

impl fmt::Display for ComplianceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDocuments => write!(f, "no documents submitted"),
            Self::MultipleListA { count } => {
                write!(f, "exactly one List A document is allowed, found {count}")
            }
            Self::ListAWithListBOrC => {
                write!(f, "a List A document cannot be combined with List B or C documents")
            }
            Self::MultipleListB { count } => {
                write!(f, "exactly one List B document is allowed, found {count}")
            }
            Self::MultipleListC { count } => {
                write!(f, "exactly one List C document is allowed, found {count}")
            }
            Self::MissingListB => write!(f, "a List C document requires a List B document"),
            Self::MissingListC => write!(f, "a List B document requires a List C document"),
            Self::MissingExpirationDate { document_type } => {
                write!(f, "{document_type} requires an expiration date")
            }
            Self::DocumentExpired {
                document_type,
                expired_on,
            } => write!(f, "{document_type} expired on {expired_on}"),
            Self::VerificationExpired { document_type } => {
                write!(f, "{document_type} was marked expired during verification")
            }
            Self::InvalidDocumentNumber { document_type } => {
                write!(f, "{document_type} number does not match the expected format")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcceptedCombination {
    ListA {
        document: DocumentType,
    },
    ListBAndC {
        identity: DocumentType,
        employment: DocumentType,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinationCheck {
    pub accepted: Option<AcceptedCombination>,
    pub violations: Vec<ComplianceCode>,
}

impl CombinationCheck {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Legal iff exactly one List A document and nothing else, or exactly one List B plus exactly
/// one List C and no List A.
pub fn validate_combination(document_types: &[DocumentType]) -> CombinationCheck {
    let of_list = |list: DocumentList| -> Vec<DocumentType> {
        document_types
            .iter()
            .copied()
            .filter(|document| document.list() == list)
            .collect()
    };
    let list_a = of_list(DocumentList::A);
    let list_b = of_list(DocumentList::B);
    let list_c = of_list(DocumentList::C);

    let mut violations = Vec::new();

    if document_types.is_empty() {
        violations.push(ComplianceCode::NoDocuments);
    } else if !list_a.is_empty() {
        if list_a.len() > 1 {
            violations.push(ComplianceCode::MultipleListA {
                count: list_a.len(),
            });
        }
        if !list_b.is_empty() || !list_c.is_empty() {
            violations.push(ComplianceCode::ListAWithListBOrC);
        }
    } else {
        if list_b.len() > 1 {
            violations.push(ComplianceCode::MultipleListB {
                count: list_b.len(),
            });
        }
        if list_c.len() > 1 {
            violations.push(ComplianceCode::MultipleListC {
                count: list_c.len(),
            });
        }
        if list_b.is_empty() {
            violations.push(ComplianceCode::MissingListB);
        }
        if list_c.is_empty() {
            violations.push(ComplianceCode::MissingListC);
        }
    }

    let accepted = match (list_a.as_slice(), list_b.as_slice(), list_c.as_slice()) {
        _ if !violations.is_empty() => None,
        ([document], [], []) => Some(AcceptedCombination::ListA {
            document: *document,
        }),
        ([], [identity], [employment]) => Some(AcceptedCombination::ListBAndC {
            identity: *identity,
            employment: *employment,
        }),
        _ => None,
    };

    CombinationCheck {
        accepted,
        violations,
    }
}

/// Combination check over stored documents; rejected documents do not count.
pub fn validate_document_combination(documents: &[I9Document]) -> CombinationCheck {
    let types: Vec<DocumentType> = documents
        .iter()
        .filter(|document| document.verification_status != VerificationStatus::Rejected)
        .map(|document| document.document_type)
        .collect();
    validate_combination(&types)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExpirationStatus {
    NotRequired,
    Valid { expires_on: NaiveDate },
    ExpiresSoon { expires_on: NaiveDate, days_remaining: i64 },
}

pub fn validate_expiration(
    document_type: DocumentType,
    expiration_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<ExpirationStatus, ComplianceCode> {
    validate_expiration_within(document_type, expiration_date, today, EXPIRY_WARNING_DAYS)
}

pub fn validate_expiration_within(
    document_type: DocumentType,
    expiration_date: Option<NaiveDate>,
    today: NaiveDate,
    warning_days: i64,
) -> Result<ExpirationStatus, ComplianceCode> {
    if !document_type.requires_expiration() {
        return Ok(ExpirationStatus::NotRequired);
    }

    let expires_on =
        expiration_date.ok_or(ComplianceCode::MissingExpirationDate { document_type })?;

    if expires_on <= today {
        return Err(ComplianceCode::DocumentExpired {
            document_type,
            expired_on: expires_on,
        });
    }

    // A window reaching past the calendar covers every future date.
    let warn_until = Duration::try_days(warning_days.max(0))
        .and_then(|window| today.checked_add_signed(window));
    if warn_until.map_or(true, |limit| expires_on <= limit) {
        return Ok(ExpirationStatus::ExpiresSoon {
            expires_on,
            days_remaining: (expires_on - today).num_days(),
        });
    }

    Ok(ExpirationStatus::Valid { expires_on })
}

fn number_patterns() -> &'static HashMap<DocumentType, Regex> {
    static PATTERNS: OnceLock<HashMap<DocumentType, Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        DocumentType::ALL
            .iter()
            .filter_map(|document_type| {
                document_type.rule().number_pattern.map(|pattern| {
                    let regex = Regex::new(pattern).expect("document number patterns are valid");
                    (*document_type, regex)
                })
            })
            .collect()
    })
}

/// Check a document number against the table's format. Types without a format accept anything.
pub fn validate_document_number(
    document_type: DocumentType,
    number: &str,
) -> Result<(), ComplianceCode> {
    let Some(pattern) = number_patterns().get(&document_type) else {
        return Ok(());
    };

    let normalized = number.trim().to_ascii_uppercase();
    if pattern.is_match(&normalized) {
        Ok(())
    } else {
        Err(ComplianceCode::InvalidDocumentNumber { document_type })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpirationWarning {
    pub document_id: DocumentId,
    pub document_type: DocumentType,
    pub expires_on: NaiveDate,
    pub days_remaining: i64,
}

/// Outcome of the Section 2 gate: every violation plus non-fatal expiry warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section2Review {
    pub combination: Option<AcceptedCombination>,
    pub violations: Vec<ComplianceCode>,
    pub warnings: Vec<ExpirationWarning>,
}

impl Section2Review {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

pub fn review_section2(
    documents: &[I9Document],
    today: NaiveDate,
    warning_days: i64,
) -> Section2Review {
    let combination = validate_document_combination(documents);
    let mut violations = combination.violations;
    let mut warnings = Vec::new();

    for document in documents
        .iter()
        .filter(|document| document.verification_status != VerificationStatus::Rejected)
    {
        if document.verification_status == VerificationStatus::Expired {
            violations.push(ComplianceCode::VerificationExpired {
                document_type: document.document_type,
            });
        }

        match validate_expiration_within(
            document.document_type,
            document.expiration_date,
            today,
            warning_days,
        ) {
            Ok(ExpirationStatus::ExpiresSoon {
                expires_on,
                days_remaining,
            }) => warnings.push(ExpirationWarning {
                document_id: document.id.clone(),
                document_type: document.document_type,
                expires_on,
                days_remaining,
            }),
            Ok(_) => {}
            Err(code) => violations.push(code),
        }

        if let Some(number) = document.document_number.as_deref() {
            if let Err(code) = validate_document_number(document.document_type, number) {
                violations.push(code);
            }
        }
    }

    Section2Review {
        combination: combination.accepted,
        violations,
        warnings,
    }
}
