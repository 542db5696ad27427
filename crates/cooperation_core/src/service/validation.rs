//! Client-correctable rejection reasons for agreement writes.
//!
//! Every variant carries the ids and ranges a caller needs to fix the
//! request. `code()` gives a stable machine-readable identifier used in logs.

use crate::model::agreement::AgreementId;
use crate::model::date_range::{DateRange, SUPPORTED_YEARS};
use crate::model::reference::{OrganizationId, OrganizationRole, PersonId, Region};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Agreement end date is before its start date.
    AgreementPeriodReversed { period: DateRange },
    /// Agreement range uses a year outside `SUPPORTED_YEARS`.
    UnsupportedAgreementYears { period: DateRange },
    /// Another active agreement already uses this theme.
    DuplicateTheme { theme: String },
    /// Create/update without assignments while the policy requires some.
    EmptyAssignments,
    /// Assignment end date is before its start date.
    AssignmentPeriodReversed {
        person_id: PersonId,
        period: DateRange,
    },
    /// Assignment range is not inside the agreement range.
    AssignmentOutsideAgreement {
        person_id: PersonId,
        period: DateRange,
        agreement_period: DateRange,
    },
    /// Referenced organization is missing or soft-deleted. `role` is the
    /// role the assignment needed it to fill.
    OrganizationUnavailable {
        person_id: PersonId,
        organization_id: OrganizationId,
        role: OrganizationRole,
    },
    /// Organization region differs from the agreement side it serves.
    OrganizationRegionMismatch {
        person_id: PersonId,
        organization_id: OrganizationId,
        role: OrganizationRole,
        actual: Region,
        expected: Region,
    },
    /// Organization does not carry the role the assignment needs.
    OrganizationRoleMismatch {
        person_id: PersonId,
        organization_id: OrganizationId,
        expected: OrganizationRole,
        actual: OrganizationRole,
    },
    /// Person is missing or soft-deleted.
    PersonUnavailable { person_id: PersonId },
    /// Person's employer is not the assignment's sending organization.
    PersonNotEmployedBySender {
        person_id: PersonId,
        sending_organization_id: OrganizationId,
        employer_id: OrganizationId,
    },
    /// Two assignments of the same request overlap for one person.
    IntraRequestOverlap {
        person_id: PersonId,
        first: DateRange,
        second: DateRange,
    },
    /// A candidate assignment overlaps a committed one on another agreement.
    CommittedOverlap {
        person_id: PersonId,
        candidate: DateRange,
        agreement_id: AgreementId,
        existing: DateRange,
    },
    /// Batch delete called with no ids.
    EmptyBatch,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AgreementPeriodReversed { .. } => "agreement_period_reversed",
            Self::UnsupportedAgreementYears { .. } => "unsupported_agreement_years",
            Self::DuplicateTheme { .. } => "duplicate_theme",
            Self::EmptyAssignments => "empty_assignments",
            Self::AssignmentPeriodReversed { .. } => "assignment_period_reversed",
            Self::AssignmentOutsideAgreement { .. } => "assignment_outside_agreement",
            Self::OrganizationUnavailable { .. } => "organization_unavailable",
            Self::OrganizationRegionMismatch { .. } => "organization_region_mismatch",
            Self::OrganizationRoleMismatch { .. } => "organization_role_mismatch",
            Self::PersonUnavailable { .. } => "person_unavailable",
            Self::PersonNotEmployedBySender { .. } => "person_not_employed_by_sender",
            Self::IntraRequestOverlap { .. } => "intra_request_overlap",
            Self::CommittedOverlap { .. } => "committed_overlap",
            Self::EmptyBatch => "empty_batch",
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AgreementPeriodReversed { period } => {
                write!(f, "agreement end date is before start date: {period}")
            }
            Self::UnsupportedAgreementYears { period } => write!(
                f,
                "agreement period {period} must stay within years {}..={}",
                SUPPORTED_YEARS.start(),
                SUPPORTED_YEARS.end()
            ),
            Self::DuplicateTheme { theme } => write!(f, "agreement theme already exists: `{theme}`"),
            Self::EmptyAssignments => write!(f, "agreement requires at least one assignment"),
            Self::AssignmentPeriodReversed { person_id, period } => write!(
                f,
                "assignment of person {person_id} ends before it starts: {period}"
            ),
            Self::AssignmentOutsideAgreement {
                person_id,
                period,
                agreement_period,
            } => write!(
                f,
                "assignment of person {person_id} {period} is outside agreement period {agreement_period}"
            ),
            Self::OrganizationUnavailable {
                person_id,
                organization_id,
                role,
            } => write!(
                f,
                "{role} organization {organization_id} of person {person_id} does not exist or is deleted"
            ),
            Self::OrganizationRegionMismatch {
                person_id,
                organization_id,
                role,
                actual,
                expected,
            } => write!(
                f,
                "{role} organization {organization_id} of person {person_id} is in region `{actual}`, expected `{expected}`"
            ),
            Self::OrganizationRoleMismatch {
                person_id,
                organization_id,
                expected,
                actual,
            } => write!(
                f,
                "organization {organization_id} of person {person_id} has role `{actual}`, expected `{expected}`"
            ),
            Self::PersonUnavailable { person_id } => {
                write!(f, "person {person_id} does not exist or is deleted")
            }
            Self::PersonNotEmployedBySender {
                person_id,
                sending_organization_id,
                employer_id,
            } => write!(
                f,
                "person {person_id} is employed by organization {employer_id}, not sending organization {sending_organization_id}"
            ),
            Self::IntraRequestOverlap {
                person_id,
                first,
                second,
            } => write!(
                f,
                "person {person_id} has overlapping assignments in request: {first} and {second}"
            ),
            Self::CommittedOverlap {
                person_id,
                candidate,
                agreement_id,
                existing,
            } => write!(
                f,
                "person {person_id} assignment {candidate} overlaps agreement {agreement_id} assignment {existing}"
            ),
            Self::EmptyBatch => write!(f, "batch delete requires at least one id"),
        }
    }
}

impl Error for ValidationError {}
