//! Agreement aggregate: the root record plus its assignment rows.
//!
//! # Responsibility
//! - Define write inputs (`AgreementFields`, `AssignmentDraft`) and
//!   persisted read models (`Agreement`, `Assignment`).
//!
//! # Invariants
//! - `theme` is unique among active agreements.
//! - Every assignment range is ordered and lies inside its agreement range.
//! - Assignments are never updated in place; an agreement write replaces
//!   the whole list.

use crate::model::date_range::DateRange;
use crate::model::reference::{OrganizationId, PersonId, Region};
use serde::{Deserialize, Serialize};

pub type AgreementId = i64;
pub type AssignmentId = i64;

/// Role a person fills while on assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Management,
    Technical,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Management => "management",
            Self::Technical => "technical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "management" => Some(Self::Management),
            "technical" => Some(Self::Technical),
            _ => None,
        }
    }
}

/// Mutable root fields of an agreement, shared by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementFields {
    pub theme: String,
    pub initiating_region: Region,
    pub receiving_region: Region,
    pub period: DateRange,
}

/// Candidate assignment submitted with an agreement write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDraft {
    pub sending_organization_id: OrganizationId,
    pub person_id: PersonId,
    pub job_type: JobType,
    pub receiving_organization_id: OrganizationId,
    pub period: DateRange,
}

/// Persisted agreement root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub theme: String,
    pub initiating_region: Region,
    pub receiving_region: Region,
    pub period: DateRange,
    pub is_deleted: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

impl Agreement {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Returns the writable root fields of this record.
    pub fn fields(&self) -> AgreementFields {
        AgreementFields {
            theme: self.theme.clone(),
            initiating_region: self.initiating_region,
            receiving_region: self.receiving_region,
            period: self.period,
        }
    }
}

/// Persisted assignment row owned by one agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub agreement_id: AgreementId,
    pub sending_organization_id: OrganizationId,
    pub person_id: PersonId,
    pub job_type: JobType,
    pub receiving_organization_id: OrganizationId,
    pub period: DateRange,
}

impl Assignment {
    /// Strips row identity, leaving the submitted shape.
    pub fn to_draft(&self) -> AssignmentDraft {
        AssignmentDraft {
            sending_organization_id: self.sending_organization_id,
            person_id: self.person_id,
            job_type: self.job_type,
            receiving_organization_id: self.receiving_organization_id,
            period: self.period,
        }
    }
}

/// Agreement with its full assignment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementDetail {
    pub agreement: Agreement,
    pub assignments: Vec<Assignment>,
}

/// One row of a listing/search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementSummary {
    pub agreement: Agreement,
    pub assignment_count: u32,
}
