//! Cross-entity invariant checks for candidate assignments.
//!
//! # Responsibility
//! - Validate each candidate against its agreement's range and regions and
//!   against the referenced organizations and person.
//!
//! # Invariants
//! - Fails fast on the first violation, in list order.
//! - Per item, checks run in this order: dates, sending organization,
//!   receiving organization, person.
//! - Performs read-only lookups only. An empty list passes.

use crate::model::agreement::{AgreementFields, AssignmentDraft};
use crate::model::reference::{Organization, OrganizationId, OrganizationRole, PersonId, Region};
use crate::repo::reference_repo::ReferenceLookup;
use crate::repo::RepoError;
use crate::service::validation::ValidationError;

/// Checks every draft against `fields` and reference data.
pub fn check_assignments<L, E>(
    lookup: &L,
    fields: &AgreementFields,
    drafts: &[AssignmentDraft],
) -> Result<(), E>
where
    L: ReferenceLookup + ?Sized,
    E: From<ValidationError> + From<RepoError>,
{
    for draft in drafts {
        check_assignment::<L, E>(lookup, fields, draft)?;
    }
    Ok(())
}

fn check_assignment<L, E>(lookup: &L, fields: &AgreementFields, draft: &AssignmentDraft) -> Result<(), E>
where
    L: ReferenceLookup + ?Sized,
    E: From<ValidationError> + From<RepoError>,
{
    check_assignment_period(fields, draft)?;

    let sending = require_organization::<L, E>(
        lookup,
        draft.person_id,
        draft.sending_organization_id,
        OrganizationRole::Sending,
        fields.initiating_region,
    )?;
    require_organization::<L, E>(
        lookup,
        draft.person_id,
        draft.receiving_organization_id,
        OrganizationRole::Receiving,
        fields.receiving_region,
    )?;

    let person = lookup
        .lookup_person(draft.person_id)?
        .ok_or(ValidationError::PersonUnavailable {
            person_id: draft.person_id,
        })?;
    if person.organization_id != sending.id {
        return Err(ValidationError::PersonNotEmployedBySender {
            person_id: person.id,
            sending_organization_id: sending.id,
            employer_id: person.organization_id,
        }
        .into());
    }
    Ok(())
}

/// Date-only part of the check: ordered, and inside the agreement range.
pub fn check_assignment_period(
    fields: &AgreementFields,
    draft: &AssignmentDraft,
) -> Result<(), ValidationError> {
    if !draft.period.is_ordered() {
        return Err(ValidationError::AssignmentPeriodReversed {
            person_id: draft.person_id,
            period: draft.period,
        });
    }
    if !fields.period.contains(&draft.period) {
        return Err(ValidationError::AssignmentOutsideAgreement {
            person_id: draft.person_id,
            period: draft.period,
            agreement_period: fields.period,
        });
    }
    Ok(())
}

fn require_organization<L, E>(
    lookup: &L,
    person_id: PersonId,
    organization_id: OrganizationId,
    role: OrganizationRole,
    expected_region: Region,
) -> Result<Organization, E>
where
    L: ReferenceLookup + ?Sized,
    E: From<ValidationError> + From<RepoError>,
{
    let organization = lookup.lookup_organization(organization_id)?.ok_or(
        ValidationError::OrganizationUnavailable {
            person_id,
            organization_id,
            role,
        },
    )?;
    if organization.region != expected_region {
        return Err(ValidationError::OrganizationRegionMismatch {
            person_id,
            organization_id,
            role,
            actual: organization.region,
            expected: expected_region,
        }
        .into());
    }
    if organization.role != role {
        return Err(ValidationError::OrganizationRoleMismatch {
            person_id,
            organization_id,
            expected: role,
            actual: organization.role,
        }
        .into());
    }
    Ok(organization)
}
