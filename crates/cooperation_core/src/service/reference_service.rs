//! Reference data registration use-cases.
//!
//! # Responsibility
//! - Register organizations and persons that agreements can reference.
//! - Edit them; moving a person changes which sending organization later
//!   agreement writes accept for them.
//! - Retire (soft-delete) them so later agreement writes stop accepting them.
//!
//! # Invariants
//! - Organization names are non-blank and unique among active organizations.
//! - A person can only be registered under an active organization.
//! - Edits and retirement never touch existing agreements.
//! - Edits never change the soft-delete flag.

use crate::model::reference::{NewOrganization, NewPerson, Organization, OrganizationId, Person, PersonId};
use crate::repo::reference_repo::{ReferenceLookup, ReferenceRepository};
use crate::repo::{EntityKind, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for reference data use-cases.
#[derive(Debug)]
pub enum ReferenceServiceError {
    /// Name is blank after trim.
    BlankName,
    /// Another active organization already uses this name.
    DuplicateOrganizationName(String),
    /// Employing organization does not exist or is deleted.
    EmployerUnavailable(OrganizationId),
    OrganizationNotFound(OrganizationId),
    /// Organization exists but is retired.
    OrganizationRetired(OrganizationId),
    PersonNotFound(PersonId),
    /// Person exists but is retired.
    PersonRetired(PersonId),
    /// An edit that passed its existence check affected zero rows.
    ConcurrentModification { entity: EntityKind, id: i64 },
    Repo(RepoError),
}

impl Display for ReferenceServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
            Self::DuplicateOrganizationName(name) => {
                write!(f, "organization name already exists: `{name}`")
            }
            Self::EmployerUnavailable(id) => {
                write!(f, "employing organization does not exist or is deleted: {id}")
            }
            Self::OrganizationNotFound(id) => write!(f, "organization not found: {id}"),
            Self::OrganizationRetired(id) => write!(f, "organization is retired: {id}"),
            Self::PersonNotFound(id) => write!(f, "person not found: {id}"),
            Self::PersonRetired(id) => write!(f, "person is retired: {id}"),
            Self::ConcurrentModification { entity, id } => {
                write!(f, "{entity} {id} was modified concurrently")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReferenceServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ReferenceServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: EntityKind::Organization,
                id,
            } => Self::OrganizationNotFound(id),
            RepoError::NotFound {
                entity: EntityKind::Person,
                id,
            } => Self::PersonNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Reference data service facade over repository implementations.
pub struct ReferenceService<R: ReferenceRepository + ReferenceLookup> {
    repo: R,
}

impl<R: ReferenceRepository + ReferenceLookup> ReferenceService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers one organization with a trimmed, unique name.
    pub fn register_organization(
        &self,
        input: NewOrganization,
    ) -> Result<Organization, ReferenceServiceError> {
        let name = normalize_name(&input.name)?;
        if self.repo.count_active_organizations_by_name(&name, None)? > 0 {
            return Err(ReferenceServiceError::DuplicateOrganizationName(name));
        }

        let organization = self
            .repo
            .insert_organization(&NewOrganization { name, ..input })?;
        info!(
            "event=organization_register module=service status=ok organization_id={} role={} region={}",
            organization.id, organization.role, organization.region
        );
        Ok(organization)
    }

    /// Registers one person under an active employing organization.
    pub fn register_person(&self, input: NewPerson) -> Result<Person, ReferenceServiceError> {
        let name = normalize_name(&input.name)?;
        if self.repo.lookup_organization(input.organization_id)?.is_none() {
            return Err(ReferenceServiceError::EmployerUnavailable(
                input.organization_id,
            ));
        }

        let person = self.repo.insert_person(&NewPerson { name, ..input })?;
        info!(
            "event=person_register module=service status=ok person_id={} organization_id={}",
            person.id, person.organization_id
        );
        Ok(person)
    }

    /// Rewrites an active organization's fields.
    ///
    /// # Contract
    /// - The trimmed name stays unique among other active organizations.
    /// - Absent target → `OrganizationNotFound`; retired → `OrganizationRetired`.
    pub fn update_organization(
        &self,
        id: OrganizationId,
        input: NewOrganization,
    ) -> Result<Organization, ReferenceServiceError> {
        let name = normalize_name(&input.name)?;
        match self.repo.find_organization(id)? {
            None => return Err(ReferenceServiceError::OrganizationNotFound(id)),
            Some(existing) if !existing.is_active() => {
                return Err(ReferenceServiceError::OrganizationRetired(id))
            }
            Some(_) => {}
        }
        if self.repo.count_active_organizations_by_name(&name, Some(id))? > 0 {
            return Err(ReferenceServiceError::DuplicateOrganizationName(name));
        }

        if self
            .repo
            .update_organization(id, &NewOrganization { name, ..input })?
            == 0
        {
            return Err(ReferenceServiceError::ConcurrentModification {
                entity: EntityKind::Organization,
                id,
            });
        }
        let organization = self.get_organization(id)?;
        info!(
            "event=organization_update module=service status=ok organization_id={id} role={} region={}",
            organization.role, organization.region
        );
        Ok(organization)
    }

    /// Rewrites an active person's name and employer.
    ///
    /// # Contract
    /// - The new employer must be active.
    /// - Absent target → `PersonNotFound`; retired → `PersonRetired`.
    pub fn update_person(
        &self,
        id: PersonId,
        input: NewPerson,
    ) -> Result<Person, ReferenceServiceError> {
        let name = normalize_name(&input.name)?;
        match self.repo.find_person(id)? {
            None => return Err(ReferenceServiceError::PersonNotFound(id)),
            Some(existing) if !existing.is_active() => {
                return Err(ReferenceServiceError::PersonRetired(id))
            }
            Some(_) => {}
        }
        if self.repo.lookup_organization(input.organization_id)?.is_none() {
            return Err(ReferenceServiceError::EmployerUnavailable(
                input.organization_id,
            ));
        }

        if self.repo.update_person(id, &NewPerson { name, ..input })? == 0 {
            return Err(ReferenceServiceError::ConcurrentModification {
                entity: EntityKind::Person,
                id,
            });
        }
        let person = self.get_person(id)?;
        info!(
            "event=person_update module=service status=ok person_id={id} organization_id={}",
            person.organization_id
        );
        Ok(person)
    }

    pub fn get_organization(&self, id: OrganizationId) -> Result<Organization, ReferenceServiceError> {
        self.repo
            .lookup_organization(id)?
            .ok_or(ReferenceServiceError::OrganizationNotFound(id))
    }

    pub fn get_person(&self, id: PersonId) -> Result<Person, ReferenceServiceError> {
        self.repo
            .lookup_person(id)?
            .ok_or(ReferenceServiceError::PersonNotFound(id))
    }

    pub fn retire_organization(&self, id: OrganizationId) -> Result<(), ReferenceServiceError> {
        self.repo.soft_delete_organization(id)?;
        info!("event=organization_retire module=service status=ok organization_id={id}");
        Ok(())
    }

    pub fn retire_person(&self, id: PersonId) -> Result<(), ReferenceServiceError> {
        self.repo.soft_delete_person(id)?;
        info!("event=person_retire module=service status=ok person_id={id}");
        Ok(())
    }
}

fn normalize_name(value: &str) -> Result<String, ReferenceServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ReferenceServiceError::BlankName);
    }
    Ok(trimmed.to_string())
}
