//! In-memory arena store.
//!
//! # Responsibility
//! - Implement `ReferenceLookup`, `ReferenceRepository` and
//!   `AgreementStore` over plain maps keyed by id, so the agreement engine
//!   can run deterministically without SQLite.
//!
//! # Invariants
//! - Ids of every entity come from one counter that starts at 1.
//! - Timestamps come from a logical clock that ticks once per write.
//! - `atomic` snapshots the arena and restores it when the work fails.

use crate::model::agreement::{
    Agreement, AgreementFields, AgreementId, AgreementSummary, Assignment, AssignmentDraft,
    AssignmentId,
};
use crate::model::date_range::DateRange;
use crate::model::reference::{
    NewOrganization, NewPerson, Organization, OrganizationId, Person, PersonId,
};
use crate::repo::agreement_repo::{AgreementPage, AgreementSearchQuery, AgreementStore};
use crate::repo::reference_repo::{ReferenceLookup, ReferenceRepository};
use crate::repo::{EntityKind, RepoError, RepoResult};
use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct Arena {
    organizations: BTreeMap<OrganizationId, Organization>,
    persons: BTreeMap<PersonId, Person>,
    agreements: BTreeMap<AgreementId, Agreement>,
    assignments: BTreeMap<AssignmentId, Assignment>,
    last_id: i64,
    clock: i64,
}

impl Arena {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn active_agreement(&self, id: AgreementId) -> Option<&Agreement> {
        self.agreements.get(&id).filter(|agreement| agreement.is_active())
    }
}

/// Single-threaded in-memory implementation of every store contract.
#[derive(Debug, Default)]
pub struct InMemoryAgreementStore {
    arena: RefCell<Arena>,
}

impl InMemoryAgreementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of assignment rows currently stored, across all agreements.
    pub fn assignment_row_count(&self) -> usize {
        self.arena.borrow().assignments.len()
    }
}

impl ReferenceLookup for InMemoryAgreementStore {
    fn lookup_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        Ok(self
            .arena
            .borrow()
            .organizations
            .get(&id)
            .filter(|organization| organization.is_active())
            .cloned())
    }

    fn lookup_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        Ok(self
            .arena
            .borrow()
            .persons
            .get(&id)
            .filter(|person| person.is_active())
            .cloned())
    }
}

impl ReferenceRepository for InMemoryAgreementStore {
    fn find_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        Ok(self.arena.borrow().organizations.get(&id).cloned())
    }

    fn find_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        Ok(self.arena.borrow().persons.get(&id).cloned())
    }

    fn insert_organization(&self, input: &NewOrganization) -> RepoResult<Organization> {
        let mut arena = self.arena.borrow_mut();
        let organization = Organization {
            id: arena.next_id(),
            name: input.name.clone(),
            role: input.role,
            category: input.category,
            region: input.region,
            is_deleted: false,
        };
        arena
            .organizations
            .insert(organization.id, organization.clone());
        Ok(organization)
    }

    fn insert_person(&self, input: &NewPerson) -> RepoResult<Person> {
        let mut arena = self.arena.borrow_mut();
        let person = Person {
            id: arena.next_id(),
            name: input.name.clone(),
            organization_id: input.organization_id,
            is_deleted: false,
        };
        arena.persons.insert(person.id, person.clone());
        Ok(person)
    }

    fn update_organization(
        &self,
        id: OrganizationId,
        input: &NewOrganization,
    ) -> RepoResult<usize> {
        match self
            .arena
            .borrow_mut()
            .organizations
            .get_mut(&id)
            .filter(|organization| organization.is_active())
        {
            Some(organization) => {
                organization.name = input.name.clone();
                organization.role = input.role;
                organization.category = input.category;
                organization.region = input.region;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn update_person(&self, id: PersonId, input: &NewPerson) -> RepoResult<usize> {
        match self
            .arena
            .borrow_mut()
            .persons
            .get_mut(&id)
            .filter(|person| person.is_active())
        {
            Some(person) => {
                person.name = input.name.clone();
                person.organization_id = input.organization_id;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn count_active_organizations_by_name(
        &self,
        name: &str,
        exclude_id: Option<OrganizationId>,
    ) -> RepoResult<u32> {
        let count = self
            .arena
            .borrow()
            .organizations
            .values()
            .filter(|organization| organization.is_active() && organization.name == name)
            .filter(|organization| Some(organization.id) != exclude_id)
            .count();
        Ok(count as u32)
    }

    fn soft_delete_organization(&self, id: OrganizationId) -> RepoResult<()> {
        match self
            .arena
            .borrow_mut()
            .organizations
            .get_mut(&id)
            .filter(|organization| organization.is_active())
        {
            Some(organization) => {
                organization.is_deleted = true;
                Ok(())
            }
            None => Err(RepoError::NotFound {
                entity: EntityKind::Organization,
                id,
            }),
        }
    }

    fn soft_delete_person(&self, id: PersonId) -> RepoResult<()> {
        match self
            .arena
            .borrow_mut()
            .persons
            .get_mut(&id)
            .filter(|person| person.is_active())
        {
            Some(person) => {
                person.is_deleted = true;
                Ok(())
            }
            None => Err(RepoError::NotFound { entity: EntityKind::Person, id }),
        }
    }
}

impl AgreementStore for InMemoryAgreementStore {
    fn atomic<T, E>(&self, work: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        let snapshot = self.arena.borrow().clone();
        let result = work(self);
        if result.is_err() {
            *self.arena.borrow_mut() = snapshot;
        }
        result
    }

    fn find_agreement(
        &self,
        id: AgreementId,
        include_deleted: bool,
    ) -> RepoResult<Option<Agreement>> {
        Ok(self
            .arena
            .borrow()
            .agreements
            .get(&id)
            .filter(|agreement| include_deleted || agreement.is_active())
            .cloned())
    }

    fn list_assignments(&self, agreement_id: AgreementId) -> RepoResult<Vec<Assignment>> {
        let mut items: Vec<Assignment> = self
            .arena
            .borrow()
            .assignments
            .values()
            .filter(|assignment| assignment.agreement_id == agreement_id)
            .cloned()
            .collect();
        items.sort_by_key(|assignment| (assignment.period.start, assignment.id));
        Ok(items)
    }

    fn count_active_by_theme(
        &self,
        theme: &str,
        exclude_id: Option<AgreementId>,
    ) -> RepoResult<u32> {
        let count = self
            .arena
            .borrow()
            .agreements
            .values()
            .filter(|agreement| agreement.is_active() && agreement.theme == theme)
            .filter(|agreement| Some(agreement.id) != exclude_id)
            .count();
        Ok(count as u32)
    }

    fn find_overlapping_assignments(
        &self,
        person_id: PersonId,
        period: &DateRange,
        exclude_agreement_id: Option<AgreementId>,
    ) -> RepoResult<Vec<Assignment>> {
        let arena = self.arena.borrow();
        let mut items: Vec<Assignment> = arena
            .assignments
            .values()
            .filter(|assignment| assignment.person_id == person_id)
            .filter(|assignment| Some(assignment.agreement_id) != exclude_agreement_id)
            .filter(|assignment| arena.active_agreement(assignment.agreement_id).is_some())
            .filter(|assignment| {
                assignment.period.end >= period.start && assignment.period.start <= period.end
            })
            .cloned()
            .collect();
        items.sort_by_key(|assignment| (assignment.period.start, assignment.id));
        Ok(items)
    }

    fn insert_agreement(&self, fields: &AgreementFields) -> RepoResult<AgreementId> {
        let mut arena = self.arena.borrow_mut();
        let id = arena.next_id();
        let now = arena.tick();
        arena.agreements.insert(
            id,
            Agreement {
                id,
                theme: fields.theme.clone(),
                initiating_region: fields.initiating_region,
                receiving_region: fields.receiving_region,
                period: fields.period,
                is_deleted: false,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    fn update_agreement_fields(
        &self,
        id: AgreementId,
        fields: &AgreementFields,
    ) -> RepoResult<usize> {
        let mut arena = self.arena.borrow_mut();
        let now = arena.tick();
        match arena
            .agreements
            .get_mut(&id)
            .filter(|agreement| agreement.is_active())
        {
            Some(agreement) => {
                agreement.theme = fields.theme.clone();
                agreement.initiating_region = fields.initiating_region;
                agreement.receiving_region = fields.receiving_region;
                agreement.period = fields.period;
                agreement.updated_at = now;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn insert_assignments(
        &self,
        agreement_id: AgreementId,
        drafts: &[AssignmentDraft],
    ) -> RepoResult<usize> {
        let mut arena = self.arena.borrow_mut();
        if !arena.agreements.contains_key(&agreement_id) {
            return Err(RepoError::NotFound {
                entity: EntityKind::Agreement,
                id: agreement_id,
            });
        }
        for draft in drafts {
            let id = arena.next_id();
            arena.assignments.insert(
                id,
                Assignment {
                    id,
                    agreement_id,
                    sending_organization_id: draft.sending_organization_id,
                    person_id: draft.person_id,
                    job_type: draft.job_type,
                    receiving_organization_id: draft.receiving_organization_id,
                    period: draft.period,
                },
            );
        }
        Ok(drafts.len())
    }

    fn delete_assignments_by_agreements(
        &self,
        agreement_ids: &[AgreementId],
    ) -> RepoResult<usize> {
        let mut arena = self.arena.borrow_mut();
        let before = arena.assignments.len();
        arena
            .assignments
            .retain(|_, assignment| !agreement_ids.contains(&assignment.agreement_id));
        Ok(before - arena.assignments.len())
    }

    fn mark_agreements_deleted(&self, ids: &[AgreementId]) -> RepoResult<Vec<AgreementId>> {
        let mut arena = self.arena.borrow_mut();
        let now = arena.tick();
        let mut marked = Vec::new();
        for agreement in arena.agreements.values_mut() {
            if agreement.is_active() && ids.contains(&agreement.id) {
                agreement.is_deleted = true;
                agreement.updated_at = now;
                marked.push(agreement.id);
            }
        }
        Ok(marked)
    }

    fn search_agreements(&self, query: &AgreementSearchQuery) -> RepoResult<AgreementPage> {
        let arena = self.arena.borrow();
        let mut matches: Vec<&Agreement> = arena
            .agreements
            .values()
            .filter(|agreement| agreement.is_active())
            .filter(|agreement| {
                query
                    .theme_filter()
                    .map_or(true, |theme| agreement.theme.contains(theme))
            })
            .filter(|agreement| {
                query
                    .initiating_region
                    .map_or(true, |region| agreement.initiating_region == region)
            })
            .filter(|agreement| {
                query
                    .receiving_region
                    .map_or(true, |region| agreement.receiving_region == region)
            })
            .collect();
        matches.sort_by(|left, right| {
            (right.created_at, right.id).cmp(&(left.created_at, left.id))
        });

        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.effective_size() as usize)
            .map(|agreement| AgreementSummary {
                agreement: agreement.clone(),
                assignment_count: arena
                    .assignments
                    .values()
                    .filter(|assignment| assignment.agreement_id == agreement.id)
                    .count() as u32,
            })
            .collect();

        Ok(AgreementPage::new(items, query, total))
    }
}
