use chrono::NaiveDate;
use cooperation_core::{
    Agreement, AgreementFields, AgreementId, AgreementPage, AgreementSearchQuery,
    AgreementService, AgreementServiceError, AgreementStore, Assignment, AssignmentDraft,
    DateRange, InMemoryAgreementStore, JobType, NewOrganization, NewPerson, Organization,
    OrganizationCategory, OrganizationId, OrganizationRole, Person, PersonId, ReferenceLookup,
    ReferenceRepository, Region, RepoError, RepoResult,
};

/// Delegates to the in-memory store but loses every root write, as if
/// another writer deleted the agreement between the check and the write.
struct LostWriteStore {
    inner: InMemoryAgreementStore,
}

impl ReferenceLookup for LostWriteStore {
    fn lookup_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        self.inner.lookup_organization(id)
    }

    fn lookup_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        self.inner.lookup_person(id)
    }
}

impl AgreementStore for LostWriteStore {
    fn atomic<T, E>(&self, work: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        self.inner.atomic(|_| work(self))
    }

    fn find_agreement(
        &self,
        id: AgreementId,
        include_deleted: bool,
    ) -> RepoResult<Option<Agreement>> {
        self.inner.find_agreement(id, include_deleted)
    }

    fn list_assignments(&self, agreement_id: AgreementId) -> RepoResult<Vec<Assignment>> {
        self.inner.list_assignments(agreement_id)
    }

    fn count_active_by_theme(
        &self,
        theme: &str,
        exclude_id: Option<AgreementId>,
    ) -> RepoResult<u32> {
        self.inner.count_active_by_theme(theme, exclude_id)
    }

    fn find_overlapping_assignments(
        &self,
        person_id: PersonId,
        period: &DateRange,
        exclude_agreement_id: Option<AgreementId>,
    ) -> RepoResult<Vec<Assignment>> {
        self.inner
            .find_overlapping_assignments(person_id, period, exclude_agreement_id)
    }

    fn insert_agreement(&self, fields: &AgreementFields) -> RepoResult<AgreementId> {
        self.inner.insert_agreement(fields)
    }

    fn update_agreement_fields(
        &self,
        _id: AgreementId,
        _fields: &AgreementFields,
    ) -> RepoResult<usize> {
        Ok(0)
    }

    fn insert_assignments(
        &self,
        agreement_id: AgreementId,
        drafts: &[AssignmentDraft],
    ) -> RepoResult<usize> {
        self.inner.insert_assignments(agreement_id, drafts)
    }

    fn delete_assignments_by_agreements(
        &self,
        agreement_ids: &[AgreementId],
    ) -> RepoResult<usize> {
        self.inner.delete_assignments_by_agreements(agreement_ids)
    }

    fn mark_agreements_deleted(&self, _ids: &[AgreementId]) -> RepoResult<Vec<AgreementId>> {
        Ok(Vec::new())
    }

    fn search_agreements(&self, query: &AgreementSearchQuery) -> RepoResult<AgreementPage> {
        self.inner.search_agreements(query)
    }
}

fn span(start: (u32, u32), end: (u32, u32)) -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, start.0, start.1).unwrap(),
        NaiveDate::from_ymd_opt(2024, end.0, end.1).unwrap(),
    )
}

fn fields() -> AgreementFields {
    AgreementFields {
        theme: "Theme-X".to_string(),
        initiating_region: Region::Shanghai,
        receiving_region: Region::Beijing,
        period: span((1, 1), (6, 30)),
    }
}

/// Returns a service over the lossy store plus one committed agreement.
fn seeded() -> (AgreementService<LostWriteStore>, Agreement, AssignmentDraft) {
    let inner = InMemoryAgreementStore::new();
    let sender = inner
        .insert_organization(&NewOrganization {
            name: "Sender".to_string(),
            role: OrganizationRole::Sending,
            category: OrganizationCategory::Technology,
            region: Region::Shanghai,
        })
        .unwrap();
    let receiver = inner
        .insert_organization(&NewOrganization {
            name: "Receiver".to_string(),
            role: OrganizationRole::Receiving,
            category: OrganizationCategory::Service,
            region: Region::Beijing,
        })
        .unwrap();
    let person = inner
        .insert_person(&NewPerson {
            name: "P".to_string(),
            organization_id: sender.id,
        })
        .unwrap();
    let draft = AssignmentDraft {
        sending_organization_id: sender.id,
        person_id: person.id,
        job_type: JobType::Technical,
        receiving_organization_id: receiver.id,
        period: span((2, 1), (3, 1)),
    };

    let service = AgreementService::new(LostWriteStore { inner });
    let created = service
        .create_agreement(&fields(), std::slice::from_ref(&draft))
        .unwrap();
    (service, created, draft)
}

#[test]
fn update_losing_its_row_is_fatal_and_keeps_assignments() {
    let (service, created, draft) = seeded();
    let before = service.get_agreement_detail(created.id).unwrap();

    let shifted = AssignmentDraft {
        period: span((4, 1), (4, 30)),
        ..draft
    };
    let err = service
        .update_agreement(created.id, &fields(), &[shifted])
        .unwrap_err();

    assert!(matches!(err, AgreementServiceError::ConcurrentModification(id) if id == created.id));
    assert!(err.is_fatal());
    assert!(!err.is_validation());
    assert_eq!(service.get_agreement_detail(created.id).unwrap(), before);
    assert_eq!(service.store().inner.assignment_row_count(), 1);
}

#[test]
fn delete_losing_its_row_is_fatal_and_keeps_assignments() {
    let (service, created, _) = seeded();

    let err = service.delete_agreement(created.id).unwrap_err();

    assert!(matches!(err, AgreementServiceError::ConcurrentModification(id) if id == created.id));
    assert!(err.is_fatal());
    let detail = service.get_agreement_detail(created.id).unwrap();
    assert!(detail.agreement.is_active());
    assert_eq!(detail.assignments.len(), 1);
}
