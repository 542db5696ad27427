use cooperation_core::db::open_db_in_memory;
use cooperation_core::{
    NewOrganization, NewPerson, OrganizationCategory, OrganizationRole, ReferenceService,
    ReferenceServiceError, Region, SqliteReferenceRepository,
};

fn sending_org(name: &str) -> NewOrganization {
    NewOrganization {
        name: name.to_string(),
        role: OrganizationRole::Sending,
        category: OrganizationCategory::Technology,
        region: Region::Shanghai,
    }
}

#[test]
fn register_organization_trims_and_enforces_unique_names() {
    let conn = open_db_in_memory().unwrap();
    let service = ReferenceService::new(SqliteReferenceRepository::new(&conn));

    let created = service.register_organization(sending_org("  Acme  ")).unwrap();
    assert_eq!(created.name, "Acme");
    assert!(created.is_active());
    assert_eq!(service.get_organization(created.id).unwrap(), created);

    let duplicate = service.register_organization(sending_org("Acme")).unwrap_err();
    assert!(matches!(
        duplicate,
        ReferenceServiceError::DuplicateOrganizationName(name) if name == "Acme"
    ));

    let blank = service.register_organization(sending_org("   ")).unwrap_err();
    assert!(matches!(blank, ReferenceServiceError::BlankName));
}

#[test]
fn retired_organization_frees_its_name_and_rejects_new_staff() {
    let conn = open_db_in_memory().unwrap();
    let service = ReferenceService::new(SqliteReferenceRepository::new(&conn));
    let org = service.register_organization(sending_org("Acme")).unwrap();

    service.retire_organization(org.id).unwrap();
    assert!(matches!(
        service.get_organization(org.id),
        Err(ReferenceServiceError::OrganizationNotFound(id)) if id == org.id
    ));
    assert!(matches!(
        service.retire_organization(org.id),
        Err(ReferenceServiceError::OrganizationNotFound(_))
    ));

    let err = service
        .register_person(NewPerson {
            name: "Late hire".to_string(),
            organization_id: org.id,
        })
        .unwrap_err();
    assert!(matches!(err, ReferenceServiceError::EmployerUnavailable(id) if id == org.id));

    service.register_organization(sending_org("Acme")).unwrap();
}

#[test]
fn person_lifecycle() {
    let conn = open_db_in_memory().unwrap();
    let service = ReferenceService::new(SqliteReferenceRepository::new(&conn));
    let org = service.register_organization(sending_org("Acme")).unwrap();

    let person = service
        .register_person(NewPerson {
            name: "Li".to_string(),
            organization_id: org.id,
        })
        .unwrap();
    assert_eq!(person.organization_id, org.id);
    assert_eq!(service.get_person(person.id).unwrap(), person);

    service.retire_person(person.id).unwrap();
    assert!(matches!(
        service.get_person(person.id),
        Err(ReferenceServiceError::PersonNotFound(_))
    ));
    assert!(matches!(
        service.retire_person(9_999),
        Err(ReferenceServiceError::PersonNotFound(9_999))
    ));
}

#[test]
fn reference_records_serialize_with_storage_codes() {
    let conn = open_db_in_memory().unwrap();
    let service = ReferenceService::new(SqliteReferenceRepository::new(&conn));
    let org = service.register_organization(sending_org("Acme")).unwrap();

    let json = serde_json::to_value(&org).unwrap();
    assert_eq!(json["role"], "sending");
    assert_eq!(json["region"], "shanghai");
    assert_eq!(json["category"], "technology");
    assert_eq!(json["is_deleted"], false);
}

#[test]
fn update_organization_keeps_names_unique_except_for_itself() {
    let conn = open_db_in_memory().unwrap();
    let service = ReferenceService::new(SqliteReferenceRepository::new(&conn));
    let acme = service.register_organization(sending_org("Acme")).unwrap();
    service.register_organization(sending_org("Globex")).unwrap();

    let same_name = service
        .update_organization(
            acme.id,
            NewOrganization {
                region: Region::Guangzhou,
                ..sending_org(" Acme ")
            },
        )
        .unwrap();
    assert_eq!(same_name.name, "Acme");
    assert_eq!(same_name.region, Region::Guangzhou);
    assert!(same_name.is_active());

    let taken = service
        .update_organization(acme.id, sending_org("Globex"))
        .unwrap_err();
    assert!(matches!(
        taken,
        ReferenceServiceError::DuplicateOrganizationName(name) if name == "Globex"
    ));
    assert_eq!(service.get_organization(acme.id).unwrap().name, "Acme");
}

#[test]
fn updates_distinguish_missing_and_retired_records() {
    let conn = open_db_in_memory().unwrap();
    let service = ReferenceService::new(SqliteReferenceRepository::new(&conn));
    let org = service.register_organization(sending_org("Acme")).unwrap();
    let person = service
        .register_person(NewPerson {
            name: "Li".to_string(),
            organization_id: org.id,
        })
        .unwrap();

    assert!(matches!(
        service.update_organization(9_999, sending_org("Other")),
        Err(ReferenceServiceError::OrganizationNotFound(9_999))
    ));
    assert!(matches!(
        service.update_person(
            9_999,
            NewPerson {
                name: "Wang".to_string(),
                organization_id: org.id,
            }
        ),
        Err(ReferenceServiceError::PersonNotFound(9_999))
    ));

    service.retire_person(person.id).unwrap();
    assert!(matches!(
        service.update_person(
            person.id,
            NewPerson {
                name: "Li".to_string(),
                organization_id: org.id,
            }
        ),
        Err(ReferenceServiceError::PersonRetired(id)) if id == person.id
    ));

    service.retire_organization(org.id).unwrap();
    assert!(matches!(
        service.update_organization(org.id, sending_org("Acme")),
        Err(ReferenceServiceError::OrganizationRetired(id)) if id == org.id
    ));
}

#[test]
fn update_person_requires_active_employer() {
    let conn = open_db_in_memory().unwrap();
    let service = ReferenceService::new(SqliteReferenceRepository::new(&conn));
    let acme = service.register_organization(sending_org("Acme")).unwrap();
    let globex = service.register_organization(sending_org("Globex")).unwrap();
    let person = service
        .register_person(NewPerson {
            name: "Li".to_string(),
            organization_id: acme.id,
        })
        .unwrap();
    service.retire_organization(globex.id).unwrap();

    let err = service
        .update_person(
            person.id,
            NewPerson {
                name: "Li".to_string(),
                organization_id: globex.id,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ReferenceServiceError::EmployerUnavailable(id) if id == globex.id));
    assert_eq!(service.get_person(person.id).unwrap().organization_id, acme.id);
}
