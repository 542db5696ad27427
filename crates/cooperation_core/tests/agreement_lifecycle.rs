use chrono::NaiveDate;
use cooperation_core::db::open_db_in_memory;
use cooperation_core::{
    AgreementFields, AgreementService, AgreementServiceError, AgreementStore, AssignmentDraft,
    CoordinatorConfig, DateRange, JobType, NewOrganization, NewPerson, Organization,
    OrganizationCategory, OrganizationRole, Person, ReferenceService, Region, RepoError,
    SqliteAgreementStore, SqliteReferenceRepository, ValidationError,
};
use rusqlite::Connection;

struct Fixture {
    sender: Organization,
    receiver: Organization,
    person: Person,
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
    DateRange::new(date(start.0, start.1, start.2), date(end.0, end.1, end.2))
}

fn seed(conn: &Connection) -> Fixture {
    let references = ReferenceService::new(SqliteReferenceRepository::new(conn));
    let sender = references
        .register_organization(NewOrganization {
            name: "Beijing Works".to_string(),
            role: OrganizationRole::Sending,
            category: OrganizationCategory::Manufacturing,
            region: Region::Beijing,
        })
        .unwrap();
    let receiver = references
        .register_organization(NewOrganization {
            name: "Shanghai Labs".to_string(),
            role: OrganizationRole::Receiving,
            category: OrganizationCategory::Technology,
            region: Region::Shanghai,
        })
        .unwrap();
    let person = references
        .register_person(NewPerson {
            name: "Engineer P".to_string(),
            organization_id: sender.id,
        })
        .unwrap();
    Fixture {
        sender,
        receiver,
        person,
    }
}

fn fields(theme: &str) -> AgreementFields {
    AgreementFields {
        theme: theme.to_string(),
        initiating_region: Region::Beijing,
        receiving_region: Region::Shanghai,
        period: range((2024, 1, 1), (2024, 6, 30)),
    }
}

fn draft(fixture: &Fixture, period: DateRange) -> AssignmentDraft {
    AssignmentDraft {
        sending_organization_id: fixture.sender.id,
        person_id: fixture.person.id,
        job_type: JobType::Technical,
        receiving_organization_id: fixture.receiver.id,
        period,
    }
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn committed_overlap_self_exclusion_and_delete_lifecycle() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));

    let first = service
        .create_agreement(
            &fields("Theme-X"),
            &[draft(&fixture, range((2024, 2, 1), (2024, 3, 1)))],
        )
        .unwrap();
    assert!(first.id > 0);
    assert!(first.is_active());
    let original_rows = service.get_agreement_detail(first.id).unwrap().assignments;
    assert_eq!(original_rows.len(), 1);

    let err = service
        .create_agreement(
            &fields("Theme-Y"),
            &[draft(&fixture, range((2024, 2, 15), (2024, 2, 20)))],
        )
        .unwrap_err();
    match err {
        AgreementServiceError::Validation(ValidationError::CommittedOverlap {
            person_id,
            agreement_id,
            existing,
            ..
        }) => {
            assert_eq!(person_id, fixture.person.id);
            assert_eq!(agreement_id, first.id);
            assert_eq!(existing, range((2024, 2, 1), (2024, 3, 1)));
        }
        other => panic!("unexpected error: {other}"),
    }

    let shifted = range((2024, 2, 10), (2024, 2, 25));
    service
        .update_agreement(first.id, &fields("Theme-X"), &[draft(&fixture, shifted)])
        .unwrap();
    let replaced = service.get_agreement_detail(first.id).unwrap().assignments;
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0].period, shifted);
    assert_ne!(replaced[0].id, original_rows[0].id);
    assert_eq!(count_rows(&conn, "assignments"), 1);

    let err = service
        .create_agreement(
            &fields("Theme-X"),
            &[draft(&fixture, range((2024, 4, 1), (2024, 4, 30)))],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AgreementServiceError::Validation(ValidationError::DuplicateTheme { .. })
    ));

    service.delete_agreement(first.id).unwrap();
    let err = service
        .update_agreement(first.id, &fields("Theme-X"), &[draft(&fixture, shifted)])
        .unwrap_err();
    assert!(matches!(err, AgreementServiceError::AlreadyDeleted(id) if id == first.id));
    assert!(err.is_not_found());
    assert_eq!(count_rows(&conn, "assignments"), 0);

    let deleted_again = service.delete_agreement(first.id).unwrap_err();
    assert!(deleted_again.is_not_found());
}

#[test]
fn deleted_agreement_frees_theme_and_person_schedule() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));
    let period = range((2024, 2, 1), (2024, 3, 1));

    let first = service
        .create_agreement(&fields("Theme-X"), &[draft(&fixture, period)])
        .unwrap();
    service.delete_agreement(first.id).unwrap();

    let second = service
        .create_agreement(&fields("Theme-X"), &[draft(&fixture, period)])
        .unwrap();
    assert_ne!(second.id, first.id);
}

#[test]
fn update_with_identical_payload_succeeds() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));
    let assignments = [draft(&fixture, range((2024, 2, 1), (2024, 3, 1)))];

    let created = service
        .create_agreement(&fields("Theme-X"), &assignments)
        .unwrap();
    let updated = service
        .update_agreement(created.id, &created.fields(), &assignments)
        .unwrap();
    let again = service
        .update_agreement(created.id, &updated.fields(), &assignments)
        .unwrap();

    assert_eq!(again.fields(), created.fields());
    let detail = service.get_agreement_detail(created.id).unwrap();
    let drafts: Vec<AssignmentDraft> = detail.assignments.iter().map(|row| row.to_draft()).collect();
    assert_eq!(drafts, assignments.to_vec());
}

#[test]
fn update_unknown_agreement_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));

    let err = service
        .update_agreement(
            404,
            &fields("Theme-X"),
            &[draft(&fixture, range((2024, 2, 1), (2024, 3, 1)))],
        )
        .unwrap_err();
    assert!(matches!(err, AgreementServiceError::NotFound(404)));
    assert!(service.get_agreement_detail(404).unwrap_err().is_not_found());
}

#[test]
fn touching_endpoints_conflict_and_adjacent_days_do_not() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));

    service
        .create_agreement(
            &fields("Theme-A"),
            &[draft(&fixture, range((2024, 2, 1), (2024, 3, 1)))],
        )
        .unwrap();

    let touching = service
        .create_agreement(
            &fields("Theme-B"),
            &[draft(&fixture, range((2024, 3, 1), (2024, 3, 10)))],
        )
        .unwrap_err();
    assert!(touching.is_validation());

    service
        .create_agreement(
            &fields("Theme-B"),
            &[draft(&fixture, range((2024, 3, 2), (2024, 3, 10)))],
        )
        .unwrap();
}

#[test]
fn rejected_writes_leave_no_rows_behind() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));

    let err = service
        .create_agreement(
            &fields("Theme-X"),
            &[
                draft(&fixture, range((2024, 2, 1), (2024, 2, 10))),
                draft(&fixture, range((2024, 2, 10), (2024, 2, 20))),
            ],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AgreementServiceError::Validation(ValidationError::IntraRequestOverlap { .. })
    ));

    let err = service
        .create_agreement(
            &fields("Theme-X"),
            &[draft(&fixture, range((2024, 6, 1), (2024, 7, 15)))],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AgreementServiceError::Validation(ValidationError::AssignmentOutsideAgreement { .. })
    ));

    assert_eq!(count_rows(&conn, "agreements"), 0);
    assert_eq!(count_rows(&conn, "assignments"), 0);
}

#[test]
fn failing_unit_of_work_rolls_back_partial_writes() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteAgreementStore::new(&conn);

    let result: Result<(), RepoError> = store.atomic(|store| {
        store.insert_agreement(&fields("Theme-X"))?;
        Err(RepoError::InvalidData("forced failure".to_string()))
    });

    assert!(result.is_err());
    assert_eq!(count_rows(&conn, "agreements"), 0);
}

#[test]
fn cross_entity_mismatches_are_reported_per_assignment() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let references = ReferenceService::new(SqliteReferenceRepository::new(&conn));
    let other_sender = references
        .register_organization(NewOrganization {
            name: "Guangzhou Services".to_string(),
            role: OrganizationRole::Sending,
            category: OrganizationCategory::Service,
            region: Region::Guangzhou,
        })
        .unwrap();
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));
    let period = range((2024, 2, 1), (2024, 3, 1));

    let mut wrong_region = draft(&fixture, period);
    wrong_region.sending_organization_id = other_sender.id;
    let err = service
        .create_agreement(&fields("Theme-X"), &[wrong_region])
        .unwrap_err();
    assert!(matches!(
        err,
        AgreementServiceError::Validation(ValidationError::OrganizationRegionMismatch {
            actual: Region::Guangzhou,
            expected: Region::Beijing,
            ..
        })
    ));

    let mut swapped_roles = draft(&fixture, period);
    swapped_roles.receiving_organization_id = fixture.sender.id;
    let mut swapped_fields = fields("Theme-X");
    swapped_fields.receiving_region = Region::Beijing;
    let err = service
        .create_agreement(&swapped_fields, &[swapped_roles])
        .unwrap_err();
    assert!(matches!(
        err,
        AgreementServiceError::Validation(ValidationError::OrganizationRoleMismatch {
            expected: OrganizationRole::Receiving,
            actual: OrganizationRole::Sending,
            ..
        })
    ));

    references.retire_person(fixture.person.id).unwrap();
    let err = service
        .create_agreement(&fields("Theme-X"), &[draft(&fixture, period)])
        .unwrap_err();
    assert!(matches!(
        err,
        AgreementServiceError::Validation(ValidationError::PersonUnavailable { person_id })
            if person_id == fixture.person.id
    ));
}

#[test]
fn empty_assignment_policy_is_configurable() {
    let conn = open_db_in_memory().unwrap();

    let strict = AgreementService::new(SqliteAgreementStore::new(&conn));
    let err = strict.create_agreement(&fields("Theme-X"), &[]).unwrap_err();
    assert!(matches!(
        err,
        AgreementServiceError::Validation(ValidationError::EmptyAssignments)
    ));

    let lenient = AgreementService::with_config(
        SqliteAgreementStore::new(&conn),
        CoordinatorConfig {
            allow_empty_assignments: true,
        },
    );
    let created = lenient.create_agreement(&fields("Theme-X"), &[]).unwrap();
    assert!(lenient
        .get_agreement_detail(created.id)
        .unwrap()
        .assignments
        .is_empty());
}

#[test]
fn reversed_agreement_period_is_rejected_first() {
    let conn = open_db_in_memory().unwrap();
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));
    let mut reversed = fields("Theme-X");
    reversed.period = range((2024, 6, 30), (2024, 1, 1));

    let err = service.create_agreement(&reversed, &[]).unwrap_err();
    assert!(matches!(
        err,
        AgreementServiceError::Validation(ValidationError::AgreementPeriodReversed { .. })
    ));
}

#[test]
fn agreement_years_beyond_four_digits_are_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));

    let mut far = fields("Theme-Far");
    far.period = DateRange::new(date(2024, 1, 1), date(10_000, 1, 1));
    let err = service
        .create_agreement(
            &far,
            &[draft(
                &fixture,
                DateRange::new(date(2024, 2, 1), date(10_000, 1, 1)),
            )],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AgreementServiceError::Validation(ValidationError::UnsupportedAgreementYears { .. })
    ));
    assert_eq!(count_rows(&conn, "agreements"), 0);

    let mut last = fields("Theme-Last");
    last.period = DateRange::new(date(2024, 1, 1), date(9_999, 12, 31));
    service
        .create_agreement(
            &last,
            &[draft(
                &fixture,
                DateRange::new(date(2024, 2, 1), date(9_999, 12, 31)),
            )],
        )
        .unwrap();

    let clash = service
        .create_agreement(
            &fields("Theme-Next"),
            &[draft(&fixture, range((2024, 6, 1), (2024, 6, 2)))],
        )
        .unwrap_err();
    assert!(matches!(
        clash,
        AgreementServiceError::Validation(ValidationError::CommittedOverlap { .. })
    ));
}

#[test]
fn moving_a_person_changes_the_accepted_sending_organization() {
    let conn = open_db_in_memory().unwrap();
    let fixture = seed(&conn);
    let references = ReferenceService::new(SqliteReferenceRepository::new(&conn));
    let new_employer = references
        .register_organization(NewOrganization {
            name: "Beijing Foundry".to_string(),
            role: OrganizationRole::Sending,
            category: OrganizationCategory::Manufacturing,
            region: Region::Beijing,
        })
        .unwrap();
    references
        .update_person(
            fixture.person.id,
            NewPerson {
                name: fixture.person.name.clone(),
                organization_id: new_employer.id,
            },
        )
        .unwrap();
    let service = AgreementService::new(SqliteAgreementStore::new(&conn));
    let period = range((2024, 2, 1), (2024, 3, 1));

    let err = service
        .create_agreement(&fields("Theme-X"), &[draft(&fixture, period)])
        .unwrap_err();
    match err {
        AgreementServiceError::Validation(ValidationError::PersonNotEmployedBySender {
            person_id,
            sending_organization_id,
            employer_id,
        }) => {
            assert_eq!(person_id, fixture.person.id);
            assert_eq!(sending_organization_id, fixture.sender.id);
            assert_eq!(employer_id, new_employer.id);
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut moved = draft(&fixture, period);
    moved.sending_organization_id = new_employer.id;
    service.create_agreement(&fields("Theme-X"), &[moved]).unwrap();
}
