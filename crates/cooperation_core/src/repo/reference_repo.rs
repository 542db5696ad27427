//! Reference data contracts and SQLite implementation.
//!
//! # Responsibility
//! - Answer "current active organization/person by id" lookups for
//!   agreement validation.
//! - Persist organization/person registration, edits and retirement.
//!
//! # Invariants
//! - `ReferenceLookup` never returns soft-deleted records.
//! - Retirement only flips `is_deleted`; rows are never removed.
//! - Edits only apply to active rows and never touch `is_deleted`.

use crate::model::reference::{
    NewOrganization, NewPerson, Organization, OrganizationCategory, OrganizationId,
    OrganizationRole, Person, PersonId, Region,
};
use crate::repo::{bool_to_int, decode_enum, decode_flag, EntityKind, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const ORGANIZATION_SELECT_SQL: &str = "SELECT
    id,
    name,
    role,
    category,
    region,
    is_deleted
FROM organizations";

const PERSON_SELECT_SQL: &str = "SELECT
    id,
    name,
    organization_id,
    is_deleted
FROM persons";

/// Read-only oracle over active reference data.
pub trait ReferenceLookup {
    /// Returns the active organization, or `None` when absent or deleted.
    fn lookup_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>>;
    /// Returns the active person, or `None` when absent or deleted.
    fn lookup_person(&self, id: PersonId) -> RepoResult<Option<Person>>;
}

/// Write side of reference data.
pub trait ReferenceRepository {
    /// Loads an organization whether or not it is retired.
    fn find_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>>;
    /// Loads a person whether or not they are retired.
    fn find_person(&self, id: PersonId) -> RepoResult<Option<Person>>;
    fn insert_organization(&self, input: &NewOrganization) -> RepoResult<Organization>;
    fn insert_person(&self, input: &NewPerson) -> RepoResult<Person>;
    /// Rewrites an active organization. Returns changed row count.
    fn update_organization(&self, id: OrganizationId, input: &NewOrganization)
        -> RepoResult<usize>;
    /// Rewrites an active person. Returns changed row count.
    fn update_person(&self, id: PersonId, input: &NewPerson) -> RepoResult<usize>;
    /// Counts active organizations carrying exactly `name`, skipping `exclude_id`.
    fn count_active_organizations_by_name(
        &self,
        name: &str,
        exclude_id: Option<OrganizationId>,
    ) -> RepoResult<u32>;
    fn soft_delete_organization(&self, id: OrganizationId) -> RepoResult<()>;
    fn soft_delete_person(&self, id: PersonId) -> RepoResult<()>;
}

/// SQLite-backed reference data repository.
pub struct SqliteReferenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReferenceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ReferenceLookup for SqliteReferenceRepository<'_> {
    fn lookup_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        load_active_organization(self.conn, id)
    }

    fn lookup_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        load_active_person(self.conn, id)
    }
}

impl ReferenceRepository for SqliteReferenceRepository<'_> {
    fn find_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        load_organization(self.conn, id, true)
    }

    fn find_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        load_person(self.conn, id, true)
    }

    fn insert_organization(&self, input: &NewOrganization) -> RepoResult<Organization> {
        self.conn.execute(
            "INSERT INTO organizations (name, role, category, region, is_deleted)
             VALUES (?1, ?2, ?3, ?4, 0);",
            params![
                input.name.as_str(),
                input.role.as_str(),
                input.category.as_str(),
                input.region.as_str(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        load_active_organization(self.conn, id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("organization {id} missing after insert"))
        })
    }

    fn insert_person(&self, input: &NewPerson) -> RepoResult<Person> {
        self.conn.execute(
            "INSERT INTO persons (name, organization_id, is_deleted)
             VALUES (?1, ?2, 0);",
            params![input.name.as_str(), input.organization_id],
        )?;
        let id = self.conn.last_insert_rowid();
        load_active_person(self.conn, id)?
            .ok_or_else(|| RepoError::InvalidData(format!("person {id} missing after insert")))
    }

    fn update_organization(
        &self,
        id: OrganizationId,
        input: &NewOrganization,
    ) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE organizations
             SET
                name = ?2,
                role = ?3,
                category = ?4,
                region = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND is_deleted = 0;",
            params![
                id,
                input.name.as_str(),
                input.role.as_str(),
                input.category.as_str(),
                input.region.as_str(),
            ],
        )?;
        Ok(changed)
    }

    fn update_person(&self, id: PersonId, input: &NewPerson) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE persons
             SET
                name = ?2,
                organization_id = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND is_deleted = 0;",
            params![id, input.name.as_str(), input.organization_id],
        )?;
        Ok(changed)
    }

    fn count_active_organizations_by_name(
        &self,
        name: &str,
        exclude_id: Option<OrganizationId>,
    ) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*)
             FROM organizations
             WHERE name = ?1
               AND is_deleted = 0
               AND (?2 IS NULL OR id != ?2);",
            params![name, exclude_id],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn soft_delete_organization(&self, id: OrganizationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE organizations
             SET is_deleted = 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND is_deleted = 0;",
            [id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: EntityKind::Organization,
                id,
            });
        }
        Ok(())
    }

    fn soft_delete_person(&self, id: PersonId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE persons
             SET is_deleted = 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND is_deleted = 0;",
            [id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: EntityKind::Person, id });
        }
        Ok(())
    }
}

pub(crate) fn load_active_organization(
    conn: &Connection,
    id: OrganizationId,
) -> RepoResult<Option<Organization>> {
    load_organization(conn, id, false)
}

pub(crate) fn load_active_person(conn: &Connection, id: PersonId) -> RepoResult<Option<Person>> {
    load_person(conn, id, false)
}

fn load_organization(
    conn: &Connection,
    id: OrganizationId,
    include_deleted: bool,
) -> RepoResult<Option<Organization>> {
    conn.query_row(
        &format!("{ORGANIZATION_SELECT_SQL} WHERE id = ?1 AND (?2 = 1 OR is_deleted = 0);"),
        params![id, bool_to_int(include_deleted)],
        |row| Ok(parse_organization_row(row)),
    )
    .optional()?
    .transpose()
}

fn load_person(conn: &Connection, id: PersonId, include_deleted: bool) -> RepoResult<Option<Person>> {
    conn.query_row(
        &format!("{PERSON_SELECT_SQL} WHERE id = ?1 AND (?2 = 1 OR is_deleted = 0);"),
        params![id, bool_to_int(include_deleted)],
        |row| Ok(parse_person_row(row)),
    )
    .optional()?
    .transpose()
}

fn parse_organization_row(row: &Row<'_>) -> RepoResult<Organization> {
    let role: String = row.get("role")?;
    let category: String = row.get("category")?;
    let region: String = row.get("region")?;
    Ok(Organization {
        id: row.get("id")?,
        name: row.get("name")?,
        role: decode_enum(&role, "organizations.role", OrganizationRole::parse)?,
        category: decode_enum(&category, "organizations.category", OrganizationCategory::parse)?,
        region: decode_enum(&region, "organizations.region", Region::parse)?,
        is_deleted: decode_flag(row.get("is_deleted")?, "organizations.is_deleted")?,
    })
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    Ok(Person {
        id: row.get("id")?,
        name: row.get("name")?,
        organization_id: row.get("organization_id")?,
        is_deleted: decode_flag(row.get("is_deleted")?, "persons.is_deleted")?,
    })
}
