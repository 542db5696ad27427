//! Agreement store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Expose the primitive reads/writes the agreement coordinator composes:
//!   theme uniqueness, overlap query, root/assignment writes, soft delete.
//! - Provide the unit-of-work boundary (`atomic`) that makes one
//!   coordinator operation all-or-nothing.
//!
//! # Invariants
//! - The overlap query uses closed-interval semantics:
//!   `existing.end >= start AND existing.start <= end`.
//! - Only assignments of active agreements are visible to the overlap query.
//! - `mark_agreements_deleted` only flips active rows and reports exactly
//!   the ids it flipped.

use crate::model::agreement::{
    Agreement, AgreementFields, AgreementId, AgreementSummary, Assignment, AssignmentDraft,
    JobType,
};
use crate::model::date_range::DateRange;
use crate::model::reference::{Organization, OrganizationId, Person, PersonId, Region};
use crate::repo::reference_repo::{load_active_organization, load_active_person, ReferenceLookup};
use crate::repo::{bool_to_int, decode_enum, decode_flag, placeholders, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rusqlite::{Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

const AGREEMENT_SELECT_SQL: &str = "SELECT
    id,
    theme,
    initiating_region,
    receiving_region,
    start_date,
    end_date,
    is_deleted,
    created_at,
    updated_at
FROM agreements";

const ASSIGNMENT_SELECT_SQL: &str = "SELECT
    a.id AS id,
    a.agreement_id AS agreement_id,
    a.sending_organization_id AS sending_organization_id,
    a.person_id AS person_id,
    a.job_type AS job_type,
    a.receiving_organization_id AS receiving_organization_id,
    a.start_date AS start_date,
    a.end_date AS end_date
FROM assignments a";

const PAGE_SIZE_DEFAULT: u32 = 10;
/// Bind slots per `IN (...)` statement; stays below SQLite's variable limit.
const MAX_IDS_PER_STATEMENT: usize = 500;
const PAGE_SIZE_MAX: u32 = 100;

/// Filters and paging for agreement listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementSearchQuery {
    /// Case-sensitive substring match on theme.
    pub theme_contains: Option<String>,
    pub initiating_region: Option<Region>,
    pub receiving_region: Option<Region>,
    /// 1-based page number. `0` is treated as `1`.
    pub page: u32,
    /// Defaults to 10 and clamps to 100.
    pub size: Option<u32>,
}

impl AgreementSearchQuery {
    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn effective_size(&self) -> u32 {
        normalize_page_size(self.size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.effective_page() - 1) * u64::from(self.effective_size())
    }

    /// Trimmed theme filter; blank filters are ignored.
    pub fn theme_filter(&self) -> Option<&str> {
        self.theme_contains
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// One page of agreement summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementPage {
    /// Sorted by `created_at DESC, id DESC`.
    pub items: Vec<AgreementSummary>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl AgreementPage {
    pub fn new(items: Vec<AgreementSummary>, query: &AgreementSearchQuery, total: u64) -> Self {
        let size = query.effective_size();
        Self {
            items,
            page: query.effective_page(),
            size,
            total_elements: total,
            total_pages: total.div_ceil(u64::from(size)) as u32,
        }
    }
}

/// Normalizes page size according to the listing contract.
pub fn normalize_page_size(size: Option<u32>) -> u32 {
    match size {
        None | Some(0) => PAGE_SIZE_DEFAULT,
        Some(value) if value > PAGE_SIZE_MAX => PAGE_SIZE_MAX,
        Some(value) => value,
    }
}

/// Storage contract consumed by the agreement coordinator.
pub trait AgreementStore: ReferenceLookup {
    /// Runs `work` as one atomic unit: every write inside it commits when
    /// `work` returns `Ok`, and none of them persist when it returns `Err`.
    fn atomic<T, E>(&self, work: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>;

    /// Loads one agreement, optionally including soft-deleted rows.
    fn find_agreement(
        &self,
        id: AgreementId,
        include_deleted: bool,
    ) -> RepoResult<Option<Agreement>>;

    /// Lists assignment rows owned by `agreement_id`, ordered by start date.
    fn list_assignments(&self, agreement_id: AgreementId) -> RepoResult<Vec<Assignment>>;

    /// Counts active agreements with exactly this theme, skipping `exclude_id`.
    fn count_active_by_theme(
        &self,
        theme: &str,
        exclude_id: Option<AgreementId>,
    ) -> RepoResult<u32>;

    /// Returns committed assignments of `person_id` on active agreements
    /// whose range intersects `period`, skipping rows owned by
    /// `exclude_agreement_id`.
    fn find_overlapping_assignments(
        &self,
        person_id: PersonId,
        period: &DateRange,
        exclude_agreement_id: Option<AgreementId>,
    ) -> RepoResult<Vec<Assignment>>;

    /// Inserts an active agreement root and returns its generated id.
    fn insert_agreement(&self, fields: &AgreementFields) -> RepoResult<AgreementId>;

    /// Rewrites mutable root fields of an active agreement. Returns changed
    /// row count; never touches the soft-delete flag.
    fn update_agreement_fields(
        &self,
        id: AgreementId,
        fields: &AgreementFields,
    ) -> RepoResult<usize>;

    /// Inserts all drafts under `agreement_id`. Returns inserted row count.
    fn insert_assignments(
        &self,
        agreement_id: AgreementId,
        drafts: &[AssignmentDraft],
    ) -> RepoResult<usize>;

    /// Hard-deletes assignment rows owned by any of `agreement_ids`.
    fn delete_assignments_by_agreements(&self, agreement_ids: &[AgreementId])
        -> RepoResult<usize>;

    /// Soft-deletes the currently active agreements among `ids` and returns
    /// the ids that were flipped, ascending.
    fn mark_agreements_deleted(&self, ids: &[AgreementId]) -> RepoResult<Vec<AgreementId>>;

    /// Lists active agreements with filters and paging.
    fn search_agreements(&self, query: &AgreementSearchQuery) -> RepoResult<AgreementPage>;
}

/// SQLite-backed agreement store.
pub struct SqliteAgreementStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAgreementStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ReferenceLookup for SqliteAgreementStore<'_> {
    fn lookup_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        load_active_organization(self.conn, id)
    }

    fn lookup_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        load_active_person(self.conn, id)
    }
}

impl AgreementStore for SqliteAgreementStore<'_> {
    fn atomic<T, E>(&self, work: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| E::from(RepoError::from(err)))?;
        // Dropping `tx` on the error path rolls back.
        let value = work(self)?;
        tx.commit().map_err(|err| E::from(RepoError::from(err)))?;
        Ok(value)
    }

    fn find_agreement(
        &self,
        id: AgreementId,
        include_deleted: bool,
    ) -> RepoResult<Option<Agreement>> {
        self.conn
            .query_row(
                &format!("{AGREEMENT_SELECT_SQL} WHERE id = ?1 AND (?2 = 1 OR is_deleted = 0);"),
                params![id, bool_to_int(include_deleted)],
                |row| Ok(parse_agreement_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_assignments(&self, agreement_id: AgreementId) -> RepoResult<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASSIGNMENT_SELECT_SQL}
             WHERE a.agreement_id = ?1
             ORDER BY a.start_date ASC, a.id ASC;"
        ))?;
        let mut rows = stmt.query([agreement_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_assignment_row(row)?);
        }
        Ok(items)
    }

    fn count_active_by_theme(
        &self,
        theme: &str,
        exclude_id: Option<AgreementId>,
    ) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*)
             FROM agreements
             WHERE theme = ?1
               AND is_deleted = 0
               AND (?2 IS NULL OR id != ?2);",
            params![theme, exclude_id],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn find_overlapping_assignments(
        &self,
        person_id: PersonId,
        period: &DateRange,
        exclude_agreement_id: Option<AgreementId>,
    ) -> RepoResult<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ASSIGNMENT_SELECT_SQL}
             INNER JOIN agreements g ON g.id = a.agreement_id
             WHERE a.person_id = ?1
               AND g.is_deleted = 0
               AND (?4 IS NULL OR a.agreement_id != ?4)
               AND a.end_date >= ?2
               AND a.start_date <= ?3
             ORDER BY a.start_date ASC, a.id ASC;"
        ))?;
        let mut rows = stmt.query(params![
            person_id,
            period.start,
            period.end,
            exclude_agreement_id
        ])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_assignment_row(row)?);
        }
        Ok(items)
    }

    fn insert_agreement(&self, fields: &AgreementFields) -> RepoResult<AgreementId> {
        self.conn.execute(
            "INSERT INTO agreements (
                theme,
                initiating_region,
                receiving_region,
                start_date,
                end_date,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0);",
            params![
                fields.theme.as_str(),
                fields.initiating_region.as_str(),
                fields.receiving_region.as_str(),
                fields.period.start,
                fields.period.end,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_agreement_fields(
        &self,
        id: AgreementId,
        fields: &AgreementFields,
    ) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE agreements
             SET
                theme = ?2,
                initiating_region = ?3,
                receiving_region = ?4,
                start_date = ?5,
                end_date = ?6,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND is_deleted = 0;",
            params![
                id,
                fields.theme.as_str(),
                fields.initiating_region.as_str(),
                fields.receiving_region.as_str(),
                fields.period.start,
                fields.period.end,
            ],
        )?;
        Ok(changed)
    }

    fn insert_assignments(
        &self,
        agreement_id: AgreementId,
        drafts: &[AssignmentDraft],
    ) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO assignments (
                agreement_id,
                sending_organization_id,
                person_id,
                job_type,
                receiving_organization_id,
                start_date,
                end_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        )?;
        let mut inserted = 0;
        for draft in drafts {
            inserted += stmt.execute(params![
                agreement_id,
                draft.sending_organization_id,
                draft.person_id,
                draft.job_type.as_str(),
                draft.receiving_organization_id,
                draft.period.start,
                draft.period.end,
            ])?;
        }
        Ok(inserted)
    }

    fn delete_assignments_by_agreements(
        &self,
        agreement_ids: &[AgreementId],
    ) -> RepoResult<usize> {
        let mut deleted = 0;
        for chunk in agreement_ids.chunks(MAX_IDS_PER_STATEMENT) {
            deleted += self.conn.execute(
                &format!(
                    "DELETE FROM assignments WHERE agreement_id IN ({});",
                    placeholders(chunk.len())
                ),
                params_from_iter(chunk.iter()),
            )?;
        }
        Ok(deleted)
    }

    fn mark_agreements_deleted(&self, ids: &[AgreementId]) -> RepoResult<Vec<AgreementId>> {
        let mut marked = Vec::new();
        for chunk in ids.chunks(MAX_IDS_PER_STATEMENT) {
            let mut stmt = self.conn.prepare(&format!(
                "UPDATE agreements
                 SET is_deleted = 1,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE is_deleted = 0
                   AND id IN ({})
                 RETURNING id;",
                placeholders(chunk.len())
            ))?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                marked.push(row.get::<_, AgreementId>(0)?);
            }
        }
        marked.sort_unstable();
        Ok(marked)
    }

    fn search_agreements(&self, query: &AgreementSearchQuery) -> RepoResult<AgreementPage> {
        let mut filter = String::from(" WHERE g.is_deleted = 0");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(theme) = query.theme_filter() {
            filter.push_str(" AND instr(g.theme, ?) > 0");
            bind_values.push(Value::Text(theme.to_string()));
        }
        if let Some(region) = query.initiating_region {
            filter.push_str(" AND g.initiating_region = ?");
            bind_values.push(Value::Text(region.as_str().to_string()));
        }
        if let Some(region) = query.receiving_region {
            filter.push_str(" AND g.receiving_region = ?");
            bind_values.push(Value::Text(region.as_str().to_string()));
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM agreements g{filter};"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;
        let total = u64::try_from(total).unwrap_or_default();

        let mut items = Vec::new();
        if query.offset() < total {
            let sql = format!(
                "SELECT
                    g.id AS id,
                    g.theme AS theme,
                    g.initiating_region AS initiating_region,
                    g.receiving_region AS receiving_region,
                    g.start_date AS start_date,
                    g.end_date AS end_date,
                    g.is_deleted AS is_deleted,
                    g.created_at AS created_at,
                    g.updated_at AS updated_at,
                    (SELECT COUNT(*) FROM assignments a WHERE a.agreement_id = g.id)
                        AS assignment_count
                 FROM agreements g{filter}
                 ORDER BY g.created_at DESC, g.id DESC
                 LIMIT ? OFFSET ?;"
            );
            bind_values.push(Value::Integer(i64::from(query.effective_size())));
            bind_values.push(Value::Integer(query.offset() as i64));

            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values.iter()))?;
            while let Some(row) = rows.next()? {
                items.push(AgreementSummary {
                    agreement: parse_agreement_row(row)?,
                    assignment_count: row.get("assignment_count")?,
                });
            }
        }

        Ok(AgreementPage::new(items, query, total))
    }
}

fn parse_agreement_row(row: &Row<'_>) -> RepoResult<Agreement> {
    let initiating: String = row.get("initiating_region")?;
    let receiving: String = row.get("receiving_region")?;
    Ok(Agreement {
        id: row.get("id")?,
        theme: row.get("theme")?,
        initiating_region: decode_enum(&initiating, "agreements.initiating_region", Region::parse)?,
        receiving_region: decode_enum(&receiving, "agreements.receiving_region", Region::parse)?,
        period: DateRange::new(row.get("start_date")?, row.get("end_date")?),
        is_deleted: decode_flag(row.get("is_deleted")?, "agreements.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_assignment_row(row: &Row<'_>) -> RepoResult<Assignment> {
    let job_type: String = row.get("job_type")?;
    Ok(Assignment {
        id: row.get("id")?,
        agreement_id: row.get("agreement_id")?,
        sending_organization_id: row.get("sending_organization_id")?,
        person_id: row.get("person_id")?,
        job_type: decode_enum(&job_type, "assignments.job_type", JobType::parse)?,
        receiving_organization_id: row.get("receiving_organization_id")?,
        period: DateRange::new(row.get("start_date")?, row.get("end_date")?),
    })
}
