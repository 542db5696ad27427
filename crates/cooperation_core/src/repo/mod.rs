//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the read/write contracts the agreement engine consumes.
//! - Isolate SQLite query details from service/business orchestration.
//! - Provide a deterministic in-memory store for tests and embedding.
//!
//! # Invariants
//! - Default read paths filter soft-deleted rows.
//! - Repositories never open their own transactions inside a unit of work;
//!   atomicity is owned by `AgreementStore::atomic`.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod agreement_repo;
pub mod memory_repo;
pub mod reference_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Record family named by `RepoError::NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Organization,
    Person,
    Agreement,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Person => "person",
            Self::Agreement => "agreement",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// A write targeted a row that does not exist or is already deleted.
    NotFound { entity: EntityKind, id: i64 },
    /// Persisted data cannot be converted to a valid domain record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn decode_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn decode_enum<T>(
    value: &str,
    column: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> RepoResult<T> {
    parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

/// Builds `?, ?, ?` for an `IN (...)` clause with `count` bind slots.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
