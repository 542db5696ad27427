//! Core domain logic for cooperation agreements.
//! This crate is the single source of truth for agreement consistency and
//! personnel conflict detection.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::agreement::{
    Agreement, AgreementDetail, AgreementFields, AgreementId, AgreementSummary, Assignment,
    AssignmentDraft, AssignmentId, JobType,
};
pub use model::date_range::DateRange;
pub use model::reference::{
    NewOrganization, NewPerson, Organization, OrganizationCategory, OrganizationId,
    OrganizationRole, Person, PersonId, Region,
};
pub use repo::agreement_repo::{
    normalize_page_size, AgreementPage, AgreementSearchQuery, AgreementStore,
    SqliteAgreementStore,
};
pub use repo::memory_repo::InMemoryAgreementStore;
pub use repo::reference_repo::{ReferenceLookup, ReferenceRepository, SqliteReferenceRepository};
pub use repo::{EntityKind, RepoError, RepoResult};
pub use service::agreement_service::{
    AgreementService, AgreementServiceError, AgreementServiceResult, BatchDeleteOutcome,
    CoordinatorConfig,
};
pub use service::conflict::{
    find_committed_conflict, find_intra_request_conflict, CommittedConflict,
    IntraRequestConflict,
};
pub use service::reference_service::{ReferenceService, ReferenceServiceError};
pub use service::validation::ValidationError;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
