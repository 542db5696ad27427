//! Agreement consistency coordinator.
//!
//! # Responsibility
//! - Run the create/update validation pipeline: dates, theme uniqueness,
//!   cross-entity invariants, intra-request overlap, committed overlap.
//! - Apply accepted writes atomically (insert, or update root + replace
//!   the whole assignment list).
//! - Soft-delete agreements singly or in batch, cascading to assignments.
//!
//! # Invariants
//! - Every operation is one `AgreementStore::atomic` unit: a failure at
//!   any step leaves persisted state unchanged.
//! - Updates never touch the soft-delete flag.
//! - Committed overlap checks on update exclude the target agreement.

use crate::model::agreement::{
    Agreement, AgreementDetail, AgreementFields, AgreementId, AssignmentDraft,
};
use crate::repo::agreement_repo::{AgreementPage, AgreementSearchQuery, AgreementStore};
use crate::repo::RepoError;
use crate::service::conflict::{find_committed_conflict, find_intra_request_conflict};
use crate::service::invariants::check_assignments;
use crate::service::validation::ValidationError;
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Policy knobs for the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Accept create/update requests with no assignments. Off by default.
    pub allow_empty_assignments: bool,
}

/// Service error for agreement use-cases.
#[derive(Debug)]
pub enum AgreementServiceError {
    /// Client-correctable rejection; nothing was written.
    Validation(ValidationError),
    /// Target agreement does not exist.
    NotFound(AgreementId),
    /// Target agreement exists but is soft-deleted.
    AlreadyDeleted(AgreementId),
    /// A write that passed its existence check affected zero rows.
    ConcurrentModification(AgreementId),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl AgreementServiceError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Absent or already-deleted target.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AlreadyDeleted(_))
    }

    /// Not correctable by the caller retrying the same input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification(_) | Self::InconsistentState(_) | Self::Repo(_)
        )
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::NotFound(_) => "not_found",
            Self::AlreadyDeleted(_) => "already_deleted",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::InconsistentState(_) => "inconsistent_state",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for AgreementServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "agreement not found: {id}"),
            Self::AlreadyDeleted(id) => write!(f, "agreement already deleted: {id}"),
            Self::ConcurrentModification(id) => {
                write!(f, "agreement {id} was modified concurrently")
            }
            Self::InconsistentState(details) => {
                write!(f, "inconsistent agreement state: {details}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AgreementServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for AgreementServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for AgreementServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub type AgreementServiceResult<T> = Result<T, AgreementServiceError>;

/// Result of a batch soft delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteOutcome {
    /// Ids flipped from active to deleted by this call, ascending.
    pub deleted_ids: Vec<AgreementId>,
    /// Requested ids that were absent or already deleted, ascending.
    pub skipped_ids: Vec<AgreementId>,
    /// Assignment rows removed together with the deleted agreements.
    pub removed_assignments: usize,
}

impl BatchDeleteOutcome {
    /// Number of agreements newly marked deleted.
    pub fn affected(&self) -> usize {
        self.deleted_ids.len()
    }
}

/// Coordinator facade over an agreement store.
pub struct AgreementService<S: AgreementStore> {
    store: S,
    config: CoordinatorConfig,
}

impl<S: AgreementStore> AgreementService<S> {
    /// Creates a service with the default policy.
    pub fn new(store: S) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    pub fn with_config(store: S, config: CoordinatorConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates and inserts one agreement with its assignments.
    ///
    /// # Contract
    /// - Committed overlap is checked against every active agreement.
    /// - Returns the stored root, including generated id and timestamps.
    pub fn create_agreement(
        &self,
        fields: &AgreementFields,
        assignments: &[AssignmentDraft],
    ) -> AgreementServiceResult<Agreement> {
        let started_at = Instant::now();
        let result: AgreementServiceResult<Agreement> = self.store.atomic(|store| {
            self.validate_write(store, fields, assignments, None)?;
            let id = store.insert_agreement(fields)?;
            store.insert_assignments(id, assignments)?;
            store
                .find_agreement(id, false)?
                .ok_or(AgreementServiceError::InconsistentState(
                    "created agreement not found in read-back",
                ))
        });

        if let Ok(agreement) = &result {
            info!(
                "event=agreement_create module=service status=ok agreement_id={} assignments={} duration_ms={}",
                agreement.id,
                assignments.len(),
                started_at.elapsed().as_millis()
            );
        }
        log_failure("agreement_create", None, started_at, &result);
        result
    }

    /// Validates and replaces one agreement's root fields and full
    /// assignment list.
    ///
    /// # Contract
    /// - Absent target → `NotFound`; soft-deleted target → `AlreadyDeleted`.
    /// - Theme uniqueness and committed overlap exclude the target itself.
    /// - Old assignment rows are deleted and the new list inserted in the
    ///   same unit of work.
    pub fn update_agreement(
        &self,
        id: AgreementId,
        fields: &AgreementFields,
        assignments: &[AssignmentDraft],
    ) -> AgreementServiceResult<Agreement> {
        let started_at = Instant::now();
        let result: AgreementServiceResult<Agreement> = self.store.atomic(|store| {
            ensure_active(store, id)?;
            self.validate_write(store, fields, assignments, Some(id))?;

            if store.update_agreement_fields(id, fields)? == 0 {
                return Err(AgreementServiceError::ConcurrentModification(id));
            }
            store.delete_assignments_by_agreements(&[id])?;
            store.insert_assignments(id, assignments)?;

            store
                .find_agreement(id, false)?
                .ok_or(AgreementServiceError::InconsistentState(
                    "updated agreement not found in read-back",
                ))
        });

        if result.is_ok() {
            info!(
                "event=agreement_update module=service status=ok agreement_id={id} assignments={} duration_ms={}",
                assignments.len(),
                started_at.elapsed().as_millis()
            );
        }
        log_failure("agreement_update", Some(id), started_at, &result);
        result
    }

    /// Soft-deletes one agreement and hard-deletes its assignments.
    pub fn delete_agreement(&self, id: AgreementId) -> AgreementServiceResult<()> {
        let started_at = Instant::now();
        let result: AgreementServiceResult<usize> = self.store.atomic(|store| {
            ensure_active(store, id)?;
            if store.mark_agreements_deleted(&[id])?.is_empty() {
                return Err(AgreementServiceError::ConcurrentModification(id));
            }
            Ok(store.delete_assignments_by_agreements(&[id])?)
        });

        if let Ok(removed) = &result {
            info!(
                "event=agreement_delete module=service status=ok agreement_id={id} removed_assignments={removed} duration_ms={}",
                started_at.elapsed().as_millis()
            );
        }
        log_failure("agreement_delete", Some(id), started_at, &result);
        result.map(|_| ())
    }

    /// Soft-deletes every currently active agreement among `ids`.
    ///
    /// # Contract
    /// - Empty `ids` → `ValidationError::EmptyBatch`.
    /// - Absent or already-deleted ids are skipped, not errors.
    /// - Duplicate ids count once.
    pub fn delete_agreements_batch(
        &self,
        ids: &[AgreementId],
    ) -> AgreementServiceResult<BatchDeleteOutcome> {
        let started_at = Instant::now();
        if ids.is_empty() {
            let result: AgreementServiceResult<BatchDeleteOutcome> =
                Err(ValidationError::EmptyBatch.into());
            log_failure("agreement_batch_delete", None, started_at, &result);
            return result;
        }

        let requested: Vec<AgreementId> = ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let result: AgreementServiceResult<BatchDeleteOutcome> = self.store.atomic(|store| {
            let deleted_ids = store.mark_agreements_deleted(&requested)?;
            let removed_assignments = if deleted_ids.is_empty() {
                0
            } else {
                store.delete_assignments_by_agreements(&deleted_ids)?
            };
            let skipped_ids = requested
                .iter()
                .copied()
                .filter(|id| deleted_ids.binary_search(id).is_err())
                .collect();
            Ok(BatchDeleteOutcome {
                deleted_ids,
                skipped_ids,
                removed_assignments,
            })
        });

        match &result {
            Ok(outcome) if outcome.deleted_ids.is_empty() => warn!(
                "event=agreement_batch_delete module=service status=ok requested={} deleted=0 skipped={} duration_ms={}",
                requested.len(),
                outcome.skipped_ids.len(),
                started_at.elapsed().as_millis()
            ),
            Ok(outcome) => info!(
                "event=agreement_batch_delete module=service status=ok requested={} deleted={} skipped={} removed_assignments={} duration_ms={}",
                requested.len(),
                outcome.deleted_ids.len(),
                outcome.skipped_ids.len(),
                outcome.removed_assignments,
                started_at.elapsed().as_millis()
            ),
            Err(_) => log_failure("agreement_batch_delete", None, started_at, &result),
        }
        result
    }

    /// Loads one active agreement with its assignments.
    pub fn get_agreement_detail(&self, id: AgreementId) -> AgreementServiceResult<AgreementDetail> {
        let agreement = self
            .store
            .find_agreement(id, false)?
            .ok_or(AgreementServiceError::NotFound(id))?;
        let assignments = self.store.list_assignments(id)?;
        Ok(AgreementDetail {
            agreement,
            assignments,
        })
    }

    /// Lists active agreements with optional filters and paging.
    pub fn search_agreements(
        &self,
        query: &AgreementSearchQuery,
    ) -> AgreementServiceResult<AgreementPage> {
        Ok(self.store.search_agreements(query)?)
    }

    fn validate_write(
        &self,
        store: &S,
        fields: &AgreementFields,
        assignments: &[AssignmentDraft],
        target: Option<AgreementId>,
    ) -> AgreementServiceResult<()> {
        if !fields.period.is_ordered() {
            return Err(ValidationError::AgreementPeriodReversed {
                period: fields.period,
            }
            .into());
        }

        if !fields.period.has_supported_years() {
            return Err(ValidationError::UnsupportedAgreementYears {
                period: fields.period,
            }
            .into());
        }

        if store.count_active_by_theme(&fields.theme, target)? > 0 {
            return Err(ValidationError::DuplicateTheme {
                theme: fields.theme.clone(),
            }
            .into());
        }

        if assignments.is_empty() && !self.config.allow_empty_assignments {
            return Err(ValidationError::EmptyAssignments.into());
        }

        check_assignments::<_, AgreementServiceError>(store, fields, assignments)?;

        if let Some(conflict) = find_intra_request_conflict(assignments) {
            return Err(ValidationError::from(conflict).into());
        }

        if let Some(conflict) = find_committed_conflict(store, assignments, target)? {
            return Err(ValidationError::from(conflict).into());
        }

        Ok(())
    }
}

fn ensure_active<S: AgreementStore>(store: &S, id: AgreementId) -> AgreementServiceResult<()> {
    match store.find_agreement(id, true)? {
        None => Err(AgreementServiceError::NotFound(id)),
        Some(agreement) if agreement.is_deleted => Err(AgreementServiceError::AlreadyDeleted(id)),
        Some(_) => Ok(()),
    }
}

fn log_failure<T>(
    event: &'static str,
    agreement_id: Option<AgreementId>,
    started_at: Instant,
    result: &AgreementServiceResult<T>,
) {
    let Err(err) = result else {
        return;
    };
    let agreement_id = agreement_id.map_or_else(|| "none".to_string(), |id| id.to_string());
    if err.is_fatal() {
        error!(
            "event={event} module=service status=error agreement_id={agreement_id} error_code={} duration_ms={} error={err}",
            err.code(),
            started_at.elapsed().as_millis()
        );
    } else {
        warn!(
            "event={event} module=service status=rejected agreement_id={agreement_id} error_code={} duration_ms={}",
            err.code(),
            started_at.elapsed().as_millis()
        );
    }
}
