//! Interval conflict detection for person assignments.
//!
//! # Responsibility
//! - Intra-request pass: find same-person overlaps inside one candidate
//!   list.
//! - Committed pass: ask the store for committed assignments that overlap
//!   each candidate.
//!
//! # Invariants
//! - Both passes use closed intervals; touching endpoints conflict.
//! - The intra-request pass reports a conflict iff a pairwise comparison
//!   of the same person's ranges would.

use crate::model::agreement::{AgreementId, Assignment, AssignmentDraft};
use crate::model::date_range::DateRange;
use crate::model::reference::PersonId;
use crate::repo::agreement_repo::AgreementStore;
use crate::repo::RepoResult;
use crate::service::validation::ValidationError;
use std::collections::BTreeMap;

/// Colliding pair inside one request. `first` starts no later than `second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntraRequestConflict {
    pub person_id: PersonId,
    pub first: DateRange,
    pub second: DateRange,
}

/// Candidate that collides with a committed assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedConflict {
    pub candidate: AssignmentDraft,
    pub existing: Assignment,
}

impl From<IntraRequestConflict> for ValidationError {
    fn from(value: IntraRequestConflict) -> Self {
        Self::IntraRequestOverlap {
            person_id: value.person_id,
            first: value.first,
            second: value.second,
        }
    }
}

impl From<CommittedConflict> for ValidationError {
    fn from(value: CommittedConflict) -> Self {
        Self::CommittedOverlap {
            person_id: value.candidate.person_id,
            candidate: value.candidate.period,
            agreement_id: value.existing.agreement_id,
            existing: value.existing.period,
        }
    }
}

/// Finds the first same-person overlap inside `drafts`.
///
/// Groups by person id (ascending), sorts each group by start date, and
/// compares adjacent ranges: after sorting, any overlapping pair implies
/// an overlapping adjacent pair, so this matches a full pairwise scan.
pub fn find_intra_request_conflict(drafts: &[AssignmentDraft]) -> Option<IntraRequestConflict> {
    let mut groups: BTreeMap<PersonId, Vec<DateRange>> = BTreeMap::new();
    for draft in drafts {
        groups.entry(draft.person_id).or_default().push(draft.period);
    }

    for (person_id, mut ranges) in groups {
        ranges.sort_by_key(|range| (range.start, range.end));
        if let Some(pair) = ranges
            .windows(2)
            .find(|pair| pair[1].start <= pair[0].end)
        {
            return Some(IntraRequestConflict {
                person_id,
                first: pair[0],
                second: pair[1],
            });
        }
    }
    None
}

/// Queries committed state once per candidate and returns the first hit.
///
/// `exclude_agreement_id` is `None` on create and the target id on update,
/// so an agreement never conflicts with its own current rows.
pub fn find_committed_conflict<S: AgreementStore>(
    store: &S,
    drafts: &[AssignmentDraft],
    exclude_agreement_id: Option<AgreementId>,
) -> RepoResult<Option<CommittedConflict>> {
    for draft in drafts {
        let overlaps =
            store.find_overlapping_assignments(draft.person_id, &draft.period, exclude_agreement_id)?;
        if let Some(existing) = overlaps.into_iter().next() {
            return Ok(Some(CommittedConflict {
                candidate: draft.clone(),
                existing,
            }));
        }
    }
    Ok(None)
}
