//! Closed calendar date ranges.
//!
//! # Invariants
//! - Both endpoints are inclusive.
//! - Two ranges overlap when `s1 <= e2 && s2 <= e1`; touching endpoints
//!   count as overlapping.
//! - Persisted ranges keep both years inside `SUPPORTED_YEARS`, where ISO
//!   `YYYY-MM-DD` text sorts in calendar order.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;

/// Years whose ISO date text has exactly four digits and no sign.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1..=9999;

/// Inclusive `[start, end]` range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Returns whether `end >= start`.
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    /// Returns whether both endpoints fall inside `SUPPORTED_YEARS`.
    pub fn has_supported_years(&self) -> bool {
        SUPPORTED_YEARS.contains(&self.start.year()) && SUPPORTED_YEARS.contains(&self.end.year())
    }

    /// Closed-interval intersection test.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns whether `inner` lies fully inside this range, endpoints included.
    pub fn contains(&self, inner: &DateRange) -> bool {
        self.start <= inner.start && inner.end <= self.end
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} .. {}]", self.start, self.end)
    }
}
