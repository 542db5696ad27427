//! Domain model for cooperation agreements and the reference data they use.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Provide stable storage codecs for closed enumerations.
//!
//! # Invariants
//! - Records are identified by store-generated integer ids.
//! - Deletion is represented by soft-delete flags on agreements,
//!   organizations and persons. Assignments are owned rows and are removed
//!   physically together with their agreement.

pub mod agreement;
pub mod date_range;
pub mod reference;
