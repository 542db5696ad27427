//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own every semantic rule on agreement writes; field-level shape is
//!   assumed checked by the caller.

pub mod agreement_service;
pub mod conflict;
pub mod invariants;
pub mod reference_service;
pub mod validation;
