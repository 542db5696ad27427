//! Reference data: organizations and the persons they employ.
//!
//! # Responsibility
//! - Define organization/person records consulted by agreement validation.
//! - Own the closed enumerations (region, role, category) and their
//!   storage strings.
//!
//! # Invariants
//! - An organization's role is fixed at creation and acts as a capability:
//!   only `Sending` organizations may lend persons, only `Receiving`
//!   organizations may host them.
//! - `is_deleted` is the source of truth for visibility.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub type OrganizationId = i64;
pub type PersonId = i64;

/// Fixed set of regions agreements and organizations can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Beijing,
    Guangzhou,
    Shanghai,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Beijing, Region::Guangzhou, Region::Shanghai];

    /// Stable storage string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beijing => "beijing",
            Self::Guangzhou => "guangzhou",
            Self::Shanghai => "shanghai",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beijing" => Some(Self::Beijing),
            "guangzhou" => Some(Self::Guangzhou),
            "shanghai" => Some(Self::Shanghai),
            _ => None,
        }
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability tag of an organization inside agreements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationRole {
    /// Lends its employees to other organizations.
    Sending,
    /// Hosts persons lent by sending organizations.
    Receiving,
}

impl OrganizationRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Receiving => "receiving",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sending" => Some(Self::Sending),
            "receiving" => Some(Self::Receiving),
            _ => None,
        }
    }
}

impl Display for OrganizationRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Industry category. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationCategory {
    Manufacturing,
    Service,
    Technology,
}

impl OrganizationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manufacturing => "manufacturing",
            Self::Service => "service",
            Self::Technology => "technology",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manufacturing" => Some(Self::Manufacturing),
            "service" => Some(Self::Service),
            "technology" => Some(Self::Technology),
            _ => None,
        }
    }
}

/// Organization record as seen by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub role: OrganizationRole,
    pub category: OrganizationCategory,
    pub region: Region,
    pub is_deleted: bool,
}

impl Organization {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Person record as seen by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    /// Current employer. Must equal the sending organization of every
    /// assignment this person takes part in.
    pub organization_id: OrganizationId,
    pub is_deleted: bool,
}

impl Person {
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Input for registering one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub role: OrganizationRole,
    pub category: OrganizationCategory,
    pub region: Region,
}

/// Input for registering one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
    pub name: String,
    pub organization_id: OrganizationId,
}
