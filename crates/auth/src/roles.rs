//! Closed role model for organization memberships.
//!
//! Roles arrive as free-form strings from two places (signed token snapshots
//! and membership rows) and are case-normalized exactly once, here. Anything
//! that does not name one of these variants grants nothing.

use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Role granted to a user within one organization.
///
/// Canonical wire form is the lower-case string returned by [`Role::as_str`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Superadmin,
    Owner,
    Admin,
    Vet,
    VetTech,
    Inseminator,
    OfficeStaff,
    Employee,
    Client,
    Farmer,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 10] = [
        Role::Superadmin,
        Role::Owner,
        Role::Admin,
        Role::Vet,
        Role::VetTech,
        Role::Inseminator,
        Role::OfficeStaff,
        Role::Employee,
        Role::Client,
        Role::Farmer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Vet => "vet",
            Role::VetTech => "vettech",
            Role::Inseminator => "inseminator",
            Role::OfficeStaff => "officestaff",
            Role::Employee => "employee",
            Role::Client => "client",
            Role::Farmer => "farmer",
        }
    }

    /// Staff-level roles: organization personnel who work client records but
    /// are not organization management.
    pub fn is_staff(&self) -> bool {
        matches!(
            self,
            Role::Employee | Role::OfficeStaff | Role::Inseminator | Role::VetTech | Role::Vet
        )
    }

    /// Client-level roles: callers whose access is limited to their own data.
    pub fn is_client(&self) -> bool {
        matches!(self, Role::Client | Role::Farmer)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// The single case-normalization point for role strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "superadmin" => Ok(Role::Superadmin),
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "vet" => Ok(Role::Vet),
            "vettech" => Ok(Role::VetTech),
            "inseminator" => Ok(Role::Inseminator),
            "officestaff" => Ok(Role::OfficeStaff),
            "employee" => Ok(Role::Employee),
            "client" => Ok(Role::Client),
            "farmer" => Ok(Role::Farmer),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
