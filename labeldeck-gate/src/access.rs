//! Role and entitlement based access control
//!
//! Rules, in order:
//! 1. `admin` role sees everything regardless of entitlement
//! 2. entitlement `all` sees everything
//! 3. an entitlement set sees exactly its members
//! 4. anything else (`none`) sees nothing
//!
//! Single-resource checks return [`AccessError::Forbidden`]; collection
//! filtering narrows silently.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Access control errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Access denied to resource: {0}")]
    Forbidden(String),

    #[error("Admin access required")]
    AdminRequired,

    #[error("Only admins can export label-wide data")]
    LabelWideExport,
}

/// Principal role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    /// A&R scout / artist manager
    #[serde(alias = "scout")]
    Manager,
    Artist,
    Viewer,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" | "scout" => Ok(Role::Manager),
            "artist" => Ok(Role::Artist),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Artist => "artist",
            Role::Viewer => "viewer",
        };
        f.write_str(name)
    }
}

/// Which resources a principal may see
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entitlement {
    All,
    #[default]
    None,
    Only(BTreeSet<String>),
}

impl Entitlement {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Entitlement::Only(ids.into_iter().map(Into::into).collect())
    }
}

impl FromStr for Entitlement {
    type Err = std::convert::Infallible;

    /// `"all"`, `"none"`/empty, or a comma-separated id list (`"art_rezz,art_attlas"`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Entitlement::All);
        }
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Entitlement::None);
        }

        let ids: BTreeSet<String> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        if ids.is_empty() {
            Ok(Entitlement::None)
        } else {
            Ok(Entitlement::Only(ids))
        }
    }
}

/// Authenticated caller as supplied by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    pub entitlement: Entitlement,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role, entitlement: Entitlement) -> Self {
        Self {
            id: id.into(),
            role,
            entitlement,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Anything addressable by a stable resource id
pub trait Resource {
    fn resource_id(&self) -> &str;
}

/// Whether `principal` may see `resource_id`
pub fn can_access(principal: &Principal, resource_id: &str) -> bool {
    if principal.is_admin() {
        return true;
    }

    match &principal.entitlement {
        Entitlement::All => true,
        Entitlement::Only(ids) => ids.contains(resource_id),
        Entitlement::None => false,
    }
}

/// Single-resource check
pub fn authorize(principal: &Principal, resource_id: &str) -> Result<(), AccessError> {
    if can_access(principal, resource_id) {
        Ok(())
    } else {
        tracing::warn!(
            principal = %principal.id,
            role = %principal.role,
            resource = resource_id,
            "Access denied"
        );
        Err(AccessError::Forbidden(resource_id.to_string()))
    }
}

/// Permitted subset of `resources`, in original order
pub fn filter_collection<'a, T: Resource>(principal: &Principal, resources: &'a [T]) -> Vec<&'a T> {
    resources
        .iter()
        .filter(|resource| can_access(principal, resource.resource_id()))
        .collect()
}

/// Admin-only operations (roster mutation, user management)
pub fn require_admin(principal: &Principal) -> Result<(), AccessError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AccessError::AdminRequired)
    }
}

/// Export check: label-wide exports (no artist) are admin-only even for
/// principals entitled to `all`; per-artist exports use [`authorize`].
pub fn authorize_export(principal: &Principal, artist_id: Option<&str>) -> Result<(), AccessError> {
    if principal.is_admin() {
        return Ok(());
    }

    match artist_id {
        None => Err(AccessError::LabelWideExport),
        Some(id) => authorize(principal, id),
    }
}
