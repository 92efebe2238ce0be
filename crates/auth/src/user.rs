//! User aggregate with its embedded role assignments.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use archivum_core::Versioned;

use crate::rights::RoleRight;
use crate::roles::{RoleAssignment, RoleName};

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A repository user, keyed by name.
///
/// # Invariants
/// - At most one assignment per role name.
/// - The password hash never leaves the process in serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<RoleAssignment>,
    pub version: u32,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    /// Add (or replace) the assignment for `assignment.role`.
    pub fn with_role(mut self, assignment: RoleAssignment) -> Self {
        self.roles.retain(|r| r.role != assignment.role);
        self.roles.push(assignment);
        self
    }

    pub fn role(&self, role: RoleName) -> Option<&RoleAssignment> {
        self.roles.iter().find(|r| r.role == role)
    }

    pub fn role_mut(&mut self, role: RoleName) -> Option<&mut RoleAssignment> {
        self.roles.iter_mut().find(|r| r.role == role)
    }

    pub fn has_role(&self, role: RoleName) -> bool {
        self.role(role).is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(RoleName::Admin)
    }

    /// Rights held for `role` at `anchor`; empty when the pair is not held.
    pub fn get_right(&self, role: RoleName, anchor: &str) -> BTreeSet<RoleRight> {
        self.role(role)
            .map(|assignment| assignment.rights_at(anchor))
            .unwrap_or_default()
    }
}

impl Versioned for User {
    fn key(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }
}
