use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use archivum_core::DomainError;

use crate::rights::{Action, RoleRight};

/// Fixed set of role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Admin,
    User,
    UserAdmin,
    Level1Admin,
    /// Placeholder for "any authenticated caller" in permission lists.
    /// Never assigned to a user.
    Any,
}

/// What a role's anchors must point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorType {
    /// No anchored rights at all.
    None,
    /// `""` or a user name.
    User,
    Level1Entity,
    Level2Entity,
}

impl RoleName {
    pub const ALL: [RoleName; 5] = [
        RoleName::Admin,
        RoleName::User,
        RoleName::UserAdmin,
        RoleName::Level1Admin,
        RoleName::Any,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoleName::Admin => "ADMIN",
            RoleName::User => "USER",
            RoleName::UserAdmin => "USER_ADMIN",
            RoleName::Level1Admin => "LEVEL1_ADMIN",
            RoleName::Any => "ANY",
        }
    }

    pub fn anchor_type(self) -> AnchorType {
        match self {
            RoleName::Admin | RoleName::Any => AnchorType::None,
            RoleName::UserAdmin => AnchorType::User,
            RoleName::Level1Admin => AnchorType::Level1Entity,
            RoleName::User => AnchorType::Level2Entity,
        }
    }

    pub fn is_assignable(self) -> bool {
        self != RoleName::Any
    }

    /// Rights that may be granted under this role.
    ///
    /// Empty for ADMIN: an ADMIN assignment matches every permission without
    /// its rights being consulted, so it never carries any. ANY is never
    /// granted.
    pub fn allowed_rights(self) -> BTreeSet<RoleRight> {
        match self {
            RoleName::Admin | RoleName::Any => BTreeSet::new(),
            RoleName::UserAdmin | RoleName::Level1Admin => {
                BTreeSet::from([RoleRight::READ, RoleRight::WRITE])
            }
            RoleName::User => RoleRight::content_rights()
                .chain([RoleRight::READ_LEVEL2, RoleRight::WRITE_LEVEL2])
                .collect(),
        }
    }

    pub fn allows(self, right: RoleRight) -> bool {
        self.allowed_rights().contains(&right)
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RoleName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleName::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::invalid_parameter(format!("unknown role '{s}'")))
    }
}

/// A role held by a user, with the rights it carries per anchor.
///
/// The anchor is an entity id, a user name, or `""` for the global scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: RoleName,
    #[serde(default)]
    pub rights: BTreeMap<String, BTreeSet<RoleRight>>,
}

impl RoleAssignment {
    pub fn new(role: RoleName) -> Self {
        Self {
            role,
            rights: BTreeMap::new(),
        }
    }

    pub fn with_rights<I>(mut self, anchor: impl Into<String>, rights: I) -> Self
    where
        I: IntoIterator<Item = RoleRight>,
    {
        self.rights
            .entry(anchor.into())
            .or_default()
            .extend(rights);
        self
    }

    /// Rights at one anchor; empty if the anchor is not held.
    pub fn rights_at(&self, anchor: &str) -> BTreeSet<RoleRight> {
        self.rights.get(anchor).cloned().unwrap_or_default()
    }

    pub fn grants(&self, anchor: &str, right: RoleRight) -> bool {
        self.rights
            .get(anchor)
            .is_some_and(|rights| rights.contains(&right))
    }

    /// Whether the anchor carries the administrative READ or WRITE right.
    pub fn grants_action(&self, anchor: &str, action: Action) -> bool {
        let right = match action {
            Action::Read => RoleRight::READ,
            Action::Write => RoleRight::WRITE,
        };
        self.grants(anchor, right)
    }

    pub fn anchors(&self) -> impl Iterator<Item = &str> {
        self.rights.keys().map(String::as_str)
    }
}
