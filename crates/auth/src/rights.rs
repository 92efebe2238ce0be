//! Fine-grained rights held by a role at an anchor.
//!
//! A right is a small tagged value rather than one constant per combination.
//! On the wire it keeps the flat names clients know
//! (`READ_PENDING_METADATA`, `WRITE_LEVEL2`, `READ`, ...).

use serde::{Deserialize, Serialize};

use archivum_core::DomainError;
use archivum_repository::EntityState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Read,
    Write,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "READ",
            Action::Write => "WRITE",
        }
    }
}

/// Part of an entity a content right applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Metadata,
    Binary,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Metadata => "METADATA",
            ObjectKind::Binary => "BINARY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RightTarget {
    /// Metadata or binaries of entities in one lifecycle state.
    Content { kind: ObjectKind, state: EntityState },
    /// The LEVEL2 entity an anchor names.
    Level2,
    /// Everything below the anchor (administrative rights).
    Whole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RoleRight {
    pub action: Action,
    pub target: RightTarget,
}

impl RoleRight {
    pub const READ: RoleRight = RoleRight::new(Action::Read, RightTarget::Whole);
    pub const WRITE: RoleRight = RoleRight::new(Action::Write, RightTarget::Whole);
    pub const READ_LEVEL2: RoleRight = RoleRight::new(Action::Read, RightTarget::Level2);
    pub const WRITE_LEVEL2: RoleRight = RoleRight::new(Action::Write, RightTarget::Level2);

    pub const fn new(action: Action, target: RightTarget) -> Self {
        Self { action, target }
    }

    pub const fn content(action: Action, kind: ObjectKind, state: EntityState) -> Self {
        Self::new(action, RightTarget::Content { kind, state })
    }

    /// The sixteen (action, kind, state) rights.
    pub fn content_rights() -> impl Iterator<Item = RoleRight> {
        [Action::Read, Action::Write].into_iter().flat_map(|action| {
            EntityState::ALL.into_iter().flat_map(move |state| {
                [ObjectKind::Metadata, ObjectKind::Binary]
                    .into_iter()
                    .map(move |kind| RoleRight::content(action, kind, state))
            })
        })
    }

    /// Every right that exists.
    pub fn all() -> impl Iterator<Item = RoleRight> {
        Self::content_rights().chain([
            RoleRight::READ_LEVEL2,
            RoleRight::WRITE_LEVEL2,
            RoleRight::READ,
            RoleRight::WRITE,
        ])
    }
}

impl core::fmt::Display for RoleRight {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let action = self.action.as_str();
        match self.target {
            RightTarget::Content { kind, state } => {
                write!(f, "{action}_{state}_{}", kind.as_str())
            }
            RightTarget::Level2 => write!(f, "{action}_LEVEL2"),
            RightTarget::Whole => f.write_str(action),
        }
    }
}

impl core::str::FromStr for RoleRight {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RoleRight::all()
            .find(|right| right.to_string().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::invalid_parameter(format!("unknown right '{s}'")))
    }
}

impl From<RoleRight> for String {
    fn from(value: RoleRight) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for RoleRight {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_match_the_flat_vocabulary() {
        let right = RoleRight::content(Action::Read, ObjectKind::Metadata, EntityState::Pending);
        assert_eq!(right.to_string(), "READ_PENDING_METADATA");
        assert_eq!(
            "write_submitted_binary".parse::<RoleRight>(),
            Ok(RoleRight::content(
                Action::Write,
                ObjectKind::Binary,
                EntityState::Submitted
            ))
        );
        assert_eq!(RoleRight::WRITE_LEVEL2.to_string(), "WRITE_LEVEL2");
        assert_eq!("READ".parse::<RoleRight>(), Ok(RoleRight::READ));
        assert!("READ_ARCHIVED_BINARY".parse::<RoleRight>().is_err());
    }

    #[test]
    fn twenty_distinct_rights() {
        let names: HashSet<String> = RoleRight::all().map(|r| r.to_string()).collect();
        assert_eq!(names.len(), 20);
        assert_eq!(RoleRight::content_rights().count(), 16);
    }

    #[test]
    fn serde_uses_names() {
        let json = serde_json::to_string(&vec![RoleRight::READ_LEVEL2]).unwrap();
        assert_eq!(json, r#"["READ_LEVEL2"]"#);
        let parsed: Vec<RoleRight> = serde_json::from_str(r#"["READ_PUBLISHED_BINARY"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![RoleRight::content(
                Action::Read,
                ObjectKind::Binary,
                EntityState::Published
            )]
        );
        assert!(serde_json::from_str::<RoleRight>(r#""ROOT""#).is_err());
    }
}
