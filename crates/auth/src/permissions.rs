use serde::{Deserialize, Serialize};

use crate::rights::Action;
use crate::roles::RoleName;

/// One acceptable way of satisfying an operation's access requirement.
///
/// Without an action this is a bare role check: holding the role at any
/// anchor is enough. With an action the role's rights are matched against
/// the target object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub role: RoleName,
    pub action: Option<Action>,
}

impl Permission {
    pub const fn new(role: RoleName, action: Action) -> Self {
        Self {
            role,
            action: Some(action),
        }
    }

    /// Satisfied by any authenticated caller, and by anonymous ones.
    pub const fn any() -> Self {
        Self::role(RoleName::Any)
    }

    pub const fn role(role: RoleName) -> Self {
        Self { role, action: None }
    }

    pub const fn read(role: RoleName) -> Self {
        Self::new(role, Action::Read)
    }

    pub const fn write(role: RoleName) -> Self {
        Self::new(role, Action::Write)
    }

    pub fn is_any(&self) -> bool {
        self.role == RoleName::Any
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.action {
            Some(action) => write!(f, "{}:{}", self.role, action.as_str()),
            None => write!(f, "{}", self.role),
        }
    }
}

/// Kind of object an operation is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    /// A stored entity, by id (and optionally version).
    Entity,
    /// A binary of a stored entity; checked against the owning entity.
    Binary,
    /// A user, by name.
    User,
    /// An entity given as the request payload (e.g. not yet created).
    InputEntity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Permission::write(RoleName::User).to_string(), "USER:WRITE");
        assert_eq!(Permission::role(RoleName::Admin).to_string(), "ADMIN");
        assert!(Permission::any().is_any());
        assert_eq!(Permission::any().action, None);
    }
}
