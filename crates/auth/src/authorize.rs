//! Authorization decisions.
//!
//! A decision takes the caller, the target object and an ordered list of
//! acceptable permissions. Permissions are tried in the given order and the
//! first one satisfied allows the request; callers list cheap role-only
//! checks before hierarchy-dependent ones. Denials never say which right
//! was missing.

use std::borrow::Cow;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use archivum_core::DomainError;
use archivum_repository::{Entity, EntityHierarchy, EntityLookup, HierarchyResolver};

use crate::permissions::{ObjectType, Permission};
use crate::rights::{Action, ObjectKind, RoleRight};
use crate::roles::{RoleAssignment, RoleName};
use crate::store::UserLookup;
use crate::user::User;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    InsufficientAuthentication,

    #[error("access denied")]
    AccessDenied,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// An object supplied with the request instead of being looked up.
#[derive(Debug, Clone)]
pub enum CheckObject<'a> {
    Entity(Cow<'a, Entity>),
    User(Cow<'a, User>),
}

/// What a decision is about.
#[derive(Debug, Clone)]
pub struct AuthzTarget<'a> {
    pub object_type: ObjectType,
    pub id: Option<&'a str>,
    pub version: Option<u32>,
    pub inline: Option<CheckObject<'a>>,
}

impl<'a> AuthzTarget<'a> {
    pub fn new(object_type: ObjectType) -> Self {
        Self {
            object_type,
            id: None,
            version: None,
            inline: None,
        }
    }

    pub fn entity(id: &'a str) -> Self {
        Self::new(ObjectType::Entity).with_id(id)
    }

    pub fn binary(entity_id: &'a str) -> Self {
        Self::new(ObjectType::Binary).with_id(entity_id)
    }

    pub fn user(name: &'a str) -> Self {
        Self::new(ObjectType::User).with_id(name)
    }

    /// A request payload entity, checked without a lookup of the entity itself.
    pub fn input_entity(entity: &'a Entity) -> Self {
        Self::new(ObjectType::InputEntity).with_inline(CheckObject::Entity(Cow::Borrowed(entity)))
    }

    pub fn with_id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_inline(mut self, object: CheckObject<'a>) -> Self {
        self.inline = Some(object);
        self
    }
}

/// Stateless evaluator; share it freely between concurrent requests.
pub struct PermissionEvaluator {
    entities: Arc<dyn EntityLookup>,
    users: Arc<dyn UserLookup>,
}

impl PermissionEvaluator {
    pub fn new(entities: Arc<dyn EntityLookup>, users: Arc<dyn UserLookup>) -> Self {
        Self { entities, users }
    }

    /// Decide whether `user` may act on `target` under any of `required`.
    pub fn authorize(
        &self,
        user: Option<&User>,
        target: &AuthzTarget<'_>,
        required: &[Permission],
    ) -> Result<(), AuthzError> {
        let Some(user) = user else {
            if required.iter().any(Permission::is_any) {
                debug!(object_type = ?target.object_type, "anonymous caller allowed by ANY");
                return Ok(());
            }
            info!(object_type = ?target.object_type, "anonymous caller rejected");
            return Err(AuthzError::InsufficientAuthentication);
        };

        let mut scope = DecisionScope::new(target);
        for permission in required {
            if permission.is_any() {
                return self.allowed(user, permission);
            }
            let Some(assignment) = user.role(permission.role) else {
                continue;
            };
            let Some(action) = permission.action else {
                return self.allowed(user, permission);
            };
            if self.role_matches(assignment, action, &mut scope)? {
                return self.allowed(user, permission);
            }
        }

        info!(user = %user.name, object_type = ?target.object_type, id = ?target.id, "access denied");
        Err(AuthzError::AccessDenied)
    }

    fn allowed(&self, user: &User, permission: &Permission) -> Result<(), AuthzError> {
        debug!(user = %user.name, permission = %permission, "access granted");
        Ok(())
    }

    fn role_matches(
        &self,
        assignment: &RoleAssignment,
        action: Action,
        scope: &mut DecisionScope<'_, '_>,
    ) -> Result<bool, AuthzError> {
        match assignment.role {
            RoleName::Admin | RoleName::Any => Ok(true),
            RoleName::UserAdmin => {
                let CheckObject::User(object) = scope.object(self)? else {
                    return Ok(false);
                };
                Ok(assignment.grants_action(&object.name, action) || assignment.grants_action("", action))
            }
            RoleName::Level1Admin => {
                let Some(entity) = scope.entity(self)? else {
                    return Ok(false);
                };
                if !(entity.is_level1() || entity.is_level2()) {
                    return Ok(false);
                }
                let hierarchy = scope.hierarchy(self)?;
                Ok(hierarchy
                    .level1()
                    .is_some_and(|level1| assignment.grants_action(level1, action)))
            }
            RoleName::User => {
                let object_type = scope.target.object_type;
                let Some(entity) = scope.entity(self)? else {
                    return Ok(false);
                };
                let right = if entity.is_level2() {
                    match action {
                        Action::Read => RoleRight::READ_LEVEL2,
                        Action::Write => RoleRight::WRITE_LEVEL2,
                    }
                } else {
                    let kind = match object_type {
                        ObjectType::Binary => ObjectKind::Binary,
                        _ => ObjectKind::Metadata,
                    };
                    RoleRight::content(action, kind, entity.state)
                };
                let hierarchy = scope.hierarchy(self)?;
                Ok(hierarchy
                    .level2()
                    .is_some_and(|level2| assignment.grants(level2, right)))
            }
        }
    }

    fn load(&self, target: &AuthzTarget<'_>) -> Result<CheckObject<'static>, AuthzError> {
        let id = target.id.ok_or_else(|| {
            DomainError::invalid_parameter(format!("no target given for {:?} check", target.object_type))
        })?;

        let object = match target.object_type {
            ObjectType::Entity | ObjectType::Binary => {
                let entity = match target.version {
                    Some(version) => self.entities.retrieve_version(id, version)?,
                    None => self.entities.retrieve(id)?,
                };
                CheckObject::Entity(Cow::Owned(entity))
            }
            ObjectType::User => CheckObject::User(Cow::Owned(self.users.retrieve(id)?)),
            ObjectType::InputEntity => {
                return Err(DomainError::invalid_parameter("input entity missing from request").into());
            }
        };
        Ok(object)
    }
}

/// Per-decision memo: the check object is loaded at most once and its
/// hierarchy resolved at most once.
struct DecisionScope<'t, 'a> {
    target: &'t AuthzTarget<'a>,
    object: Option<CheckObject<'a>>,
    hierarchy: Option<EntityHierarchy>,
}

impl<'t, 'a> DecisionScope<'t, 'a> {
    fn new(target: &'t AuthzTarget<'a>) -> Self {
        Self {
            target,
            object: target.inline.clone(),
            hierarchy: None,
        }
    }

    fn object(&mut self, evaluator: &PermissionEvaluator) -> Result<&CheckObject<'a>, AuthzError> {
        if self.object.is_none() {
            self.object = Some(evaluator.load(self.target)?);
        }
        self.object
            .as_ref()
            .ok_or_else(|| DomainError::not_found("authorization target").into())
    }

    fn entity(&mut self, evaluator: &PermissionEvaluator) -> Result<Option<&Entity>, AuthzError> {
        Ok(match self.object(evaluator)? {
            CheckObject::Entity(entity) => Some(entity.as_ref()),
            CheckObject::User(_) => None,
        })
    }

    fn hierarchy(&mut self, evaluator: &PermissionEvaluator) -> Result<&EntityHierarchy, AuthzError> {
        if self.hierarchy.is_none() {
            let resolved = match self.entity(evaluator)? {
                Some(entity) => HierarchyResolver::new(&*evaluator.entities).resolve_entity(entity)?,
                None => EntityHierarchy::default(),
            };
            self.hierarchy = Some(resolved);
        }
        self.hierarchy
            .as_ref()
            .ok_or_else(|| DomainError::not_found("entity hierarchy").into())
    }
}
