//! User and role administration.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::info;

use archivum_core::{DomainError, DomainResult, RepositoryConfig};
use archivum_repository::{Entity, EntityLookup};

use crate::password::{hash_password, verify_password};
use crate::rights::RoleRight;
use crate::roles::{AnchorType, RoleAssignment, RoleName};
use crate::store::UserStore;
use crate::user::User;

pub struct CredentialsService {
    users: Arc<dyn UserStore>,
    entities: Arc<dyn EntityLookup>,
    config: RepositoryConfig,
}

impl CredentialsService {
    pub fn new(
        users: Arc<dyn UserStore>,
        entities: Arc<dyn EntityLookup>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            users,
            entities,
            config,
        }
    }

    /// Register a user. Roles given on the user are validated; every user
    /// additionally gets READ and WRITE on themselves through USER_ADMIN.
    pub fn create_user(&self, mut user: User, password: &str) -> DomainResult<User> {
        if user.name.trim().is_empty() {
            return Err(DomainError::invalid_parameter("user name may not be blank"));
        }
        validate_email(&user.email)?;
        if password.chars().count() < self.config.min_password_length {
            return Err(DomainError::invalid_parameter(format!(
                "password must have at least {} characters",
                self.config.min_password_length
            )));
        }
        if self.users.exists(&user.name)? {
            return Err(DomainError::already_exists(format!("user {}", user.name)));
        }

        add_default_rights(&mut user);
        self.validate_roles(&user.name, &user.roles)?;
        user.password_hash = hash_password(password)?;
        user.version = 1;

        self.users.create(user.clone())?;
        info!(user = %user.name, "user created");
        Ok(user)
    }

    pub fn retrieve_user(&self, name: &str) -> DomainResult<User> {
        self.users.retrieve(name)
    }

    /// The user named `name` if `password` matches their stored hash.
    pub fn authenticate(&self, name: &str, password: &str) -> DomainResult<Option<User>> {
        let user = match self.users.retrieve(name) {
            Ok(user) => user,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub fn list_users(&self) -> DomainResult<Vec<User>> {
        self.users.list()
    }

    /// Update personal details; roles and password are kept.
    pub fn update_user(&self, user: User) -> DomainResult<User> {
        let stored = self.users.retrieve(&user.name)?;
        validate_email(&user.email)?;

        let next = User {
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            version: stored.version + 1,
            ..stored
        };
        self.users.update(next.clone())?;
        Ok(next)
    }

    /// Replace all role assignments of a user.
    pub fn set_roles(&self, name: &str, roles: Vec<RoleAssignment>) -> DomainResult<User> {
        let stored = self.users.retrieve(name)?;
        self.validate_roles(name, &roles)?;
        let next = User {
            roles,
            version: stored.version + 1,
            ..stored
        };
        self.users.update(next.clone())?;
        info!(user = %name, "roles replaced");
        Ok(next)
    }

    /// Grant or revoke rights for one role at one anchor.
    ///
    /// ADMIN has no anchors: calling this for ADMIN toggles the role. An empty
    /// `rights` set removes the anchor, and the role once no anchor is left.
    /// The store refuses to take ADMIN from the last administrator.
    pub fn set_right(
        &self,
        name: &str,
        role: RoleName,
        anchor: &str,
        rights: BTreeSet<RoleRight>,
    ) -> DomainResult<User> {
        if !role.is_assignable() {
            return Err(DomainError::invalid_parameter(format!("role {role} can not be assigned")));
        }
        let stored = self.users.retrieve(name)?;
        let mut roles = stored.roles.clone();

        if role == RoleName::Admin {
            if !rights.is_empty() {
                return Err(DomainError::invalid_parameter("ADMIN does not carry rights"));
            }
            if stored.is_admin() {
                roles.retain(|r| r.role != RoleName::Admin);
            } else {
                roles.push(RoleAssignment::new(RoleName::Admin));
            }
        } else if rights.is_empty() {
            if let Some(assignment) = roles.iter_mut().find(|r| r.role == role) {
                assignment.rights.remove(anchor);
            }
            roles.retain(|r| r.role != role || !r.rights.is_empty());
        } else {
            match roles.iter_mut().find(|r| r.role == role) {
                Some(assignment) => {
                    assignment.rights.insert(anchor.to_string(), rights);
                }
                None => roles.push(RoleAssignment::new(role).with_rights(anchor, rights)),
            }
        }

        self.validate_roles(name, &roles)?;
        let next = User {
            roles,
            version: stored.version + 1,
            ..stored
        };
        self.users.update(next.clone())?;
        info!(user = %name, role = %role, anchor = %anchor, "rights changed");
        Ok(next)
    }

    /// Delete a user; the last remaining ADMIN is refused by the store.
    pub fn delete_user(&self, name: &str) -> DomainResult<()> {
        self.users.delete(name)?;
        info!(user = %name, "user deleted");
        Ok(())
    }

    /// Remove every right anchored at `anchor` (e.g. a deleted entity).
    pub fn delete_rights(&self, anchor: &str) -> DomainResult<usize> {
        let changed = self.users.delete_rights(anchor)?;
        if changed > 0 {
            info!(anchor = %anchor, users = changed, "anchored rights removed");
        }
        Ok(changed)
    }

    /// No duplicate roles, only rights the role allows, anchors of the kind
    /// the role expects.
    pub fn validate_roles(&self, user_name: &str, roles: &[RoleAssignment]) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for assignment in roles {
            let role = assignment.role;
            if !role.is_assignable() {
                return Err(DomainError::invalid_parameter(format!("role {role} can not be assigned")));
            }
            if !seen.insert(role) {
                return Err(DomainError::invalid_parameter(format!("duplicate role {role}")));
            }

            for (anchor, rights) in &assignment.rights {
                if rights.is_empty() {
                    return Err(DomainError::invalid_parameter(format!(
                        "role {role} has no rights at anchor '{anchor}'"
                    )));
                }
                if let Some(right) = rights.iter().find(|r| !role.allows(**r)) {
                    return Err(DomainError::invalid_parameter(format!(
                        "right {right} is not allowed for role {role}"
                    )));
                }
                self.check_anchor(user_name, role, anchor)?;
            }
        }
        Ok(())
    }

    fn check_anchor(&self, user_name: &str, role: RoleName, anchor: &str) -> DomainResult<()> {
        let wrong = || {
            DomainError::invalid_parameter(format!("anchor '{anchor}' is not valid for role {role}"))
        };
        match role.anchor_type() {
            AnchorType::None => Err(wrong()),
            AnchorType::User => {
                if anchor.is_empty() || anchor == user_name || self.users.exists(anchor)? {
                    Ok(())
                } else {
                    Err(wrong())
                }
            }
            AnchorType::Level1Entity => self.check_entity_anchor(anchor, |e| e.is_level1(), wrong),
            AnchorType::Level2Entity => self.check_entity_anchor(anchor, |e| e.is_level2(), wrong),
        }
    }

    fn check_entity_anchor<P, W>(&self, anchor: &str, accept: P, wrong: W) -> DomainResult<()>
    where
        P: Fn(&Entity) -> bool,
        W: Fn() -> DomainError,
    {
        if anchor.trim().is_empty() {
            return Err(wrong());
        }
        let entity = self.entities.retrieve(anchor)?;
        if accept(&entity) { Ok(()) } else { Err(wrong()) }
    }
}

fn validate_email(email: &str) -> DomainResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::invalid_parameter(format!("invalid email '{email}'"))),
    }
}

fn add_default_rights(user: &mut User) {
    let name = user.name.clone();
    let own = [RoleRight::READ, RoleRight::WRITE];
    if let Some(assignment) = user.role_mut(RoleName::UserAdmin) {
        assignment.rights.entry(name).or_default().extend(own);
        return;
    }
    user.roles
        .push(RoleAssignment::new(RoleName::UserAdmin).with_rights(name, own));
}
