//! User storage boundary.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use archivum_core::{DomainError, DomainResult, ensure_successor};

use crate::roles::RoleName;
use crate::user::User;

pub const LAST_ADMIN_MESSAGE: &str = "Unable to delete last remaining Administrator";
pub const LAST_ADMIN_ROLE_MESSAGE: &str = "Unable to remove the role of the last remaining Administrator";

/// Read access to users, as needed by authorization.
pub trait UserLookup: Send + Sync {
    fn retrieve(&self, name: &str) -> DomainResult<User>;
    fn exists(&self, name: &str) -> DomainResult<bool>;
}

pub trait UserStore: UserLookup {
    fn create(&self, user: User) -> DomainResult<()>;

    /// Replace a user; `user.version` must be the stored version + 1.
    /// Taking ADMIN from the only administrator fails with InvalidParameter;
    /// like `delete`, the check and the write must be atomic.
    fn update(&self, user: User) -> DomainResult<()>;

    /// Remove a user. Removing the only ADMIN fails with InvalidParameter;
    /// the admin count and the removal must be atomic.
    fn delete(&self, name: &str) -> DomainResult<()>;

    fn list(&self) -> DomainResult<Vec<User>>;

    /// Strip `anchor` from every role of every user, dropping anchored roles
    /// left without anchors. Returns the number of users changed.
    fn delete_rights(&self, anchor: &str) -> DomainResult<usize>;
}

impl<S> UserLookup for Arc<S>
where
    S: UserLookup + ?Sized,
{
    fn retrieve(&self, name: &str) -> DomainResult<User> {
        (**self).retrieve(name)
    }

    fn exists(&self, name: &str) -> DomainResult<bool> {
        (**self).exists(name)
    }
}

/// In-memory user store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, HashMap<String, User>>> {
        self.users.read().map_err(|_| poisoned())
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, HashMap<String, User>>> {
        self.users.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> DomainError {
    warn!("user store lock poisoned");
    DomainError::backend("lock poisoned")
}

impl UserLookup for InMemoryUserStore {
    fn retrieve(&self, name: &str) -> DomainResult<User> {
        self.read()?
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("user {name}")))
    }

    fn exists(&self, name: &str) -> DomainResult<bool> {
        Ok(self.read()?.contains_key(name))
    }
}

impl UserStore for InMemoryUserStore {
    fn create(&self, user: User) -> DomainResult<()> {
        let mut users = self.write()?;
        if users.contains_key(&user.name) {
            return Err(DomainError::already_exists(format!("user {}", user.name)));
        }
        users.insert(user.name.clone(), user);
        Ok(())
    }

    fn update(&self, user: User) -> DomainResult<()> {
        let mut users = self.write()?;
        let stored = users
            .get(&user.name)
            .ok_or_else(|| DomainError::not_found(format!("user {}", user.name)))?;
        ensure_successor(stored, &user)?;

        let demotes_last_admin = stored.is_admin()
            && !user.is_admin()
            && !users.values().any(|u| u.name != user.name && u.is_admin());
        if demotes_last_admin {
            return Err(DomainError::invalid_parameter(LAST_ADMIN_ROLE_MESSAGE));
        }
        users.insert(user.name.clone(), user);
        Ok(())
    }

    fn delete(&self, name: &str) -> DomainResult<()> {
        let mut users = self.write()?;
        let target = users
            .get(name)
            .ok_or_else(|| DomainError::not_found(format!("user {name}")))?;

        if target.is_admin() && users.values().filter(|u| u.is_admin()).count() == 1 {
            return Err(DomainError::invalid_parameter(LAST_ADMIN_MESSAGE));
        }
        users.remove(name);
        Ok(())
    }

    fn list(&self) -> DomainResult<Vec<User>> {
        let mut users: Vec<User> = self.read()?.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    fn delete_rights(&self, anchor: &str) -> DomainResult<usize> {
        if anchor.trim().is_empty() {
            return Err(DomainError::invalid_parameter("anchor may not be blank"));
        }

        let mut users = self.write()?;
        let mut changed = 0;
        for user in users.values_mut() {
            let mut touched = false;
            for assignment in &mut user.roles {
                touched |= assignment.rights.remove(anchor).is_some();
            }
            if touched {
                user.roles
                    .retain(|a| a.role == RoleName::Admin || !a.rights.is_empty());
                user.version += 1;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
