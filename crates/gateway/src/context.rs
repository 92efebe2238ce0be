use std::borrow::Cow;

use archivum_auth::{CheckObject, User};
use archivum_repository::Entity;

/// The caller of an operation.
///
/// Resolved by the transport layer and passed explicitly to every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    user: Option<User>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.name.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }
}

/// Everything the gateway needs to know about one request: the caller and
/// the target id, version or inline object, decided by the caller.
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub caller: &'a CallerContext,
    pub id: Option<&'a str>,
    pub version: Option<u32>,
    pub inline: Option<CheckObject<'a>>,
}

impl<'a> RequestContext<'a> {
    pub fn new(caller: &'a CallerContext) -> Self {
        Self {
            caller,
            id: None,
            version: None,
            inline: None,
        }
    }

    pub fn with_id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_entity(mut self, entity: &'a Entity) -> Self {
        self.inline = Some(CheckObject::Entity(Cow::Borrowed(entity)));
        self
    }

    pub fn with_user(mut self, user: &'a User) -> Self {
        self.inline = Some(CheckObject::User(Cow::Borrowed(user)));
        self
    }
}
