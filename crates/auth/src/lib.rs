//! `archivum-auth`: roles, rights and authorization decisions.
//!
//! This crate is decoupled from transport; the caller is always passed in
//! explicitly, never read from ambient state.

pub mod authorize;
pub mod credentials;
pub mod password;
pub mod permissions;
pub mod rights;
pub mod roles;
pub mod store;
pub mod user;

pub use authorize::{AuthzError, AuthzTarget, CheckObject, PermissionEvaluator};
pub use credentials::CredentialsService;
pub use permissions::{ObjectType, Permission};
pub use rights::{Action, ObjectKind, RightTarget, RoleRight};
pub use roles::{AnchorType, RoleAssignment, RoleName};
pub use store::{InMemoryUserStore, UserLookup, UserStore};
pub use user::User;
