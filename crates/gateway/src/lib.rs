//! `archivum-gateway`: authorized access to the repository.
//!
//! Maps every operation to an access policy and enforces it before the
//! repository and credentials services run. Transport adapters sit on top of
//! [`SecuredRepository`] and translate [`ApiError`] via [`Status`].

pub mod authz;
pub mod context;
pub mod error;
pub mod operations;
pub mod secured;

pub use authz::AuthorizationGateway;
pub use context::{CallerContext, RequestContext};
pub use error::{ApiError, ApiResult, Status};
pub use operations::{Operation, Phase, Policy, PolicyRegistry, PolicyRegistryBuilder};
pub use secured::{RepositoryState, SecuredRepository};
