//! Operation-level authorization guard.
//!
//! Resolves an operation to its policy and asks the permission evaluator.
//! Pre-phase policies run before dispatch; post-phase policies run on the
//! object a read returned, with only the authentication part enforced up
//! front.

use tracing::{debug, info};

use archivum_auth::{AuthzError, AuthzTarget, ObjectType, PermissionEvaluator};

use crate::context::RequestContext;
use crate::error::ApiResult;
use crate::operations::{Operation, Phase, Policy, PolicyRegistry};

pub struct AuthorizationGateway {
    evaluator: PermissionEvaluator,
    registry: PolicyRegistry,
}

impl AuthorizationGateway {
    pub fn new(evaluator: PermissionEvaluator, registry: PolicyRegistry) -> Self {
        Self { evaluator, registry }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Full check of `operation` against the request, regardless of phase.
    pub fn authorize(&self, operation: Operation, request: &RequestContext<'_>) -> ApiResult<()> {
        let policy = self.registry.policy(operation)?;
        self.check(operation, policy, request)
    }

    /// Check to run before dispatching `operation`.
    pub fn pre_authorize(&self, operation: Operation, request: &RequestContext<'_>) -> ApiResult<()> {
        let policy = self.registry.policy(operation)?;
        match policy.phase {
            Phase::Pre => self.check(operation, policy, request),
            Phase::Post => {
                if request.caller.user().is_none() && !policy.permissions.iter().any(|p| p.is_any()) {
                    info!(operation = %operation, "anonymous caller rejected");
                    return Err(AuthzError::InsufficientAuthentication.into());
                }
                Ok(())
            }
        }
    }

    /// Check to run on the object a read returned; a no-op for pre-phase
    /// operations.
    pub fn post_authorize(&self, operation: Operation, request: &RequestContext<'_>) -> ApiResult<()> {
        let policy = self.registry.policy(operation)?;
        match policy.phase {
            Phase::Pre => Ok(()),
            Phase::Post => self.check(operation, policy, request),
        }
    }

    fn check(&self, operation: Operation, policy: &Policy, request: &RequestContext<'_>) -> ApiResult<()> {
        let target = AuthzTarget {
            object_type: policy.object_type.unwrap_or(ObjectType::Entity),
            id: request.id,
            version: request.version,
            inline: request.inline.clone(),
        };

        match self
            .evaluator
            .authorize(request.caller.user(), &target, &policy.permissions)
        {
            Ok(()) => {
                debug!(operation = %operation, caller = ?request.caller.name(), "operation allowed");
                Ok(())
            }
            Err(err) => {
                info!(operation = %operation, caller = ?request.caller.name(), "operation refused");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use archivum_auth::{InMemoryUserStore, Permission, RoleAssignment, RoleName, User};
    use archivum_repository::{Entity, EntityPersistence, InMemoryEntityStore};

    use super::*;
    use crate::context::CallerContext;
    use crate::error::{ApiError, Status};

    fn gateway() -> AuthorizationGateway {
        let entities = Arc::new(InMemoryEntityStore::new());
        entities.create(Entity::new("l1", "level1")).unwrap();
        let evaluator = PermissionEvaluator::new(entities, Arc::new(InMemoryUserStore::new()));
        AuthorizationGateway::new(evaluator, PolicyRegistry::standard())
    }

    #[test]
    fn post_phase_only_rejects_anonymous_up_front() {
        let gateway = gateway();
        let anonymous = CallerContext::anonymous();
        let err = gateway
            .pre_authorize(Operation::RetrieveEntity, &RequestContext::new(&anonymous).with_id("l1"))
            .unwrap_err();
        assert_eq!(err.status(), Status::Unauthenticated);

        // no rights at all, but the object check is deferred
        let nobody = CallerContext::authenticated(User::new("nobody", "nobody@example.org"));
        gateway
            .pre_authorize(Operation::RetrieveEntity, &RequestContext::new(&nobody).with_id("l1"))
            .unwrap();
        let err = gateway
            .authorize(Operation::RetrieveEntity, &RequestContext::new(&nobody).with_id("l1"))
            .unwrap_err();
        assert_eq!(err.status(), Status::Forbidden);
    }

    #[test]
    fn post_authorize_skips_pre_phase_operations() {
        let gateway = gateway();
        let anonymous = CallerContext::anonymous();
        gateway
            .post_authorize(Operation::DeleteEntity, &RequestContext::new(&anonymous).with_id("l1"))
            .unwrap();
    }

    #[test]
    fn open_operations_admit_anonymous_callers() {
        let gateway = gateway();
        let anonymous = CallerContext::anonymous();
        gateway
            .pre_authorize(Operation::ListContentModels, &RequestContext::new(&anonymous))
            .unwrap();
    }

    #[test]
    fn unknown_operation_is_an_error() {
        let entities = Arc::new(InMemoryEntityStore::new());
        let evaluator = PermissionEvaluator::new(entities, Arc::new(InMemoryUserStore::new()));
        let registry = PolicyRegistry::builder()
            .register(Operation::SetRoles, Policy::roles([RoleName::Admin]))
            .build();
        let gateway = AuthorizationGateway::new(evaluator, registry);

        let admin = CallerContext::authenticated(
            User::new("root", "root@example.org").with_role(RoleAssignment::new(RoleName::Admin)),
        );
        let request = RequestContext::new(&admin);
        gateway.pre_authorize(Operation::SetRoles, &request).unwrap();
        assert!(matches!(
            gateway.pre_authorize(Operation::ListUsers, &request),
            Err(ApiError::UnknownOperation(_))
        ));
        assert_eq!(
            gateway.registry().policy(Operation::SetRoles).unwrap().permissions,
            vec![Permission::role(RoleName::Admin)]
        );
    }
}
