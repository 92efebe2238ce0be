//! The repository as seen by callers: every operation is authorized through
//! the gateway before (or, for plain reads, after) it reaches a service.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use archivum_auth::{
    AnchorType, AuthzError, CredentialsService, InMemoryUserStore, PermissionEvaluator, RoleAssignment,
    RoleName, RoleRight, User, UserStore,
};
use archivum_core::{DomainError, RepositoryConfig};
use archivum_repository::{
    AuditRecord, AuditStore, Binary, ContentModel, ContentModelService, ContentModelStore, Entity,
    EntityPersistence, EntityService, InMemoryAuditStore, InMemoryContentModelStore,
    InMemoryEntityStore, Metadata,
};

use crate::authz::AuthorizationGateway;
use crate::context::{CallerContext, RequestContext};
use crate::error::ApiResult;
use crate::operations::{Operation, PolicyRegistry};

/// Summary returned by [`SecuredRepository::repository_state`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryState {
    pub entities_by_content_model: BTreeMap<String, usize>,
    pub users: usize,
}

const ANONYMOUS_AGENT: &str = "anonymous";

pub struct SecuredRepository {
    gateway: AuthorizationGateway,
    entities: EntityService,
    content_models: ContentModelService,
    credentials: CredentialsService,
}

impl SecuredRepository {
    pub fn new(
        entity_store: Arc<dyn EntityPersistence>,
        model_store: Arc<dyn ContentModelStore>,
        user_store: Arc<dyn UserStore>,
        audit_store: Arc<dyn AuditStore>,
        registry: PolicyRegistry,
        config: RepositoryConfig,
    ) -> Self {
        let evaluator = PermissionEvaluator::new(entity_store.clone(), user_store.clone());
        Self {
            gateway: AuthorizationGateway::new(evaluator, registry),
            entities: EntityService::new(
                entity_store.clone(),
                model_store.clone(),
                audit_store,
                config.clone(),
            ),
            content_models: ContentModelService::new(model_store, entity_store.clone()),
            credentials: CredentialsService::new(user_store, entity_store, config),
        }
    }

    /// In-memory stores with the standard policies.
    pub fn in_memory(config: RepositoryConfig) -> Self {
        Self::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(InMemoryContentModelStore::new()),
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryAuditStore::new()),
            PolicyRegistry::standard(),
            config,
        )
    }

    /// Process entry point: logging plus configuration from the environment.
    pub fn from_env() -> Self {
        archivum_observability::init();
        Self::in_memory(RepositoryConfig::from_env())
    }

    /// Create the first administrator. Refused once any administrator exists.
    pub fn bootstrap_admin(&self, user: User, password: &str) -> ApiResult<User> {
        if self.credentials.list_users()?.iter().any(User::is_admin) {
            return Err(DomainError::conflict("an administrator already exists").into());
        }
        let user = self
            .credentials
            .create_user(user.with_role(RoleAssignment::new(RoleName::Admin)), password)?;
        info!(user = %user.name, "administrator bootstrapped");
        Ok(user)
    }

    /// Resolve a caller from a user name and password. Unknown users and
    /// wrong passwords are refused alike.
    pub fn authenticate(&self, name: &str, password: &str) -> ApiResult<CallerContext> {
        match self.credentials.authenticate(name, password)? {
            Some(user) => Ok(CallerContext::authenticated(user)),
            None => {
                info!(user = %name, "authentication failed");
                Err(AuthzError::InsufficientAuthentication.into())
            }
        }
    }

    fn guard(&self, operation: Operation, request: &RequestContext<'_>) -> ApiResult<()> {
        self.gateway.pre_authorize(operation, request)
    }

    fn guard_id(&self, operation: Operation, caller: &CallerContext, id: &str) -> ApiResult<()> {
        self.guard(operation, &RequestContext::new(caller).with_id(id))
    }

    /// Name recorded in the audit trail for writes by `caller`.
    fn agent(caller: &CallerContext) -> &str {
        caller.name().unwrap_or(ANONYMOUS_AGENT)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entities
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_entity(&self, caller: &CallerContext, entity: Entity) -> ApiResult<String> {
        self.guard(
            Operation::CreateEntity,
            &RequestContext::new(caller).with_entity(&entity),
        )?;
        Ok(self.entities.create(Self::agent(caller), entity)?)
    }

    pub fn retrieve_entity(&self, caller: &CallerContext, id: &str) -> ApiResult<Entity> {
        self.guard_id(Operation::RetrieveEntity, caller, id)?;
        // Loaded before the decision, so an authenticated caller learns
        // whether the id exists (NotFound) even when the read is Forbidden.
        let entity = self.entities.retrieve(id)?;
        self.gateway.post_authorize(
            Operation::RetrieveEntity,
            &RequestContext::new(caller).with_entity(&entity),
        )?;
        Ok(entity)
    }

    pub fn retrieve_entity_version(&self, caller: &CallerContext, id: &str, version: u32) -> ApiResult<Entity> {
        let request = RequestContext::new(caller).with_id(id).with_version(version);
        self.guard(Operation::RetrieveEntityVersion, &request)?;
        // Same disclosure as retrieve_entity.
        let entity = self.entities.retrieve_version(id, version)?;
        self.gateway.post_authorize(
            Operation::RetrieveEntityVersion,
            &RequestContext::new(caller).with_entity(&entity),
        )?;
        Ok(entity)
    }

    pub fn old_versions(&self, caller: &CallerContext, id: &str) -> ApiResult<Vec<Entity>> {
        self.guard_id(Operation::RetrieveOldVersions, caller, id)?;
        Ok(self.entities.old_versions(id)?)
    }

    pub fn update_entity(&self, caller: &CallerContext, entity: Entity) -> ApiResult<Entity> {
        self.guard_id(Operation::UpdateEntity, caller, &entity.id)?;
        Ok(self.entities.update(Self::agent(caller), entity)?)
    }

    /// Delete an entity and its descendants, then drop every right anchored
    /// at a removed entity.
    ///
    /// Cleanup is attempted for every removed id. If any fails the entities
    /// stay deleted, the ids still carrying rights are logged and the first
    /// failure is returned.
    pub fn delete_entity(&self, caller: &CallerContext, id: &str) -> ApiResult<Vec<String>> {
        self.guard_id(Operation::DeleteEntity, caller, id)?;
        let removed = self.entities.delete(id)?;

        let mut uncleaned = Vec::new();
        let mut first_error = None;
        for removed_id in &removed {
            if let Err(err) = self.credentials.delete_rights(removed_id) {
                uncleaned.push(removed_id.as_str());
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            warn!(
                entity_id = %id,
                uncleaned = ?uncleaned,
                error = %err,
                "rights anchored at deleted entities remain"
            );
            return Err(err.into());
        }
        Ok(removed)
    }

    pub fn submit_entity(&self, caller: &CallerContext, id: &str) -> ApiResult<Entity> {
        self.guard_id(Operation::SubmitEntity, caller, id)?;
        Ok(self.entities.submit(Self::agent(caller), id)?)
    }

    pub fn publish_entity(&self, caller: &CallerContext, id: &str) -> ApiResult<Entity> {
        self.guard_id(Operation::PublishEntity, caller, id)?;
        Ok(self.entities.publish(Self::agent(caller), id)?)
    }

    pub fn withdraw_entity(&self, caller: &CallerContext, id: &str) -> ApiResult<Entity> {
        self.guard_id(Operation::WithdrawEntity, caller, id)?;
        Ok(self.entities.withdraw(Self::agent(caller), id)?)
    }

    pub fn pending_entity(&self, caller: &CallerContext, id: &str) -> ApiResult<Entity> {
        self.guard_id(Operation::PendingEntity, caller, id)?;
        Ok(self.entities.pending(Self::agent(caller), id)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binaries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_binary(&self, caller: &CallerContext, id: &str, binary: Binary) -> ApiResult<Entity> {
        self.guard_id(Operation::AddBinary, caller, id)?;
        Ok(self.entities.add_binary(Self::agent(caller), id, binary)?)
    }

    pub fn delete_binary(&self, caller: &CallerContext, id: &str, name: &str) -> ApiResult<Entity> {
        self.guard_id(Operation::DeleteBinary, caller, id)?;
        Ok(self.entities.delete_binary(Self::agent(caller), id, name)?)
    }

    pub fn retrieve_binary(&self, caller: &CallerContext, id: &str, name: &str) -> ApiResult<Binary> {
        self.guard_id(Operation::RetrieveBinary, caller, id)?;
        let mut entity = self.entities.retrieve(id)?;
        entity
            .binaries
            .remove(name)
            .ok_or_else(|| DomainError::not_found(format!("binary {name}")).into())
    }

    pub fn add_binary_metadata(
        &self,
        caller: &CallerContext,
        id: &str,
        binary_name: &str,
        metadata: Metadata,
    ) -> ApiResult<Entity> {
        self.guard_id(Operation::AddBinaryMetadata, caller, id)?;
        Ok(self.entities.add_binary_metadata(Self::agent(caller), id, binary_name, metadata)?)
    }

    pub fn delete_binary_metadata(
        &self,
        caller: &CallerContext,
        id: &str,
        binary_name: &str,
        name: &str,
    ) -> ApiResult<Entity> {
        self.guard_id(Operation::DeleteBinaryMetadata, caller, id)?;
        Ok(self.entities.delete_binary_metadata(Self::agent(caller), id, binary_name, name)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metadata, identifiers, relations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_metadata(&self, caller: &CallerContext, id: &str, metadata: Metadata) -> ApiResult<Entity> {
        self.guard_id(Operation::AddMetadata, caller, id)?;
        Ok(self.entities.add_metadata(Self::agent(caller), id, metadata)?)
    }

    pub fn delete_metadata(&self, caller: &CallerContext, id: &str, name: &str) -> ApiResult<Entity> {
        self.guard_id(Operation::DeleteMetadata, caller, id)?;
        Ok(self.entities.delete_metadata(Self::agent(caller), id, name)?)
    }

    pub fn add_identifier(
        &self,
        caller: &CallerContext,
        id: &str,
        identifier_type: &str,
        value: &str,
    ) -> ApiResult<Entity> {
        self.guard_id(Operation::AddIdentifier, caller, id)?;
        Ok(self.entities.add_identifier(Self::agent(caller), id, identifier_type, value)?)
    }

    pub fn delete_identifier(
        &self,
        caller: &CallerContext,
        id: &str,
        identifier_type: &str,
        value: &str,
    ) -> ApiResult<Entity> {
        self.guard_id(Operation::DeleteIdentifier, caller, id)?;
        Ok(self.entities.delete_identifier(Self::agent(caller), id, identifier_type, value)?)
    }

    pub fn add_relation(&self, caller: &CallerContext, id: &str, predicate: &str, object: &str) -> ApiResult<Entity> {
        self.guard_id(Operation::AddRelation, caller, id)?;
        Ok(self.entities.add_relation(Self::agent(caller), id, predicate, object)?)
    }

    pub fn delete_relation(
        &self,
        caller: &CallerContext,
        id: &str,
        predicate: &str,
        object: &str,
    ) -> ApiResult<Entity> {
        self.guard_id(Operation::DeleteRelation, caller, id)?;
        Ok(self.entities.delete_relation(Self::agent(caller), id, predicate, object)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audit
    // ─────────────────────────────────────────────────────────────────────────

    /// Audit records of one entity, newest first. `count` defaults to
    /// [`archivum_repository::DEFAULT_AUDIT_PAGE`].
    pub fn retrieve_audit_records(
        &self,
        caller: &CallerContext,
        id: &str,
        offset: usize,
        count: Option<usize>,
    ) -> ApiResult<Vec<AuditRecord>> {
        self.guard_id(Operation::RetrieveAuditRecords, caller, id)?;
        Ok(self.entities.audit_records(id, offset, count)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Content models
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_content_model(&self, caller: &CallerContext, model: ContentModel) -> ApiResult<String> {
        self.guard(Operation::CreateContentModel, &RequestContext::new(caller))?;
        Ok(self.content_models.create(model)?)
    }

    pub fn retrieve_content_model(&self, caller: &CallerContext, id: &str) -> ApiResult<ContentModel> {
        self.guard(Operation::RetrieveContentModel, &RequestContext::new(caller))?;
        Ok(self.content_models.retrieve(id)?)
    }

    pub fn delete_content_model(&self, caller: &CallerContext, id: &str) -> ApiResult<()> {
        self.guard(Operation::DeleteContentModel, &RequestContext::new(caller))?;
        Ok(self.content_models.delete(id)?)
    }

    pub fn list_content_models(&self, caller: &CallerContext) -> ApiResult<Vec<ContentModel>> {
        self.guard(Operation::ListContentModels, &RequestContext::new(caller))?;
        Ok(self.content_models.list()?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users and rights
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a user. Only administrators may hand out roles on creation.
    pub fn create_user(&self, caller: &CallerContext, user: User, password: &str) -> ApiResult<User> {
        self.guard(Operation::CreateUser, &RequestContext::new(caller).with_user(&user))?;
        if !user.roles.is_empty() && !caller.is_admin() {
            info!(caller = ?caller.name(), "roles supplied by a non-administrator");
            return Err(AuthzError::AccessDenied.into());
        }
        Ok(self.credentials.create_user(user, password)?)
    }

    pub fn retrieve_user(&self, caller: &CallerContext, name: &str) -> ApiResult<User> {
        self.guard_id(Operation::RetrieveUser, caller, name)?;
        Ok(self.credentials.retrieve_user(name)?)
    }

    pub fn list_users(&self, caller: &CallerContext) -> ApiResult<Vec<User>> {
        self.guard(Operation::ListUsers, &RequestContext::new(caller))?;
        Ok(self.credentials.list_users()?)
    }

    pub fn update_user(&self, caller: &CallerContext, user: User) -> ApiResult<User> {
        self.guard_id(Operation::UpdateUser, caller, &user.name)?;
        Ok(self.credentials.update_user(user)?)
    }

    /// Delete a user and every USER_ADMIN right anchored at them.
    pub fn delete_user(&self, caller: &CallerContext, name: &str) -> ApiResult<()> {
        self.guard_id(Operation::DeleteUser, caller, name)?;
        self.credentials.delete_user(name)?;
        self.credentials.delete_rights(name)?;
        Ok(())
    }

    pub fn set_roles(&self, caller: &CallerContext, name: &str, roles: Vec<RoleAssignment>) -> ApiResult<User> {
        self.guard(Operation::SetRoles, &RequestContext::new(caller))?;
        Ok(self.credentials.set_roles(name, roles)?)
    }

    /// Grant or revoke rights of `role` at `anchor` for user `name`.
    ///
    /// Entity-anchored roles are checked against the anchor entity, so a
    /// LEVEL1_ADMIN may manage rights below their own level1 entity.
    pub fn set_right(
        &self,
        caller: &CallerContext,
        name: &str,
        role: RoleName,
        anchor: &str,
        rights: BTreeSet<RoleRight>,
    ) -> ApiResult<User> {
        match role.anchor_type() {
            AnchorType::Level1Entity | AnchorType::Level2Entity => {
                self.guard_id(Operation::SetRightWithAnchor, caller, anchor)?
            }
            AnchorType::None | AnchorType::User => {
                self.guard(Operation::SetRightWithoutAnchor, &RequestContext::new(caller))?
            }
        }
        Ok(self.credentials.set_right(name, role, anchor, rights)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // System
    // ─────────────────────────────────────────────────────────────────────────

    pub fn repository_state(&self, caller: &CallerContext) -> ApiResult<RepositoryState> {
        self.guard(Operation::RepositoryState, &RequestContext::new(caller))?;
        let mut entities_by_content_model = BTreeMap::new();
        for model in self.content_models.list()? {
            let count = self.content_models.usage(&model.id)?;
            entities_by_content_model.insert(model.id, count);
        }
        Ok(RepositoryState {
            entities_by_content_model,
            users: self.credentials.list_users()?.len(),
        })
    }
}
