//! Operations and their access policies.
//!
//! Every externally reachable operation has exactly one policy. Permissions
//! in a policy are tried in order, so role-only checks come first.

use std::collections::HashMap;

use archivum_auth::{ObjectType, Permission, RoleName};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateEntity,
    RetrieveEntity,
    RetrieveEntityVersion,
    RetrieveOldVersions,
    UpdateEntity,
    DeleteEntity,
    SubmitEntity,
    PublishEntity,
    WithdrawEntity,
    PendingEntity,

    AddBinary,
    DeleteBinary,
    RetrieveBinary,
    AddBinaryMetadata,
    DeleteBinaryMetadata,

    AddMetadata,
    DeleteMetadata,
    AddIdentifier,
    DeleteIdentifier,
    AddRelation,
    DeleteRelation,
    RetrieveAuditRecords,

    CreateContentModel,
    RetrieveContentModel,
    DeleteContentModel,
    ListContentModels,

    CreateUser,
    RetrieveUser,
    ListUsers,
    UpdateUser,
    DeleteUser,
    SetRoles,
    SetRightWithAnchor,
    SetRightWithoutAnchor,

    RepositoryState,
}

impl Operation {
    pub const ALL: [Operation; 35] = [
        Operation::CreateEntity,
        Operation::RetrieveEntity,
        Operation::RetrieveEntityVersion,
        Operation::RetrieveOldVersions,
        Operation::UpdateEntity,
        Operation::DeleteEntity,
        Operation::SubmitEntity,
        Operation::PublishEntity,
        Operation::WithdrawEntity,
        Operation::PendingEntity,
        Operation::AddBinary,
        Operation::DeleteBinary,
        Operation::RetrieveBinary,
        Operation::AddBinaryMetadata,
        Operation::DeleteBinaryMetadata,
        Operation::AddMetadata,
        Operation::DeleteMetadata,
        Operation::AddIdentifier,
        Operation::DeleteIdentifier,
        Operation::AddRelation,
        Operation::DeleteRelation,
        Operation::RetrieveAuditRecords,
        Operation::CreateContentModel,
        Operation::RetrieveContentModel,
        Operation::DeleteContentModel,
        Operation::ListContentModels,
        Operation::CreateUser,
        Operation::RetrieveUser,
        Operation::ListUsers,
        Operation::UpdateUser,
        Operation::DeleteUser,
        Operation::SetRoles,
        Operation::SetRightWithAnchor,
        Operation::SetRightWithoutAnchor,
        Operation::RepositoryState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateEntity => "create_entity",
            Operation::RetrieveEntity => "retrieve_entity",
            Operation::RetrieveEntityVersion => "retrieve_entity_version",
            Operation::RetrieveOldVersions => "retrieve_old_versions",
            Operation::UpdateEntity => "update_entity",
            Operation::DeleteEntity => "delete_entity",
            Operation::SubmitEntity => "submit_entity",
            Operation::PublishEntity => "publish_entity",
            Operation::WithdrawEntity => "withdraw_entity",
            Operation::PendingEntity => "pending_entity",
            Operation::AddBinary => "add_binary",
            Operation::DeleteBinary => "delete_binary",
            Operation::RetrieveBinary => "retrieve_binary",
            Operation::AddBinaryMetadata => "add_binary_metadata",
            Operation::DeleteBinaryMetadata => "delete_binary_metadata",
            Operation::AddMetadata => "add_metadata",
            Operation::DeleteMetadata => "delete_metadata",
            Operation::AddIdentifier => "add_identifier",
            Operation::DeleteIdentifier => "delete_identifier",
            Operation::AddRelation => "add_relation",
            Operation::DeleteRelation => "delete_relation",
            Operation::RetrieveAuditRecords => "retrieve_audit_records",
            Operation::CreateContentModel => "create_content_model",
            Operation::RetrieveContentModel => "retrieve_content_model",
            Operation::DeleteContentModel => "delete_content_model",
            Operation::ListContentModels => "list_content_models",
            Operation::CreateUser => "create_user",
            Operation::RetrieveUser => "retrieve_user",
            Operation::ListUsers => "list_users",
            Operation::UpdateUser => "update_user",
            Operation::DeleteUser => "delete_user",
            Operation::SetRoles => "set_roles",
            Operation::SetRightWithAnchor => "set_right_with_anchor",
            Operation::SetRightWithoutAnchor => "set_right_without_anchor",
            Operation::RepositoryState => "repository_state",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the check runs relative to the operation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the operation, against the request's target.
    Pre,
    /// After a read, against the object it returned.
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// `None` for checks that never look at an object.
    pub object_type: Option<ObjectType>,
    pub permissions: Vec<Permission>,
    pub phase: Phase,
}

impl Policy {
    pub fn pre(object_type: ObjectType, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            object_type: Some(object_type),
            permissions: permissions.into_iter().collect(),
            phase: Phase::Pre,
        }
    }

    pub fn post(object_type: ObjectType, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            object_type: Some(object_type),
            permissions: permissions.into_iter().collect(),
            phase: Phase::Post,
        }
    }

    /// Role-only check, no object involved.
    pub fn roles(roles: impl IntoIterator<Item = RoleName>) -> Self {
        Self {
            object_type: None,
            permissions: roles.into_iter().map(Permission::role).collect(),
            phase: Phase::Pre,
        }
    }

    /// Open to everyone, anonymous callers included.
    pub fn open() -> Self {
        Self::roles([RoleName::Any])
    }
}

/// Lookup table from operation to policy.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<Operation, Policy>,
}

impl PolicyRegistry {
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::default()
    }

    pub fn policy(&self, operation: Operation) -> ApiResult<&Policy> {
        self.policies
            .get(&operation)
            .ok_or_else(|| ApiError::UnknownOperation(operation.to_string()))
    }

    /// The repository's access rules.
    pub fn standard() -> Self {
        use Operation as Op;
        use RoleName::{Admin, Level1Admin, User, UserAdmin};

        let admin = Permission::role(Admin);
        let entity_write = [admin, Permission::write(User), Permission::write(Level1Admin)];
        let entity_read = [admin, Permission::read(User), Permission::read(Level1Admin)];
        let user_write = [admin, Permission::write(UserAdmin)];

        let mut builder = Self::builder()
            .register(Op::CreateEntity, Policy::pre(ObjectType::InputEntity, entity_write))
            .register(Op::RetrieveEntity, Policy::post(ObjectType::Entity, entity_read))
            .register(Op::RetrieveEntityVersion, Policy::post(ObjectType::Entity, entity_read))
            .register(
                Op::RetrieveOldVersions,
                Policy::pre(ObjectType::Entity, [admin, Permission::read(Level1Admin)]),
            )
            .register(Op::RetrieveBinary, Policy::pre(ObjectType::Binary, [admin, Permission::read(User)]))
            .register(Op::RetrieveAuditRecords, Policy::pre(ObjectType::Entity, [admin]))
            .register(Op::CreateContentModel, Policy::roles([Admin, Level1Admin]))
            .register(Op::DeleteContentModel, Policy::roles([Admin, Level1Admin]))
            .register(Op::RetrieveContentModel, Policy::open())
            .register(Op::ListContentModels, Policy::open())
            .register(Op::CreateUser, Policy::pre(ObjectType::User, user_write))
            .register(
                Op::RetrieveUser,
                Policy::pre(
                    ObjectType::User,
                    [admin, Permission::role(Level1Admin), Permission::read(UserAdmin)],
                ),
            )
            .register(Op::ListUsers, Policy::roles([Admin, Level1Admin]))
            .register(Op::UpdateUser, Policy::pre(ObjectType::User, user_write))
            .register(Op::DeleteUser, Policy::pre(ObjectType::User, user_write))
            .register(Op::SetRoles, Policy::roles([Admin]))
            .register(
                Op::SetRightWithAnchor,
                Policy::pre(
                    ObjectType::Entity,
                    [admin, Permission::write(Level1Admin), Permission::write(User)],
                ),
            )
            .register(Op::SetRightWithoutAnchor, Policy::roles([Admin]))
            .register(Op::RepositoryState, Policy::roles([Admin]));

        for op in [
            Op::UpdateEntity,
            Op::DeleteEntity,
            Op::SubmitEntity,
            Op::PublishEntity,
            Op::WithdrawEntity,
            Op::PendingEntity,
        ] {
            builder = builder.register(op, Policy::pre(ObjectType::Entity, entity_write));
        }
        for op in [
            Op::AddBinary,
            Op::DeleteBinary,
            Op::AddBinaryMetadata,
            Op::DeleteBinaryMetadata,
        ] {
            builder = builder.register(op, Policy::pre(ObjectType::Binary, [admin, Permission::write(User)]));
        }
        for op in [
            Op::AddMetadata,
            Op::DeleteMetadata,
            Op::AddIdentifier,
            Op::DeleteIdentifier,
            Op::AddRelation,
            Op::DeleteRelation,
        ] {
            builder = builder.register(op, Policy::pre(ObjectType::Entity, [admin, Permission::write(User)]));
        }

        builder.build()
    }
}

#[derive(Debug, Default)]
pub struct PolicyRegistryBuilder {
    policies: HashMap<Operation, Policy>,
}

impl PolicyRegistryBuilder {
    pub fn register(mut self, operation: Operation, policy: Policy) -> Self {
        self.policies.insert(operation, policy);
        self
    }

    pub fn build(self) -> PolicyRegistry {
        PolicyRegistry {
            policies: self.policies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_has_a_policy() {
        let registry = PolicyRegistry::standard();
        for op in Operation::ALL {
            assert!(registry.policy(op).is_ok(), "{op} has no policy");
        }
    }

    #[test]
    fn admin_is_always_listed_first_unless_open() {
        let registry = PolicyRegistry::standard();
        for op in Operation::ALL {
            let policy = registry.policy(op).unwrap();
            let first = policy.permissions[0];
            assert!(
                first == Permission::role(RoleName::Admin) || first.is_any(),
                "{op} starts with {first}"
            );
        }
    }

    #[test]
    fn only_plain_retrieves_are_post_checked() {
        let registry = PolicyRegistry::standard();
        let post: Vec<_> = Operation::ALL
            .into_iter()
            .filter(|op| registry.policy(*op).unwrap().phase == Phase::Post)
            .collect();
        assert_eq!(post, vec![Operation::RetrieveEntity, Operation::RetrieveEntityVersion]);
    }

    #[test]
    fn audit_records_are_reserved_to_administrators() {
        let registry = PolicyRegistry::standard();
        let policy = registry.policy(Operation::RetrieveAuditRecords).unwrap();
        assert_eq!(policy.permissions, vec![Permission::role(RoleName::Admin)]);
        assert_eq!(policy.phase, Phase::Pre);
    }

    #[test]
    fn unregistered_operation_is_reported() {
        let registry = PolicyRegistry::builder()
            .register(Operation::ListContentModels, Policy::open())
            .build();
        let err = registry.policy(Operation::RepositoryState).unwrap_err();
        assert_eq!(err, ApiError::UnknownOperation("repository_state".into()));
    }
}
