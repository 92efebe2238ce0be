//! Provenance records of entity writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use archivum_core::generate_id;

use crate::lifecycle::Transition;

/// Default page size for audit record retrieval.
pub const DEFAULT_AUDIT_PAGE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateEntity,
    UpdateEntity,
    SubmitEntity,
    PublishEntity,
    WithdrawEntity,
    PendingEntity,
    CreateBinary,
    DeleteBinary,
    CreateMetadata,
    DeleteMetadata,
    CreateBinaryMetadata,
    DeleteBinaryMetadata,
    CreateIdentifier,
    DeleteIdentifier,
    CreateRelation,
    DeleteRelation,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::CreateEntity => "CREATE_ENTITY",
            AuditAction::UpdateEntity => "UPDATE_ENTITY",
            AuditAction::SubmitEntity => "SUBMIT_ENTITY",
            AuditAction::PublishEntity => "PUBLISH_ENTITY",
            AuditAction::WithdrawEntity => "WITHDRAW_ENTITY",
            AuditAction::PendingEntity => "PENDING_ENTITY",
            AuditAction::CreateBinary => "CREATE_BINARY",
            AuditAction::DeleteBinary => "DELETE_BINARY",
            AuditAction::CreateMetadata => "CREATE_METADATA",
            AuditAction::DeleteMetadata => "DELETE_METADATA",
            AuditAction::CreateBinaryMetadata => "CREATE_BINARY_METADATA",
            AuditAction::DeleteBinaryMetadata => "DELETE_BINARY_METADATA",
            AuditAction::CreateIdentifier => "CREATE_IDENTIFIER",
            AuditAction::DeleteIdentifier => "DELETE_IDENTIFIER",
            AuditAction::CreateRelation => "CREATE_RELATION",
            AuditAction::DeleteRelation => "DELETE_RELATION",
        }
    }
}

impl From<Transition> for AuditAction {
    fn from(transition: Transition) -> Self {
        match transition {
            Transition::Submit => AuditAction::SubmitEntity,
            Transition::Publish => AuditAction::PublishEntity,
            Transition::Withdraw => AuditAction::WithdrawEntity,
            Transition::Pending => AuditAction::PendingEntity,
        }
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who did what to which entity, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub entity_id: String,
    pub action: AuditAction,
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(entity_id: impl Into<String>, action: AuditAction, agent_name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            entity_id: entity_id.into(),
            action,
            agent_name: agent_name.into(),
            timestamp: Utc::now(),
        }
    }
}
