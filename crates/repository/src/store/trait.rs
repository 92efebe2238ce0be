use std::sync::Arc;

use archivum_core::DomainResult;

use crate::audit::AuditRecord;
use crate::content_model::ContentModel;
use crate::entity::Entity;

/// Read access to entities, as needed by hierarchy resolution and
/// authorization.
pub trait EntityLookup: Send + Sync {
    /// Current version of an entity (NotFound if absent).
    fn retrieve(&self, id: &str) -> DomainResult<Entity>;

    /// A specific version: the current one or a historical snapshot.
    fn retrieve_version(&self, id: &str, version: u32) -> DomainResult<Entity>;

    fn exists(&self, id: &str) -> DomainResult<bool>;

    /// Ids of entities whose parent is `id`.
    fn children(&self, id: &str) -> DomainResult<Vec<String>>;
}

/// Write side of entity storage.
///
/// Implementations own version monotonicity: `update` must only accept
/// `stored.version + 1` and must keep the replaced version as a snapshot.
pub trait EntityPersistence: EntityLookup {
    /// Insert a new entity (AlreadyExists on duplicate id).
    fn create(&self, entity: Entity) -> DomainResult<()>;

    fn update(&self, entity: Entity) -> DomainResult<()>;

    /// Remove an entity together with its snapshots.
    fn delete(&self, id: &str) -> DomainResult<()>;

    /// Historical snapshots, oldest first.
    fn old_versions(&self, id: &str) -> DomainResult<Vec<Entity>>;

    fn count_by_content_model(&self, content_model_id: &str) -> DomainResult<usize>;
}

pub trait ContentModelStore: Send + Sync {
    fn retrieve(&self, id: &str) -> DomainResult<ContentModel>;
    fn exists(&self, id: &str) -> DomainResult<bool>;
    fn create(&self, model: ContentModel) -> DomainResult<()>;
    fn delete(&self, id: &str) -> DomainResult<()>;
    fn list(&self) -> DomainResult<Vec<ContentModel>>;
}

/// Append-only provenance log, keyed by entity.
pub trait AuditStore: Send + Sync {
    fn append(&self, record: AuditRecord) -> DomainResult<()>;

    /// Records of one entity, newest first, skipping `offset` and returning
    /// at most `count`.
    fn retrieve(&self, entity_id: &str, offset: usize, count: usize) -> DomainResult<Vec<AuditRecord>>;

    /// Drop every record of an entity. Returns the number removed.
    fn delete_all(&self, entity_id: &str) -> DomainResult<usize>;
}

impl<S> EntityLookup for Arc<S>
where
    S: EntityLookup + ?Sized,
{
    fn retrieve(&self, id: &str) -> DomainResult<Entity> {
        (**self).retrieve(id)
    }

    fn retrieve_version(&self, id: &str, version: u32) -> DomainResult<Entity> {
        (**self).retrieve_version(id, version)
    }

    fn exists(&self, id: &str) -> DomainResult<bool> {
        (**self).exists(id)
    }

    fn children(&self, id: &str) -> DomainResult<Vec<String>> {
        (**self).children(id)
    }
}
