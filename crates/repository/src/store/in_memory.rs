use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use archivum_core::{DomainError, DomainResult, ensure_successor};

use super::r#trait::{AuditStore, ContentModelStore, EntityLookup, EntityPersistence};
use crate::audit::AuditRecord;
use crate::content_model::{ContentModel, FixedContentModel};
use crate::entity::Entity;

fn poisoned() -> DomainError {
    warn!("in-memory store lock poisoned");
    DomainError::backend("lock poisoned")
}

#[derive(Debug, Default)]
struct EntityTables {
    current: HashMap<String, Entity>,
    snapshots: HashMap<String, Vec<Entity>>,
}

/// In-memory entity store with version snapshots.
///
/// Intended for tests/dev. Children are found by scanning parent links.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    inner: RwLock<EntityTables>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, EntityTables>> {
        self.inner.read().map_err(|_| poisoned())
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, EntityTables>> {
        self.inner.write().map_err(|_| poisoned())
    }
}

impl EntityLookup for InMemoryEntityStore {
    fn retrieve(&self, id: &str) -> DomainResult<Entity> {
        self.read()?
            .current
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("entity {id}")))
    }

    fn retrieve_version(&self, id: &str, version: u32) -> DomainResult<Entity> {
        let tables = self.read()?;
        let current = tables
            .current
            .get(id)
            .ok_or_else(|| DomainError::not_found(format!("entity {id}")))?;
        if current.version == version {
            return Ok(current.clone());
        }
        tables
            .snapshots
            .get(id)
            .and_then(|versions| versions.iter().find(|e| e.version == version))
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("entity {id} version {version}")))
    }

    fn exists(&self, id: &str) -> DomainResult<bool> {
        Ok(self.read()?.current.contains_key(id))
    }

    fn children(&self, id: &str) -> DomainResult<Vec<String>> {
        let tables = self.read()?;
        let mut children: Vec<String> = tables
            .current
            .values()
            .filter(|e| e.parent() == Some(id))
            .map(|e| e.id.clone())
            .collect();
        children.sort();
        Ok(children)
    }
}

impl EntityPersistence for InMemoryEntityStore {
    fn create(&self, entity: Entity) -> DomainResult<()> {
        let mut tables = self.write()?;
        if tables.current.contains_key(&entity.id) {
            return Err(DomainError::already_exists(format!("entity {}", entity.id)));
        }
        tables.current.insert(entity.id.clone(), entity);
        Ok(())
    }

    fn update(&self, entity: Entity) -> DomainResult<()> {
        let mut tables = self.write()?;
        let previous = tables
            .current
            .get(&entity.id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("entity {}", entity.id)))?;

        ensure_successor(&previous, &entity)?;

        tables
            .snapshots
            .entry(entity.id.clone())
            .or_default()
            .push(previous);
        tables.current.insert(entity.id.clone(), entity);
        Ok(())
    }

    fn delete(&self, id: &str) -> DomainResult<()> {
        let mut tables = self.write()?;
        if tables.current.remove(id).is_none() {
            return Err(DomainError::not_found(format!("entity {id}")));
        }
        tables.snapshots.remove(id);
        Ok(())
    }

    fn old_versions(&self, id: &str) -> DomainResult<Vec<Entity>> {
        let tables = self.read()?;
        if !tables.current.contains_key(id) {
            return Err(DomainError::not_found(format!("entity {id}")));
        }
        Ok(tables.snapshots.get(id).cloned().unwrap_or_default())
    }

    fn count_by_content_model(&self, content_model_id: &str) -> DomainResult<usize> {
        Ok(self
            .read()?
            .current
            .values()
            .filter(|e| e.content_model_id == content_model_id)
            .count())
    }
}

/// In-memory content model store, seeded with the fixed models.
#[derive(Debug)]
pub struct InMemoryContentModelStore {
    models: RwLock<HashMap<String, ContentModel>>,
}

impl InMemoryContentModelStore {
    pub fn new() -> Self {
        let models = FixedContentModel::ALL
            .into_iter()
            .map(|m| (m.id().to_string(), m.model()))
            .collect();
        Self {
            models: RwLock::new(models),
        }
    }
}

impl Default for InMemoryContentModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentModelStore for InMemoryContentModelStore {
    fn retrieve(&self, id: &str) -> DomainResult<ContentModel> {
        self.models
            .read()
            .map_err(|_| poisoned())?
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("content model {id}")))
    }

    fn exists(&self, id: &str) -> DomainResult<bool> {
        Ok(self.models.read().map_err(|_| poisoned())?.contains_key(id))
    }

    fn create(&self, model: ContentModel) -> DomainResult<()> {
        let mut models = self.models.write().map_err(|_| poisoned())?;
        if models.contains_key(&model.id) {
            return Err(DomainError::already_exists(format!("content model {}", model.id)));
        }
        models.insert(model.id.clone(), model);
        Ok(())
    }

    fn delete(&self, id: &str) -> DomainResult<()> {
        self.models
            .write()
            .map_err(|_| poisoned())?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(format!("content model {id}")))
    }

    fn list(&self) -> DomainResult<Vec<ContentModel>> {
        let mut models: Vec<ContentModel> = self
            .models
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(models)
    }
}

/// In-memory audit log; records of each entity kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    records: RwLock<HashMap<String, Vec<AuditRecord>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(&self, record: AuditRecord) -> DomainResult<()> {
        self.records
            .write()
            .map_err(|_| poisoned())?
            .entry(record.entity_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    fn retrieve(&self, entity_id: &str, offset: usize, count: usize) -> DomainResult<Vec<AuditRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .get(entity_id)
            .map(|list| list.iter().rev().skip(offset).take(count).cloned().collect())
            .unwrap_or_default())
    }

    fn delete_all(&self, entity_id: &str) -> DomainResult<usize> {
        Ok(self
            .records
            .write()
            .map_err(|_| poisoned())?
            .remove(entity_id)
            .map_or(0, |list| list.len()))
    }
}
