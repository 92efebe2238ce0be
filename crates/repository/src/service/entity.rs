//! Entity lifecycle operations.
//!
//! Every persisted write goes through [`EntityService::commit`], which bumps
//! the version by one; the persistence collaborator snapshots the replaced
//! version and rejects stale writes. Validation always completes before the
//! write, so a rejected operation never leaves a partially-mutated entity.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use archivum_core::{DomainError, DomainResult, RepositoryConfig, generate_id, is_blank};

use crate::audit::{AuditAction, AuditRecord, DEFAULT_AUDIT_PAGE};
use crate::entity::{AlternativeIdentifier, Binary, Entity, EntityState, IdentifierType, Metadata};
use crate::hierarchy::HierarchyResolver;
use crate::lifecycle::{StateMachine, Transition};
use crate::store::{AuditStore, ContentModelStore, EntityPersistence};

pub struct EntityService {
    entities: Arc<dyn EntityPersistence>,
    content_models: Arc<dyn ContentModelStore>,
    audit: Arc<dyn AuditStore>,
    config: RepositoryConfig,
}

impl EntityService {
    pub fn new(
        entities: Arc<dyn EntityPersistence>,
        content_models: Arc<dyn ContentModelStore>,
        audit: Arc<dyn AuditStore>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            entities,
            content_models,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Create / update / retrieve / delete
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an entity and return its id (generated when blank).
    pub fn create(&self, agent: &str, mut entity: Entity) -> DomainResult<String> {
        if is_blank(Some(&entity.id)) {
            entity.id = generate_id();
        } else if self.entities.exists(&entity.id)? {
            return Err(DomainError::already_exists(format!("entity {}", entity.id)));
        }

        self.validate_hierarchy(&entity)?;

        if entity.label.trim().is_empty() {
            entity.label = self.config.default_label.clone();
        }
        let now = Utc::now();
        entity.version = 1;
        entity.children.clear();
        entity.utc_created = Some(now);
        entity.utc_last_modified = Some(now);

        let id = entity.id.clone();
        let content_model = entity.content_model_id.clone();
        self.entities.create(entity)?;
        self.record(&id, AuditAction::CreateEntity, agent)?;

        info!(entity_id = %id, content_model = %content_model, "entity created");
        Ok(id)
    }

    /// Replace the updateable fields of a stored entity.
    pub fn update(&self, agent: &str, entity: Entity) -> DomainResult<Entity> {
        let stored = self.entities.retrieve(&entity.id)?;
        StateMachine::ensure_mutable(stored.state)?;
        self.check_non_updateable_fields(&stored, &entity)?;
        self.validate_hierarchy(&entity)?;

        let mut next = entity;
        if next.label.trim().is_empty() {
            next.label = self.config.default_label.clone();
        }
        next.children.clear();
        next.utc_created = stored.utc_created;

        let next = self.commit(next, &stored)?;
        self.record(&next.id, AuditAction::UpdateEntity, agent)?;
        info!(entity_id = %next.id, version = next.version, "entity updated");
        Ok(next)
    }

    /// Current version, with children attached.
    pub fn retrieve(&self, id: &str) -> DomainResult<Entity> {
        let mut entity = self.entities.retrieve(id)?;
        entity.children = self.entities.children(id)?;
        Ok(entity)
    }

    pub fn retrieve_version(&self, id: &str, version: u32) -> DomainResult<Entity> {
        let mut entity = self.entities.retrieve_version(id, version)?;
        entity.children = self.entities.children(id)?;
        Ok(entity)
    }

    pub fn old_versions(&self, id: &str) -> DomainResult<Vec<Entity>> {
        self.entities.old_versions(id)
    }

    /// Delete an entity and its whole subtree, returning the removed ids
    /// (descendants before their ancestors). Snapshots and audit records of
    /// the removed entities go with them.
    ///
    /// Nothing is removed when the entity or any descendant is published.
    pub fn delete(&self, id: &str) -> DomainResult<Vec<String>> {
        let root = self.entities.retrieve(id)?;
        if root.state == EntityState::Published {
            return Err(DomainError::invalid_parameter(format!(
                "entity {id} is published and can not be deleted"
            )));
        }

        let subtree = self.subtree(id)?;
        for descendant in subtree.iter().filter(|d| d.as_str() != id) {
            if self.entities.retrieve(descendant)?.state == EntityState::Published {
                return Err(DomainError::invalid_parameter(format!(
                    "entity {id} has published descendant {descendant} and can not be deleted"
                )));
            }
        }

        for entity_id in &subtree {
            self.entities.delete(entity_id)?;
            self.audit.delete_all(entity_id)?;
        }

        info!(entity_id = %id, removed = subtree.len(), "entity subtree deleted");
        Ok(subtree)
    }

    /// Audit records of an entity, newest first. `count` defaults to
    /// [`DEFAULT_AUDIT_PAGE`].
    pub fn audit_records(&self, id: &str, offset: usize, count: Option<usize>) -> DomainResult<Vec<AuditRecord>> {
        if !self.entities.exists(id)? {
            return Err(DomainError::not_found(format!("entity {id}")));
        }
        self.audit.retrieve(id, offset, count.unwrap_or(DEFAULT_AUDIT_PAGE))
    }

    /// Ids of `id` and all descendants, every id listed after its descendants.
    fn subtree(&self, id: &str) -> DomainResult<Vec<String>> {
        let mut visited = HashSet::new();
        let mut preorder = Vec::new();
        let mut stack = vec![id.to_string()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            stack.extend(self.entities.children(&current)?);
            preorder.push(current);
        }

        preorder.reverse();
        Ok(preorder)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle transitions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn submit(&self, agent: &str, id: &str) -> DomainResult<Entity> {
        self.transition(agent, id, Transition::Submit)
    }

    pub fn publish(&self, agent: &str, id: &str) -> DomainResult<Entity> {
        self.transition(agent, id, Transition::Publish)
    }

    pub fn withdraw(&self, agent: &str, id: &str) -> DomainResult<Entity> {
        self.transition(agent, id, Transition::Withdraw)
    }

    pub fn pending(&self, agent: &str, id: &str) -> DomainResult<Entity> {
        self.transition(agent, id, Transition::Pending)
    }

    /// Apply a lifecycle transition. Already being in the target state is a
    /// successful no-op that leaves the version unchanged.
    pub fn transition(&self, agent: &str, id: &str, transition: Transition) -> DomainResult<Entity> {
        let stored = self.entities.retrieve(id)?;

        let Some(state) = StateMachine::plan(stored.state, transition)? else {
            debug!(entity_id = %id, state = %stored.state, transition = transition.as_str(), "transition skipped");
            return Ok(stored);
        };

        let from = stored.state;
        let mut next = stored.clone();
        next.state = state;
        let next = self.commit(next, &stored)?;
        self.record(id, transition.into(), agent)?;

        info!(entity_id = %id, from = %from, to = %state, version = next.version, "entity state changed");
        Ok(next)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binaries and metadata
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_binary(
        &self,
        agent: &str,
        id: &str, mut binary: Binary) -> DomainResult<Entity> {
        require_name(&binary.name, "binary")?;
        self.mutate(agent, id, AuditAction::CreateBinary, |entity| {
            if entity.binaries.contains_key(&binary.name) {
                return Err(DomainError::already_exists(format!("binary {}", binary.name)));
            }
            let now = Utc::now();
            binary.utc_created = Some(now);
            binary.utc_last_modified = Some(now);
            entity.binaries.insert(binary.name.clone(), binary);
            Ok(())
        })
    }

    pub fn delete_binary(
        &self,
        agent: &str,
        id: &str, name: &str) -> DomainResult<Entity> {
        self.mutate(agent, id, AuditAction::DeleteBinary, |entity| {
            entity
                .binaries
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| DomainError::not_found(format!("binary {name}")))
        })
    }

    pub fn add_metadata(
        &self,
        agent: &str,
        id: &str, mut metadata: Metadata) -> DomainResult<Entity> {
        require_name(&metadata.name, "metadata")?;
        self.mutate(agent, id, AuditAction::CreateMetadata, |entity| {
            if entity.metadata.contains_key(&metadata.name) {
                return Err(DomainError::already_exists(format!("metadata {}", metadata.name)));
            }
            stamp(&mut metadata);
            entity.metadata.insert(metadata.name.clone(), metadata);
            Ok(())
        })
    }

    pub fn delete_metadata(
        &self,
        agent: &str,
        id: &str, name: &str) -> DomainResult<Entity> {
        self.mutate(agent, id, AuditAction::DeleteMetadata, |entity| {
            entity
                .metadata
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| DomainError::not_found(format!("metadata {name}")))
        })
    }

    pub fn add_binary_metadata(
        &self,
        agent: &str,
        id: &str,
        binary_name: &str,
        mut metadata: Metadata,
    ) -> DomainResult<Entity> {
        require_name(&metadata.name, "metadata")?;
        self.mutate(agent, id, AuditAction::CreateBinaryMetadata, |entity| {
            let binary = entity
                .binaries
                .get_mut(binary_name)
                .ok_or_else(|| DomainError::not_found(format!("binary {binary_name}")))?;
            if binary.metadata.contains_key(&metadata.name) {
                return Err(DomainError::already_exists(format!("metadata {}", metadata.name)));
            }
            stamp(&mut metadata);
            binary.metadata.insert(metadata.name.clone(), metadata);
            binary.utc_last_modified = Some(Utc::now());
            Ok(())
        })
    }

    pub fn delete_binary_metadata(
        &self,
        agent: &str,
        id: &str,
        binary_name: &str,
        name: &str,
    ) -> DomainResult<Entity> {
        self.mutate(agent, id, AuditAction::DeleteBinaryMetadata, |entity| {
            let binary = entity
                .binaries
                .get_mut(binary_name)
                .ok_or_else(|| DomainError::not_found(format!("binary {binary_name}")))?;
            binary
                .metadata
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| DomainError::not_found(format!("metadata {name}")))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identifiers and relations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn add_identifier(
        &self,
        agent: &str,
        id: &str, identifier_type: &str, value: &str) -> DomainResult<Entity> {
        let identifier = parse_identifier(identifier_type, value)?;
        self.mutate(agent, id, AuditAction::CreateIdentifier, |entity| {
            if entity.alternative_identifiers.contains(&identifier) {
                return Err(DomainError::already_exists(format!(
                    "identifier {}:{}",
                    identifier.identifier_type, identifier.value
                )));
            }
            entity.alternative_identifiers.push(identifier);
            Ok(())
        })
    }

    pub fn delete_identifier(
        &self,
        agent: &str,
        id: &str, identifier_type: &str, value: &str) -> DomainResult<Entity> {
        let identifier = parse_identifier(identifier_type, value)?;
        self.mutate(agent, id, AuditAction::DeleteIdentifier, |entity| {
            let before = entity.alternative_identifiers.len();
            entity.alternative_identifiers.retain(|i| i != &identifier);
            if entity.alternative_identifiers.len() == before {
                return Err(DomainError::not_found(format!(
                    "identifier {}:{}",
                    identifier.identifier_type, identifier.value
                )));
            }
            Ok(())
        })
    }

    /// Add `object` under `predicate`. Objects of the form
    /// `<{namespace}{id}>` must reference an existing entity.
    pub fn add_relation(
        &self,
        agent: &str,
        id: &str, predicate: &str, object: &str) -> DomainResult<Entity> {
        require_name(predicate, "relation predicate")?;
        require_name(object, "relation object")?;
        if let Some(target) = self.internal_reference(object) {
            if !self.entities.exists(target)? {
                return Err(DomainError::not_found(format!("relation target entity {target}")));
            }
        }

        self.mutate(agent, id, AuditAction::CreateRelation, |entity| {
            let objects = entity.relations.entry(predicate.to_string()).or_default();
            if objects.iter().any(|o| o == object) {
                return Err(DomainError::already_exists(format!("relation {predicate} {object}")));
            }
            objects.push(object.to_string());
            Ok(())
        })
    }

    pub fn delete_relation(
        &self,
        agent: &str,
        id: &str, predicate: &str, object: &str) -> DomainResult<Entity> {
        self.mutate(agent, id, AuditAction::DeleteRelation, |entity| {
            let missing = || DomainError::not_found(format!("relation {predicate} {object}"));
            let objects = entity.relations.get_mut(predicate).ok_or_else(missing)?;
            let position = objects.iter().position(|o| o == object).ok_or_else(missing)?;
            objects.remove(position);
            if objects.is_empty() {
                entity.relations.remove(predicate);
            }
            Ok(())
        })
    }

    fn internal_reference<'o>(&self, object: &'o str) -> Option<&'o str> {
        object
            .strip_prefix('<')?
            .strip_suffix('>')?
            .strip_prefix(self.config.relation_namespace.as_str())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Content model and parent placement rules.
    fn validate_hierarchy(&self, entity: &Entity) -> DomainResult<()> {
        if entity.content_model_id.trim().is_empty() {
            return Err(DomainError::invalid_parameter("content model id may not be blank"));
        }
        let model = self.content_models.retrieve(&entity.content_model_id)?;

        if model.is_root() {
            if entity.parent().is_some() {
                return Err(DomainError::invalid_parameter(format!(
                    "entities of content model {} may not have a parent",
                    model.id
                )));
            }
            return Ok(());
        }

        let parent_id = entity.parent().ok_or_else(|| {
            DomainError::invalid_parameter(format!(
                "entities of content model {} need a parent",
                model.id
            ))
        })?;
        let parent = self.entities.retrieve(parent_id)?;

        if !model.allows_parent(&parent.content_model_id) {
            return Err(DomainError::invalid_parameter(format!(
                "invalid entity: content model {} may not be placed under {}",
                model.id, parent.content_model_id
            )));
        }
        Ok(())
    }

    fn check_non_updateable_fields(&self, stored: &Entity, next: &Entity) -> DomainResult<()> {
        if stored.content_model_id != next.content_model_id {
            return Err(DomainError::invalid_parameter("content model may not be changed"));
        }
        if stored.state != next.state {
            return Err(DomainError::invalid_parameter(
                "state may only be changed through lifecycle operations",
            ));
        }

        match (stored.parent(), next.parent()) {
            (None, None) => Ok(()),
            (Some(_), None) | (None, Some(_)) => Err(DomainError::invalid_parameter(
                "parent may not be added or removed",
            )),
            (Some(old), Some(new)) if old == new => Ok(()),
            (Some(old), Some(new)) => {
                let resolver = HierarchyResolver::new(&*self.entities);
                let from = resolver.resolve(old)?;
                let to = resolver.resolve(new)?;
                if from.level1_id != to.level1_id {
                    return Err(DomainError::invalid_parameter(
                        "entity may not be moved to a different level1",
                    ));
                }
                if from.level2_id != to.level2_id {
                    return Err(DomainError::invalid_parameter(
                        "entity may not be moved to a different level2",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Load, reject frozen entities, apply, commit.
    fn mutate<F>(&self, agent: &str, id: &str, action: AuditAction, apply: F) -> DomainResult<Entity>
    where
        F: FnOnce(&mut Entity) -> DomainResult<()>,
    {
        let stored = self.entities.retrieve(id)?;
        StateMachine::ensure_mutable(stored.state)?;

        let mut next = stored.clone();
        apply(&mut next)?;
        let next = self.commit(next, &stored)?;
        self.record(id, action, agent)?;

        debug!(entity_id = %id, version = next.version, action = %action, "entity content changed");
        Ok(next)
    }

    fn record(&self, id: &str, action: AuditAction, agent: &str) -> DomainResult<()> {
        self.audit.append(AuditRecord::new(id, action, agent))
    }

    fn commit(&self, mut next: Entity, previous: &Entity) -> DomainResult<Entity> {
        next.version = previous.version + 1;
        next.utc_last_modified = Some(Utc::now());
        self.entities.update(next.clone())?;
        Ok(next)
    }
}

fn require_name(name: &str, what: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        Err(DomainError::invalid_parameter(format!("{what} name may not be blank")))
    } else {
        Ok(())
    }
}

fn parse_identifier(identifier_type: &str, value: &str) -> DomainResult<AlternativeIdentifier> {
    let identifier_type: IdentifierType = identifier_type.parse()?;
    if value.trim().is_empty() {
        return Err(DomainError::invalid_parameter("identifier value may not be blank"));
    }
    Ok(AlternativeIdentifier::new(identifier_type, value.trim()))
}

fn stamp(metadata: &mut Metadata) {
    let now = Utc::now();
    metadata.utc_created = Some(now);
    metadata.utc_last_modified = Some(now);
}
