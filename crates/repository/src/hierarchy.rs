//! Resolution of the LEVEL1/LEVEL2 ancestors that govern an entity's
//! permission scope.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use archivum_core::{DomainError, DomainResult};

use crate::content_model::FixedContentModel;
use crate::entity::Entity;
use crate::store::EntityLookup;

/// LEVEL1/LEVEL2 ancestor pair of an entity. Derived, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityHierarchy {
    pub level1_id: Option<String>,
    pub level2_id: Option<String>,
}

impl EntityHierarchy {
    pub fn level1(&self) -> Option<&str> {
        self.level1_id.as_deref()
    }

    pub fn level2(&self) -> Option<&str> {
        self.level2_id.as_deref()
    }
}

/// Walks parent links upward until a LEVEL1 or LEVEL2 entity is reached.
///
/// Stateless; one resolver may be shared by concurrent callers.
pub struct HierarchyResolver<'a, L: EntityLookup + ?Sized> {
    entities: &'a L,
}

impl<'a, L: EntityLookup + ?Sized> HierarchyResolver<'a, L> {
    pub fn new(entities: &'a L) -> Self {
        Self { entities }
    }

    /// Resolve by id. NotFound if the entity or any ancestor is missing.
    pub fn resolve(&self, entity_id: &str) -> DomainResult<EntityHierarchy> {
        let entity = self.entities.retrieve(entity_id)?;
        self.resolve_entity(&entity)
    }

    /// Resolve for an entity value that may not be stored yet (e.g. the
    /// payload of a create request); only its ancestors are looked up.
    pub fn resolve_entity(&self, entity: &Entity) -> DomainResult<EntityHierarchy> {
        let mut visited = HashSet::new();
        let mut current = Cow::Borrowed(entity);

        loop {
            if !visited.insert(current.id.clone()) {
                return Err(DomainError::invalid_parameter(format!(
                    "parent chain of entity {} contains a cycle",
                    entity.id
                )));
            }

            match current.fixed_content_model() {
                Some(FixedContentModel::Level1) => {
                    return Ok(EntityHierarchy {
                        level1_id: Some(current.id.clone()),
                        level2_id: None,
                    });
                }
                Some(FixedContentModel::Level2) => {
                    return Ok(EntityHierarchy {
                        level1_id: current.parent().map(str::to_owned),
                        level2_id: Some(current.id.clone()),
                    });
                }
                _ => {}
            }

            let Some(parent_id) = current.parent().map(str::to_owned) else {
                return Ok(EntityHierarchy::default());
            };
            current = Cow::Owned(self.entities.retrieve(&parent_id)?);
        }
    }
}

/// Resolve the hierarchy of a stored entity.
pub fn resolve_hierarchy<L: EntityLookup + ?Sized>(
    entities: &L,
    entity_id: &str,
) -> DomainResult<EntityHierarchy> {
    HierarchyResolver::new(entities).resolve(entity_id)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::store::{EntityPersistence, InMemoryEntityStore};

    fn tree(data_depth: usize) -> (InMemoryEntityStore, String) {
        let store = InMemoryEntityStore::new();
        store.create(Entity::new("l1", "level1")).unwrap();
        store.create(Entity::new("l2", "level2").with_parent("l1")).unwrap();

        let mut parent = "l2".to_string();
        for depth in 0..data_depth {
            let id = format!("d{depth}");
            store.create(Entity::new(&id, "data").with_parent(&parent)).unwrap();
            parent = id;
        }
        (store, parent)
    }

    #[test]
    fn levels_resolve_to_themselves() {
        let (store, _) = tree(0);

        assert_eq!(
            resolve_hierarchy(&store, "l1").unwrap(),
            EntityHierarchy {
                level1_id: Some("l1".into()),
                level2_id: None
            }
        );
        let l2 = resolve_hierarchy(&store, "l2").unwrap();
        assert_eq!(l2.level1(), Some("l1"));
        assert_eq!(l2.level2(), Some("l2"));
    }

    #[test]
    fn parentless_data_has_no_hierarchy() {
        let store = InMemoryEntityStore::new();
        store.create(Entity::new("loose", "data")).unwrap();
        assert_eq!(
            resolve_hierarchy(&store, "loose").unwrap(),
            EntityHierarchy::default()
        );
    }

    #[test]
    fn missing_ancestor_is_not_found() {
        let store = InMemoryEntityStore::new();
        store.create(Entity::new("d", "data").with_parent("gone")).unwrap();
        assert!(resolve_hierarchy(&store, "d").unwrap_err().is_not_found());
        assert!(resolve_hierarchy(&store, "nope").unwrap_err().is_not_found());
    }

    #[test]
    fn cycles_are_rejected() {
        let store = InMemoryEntityStore::new();
        store.create(Entity::new("a", "data").with_parent("b")).unwrap();
        store.create(Entity::new("b", "data").with_parent("a")).unwrap();
        assert!(matches!(
            resolve_hierarchy(&store, "a"),
            Err(DomainError::InvalidParameter(_))
        ));
    }

    #[test]
    fn unsaved_entity_resolves_through_its_parent() {
        let (store, leaf) = tree(2);
        let draft = Entity::new("", "data").with_parent(leaf);
        let hierarchy = HierarchyResolver::new(&store).resolve_entity(&draft).unwrap();
        assert_eq!(hierarchy.level2(), Some("l2"));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

        #[test]
        fn data_at_any_depth_resolves_to_its_level_ancestors(depth in 1usize..12) {
            let (store, leaf) = tree(depth);
            let hierarchy = resolve_hierarchy(&store, &leaf).unwrap();
            prop_assert_eq!(hierarchy.level1(), Some("l1"));
            prop_assert_eq!(hierarchy.level2(), Some("l2"));
        }
    }
}
