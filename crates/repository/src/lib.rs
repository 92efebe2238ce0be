//! `archivum-repository`: entities, content models and their lifecycle.
//!
//! Storage is reached only through the traits in [`store`]; nothing here
//! knows about transport or authorization.

pub mod audit;
pub mod content_model;
pub mod entity;
pub mod hierarchy;
pub mod lifecycle;
pub mod service;
pub mod store;

pub use audit::{AuditAction, AuditRecord, DEFAULT_AUDIT_PAGE};
pub use content_model::{ContentModel, FixedContentModel};
pub use entity::{AlternativeIdentifier, Binary, Entity, EntityState, IdentifierType, Metadata};
pub use hierarchy::{EntityHierarchy, HierarchyResolver, resolve_hierarchy};
pub use lifecycle::{StateMachine, Transition, can_transition};
pub use service::{ContentModelService, EntityService};
pub use store::{
    AuditStore, ContentModelStore, EntityLookup, EntityPersistence, InMemoryAuditStore,
    InMemoryContentModelStore, InMemoryEntityStore,
};
