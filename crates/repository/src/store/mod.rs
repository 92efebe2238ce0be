//! Storage boundary for entities, content models and audit records.
//!
//! Services depend on the traits only; the in-memory implementations serve
//! tests and development.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{InMemoryAuditStore, InMemoryContentModelStore, InMemoryEntityStore};
pub use r#trait::{AuditStore, ContentModelStore, EntityLookup, EntityPersistence};
