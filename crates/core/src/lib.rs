//! `archivum-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no storage, no transport).

pub mod aggregate;
pub mod config;
pub mod error;
pub mod id;

pub use aggregate::{ExpectedVersion, Versioned, ensure_successor};
pub use config::RepositoryConfig;
pub use error::{DomainError, DomainResult};
pub use id::{generate_id, is_blank};
