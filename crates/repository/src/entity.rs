//! Entity aggregate and its embedded parts (binaries, metadata, identifiers,
//! relations).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use archivum_core::{DomainError, Versioned};

use crate::content_model::FixedContentModel;

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle state
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of an entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityState {
    #[default]
    Pending,
    Submitted,
    Published,
    Withdrawn,
}

impl EntityState {
    pub const ALL: [EntityState; 4] = [
        EntityState::Pending,
        EntityState::Submitted,
        EntityState::Published,
        EntityState::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityState::Pending => "PENDING",
            EntityState::Submitted => "SUBMITTED",
            EntityState::Published => "PUBLISHED",
            EntityState::Withdrawn => "WITHDRAWN",
        }
    }

    /// PUBLISHED and WITHDRAWN entities no longer accept content writes.
    pub fn is_frozen(self) -> bool {
        matches!(self, EntityState::Published | EntityState::Withdrawn)
    }
}

impl core::fmt::Display for EntityState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for EntityState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::invalid_parameter(format!("unknown entity state '{s}'")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedded parts
// ─────────────────────────────────────────────────────────────────────────────

/// Named metadata record attached to an entity or a binary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    #[serde(rename = "type")]
    pub metadata_type: String,
    pub content_type: String,
    /// Inline JSON payload, when the record is small enough to keep with the entity.
    pub json_data: Option<JsonValue>,
    pub index_inline: bool,
    pub utc_created: Option<DateTime<Utc>>,
    pub utc_last_modified: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn new(
        name: impl Into<String>,
        metadata_type: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            metadata_type: metadata_type.into(),
            content_type: content_type.into(),
            ..Default::default()
        }
    }

    pub fn with_json(mut self, data: JsonValue) -> Self {
        self.json_data = Some(data);
        self
    }
}

/// Binary content descriptor. The bytes themselves live in blob storage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binary {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub checksum: Option<String>,
    pub metadata: BTreeMap<String, Metadata>,
    pub utc_created: Option<DateTime<Utc>>,
    pub utc_last_modified: Option<DateTime<Utc>>,
}

impl Binary {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size,
            ..Default::default()
        }
    }
}

/// Supported kinds of alternative identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierType {
    Doi,
    Urn,
    Handle,
    Isbn,
    Issn,
    Pmid,
    Local,
}

impl IdentifierType {
    pub const ALL: [IdentifierType; 7] = [
        IdentifierType::Doi,
        IdentifierType::Urn,
        IdentifierType::Handle,
        IdentifierType::Isbn,
        IdentifierType::Issn,
        IdentifierType::Pmid,
        IdentifierType::Local,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IdentifierType::Doi => "DOI",
            IdentifierType::Urn => "URN",
            IdentifierType::Handle => "HANDLE",
            IdentifierType::Isbn => "ISBN",
            IdentifierType::Issn => "ISSN",
            IdentifierType::Pmid => "PMID",
            IdentifierType::Local => "LOCAL",
        }
    }
}

impl core::fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for IdentifierType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(DomainError::invalid_parameter("identifier type may not be blank"));
        }
        IdentifierType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::invalid_parameter(format!("wrong identifier type '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlternativeIdentifier {
    #[serde(rename = "type")]
    pub identifier_type: IdentifierType,
    pub value: String,
}

impl AlternativeIdentifier {
    pub fn new(identifier_type: IdentifierType, value: impl Into<String>) -> Self {
        Self {
            identifier_type,
            value: value.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity
// ─────────────────────────────────────────────────────────────────────────────

/// An archival record placed in the content-model hierarchy.
///
/// # Invariants
/// - `version` starts at 1 and grows by exactly one per persisted write.
/// - Only LEVEL1 entities (and roots of custom root models) have no parent.
/// - `children` is derived on retrieval and ignored on input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entity {
    pub id: String,
    pub content_model_id: String,
    pub parent_id: Option<String>,
    pub version: u32,
    pub state: EntityState,
    pub label: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, Metadata>,
    pub binaries: BTreeMap<String, Binary>,
    pub alternative_identifiers: Vec<AlternativeIdentifier>,
    pub relations: BTreeMap<String, Vec<String>>,
    #[serde(skip_deserializing)]
    pub children: Vec<String>,
    pub utc_created: Option<DateTime<Utc>>,
    pub utc_last_modified: Option<DateTime<Utc>>,
}

impl Entity {
    pub fn new(id: impl Into<String>, content_model_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_model_id: content_model_id.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_state(mut self, state: EntityState) -> Self {
        self.state = state;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Parent id, with blank ids treated as absent.
    pub fn parent(&self) -> Option<&str> {
        self.parent_id
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }

    pub fn fixed_content_model(&self) -> Option<FixedContentModel> {
        FixedContentModel::from_id(&self.content_model_id)
    }

    pub fn is_level1(&self) -> bool {
        self.fixed_content_model() == Some(FixedContentModel::Level1)
    }

    pub fn is_level2(&self) -> bool {
        self.fixed_content_model() == Some(FixedContentModel::Level2)
    }
}

impl Versioned for Entity {
    fn key(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u32 {
        self.version
    }
}
