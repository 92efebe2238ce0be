//! Content models: which kinds of entities may be placed under which parents.

use serde::{Deserialize, Serialize};

use archivum_core::{DomainError, DomainResult};

/// Bootstrap content models every repository starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedContentModel {
    Level1,
    Level2,
    Data,
}

impl FixedContentModel {
    pub const ALL: [FixedContentModel; 3] = [
        FixedContentModel::Level1,
        FixedContentModel::Level2,
        FixedContentModel::Data,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            FixedContentModel::Level1 => "level1",
            FixedContentModel::Level2 => "level2",
            FixedContentModel::Data => "data",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }

    /// Materialize the model with its fixed parent rules.
    pub fn model(self) -> ContentModel {
        match self {
            FixedContentModel::Level1 => ContentModel::new(self.id(), "Level 1", Vec::<String>::new()),
            FixedContentModel::Level2 => {
                ContentModel::new(self.id(), "Level 2", [FixedContentModel::Level1.id()])
            }
            FixedContentModel::Data => ContentModel::new(
                self.id(),
                "Data",
                [FixedContentModel::Level2.id(), FixedContentModel::Data.id()],
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentModel {
    pub id: String,
    pub name: String,
    pub allowed_parent_content_models: Vec<String>,
}

impl ContentModel {
    pub fn new<I, S>(id: impl Into<String>, name: impl Into<String>, allowed_parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            allowed_parent_content_models: allowed_parents.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_fixed(&self) -> bool {
        FixedContentModel::from_id(&self.id).is_some()
    }

    /// Entities of a root model must not have a parent.
    pub fn is_root(&self) -> bool {
        self.allowed_parent_content_models.is_empty()
    }

    pub fn allows_parent(&self, parent_content_model_id: &str) -> bool {
        self.allowed_parent_content_models
            .iter()
            .any(|p| p == parent_content_model_id)
    }

    /// Rules for caller-defined models: there must be at least one allowed
    /// parent, none blank, and LEVEL1 is never one of them.
    pub fn validate_new(&self) -> DomainResult<()> {
        if self.id.trim().is_empty() {
            return Err(DomainError::invalid_parameter("content model id may not be blank"));
        }
        if self.allowed_parent_content_models.is_empty() {
            return Err(DomainError::invalid_parameter(
                "allowed parent content models may not be empty",
            ));
        }
        for parent in &self.allowed_parent_content_models {
            if parent.trim().is_empty() {
                return Err(DomainError::invalid_parameter(
                    "allowed parent content models may not contain a blank id",
                ));
            }
            if parent.eq_ignore_ascii_case(FixedContentModel::Level1.id()) {
                return Err(DomainError::invalid_parameter(
                    "level1 may not be an allowed parent content model",
                ));
            }
        }
        Ok(())
    }
}
