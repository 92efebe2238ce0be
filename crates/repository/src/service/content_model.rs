use std::sync::Arc;

use tracing::info;

use archivum_core::{DomainError, DomainResult};

use crate::content_model::ContentModel;
use crate::store::{ContentModelStore, EntityPersistence};

/// Administration of caller-defined content models.
pub struct ContentModelService {
    models: Arc<dyn ContentModelStore>,
    entities: Arc<dyn EntityPersistence>,
}

impl ContentModelService {
    pub fn new(models: Arc<dyn ContentModelStore>, entities: Arc<dyn EntityPersistence>) -> Self {
        Self { models, entities }
    }

    pub fn create(&self, model: ContentModel) -> DomainResult<String> {
        model.validate_new()?;
        for parent in &model.allowed_parent_content_models {
            if !self.models.exists(parent)? {
                return Err(DomainError::not_found(format!("content model {parent}")));
            }
        }

        let id = model.id.clone();
        self.models.create(model)?;
        info!(content_model = %id, "content model created");
        Ok(id)
    }

    pub fn retrieve(&self, id: &str) -> DomainResult<ContentModel> {
        self.models.retrieve(id)
    }

    pub fn list(&self) -> DomainResult<Vec<ContentModel>> {
        self.models.list()
    }

    /// Number of stored entities using the model.
    pub fn usage(&self, id: &str) -> DomainResult<usize> {
        self.entities.count_by_content_model(id)
    }

    pub fn delete(&self, id: &str) -> DomainResult<()> {
        let model = self.models.retrieve(id)?;
        if model.is_fixed() {
            return Err(DomainError::invalid_parameter(format!(
                "fixed content model {id} can not be deleted"
            )));
        }
        let used_by = self.entities.count_by_content_model(id)?;
        if used_by > 0 {
            return Err(DomainError::invalid_parameter(format!(
                "content model {id} is used by {used_by} entities"
            )));
        }

        self.models.delete(id)?;
        info!(content_model = %id, "content model deleted");
        Ok(())
    }
}
