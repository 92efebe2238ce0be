pub mod content_model;
pub mod entity;

pub use content_model::ContentModelService;
pub use entity::EntityService;
