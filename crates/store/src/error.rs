//! Storage errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}
