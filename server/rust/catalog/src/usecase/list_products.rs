use std::sync::Arc;

use crate::domain::entity::Product;
use crate::domain::repository::ProductRepository;

#[derive(Debug, thiserror::Error)]
pub enum ListProductsError {
    #[error("internal error: {0}")]
    Internal(String),
}

pub struct ListProductsUseCase {
    repo: Arc<dyn ProductRepository>,
}

impl ListProductsUseCase {
    pub fn new(repo: Arc<dyn ProductRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self) -> Result<Vec<Product>, ListProductsError> {
        self.repo
            .find_all()
            .await
            .map_err(|e| ListProductsError::Internal(e.to_string()))
    }
}
