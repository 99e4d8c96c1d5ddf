use std::sync::Arc;

use crate::domain::entity::{NewProduct, Product};
use crate::domain::repository::product_repository::DuplicateSku;
use crate::domain::repository::ProductRepository;

#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub sku: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateProductError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("product with sku {0:?} already exists")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct CreateProductUseCase {
    repo: Arc<dyn ProductRepository>,
}

impl CreateProductUseCase {
    pub fn new(repo: Arc<dyn ProductRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, input: &CreateProductInput) -> Result<Product, CreateProductError> {
        let product =
            NewProduct::new(&input.sku, &input.name).map_err(CreateProductError::Validation)?;

        let existing = self
            .repo
            .find_by_sku(&product.sku)
            .await
            .map_err(|e| CreateProductError::Internal(e.to_string()))?;
        if existing.is_some() {
            return Err(CreateProductError::Conflict(product.sku));
        }

        self.repo.create(&product).await.map_err(|e| {
            match e.downcast_ref::<DuplicateSku>() {
                Some(dup) => CreateProductError::Conflict(dup.0.clone()),
                None => CreateProductError::Internal(e.to_string()),
            }
        })
    }
}
