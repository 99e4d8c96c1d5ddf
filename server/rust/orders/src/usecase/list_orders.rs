use std::sync::Arc;

use crate::domain::entity::Order;
use crate::domain::repository::OrderRepository;

#[derive(Debug, thiserror::Error)]
pub enum ListOrdersError {
    #[error("internal error: {0}")]
    Internal(String),
}

pub struct ListOrdersUseCase {
    repo: Arc<dyn OrderRepository>,
}

impl ListOrdersUseCase {
    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self) -> Result<Vec<Order>, ListOrdersError> {
        self.repo
            .find_all()
            .await
            .map_err(|e| ListOrdersError::Internal(e.to_string()))
    }
}
