use async_trait::async_trait;

use crate::domain::entity::Order;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_all(&self) -> anyhow::Result<Vec<Order>>;
}
