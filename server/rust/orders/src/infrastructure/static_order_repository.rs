use async_trait::async_trait;

use crate::domain::entity::{Order, OrderStatus};
use crate::domain::repository::OrderRepository;

/// StaticOrderRepository は固定の注文一覧を返すリポジトリ。
pub struct StaticOrderRepository {
    orders: Vec<Order>,
}

impl StaticOrderRepository {
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }
}

impl Default for StaticOrderRepository {
    fn default() -> Self {
        Self::new(vec![
            Order::new("ord_001", OrderStatus::Created),
            Order::new("ord_002", OrderStatus::Paid),
        ])
    }
}

#[async_trait]
impl OrderRepository for StaticOrderRepository {
    async fn find_all(&self) -> anyhow::Result<Vec<Order>> {
        Ok(self.orders.clone())
    }
}
